use meshview_input::{InputState, Key, MouseButton};

/// Map an egui key to a viewer key. Keys the viewer ignores map to `None`.
pub fn key_from_egui(key: egui::Key) -> Option<Key> {
    Some(match key {
        egui::Key::W => Key::W,
        egui::Key::A => Key::A,
        egui::Key::S => Key::S,
        egui::Key::D => Key::D,
        egui::Key::ArrowUp => Key::Up,
        egui::Key::ArrowDown => Key::Down,
        egui::Key::ArrowLeft => Key::Left,
        egui::Key::ArrowRight => Key::Right,
        egui::Key::R => Key::R,
        egui::Key::Escape => Key::Escape,
        _ => return None,
    })
}

/// Shortcuts that act once on key press rather than while held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    ReloadScene,
    ResetCamera,
}

/// Feed one frame of egui input into the viewer's [`InputState`] and
/// return the shortcuts pressed.
///
/// Pointer buttons only count while the press started on the viewport
/// (`pressed_on_viewport`); keys are skipped while an egui widget holds
/// keyboard focus.
pub fn apply_egui_input(
    state: &mut InputState,
    input: &egui::InputState,
    pressed_on_viewport: bool,
    keyboard_free: bool,
) -> Vec<Shortcut> {
    let pointer = &input.pointer;
    state.set_mouse_button(MouseButton::Primary, pressed_on_viewport && pointer.primary_down());
    state.set_mouse_button(
        MouseButton::Secondary,
        pressed_on_viewport && pointer.secondary_down(),
    );
    state.set_mouse_button(MouseButton::Middle, pressed_on_viewport && pointer.middle_down());

    let mut shortcuts = Vec::new();
    for event in &input.events {
        match event {
            egui::Event::WindowFocused(false) => state.release_all(),
            egui::Event::Key {
                key,
                pressed,
                repeat,
                ..
            } if keyboard_free => {
                let Some(key) = key_from_egui(*key) else {
                    continue;
                };
                state.set_key(key, *pressed);
                if *pressed && !*repeat {
                    match key {
                        Key::R => shortcuts.push(Shortcut::ReloadScene),
                        Key::Escape => shortcuts.push(Shortcut::ResetCamera),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
    if keyboard_free {
        state.set_key(Key::Shift, input.modifiers.shift);
    }
    shortcuts
}
