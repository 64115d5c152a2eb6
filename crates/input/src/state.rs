use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Keys the viewer reacts to. Host key codes without a mapping are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    W,
    A,
    S,
    D,
    Up,
    Down,
    Left,
    Right,
    Shift,
    R,
    Escape,
}

impl Key {
    pub const COUNT: usize = 11;

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    Primary,
    Secondary,
    Middle,
}

impl MouseButton {
    pub const COUNT: usize = 3;

    fn index(self) -> usize {
        self as usize
    }
}

/// Key/button press state plus the pointer motion accumulated since the last
/// frame.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    keys: [bool; Key::COUNT],
    buttons: [bool; MouseButton::COUNT],
    mouse_delta: Vec2,
    last_pointer: Option<Vec2>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_key(&mut self, key: Key, pressed: bool) {
        self.keys[key.index()] = pressed;
    }

    pub fn is_key_down(&self, key: Key) -> bool {
        self.keys[key.index()]
    }

    pub fn set_mouse_button(&mut self, button: MouseButton, pressed: bool) {
        self.buttons[button.index()] = pressed;
    }

    pub fn is_mouse_button_down(&self, button: MouseButton) -> bool {
        self.buttons[button.index()]
    }

    /// Add to the pending delta. Several motion events within one frame
    /// compose additively.
    pub fn accumulate_mouse_delta(&mut self, delta: Vec2) {
        self.mouse_delta += delta;
    }

    pub fn mouse_delta(&self) -> Vec2 {
        self.mouse_delta
    }

    /// Must run once per rendered frame, after the camera has read the delta.
    pub fn clear_delta(&mut self) {
        self.mouse_delta = Vec2::ZERO;
    }

    /// Feed an absolute pointer position; the delta from the previous
    /// position is accumulated.
    pub fn pointer_moved(&mut self, position: Vec2) {
        if let Some(previous) = self.last_pointer {
            self.accumulate_mouse_delta(position - previous);
        }
        self.last_pointer = Some(position);
    }

    /// Forget the last pointer position so re-entry does not produce a jump.
    pub fn pointer_left(&mut self) {
        self.last_pointer = None;
    }

    /// Release every key and button, e.g. when the host loses focus.
    pub fn release_all(&mut self) {
        self.keys = [false; Key::COUNT];
        self.buttons = [false; MouseButton::COUNT];
        self.last_pointer = None;
    }
}
