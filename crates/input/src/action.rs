use crate::state::{InputState, Key, MouseButton};
use serde::{Deserialize, Serialize};

/// A camera action. The camera consumes actions, never raw key codes, so
/// rebinding does not touch camera logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    MoveForward,
    MoveBackward,
    MoveLeft,
    MoveRight,
    /// Multiplies movement speed while held.
    Boost,
    /// Mouse motion rotates the camera while held.
    Look,
}

/// Key and button assignments for each [`Action`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bindings {
    pub move_forward: Vec<Key>,
    pub move_backward: Vec<Key>,
    pub move_left: Vec<Key>,
    pub move_right: Vec<Key>,
    pub boost: Vec<Key>,
    pub look: MouseButton,
}

impl Default for Bindings {
    fn default() -> Self {
        Self {
            move_forward: vec![Key::W, Key::Up],
            move_backward: vec![Key::S, Key::Down],
            move_left: vec![Key::A, Key::Left],
            move_right: vec![Key::D, Key::Right],
            boost: vec![Key::Shift],
            look: MouseButton::Primary,
        }
    }
}

impl Bindings {
    pub fn is_active(&self, action: Action, input: &InputState) -> bool {
        let keys = match action {
            Action::MoveForward => &self.move_forward,
            Action::MoveBackward => &self.move_backward,
            Action::MoveLeft => &self.move_left,
            Action::MoveRight => &self.move_right,
            Action::Boost => &self.boost,
            Action::Look => return input.is_mouse_button_down(self.look),
        };
        keys.iter().any(|k| input.is_key_down(*k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bindings_cover_wasd_and_arrows() {
        let bindings = Bindings::default();
        let mut input = InputState::new();
        input.set_key(Key::Up, true);
        assert!(bindings.is_active(Action::MoveForward, &input));
        assert!(!bindings.is_active(Action::MoveBackward, &input));

        input.set_key(Key::Up, false);
        input.set_key(Key::D, true);
        assert!(bindings.is_active(Action::MoveRight, &input));
    }

    #[test]
    fn look_follows_primary_button() {
        let bindings = Bindings::default();
        let mut input = InputState::new();
        assert!(!bindings.is_active(Action::Look, &input));
        input.set_mouse_button(MouseButton::Primary, true);
        assert!(bindings.is_active(Action::Look, &input));
    }

    #[test]
    fn rebinding_changes_activation() {
        let bindings = Bindings {
            look: MouseButton::Secondary,
            ..Default::default()
        };
        let mut input = InputState::new();
        input.set_mouse_button(MouseButton::Primary, true);
        assert!(!bindings.is_active(Action::Look, &input));
    }
}
