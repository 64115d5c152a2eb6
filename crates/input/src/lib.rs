//! Input state fed by the host UI's event delivery and read once per frame by
//! the camera.
//!
//! # Invariants
//! - All pending key, button and motion updates are applied before the frame
//!   that reads them begins; the host delivers them on the render thread.
//! - The accumulated mouse delta is cleared exactly once per rendered frame,
//!   after the camera has consumed it.

pub mod action;
mod state;

pub use action::{Action, Bindings};
pub use state::{InputState, Key, MouseButton};
