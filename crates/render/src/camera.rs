use glam::{EulerRot, Mat4, Quat, Vec3};
use meshview_input::{Action, Bindings, InputState};
use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_2;

/// Tunable camera constants. Fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    /// Units per second.
    pub move_speed: f32,
    /// Speed multiplier while the boost action is held.
    pub boost_multiplier: f32,
    /// Radians per pixel of mouse motion.
    pub rotation_sensitivity: f32,
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    /// Distance kept from the poles when clamping pitch.
    pub pitch_epsilon: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            yaw: 0.0,
            pitch: 0.0,
            move_speed: 2.0,
            boost_multiplier: 3.0,
            rotation_sensitivity: 0.01,
            fov_y_degrees: 45.0,
            near: 0.1,
            far: 100.0,
            pitch_epsilon: 0.01,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CameraSettingsError {
    #[error("pitch_epsilon must be in (0, pi/2), got {0}")]
    PitchEpsilon(f32),
    #[error("fov_y_degrees must be in (0, 180), got {0}")]
    FieldOfView(f32),
    #[error("clip planes need 0 < near < far, got near {near} far {far}")]
    ClipPlanes { near: f32, far: f32 },
}

impl CameraSettings {
    /// Reject values that would make the pitch clamp or projection degenerate.
    pub fn validate(&self) -> Result<(), CameraSettingsError> {
        if !(self.pitch_epsilon > 0.0 && self.pitch_epsilon < FRAC_PI_2) {
            return Err(CameraSettingsError::PitchEpsilon(self.pitch_epsilon));
        }
        if !(self.fov_y_degrees > 0.0 && self.fov_y_degrees < 180.0) {
            return Err(CameraSettingsError::FieldOfView(self.fov_y_degrees));
        }
        if !(self.near > 0.0 && self.near < self.far && self.far.is_finite()) {
            return Err(CameraSettingsError::ClipPlanes {
                near: self.near,
                far: self.far,
            });
        }
        Ok(())
    }

    /// `pitch_epsilon` forced into a range where the clamp interval is
    /// non-empty.
    fn effective_pitch_epsilon(&self) -> f32 {
        if self.pitch_epsilon > 0.0 && self.pitch_epsilon < FRAC_PI_2 {
            self.pitch_epsilon
        } else {
            CameraSettings::default().pitch_epsilon
        }
    }
}

/// Model/view/projection triple written to the shared uniform before a draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mvp {
    pub model: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
}

/// First-person fly camera driven by [`InputState`].
///
/// The view matrix derives both its forward and up vectors from the same
/// yaw-pitch rotation, so the look-at basis stays well defined as pitch
/// approaches the poles.
#[derive(Debug, Clone)]
pub struct CameraController {
    settings: CameraSettings,
    position: Vec3,
    yaw: f32,
    pitch: f32,
    aspect_ratio: f32,
    view: Mat4,
    projection: Mat4,
}

impl CameraController {
    pub fn new(settings: CameraSettings, aspect_ratio: f32) -> Self {
        if let Err(e) = settings.validate() {
            tracing::warn!("camera settings out of range: {e}");
        }
        let mut camera = Self {
            settings,
            position: settings.position,
            yaw: settings.yaw,
            pitch: 0.0,
            aspect_ratio,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        };
        camera.pitch = camera.clamp_pitch(settings.pitch);
        camera.update_view();
        camera.update_projection();
        camera
    }

    pub fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.aspect_ratio
    }

    pub fn view(&self) -> Mat4 {
        self.view
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    /// Inclusive pitch limit on either side of the horizon.
    pub fn max_pitch(&self) -> f32 {
        FRAC_PI_2 - self.settings.effective_pitch_epsilon()
    }

    fn rotation(&self) -> Quat {
        Quat::from_euler(EulerRot::YXZ, self.yaw, self.pitch, 0.0)
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation() * Vec3::NEG_Z
    }

    pub fn right(&self) -> Vec3 {
        self.rotation() * Vec3::X
    }

    pub fn up(&self) -> Vec3 {
        self.rotation() * Vec3::Y
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.update_view();
    }

    pub fn set_rotation(&mut self, yaw: f32, pitch: f32) {
        self.yaw = yaw;
        self.pitch = self.clamp_pitch(pitch);
        self.update_view();
    }

    /// Return to the configured starting position and orientation.
    pub fn reset(&mut self) {
        self.position = self.settings.position;
        self.yaw = self.settings.yaw;
        self.pitch = self.clamp_pitch(self.settings.pitch);
        self.update_view();
    }

    /// Advance by `dt` seconds of held movement keys and, while the look
    /// action is held, the accumulated mouse delta. Mouse Y is inverted.
    pub fn update(&mut self, dt: f32, input: &InputState, bindings: &Bindings) {
        let mut speed = self.settings.move_speed * dt;
        if bindings.is_active(Action::Boost, input) {
            speed *= self.settings.boost_multiplier;
        }

        let forward = self.forward();
        let right = self.right();
        let mut motion = Vec3::ZERO;
        if bindings.is_active(Action::MoveForward, input) {
            motion += forward;
        }
        if bindings.is_active(Action::MoveBackward, input) {
            motion -= forward;
        }
        if bindings.is_active(Action::MoveLeft, input) {
            motion -= right;
        }
        if bindings.is_active(Action::MoveRight, input) {
            motion += right;
        }
        self.position += motion * speed;

        if bindings.is_active(Action::Look, input) {
            let delta = input.mouse_delta() * self.settings.rotation_sensitivity;
            self.yaw += delta.x;
            self.pitch = self.clamp_pitch(self.pitch - delta.y);
        }

        self.update_view();
    }

    /// Rebuild the projection for a new aspect ratio; the view is untouched.
    pub fn update_aspect_ratio(&mut self, aspect_ratio: f32) {
        self.aspect_ratio = aspect_ratio;
        self.update_projection();
    }

    pub fn view_projection(&self, model: Mat4) -> Mvp {
        Mvp {
            model,
            view: self.view,
            projection: self.projection,
        }
    }

    fn clamp_pitch(&self, pitch: f32) -> f32 {
        let limit = self.max_pitch();
        pitch.clamp(-limit, limit)
    }

    fn update_view(&mut self) {
        self.view = Mat4::look_to_rh(self.position, self.forward(), self.up());
    }

    fn update_projection(&mut self) {
        self.projection = Mat4::perspective_rh(
            self.settings.fov_y_degrees.to_radians(),
            self.aspect_ratio,
            self.settings.near,
            self.settings.far,
        );
    }
}
