// SPDX-License-Identifier: MPL-2.0

//! A free-fly camera driven by Euler angles.
//!
//! The camera keeps an orthonormal basis (`front`, `right`, `up`) that is recomputed from
//! [yaw](Camera::yaw) and [pitch](Camera::pitch) whenever either changes. Angles are stored in
//! degrees; they are converted to radians only when the basis is rebuilt.

use glam::{Mat4, Vec3};

/// Default yaw, in degrees. A yaw of -90° points the camera down the negative Z axis.
pub const YAW: f32 = -90.0;
/// Default pitch, in degrees.
pub const PITCH: f32 = 0.0;
/// Default movement speed, in world units per second.
pub const SPEED: f32 = 2.5;
/// Default mouse sensitivity, in degrees per pixel of cursor travel.
pub const SENSITIVITY: f32 = 0.1;
/// Default vertical field of view, in degrees.
pub const ZOOM: f32 = 45.0;

/// The narrowest field of view reachable by scrolling.
pub const ZOOM_MIN: f32 = 1.0;
/// The widest field of view reachable by scrolling.
pub const ZOOM_MAX: f32 = 45.0;
/// Pitch is kept strictly inside ±90° so the view never flips.
pub const PITCH_LIMIT: f32 = 89.0;

/// A direction of travel, decoupled from any particular windowing system's key codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CameraMovement {
    Forward,
    Backward,
    Left,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    /// The location of this camera in world space.
    pub position: Vec3,
    front: Vec3,
    up: Vec3,
    right: Vec3,
    world_up: Vec3,
    yaw: f32,
    pitch: f32,
    /// Units travelled per second of held movement.
    pub movement_speed: f32,
    /// Degrees of rotation per pixel of cursor travel.
    pub mouse_sensitivity: f32,
    zoom: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::Y, YAW, PITCH)
    }
}

impl Camera {
    /// Creates a new `Camera` at `position`.
    ///
    /// `world_up` is the fixed up direction used to derive the camera's right vector; it must
    /// not be parallel to the initial view direction.
    pub fn new(position: Vec3, world_up: Vec3, yaw: f32, pitch: f32) -> Self {
        let mut this = Self {
            position,
            front: Vec3::new(0.0, 0.0, -1.0),
            up: world_up,
            right: Vec3::X,
            world_up,
            yaw,
            pitch,
            movement_speed: SPEED,
            mouse_sensitivity: SENSITIVITY,
            zoom: ZOOM,
        };
        this.update_vectors();

        this
    }

    pub fn front(&self) -> Vec3 {
        self.front
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn right(&self) -> Vec3 {
        self.right
    }

    pub fn world_up(&self) -> Vec3 {
        self.world_up
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// The vertical field of view, in degrees.
    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Sets the vertical field of view, clamped to `[ZOOM_MIN, ZOOM_MAX]`.
    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom = zoom.clamp(ZOOM_MIN, ZOOM_MAX);
    }

    /// The world-to-camera transform.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front, self.up)
    }

    /// The camera-to-clip transform for a viewport of the given aspect ratio.
    ///
    /// Depth is mapped to `[0, 1]`, which is what the GPU backend expects.
    pub fn projection_matrix(&self, aspect: f32, near: f32, far: f32) -> Mat4 {
        Mat4::perspective_rh(self.zoom.to_radians(), aspect, near, far)
    }

    /// Moves the camera for `delta_time` seconds in `direction`.
    pub fn process_keyboard(&mut self, direction: CameraMovement, delta_time: f32) {
        let velocity = self.movement_speed * delta_time;
        match direction {
            CameraMovement::Forward => self.position += self.front * velocity,
            CameraMovement::Backward => self.position -= self.front * velocity,
            CameraMovement::Left => self.position -= self.right * velocity,
            CameraMovement::Right => self.position += self.right * velocity,
        }
    }

    /// Rotates the camera by a cursor offset, in pixels.
    ///
    /// With `constrain_pitch`, pitch is clamped to `±PITCH_LIMIT`.
    pub fn process_mouse_movement(&mut self, x_offset: f32, y_offset: f32, constrain_pitch: bool) {
        self.yaw += x_offset * self.mouse_sensitivity;
        self.pitch += y_offset * self.mouse_sensitivity;

        if constrain_pitch {
            self.pitch = self.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
        }

        self.update_vectors();
    }

    /// Narrows (positive offset) or widens (negative offset) the field of view.
    pub fn process_mouse_scroll(&mut self, y_offset: f32) {
        self.set_zoom(self.zoom - y_offset);
    }

    fn update_vectors(&mut self) {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        self.front = Vec3::new(
            yaw.cos() * pitch.cos(),
            pitch.sin(),
            yaw.sin() * pitch.cos(),
        )
        .normalize();
        // The cross product shrinks as the camera looks up or down, hence the normalization.
        self.right = self.front.cross(self.world_up).normalize();
        self.up = self.right.cross(self.front).normalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    fn assert_vec_eq(a: Vec3, b: Vec3) {
        assert!(a.abs_diff_eq(b, EPSILON), "{a:?} != {b:?}");
    }

    #[test]
    fn default_camera_looks_down_negative_z() {
        let camera = Camera::default();

        assert_vec_eq(camera.front(), Vec3::new(0.0, 0.0, -1.0));
        assert_vec_eq(camera.right(), Vec3::X);
        assert_vec_eq(camera.up(), Vec3::Y);
        assert_eq!(camera.zoom(), ZOOM);
    }

    #[test]
    fn keyboard_moves_along_basis() {
        let mut camera = Camera::new(Vec3::new(0.0, 0.0, 3.0), Vec3::Y, YAW, PITCH);

        camera.process_keyboard(CameraMovement::Forward, 0.4);
        assert_vec_eq(camera.position, Vec3::new(0.0, 0.0, 2.0));

        camera.process_keyboard(CameraMovement::Right, 0.4);
        assert_vec_eq(camera.position, Vec3::new(1.0, 0.0, 2.0));

        camera.process_keyboard(CameraMovement::Left, 0.8);
        camera.process_keyboard(CameraMovement::Backward, 0.4);
        assert_vec_eq(camera.position, Vec3::new(-1.0, 0.0, 3.0));
    }

    #[test]
    fn pitch_is_clamped_when_constrained() {
        let mut camera = Camera::default();

        camera.process_mouse_movement(0.0, 10_000.0, true);
        assert_eq!(camera.pitch(), PITCH_LIMIT);

        camera.process_mouse_movement(0.0, -20_000.0, true);
        assert_eq!(camera.pitch(), -PITCH_LIMIT);
    }

    #[test]
    fn pitch_is_free_when_unconstrained() {
        let mut camera = Camera::default();
        camera.process_mouse_movement(0.0, 1_000.0, false);

        assert!((camera.pitch() - 100.0).abs() < EPSILON);
    }

    #[test]
    fn mouse_movement_scales_by_sensitivity() {
        let mut camera = Camera::default();
        camera.process_mouse_movement(900.0, 0.0, true);

        // 900 px * 0.1 °/px turns the camera from -Z to +X.
        assert!((camera.yaw() - 0.0).abs() < EPSILON);
        assert_vec_eq(camera.front(), Vec3::X);
    }

    #[test]
    fn basis_stays_orthonormal() {
        let mut camera = Camera::default();
        for (dx, dy) in [(13.0, 7.0), (-200.0, 450.0), (31.0, -900.0), (0.5, 0.25)] {
            camera.process_mouse_movement(dx, dy, true);

            for v in [camera.front(), camera.right(), camera.up()] {
                assert!((v.length() - 1.0).abs() < EPSILON);
            }
            assert!(camera.front().dot(camera.right()).abs() < EPSILON);
            assert!(camera.front().dot(camera.up()).abs() < EPSILON);
            assert!(camera.right().dot(camera.up()).abs() < EPSILON);
        }
    }

    #[test]
    fn scroll_clamps_zoom() {
        let mut camera = Camera::default();

        camera.process_mouse_scroll(10.0);
        assert_eq!(camera.zoom(), 35.0);

        camera.process_mouse_scroll(100.0);
        assert_eq!(camera.zoom(), ZOOM_MIN);

        camera.process_mouse_scroll(-100.0);
        assert_eq!(camera.zoom(), ZOOM_MAX);
    }

    #[test]
    fn view_matrix_maps_target_onto_negative_z() {
        let camera = Camera::new(Vec3::new(0.0, 0.0, 3.0), Vec3::Y, YAW, PITCH);
        let view = camera.view_matrix();

        assert_vec_eq(view.transform_point3(Vec3::new(0.0, 0.0, 3.0)), Vec3::ZERO);
        assert_vec_eq(view.transform_point3(Vec3::ZERO), Vec3::new(0.0, 0.0, -3.0));
    }
}
