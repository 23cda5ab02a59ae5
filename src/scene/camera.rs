//! Orbit camera: rotate, zoom and pan around a target point

use glam::{Mat4, Vec3};
use std::f32::consts::FRAC_PI_2;

use super::config::CameraConfig;

const PITCH_LIMIT: f32 = FRAC_PI_2 - 0.01;
const MIN_DISTANCE: f32 = 0.1;
const MAX_DISTANCE: f32 = 1000.0;
/// Distance scale per zoom step
const ZOOM_BASE: f32 = 0.95;

#[derive(Debug, Clone)]
pub struct OrbitCamera {
    pub target: Vec3,
    pub distance: f32,
    pub yaw: f32,   // Horizontal rotation (radians)
    pub pitch: f32, // Vertical rotation (radians), positive looks down from above
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    pub aspect: f32,
}

impl OrbitCamera {
    /// Place the camera at `config.position` looking at `config.target`
    pub fn from_config(config: &CameraConfig, aspect: f32) -> Self {
        let offset = config.position - config.target;
        let distance = offset.length().max(MIN_DISTANCE);
        let yaw = offset.x.atan2(offset.z);
        let pitch = (offset.y / distance).clamp(-1.0, 1.0).asin().clamp(-PITCH_LIMIT, PITCH_LIMIT);

        Self {
            target: config.target,
            distance,
            yaw,
            pitch,
            fov_y: config.fov_degrees.to_radians(),
            near: config.near,
            far: config.far,
            aspect,
        }
    }

    pub fn eye(&self) -> Vec3 {
        let x = self.distance * self.pitch.cos() * self.yaw.sin();
        let y = self.distance * self.pitch.sin();
        let z = self.distance * self.pitch.cos() * self.yaw.cos();
        self.target + Vec3::new(x, y, z)
    }

    pub fn rotate(&mut self, delta_yaw: f32, delta_pitch: f32) {
        self.yaw += delta_yaw;
        self.pitch = (self.pitch + delta_pitch).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Positive `delta` moves away from the target. Steps compose
    /// multiplicatively, so `zoom(d)` followed by `zoom(-d)` is a no-op.
    pub fn zoom(&mut self, delta: f32) {
        let scale = ZOOM_BASE.powf(-delta);
        self.distance = (self.distance * scale).clamp(MIN_DISTANCE, MAX_DISTANCE);
    }

    /// Move the target (and the eye with it) in the view plane
    pub fn pan(&mut self, delta_x: f32, delta_y: f32) {
        let forward = (self.target - self.eye()).normalize();
        let right = forward.cross(Vec3::Y).normalize();
        let up = right.cross(forward).normalize();

        let pan_speed = self.distance * 0.001;
        self.target += right * delta_x * pan_speed;
        self.target += up * delta_y * pan_speed;
    }

    pub fn set_aspect(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

/// Mouse-driven orbit controls: left drag rotates, right drag pans, wheel zooms
#[derive(Debug, Default)]
pub struct OrbitControls {
    rotating: bool,
    panning: bool,
    last_cursor: Option<(f32, f32)>,
    sensitivity: f32,
}

impl OrbitControls {
    pub fn new() -> Self {
        Self {
            sensitivity: 0.005,
            ..Default::default()
        }
    }

    pub fn set_rotating(&mut self, pressed: bool) {
        self.rotating = pressed;
    }

    pub fn set_panning(&mut self, pressed: bool) {
        self.panning = pressed;
    }

    pub fn cursor_moved(&mut self, x: f32, y: f32, camera: &mut OrbitCamera) {
        if let Some((last_x, last_y)) = self.last_cursor {
            let dx = x - last_x;
            let dy = y - last_y;
            if self.rotating {
                camera.rotate(-dx * self.sensitivity, dy * self.sensitivity);
            } else if self.panning {
                camera.pan(-dx, dy);
            }
        }
        self.last_cursor = Some((x, y));
    }

    pub fn cursor_left(&mut self) {
        self.last_cursor = None;
    }

    /// `lines` is the wheel delta in lines; scrolling up zooms in
    pub fn scrolled(&mut self, lines: f32, camera: &mut OrbitCamera) {
        camera.zoom(-lines);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> OrbitCamera {
        OrbitCamera::from_config(&CameraConfig::default(), 16.0 / 9.0)
    }

    #[test]
    fn test_starts_at_configured_position() {
        let camera = camera();
        assert!((camera.eye() - Vec3::new(0.0, 0.0, 5.0)).length() < 1e-4);
        assert!((camera.distance - 5.0).abs() < 1e-5);

        let config = CameraConfig {
            position: Vec3::new(3.0, 4.0, 0.0),
            ..Default::default()
        };
        let raised = OrbitCamera::from_config(&config, 1.0);
        assert!((raised.eye() - config.position).length() < 1e-4);
    }

    #[test]
    fn test_pitch_is_clamped() {
        let mut camera = camera();
        camera.rotate(0.0, 10.0);
        assert!(camera.pitch < FRAC_PI_2);
        camera.rotate(0.0, -20.0);
        assert!(camera.pitch > -FRAC_PI_2);
        // Still a valid view matrix looking straight down-ish
        assert!(camera.view_matrix().is_finite());
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut camera = camera();
        for _ in 0..200 {
            camera.zoom(-5.0);
        }
        assert!(camera.distance >= MIN_DISTANCE);
        for _ in 0..200 {
            camera.zoom(5.0);
        }
        assert!(camera.distance <= MAX_DISTANCE);
    }

    #[test]
    fn test_large_wheel_delta_zooms_gradually() {
        let mut camera = camera();
        let mut controls = OrbitControls::new();

        // A single big trackpad event must not snap to the near limit
        controls.scrolled(10.0, &mut camera);
        let expected = 5.0 * ZOOM_BASE.powi(10);
        assert!((camera.distance - expected).abs() < 1e-4);
        assert!(camera.distance > 2.0);

        controls.scrolled(-10.0, &mut camera);
        assert!((camera.distance - 5.0).abs() < 1e-4);

        controls.scrolled(1000.0, &mut camera);
        assert_eq!(camera.distance, MIN_DISTANCE);
    }

    #[test]
    fn test_pan_moves_eye_and_target_together() {
        let mut camera = camera();
        let offset_before = camera.eye() - camera.target;

        camera.pan(100.0, 50.0);

        assert!(camera.target.length() > 0.0);
        assert!((camera.eye() - camera.target - offset_before).length() < 1e-4);
    }

    #[test]
    fn test_controls_rotate_only_while_dragging() {
        let mut camera = camera();
        let mut controls = OrbitControls::new();
        let yaw = camera.yaw;

        controls.cursor_moved(10.0, 10.0, &mut camera);
        controls.cursor_moved(50.0, 10.0, &mut camera);
        assert_eq!(camera.yaw, yaw);

        controls.set_rotating(true);
        controls.cursor_moved(90.0, 10.0, &mut camera);
        assert!((camera.yaw - (yaw - 40.0 * 0.005)).abs() < 1e-5);
    }

    #[test]
    fn test_aspect_ignores_zero_size() {
        let mut camera = camera();
        camera.set_aspect(800, 400);
        assert_eq!(camera.aspect, 2.0);
        camera.set_aspect(0, 400);
        assert_eq!(camera.aspect, 2.0);
    }
}
