use crate::config::CameraSettings;
use crate::picking::Ray;
use glam::{DMat4, DQuat, DVec2, DVec3, DVec4};
use std::f64::consts::PI;

/// Perspective camera looking at `target`
#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveCamera {
    pub position: DVec3,
    pub target: DVec3,
    pub up: DVec3,
    /// Vertical field of view in degrees
    pub fov: f64,
    pub aspect: f64,
    pub near: f64,
    pub far: f64,
}

impl PerspectiveCamera {
    pub fn new(settings: &CameraSettings, aspect: f64) -> Self {
        Self {
            position: DVec3::from_array(settings.position),
            target: DVec3::from_array(settings.target),
            up: DVec3::Y,
            fov: settings.fov,
            aspect: if aspect > 0.0 { aspect } else { 1.0 },
            near: settings.near,
            far: settings.far,
        }
    }

    /// Keep the image undistorted after a resize. Zero sizes are ignored.
    pub fn set_aspect(&mut self, width: f64, height: f64) {
        if width > 0.0 && height > 0.0 {
            self.aspect = width / height;
        }
    }

    pub fn view_matrix(&self) -> DMat4 {
        DMat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self) -> DMat4 {
        DMat4::perspective_rh_gl(self.fov.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> DMat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// World point to clip space
    pub fn to_clip(&self, world: DVec3) -> DVec4 {
        self.view_projection() * world.extend(1.0)
    }

    /// World point to normalized device coordinates; `None` behind the camera
    pub fn project(&self, world: DVec3) -> Option<DVec3> {
        let clip = self.to_clip(world);
        if clip.w <= self.near * 0.5 {
            return None;
        }
        Some(clip.truncate() / clip.w)
    }

    /// Ray from the eye through an NDC position
    pub fn ray_from_ndc(&self, ndc: DVec2) -> Ray {
        let inverse = self.view_projection().inverse();
        let far = inverse.project_point3(DVec3::new(ndc.x, ndc.y, 0.5));
        Ray::new(self.position, far - self.position)
    }

    pub fn distance(&self) -> f64 {
        self.position.distance(self.target)
    }
}

/// NDC to pixel coordinates (origin top-left)
pub fn ndc_to_screen(ndc: DVec2, width: f64, height: f64) -> DVec2 {
    DVec2::new((ndc.x + 1.0) * 0.5 * width, (1.0 - ndc.y) * 0.5 * height)
}

/// Orbit around the camera target, with the pole along `camera.up`
#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub enable_damping: bool,
    pub damping_factor: f64,
    pub min_distance: f64,
    pub max_distance: f64,
    pub min_polar_angle: f64,
    pub max_polar_angle: f64,
    delta_theta: f64,
    delta_phi: f64,
    scale: f64,
    pan_offset: DVec3,
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self {
            enable_damping: false,
            damping_factor: 0.05,
            min_distance: 10.0,
            max_distance: 3000.0,
            min_polar_angle: 0.01,
            max_polar_angle: PI - 0.01,
            delta_theta: 0.0,
            delta_phi: 0.0,
            scale: 1.0,
            pan_offset: DVec3::ZERO,
        }
    }
}

impl OrbitControls {
    /// Swing around the pole (radians)
    pub fn rotate_left(&mut self, angle: f64) {
        self.delta_theta -= angle;
    }

    /// Tilt towards the pole (radians)
    pub fn rotate_up(&mut self, angle: f64) {
        self.delta_phi -= angle;
    }

    pub fn dolly_in(&mut self, factor: f64) {
        if factor > 0.0 {
            self.scale /= factor;
        }
    }

    pub fn dolly_out(&mut self, factor: f64) {
        if factor > 0.0 {
            self.scale *= factor;
        }
    }

    /// Slide the target in the view plane; `dx`/`dy` are fractions of the
    /// visible height at the target distance
    pub fn pan(&mut self, dx: f64, dy: f64, camera: &PerspectiveCamera) {
        let view = camera.view_matrix().inverse();
        let right = view.x_axis.truncate();
        let up = view.y_axis.truncate();
        let visible = 2.0 * camera.distance() * (camera.fov.to_radians() / 2.0).tan();
        self.pan_offset += right * (-dx * visible) + up * (dy * visible);
    }

    /// Apply pending motion to `camera`. Returns whether the camera moved.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) -> bool {
        let to_pole = DQuat::from_rotation_arc(camera.up.normalize(), DVec3::Y);
        let from_pole = to_pole.inverse();

        let offset = to_pole * (camera.position - camera.target);
        let mut radius = offset.length();
        if radius <= f64::EPSILON {
            return false;
        }
        let mut theta = offset.x.atan2(offset.z);
        let mut phi = (offset.y / radius).clamp(-1.0, 1.0).acos();

        let step = if self.enable_damping { self.damping_factor } else { 1.0 };
        theta += self.delta_theta * step;
        phi += self.delta_phi * step;
        phi = phi.clamp(self.min_polar_angle, self.max_polar_angle);
        radius = (radius * self.scale).clamp(self.min_distance, self.max_distance);

        let target = camera.target + self.pan_offset * step;
        let offset = DVec3::new(
            radius * phi.sin() * theta.sin(),
            radius * phi.cos(),
            radius * phi.sin() * theta.cos(),
        );
        let position = target + from_pole * offset;

        if self.enable_damping {
            self.delta_theta *= 1.0 - self.damping_factor;
            self.delta_phi *= 1.0 - self.damping_factor;
            self.pan_offset *= 1.0 - self.damping_factor;
        } else {
            self.delta_theta = 0.0;
            self.delta_phi = 0.0;
            self.pan_offset = DVec3::ZERO;
        }
        self.scale = 1.0;

        let moved = position.distance_squared(camera.position) > 1e-12
            || target.distance_squared(camera.target) > 1e-12;
        camera.position = position;
        camera.target = target;
        moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> PerspectiveCamera {
        PerspectiveCamera::new(&CameraSettings::default(), 2.0)
    }

    #[test]
    fn test_target_projects_to_center() {
        let cam = camera();
        let ndc = cam.project(DVec3::ZERO).unwrap();
        assert!(ndc.x.abs() < 1e-9 && ndc.y.abs() < 1e-9);
        assert_eq!(ndc_to_screen(DVec2::ZERO, 200.0, 100.0), DVec2::new(100.0, 50.0));
    }

    #[test]
    fn test_behind_camera_is_culled() {
        let cam = camera();
        assert!(cam.project(DVec3::new(50.0, -100.0, 900.0)).is_none());
    }

    #[test]
    fn test_center_ray_hits_target() {
        let cam = camera();
        let ray = cam.ray_from_ndc(DVec2::ZERO);
        let to_target = (cam.target - cam.position).normalize();
        assert!((ray.direction - to_target).length() < 1e-9);
    }

    #[test]
    fn test_rotation_keeps_distance() {
        let mut cam = camera();
        let before = cam.distance();
        let mut controls = OrbitControls::default();
        controls.rotate_left(0.5);
        controls.rotate_up(0.2);
        assert!(controls.update(&mut cam));
        assert!((cam.distance() - before).abs() < 1e-6);
        // Nothing pending, nothing moves
        assert!(!controls.update(&mut cam));
    }

    #[test]
    fn test_dolly_is_clamped() {
        let mut cam = camera();
        let mut controls = OrbitControls::default();
        controls.dolly_in(2.0);
        controls.update(&mut cam);
        assert!((cam.distance() - camera().distance() / 2.0).abs() < 1e-6);

        controls.dolly_in(1e6);
        controls.update(&mut cam);
        assert!((cam.distance() - controls.min_distance).abs() < 1e-6);
    }

    #[test]
    fn test_polar_angle_is_clamped() {
        let mut cam = camera();
        let mut controls = OrbitControls::default();
        controls.rotate_up(10.0);
        controls.update(&mut cam);
        let offset = (cam.position - cam.target).normalize();
        assert!(offset.dot(DVec3::Y).acos() >= controls.min_polar_angle - 1e-9);
    }

    #[test]
    fn test_pan_moves_target() {
        let mut cam = camera();
        let mut controls = OrbitControls::default();
        controls.pan(0.1, 0.0, &cam);
        controls.update(&mut cam);
        assert!(cam.target.length() > 1.0);
    }
}
