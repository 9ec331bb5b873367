//! Orbit camera
//!
//! Spherical coordinates around a target point, projected with a right-handed
//! perspective. Z is up, matching the optical layout of the documents.

use crate::constants;
use glam::{Mat4, Vec2, Vec3};

#[derive(Debug, Clone)]
pub struct OrbitCamera {
    pub target: Vec3,
    /// Azimuth (radians)
    pub theta: f32,
    /// Elevation above the XY plane (radians)
    pub phi: f32,
    pub distance: f32,
    /// Vertical field of view (radians)
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            theta: constants::camera::START_THETA,
            phi: constants::camera::START_PHI,
            distance: constants::camera::DISTANCE,
            fov: constants::camera::FOV_DEGREES.to_radians(),
            near: 1.0,
            far: 10000.0,
        }
    }
}

impl OrbitCamera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eye(&self) -> Vec3 {
        let offset = Vec3::new(
            self.phi.cos() * self.theta.cos(),
            self.phi.cos() * self.theta.sin(),
            self.phi.sin(),
        );
        self.target + offset * self.distance
    }

    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        let view = Mat4::look_at_rh(self.eye(), self.target, Vec3::Z);
        let proj = Mat4::perspective_rh(self.fov, aspect.max(f32::EPSILON), self.near, self.far);
        proj * view
    }

    /// Rotate around the target by a dragged screen delta (points)
    pub fn orbit(&mut self, delta: Vec2) {
        let limit = std::f32::consts::FRAC_PI_2 - 0.01;
        self.theta -= delta.x * constants::camera::DRAG_SENSITIVITY;
        self.phi = (self.phi + delta.y * constants::camera::DRAG_SENSITIVITY).clamp(-limit, limit);
    }

    /// Move closer (positive scroll) or farther away
    pub fn zoom(&mut self, scroll: f32) {
        let factor = (-scroll * constants::camera::SCROLL_SENSITIVITY).exp();
        self.distance = (self.distance * factor).clamp(self.near, self.far * 0.5);
    }

    /// Slide the target in the view plane so the scene follows the pointer
    pub fn pan(&mut self, delta: Vec2) {
        let forward = (self.target - self.eye()).normalize_or_zero();
        let right = forward.cross(Vec3::Z).normalize_or_zero();
        let up = right.cross(forward);
        let scale = self.distance * constants::camera::PAN_SENSITIVITY;
        self.target += (up * delta.y - right * delta.x) * scale;
    }

    pub fn center(&mut self, target: Vec3) {
        self.target = target;
    }

    /// Screen position (points from the top-left of a viewport of `size`), or
    /// `None` when the point is behind the camera
    pub fn project(&self, point: Vec3, size: Vec2) -> Option<Vec2> {
        let clip = self.view_projection(size.x / size.y) * point.extend(1.0);
        if clip.w <= f32::EPSILON {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        Some(Vec2::new((ndc.x + 1.0) * 0.5 * size.x, (1.0 - ndc.y) * 0.5 * size.y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_projects_to_center() {
        let mut camera = OrbitCamera::new();
        camera.center(Vec3::new(3.0, -2.0, 1.0));
        let size = Vec2::new(800.0, 600.0);
        let center = camera.project(camera.target, size).unwrap();
        assert!((center - size * 0.5).length() < 1e-3);
    }

    #[test]
    fn test_point_behind_camera_is_hidden() {
        let camera = OrbitCamera::new();
        let behind = camera.eye() + (camera.eye() - camera.target);
        assert!(camera.project(behind, Vec2::new(100.0, 100.0)).is_none());
    }

    #[test]
    fn test_orbit_clamps_elevation() {
        let mut camera = OrbitCamera::new();
        camera.orbit(Vec2::new(0.0, 10_000.0));
        assert!(camera.phi < std::f32::consts::FRAC_PI_2);
        let distance = (camera.eye() - camera.target).length();
        assert!((distance - constants::camera::DISTANCE).abs() < 1e-3);
    }

    #[test]
    fn test_pan_moves_scene_with_pointer() {
        let mut camera = OrbitCamera::new();
        let size = Vec2::new(200.0, 100.0);
        let origin = camera.target;
        let offset = camera.eye() - camera.target;

        camera.pan(Vec2::new(40.0, 0.0));
        assert!((camera.eye() - camera.target - offset).length() < 1e-4);
        let moved = camera.project(origin, size).unwrap();
        assert!(moved.x > size.x * 0.5);
        assert!((moved.y - size.y * 0.5).abs() < 1e-2);

        camera.pan(Vec2::new(-40.0, 30.0));
        let moved = camera.project(origin, size).unwrap();
        assert!((moved.x - size.x * 0.5).abs() < 1e-2);
        assert!(moved.y > size.y * 0.5);
    }

    #[test]
    fn test_zoom_in_reduces_distance() {
        let mut camera = OrbitCamera::new();
        camera.zoom(100.0);
        assert!(camera.distance < constants::camera::DISTANCE);
    }
}
