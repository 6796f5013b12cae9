//! Time-derived transforms.
//!
//! Every function here is a pure function of elapsed seconds, so two frames
//! drawn at the same elapsed time produce identical matrices.

use glam::{Mat4, Vec3};

/// Parameters for the orbiting camera and spinning model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrbitParams {
    /// Camera distance from the origin on the XZ plane
    pub radius: f32,
    /// Camera height above the XZ plane
    pub height: f32,
    /// Camera angular speed in radians per second
    pub orbit_speed: f32,
    /// Model angular speed in radians per second
    pub spin_speed: f32,
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Near clip distance
    pub near: f32,
    /// Far clip distance
    pub far: f32,
}

impl Default for OrbitParams {
    fn default() -> Self {
        Self {
            radius: 4.0,
            height: 1.5,
            orbit_speed: 0.5,
            spin_speed: 1.0,
            fov_y: std::f32::consts::FRAC_PI_4,
            near: 0.1,
            far: 100.0,
        }
    }
}

impl OrbitParams {
    /// Camera position at the given time.
    #[inline]
    pub fn eye(&self, elapsed: f32) -> Vec3 {
        let angle = elapsed * self.orbit_speed;
        Vec3::new(
            self.radius * angle.cos(),
            self.height,
            self.radius * angle.sin(),
        )
    }

    /// View matrix looking at the origin from the orbit position.
    pub fn view(&self, elapsed: f32) -> Mat4 {
        Mat4::look_at_rh(self.eye(elapsed), Vec3::ZERO, Vec3::Y)
    }

    /// Model matrix for the spinning object.
    pub fn model(&self, elapsed: f32) -> Mat4 {
        let angle = elapsed * self.spin_speed;
        Mat4::from_rotation_y(angle) * Mat4::from_rotation_x(angle * 0.5)
    }

    /// Projection matrix for the given aspect ratio.
    pub fn projection(&self, aspect: f32) -> Mat4 {
        vulkan_perspective(self.fov_y, aspect, self.near, self.far)
    }
}

/// Right-handed perspective projection with Vulkan clip conventions.
///
/// Depth maps to `[0, 1]` and the Y axis is flipped so +Y points up on screen.
pub fn vulkan_perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    let aspect = if aspect.is_finite() && aspect > 0.0 {
        aspect
    } else {
        1.0
    };
    let mut projection = Mat4::perspective_rh(fov_y, aspect, near, far);
    projection.y_axis.y *= -1.0;
    projection
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Vec4;

    #[test]
    fn eye_stays_on_orbit() {
        let params = OrbitParams::default();
        for i in 0..16 {
            let eye = params.eye(i as f32 * 0.37);
            let planar = Vec3::new(eye.x, 0.0, eye.z).length();
            assert_relative_eq!(planar, params.radius, epsilon = 1e-4);
            assert_relative_eq!(eye.y, params.height);
        }
    }

    #[test]
    fn transforms_are_deterministic() {
        let params = OrbitParams::default();
        assert_eq!(params.view(1.25), params.view(1.25));
        assert_eq!(params.model(3.5), params.model(3.5));
        assert_eq!(params.model(0.0), Mat4::IDENTITY);
    }

    #[test]
    fn origin_is_in_front_of_camera() {
        let params = OrbitParams::default();
        let clip = params.projection(16.0 / 9.0) * params.view(2.0) * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip / clip.w;
        assert!(clip.w > 0.0);
        assert!((0.0..=1.0).contains(&ndc.z));
        assert_relative_eq!(ndc.x, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn projection_flips_y() {
        let projection = vulkan_perspective(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 10.0);
        let clip = projection * Vec4::new(0.0, 1.0, -1.0, 1.0);
        assert!(clip.y / clip.w < 0.0);
    }

    #[test]
    fn degenerate_aspect_falls_back() {
        let fallback = vulkan_perspective(1.0, 1.0, 0.1, 10.0);
        assert_eq!(vulkan_perspective(1.0, 0.0, 0.1, 10.0), fallback);
        assert_eq!(vulkan_perspective(1.0, f32::NAN, 0.1, 10.0), fallback);
    }
}
