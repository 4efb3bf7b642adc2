use bytemuck::{Pod, Zeroable};
use glam::{vec2, vec4, Mat4, UVec2, Vec2, Vec3, Vec4, Vec4Swizzles};

use crate::Ray;

#[repr(C)]
#[derive(Clone, Copy, Default, Pod, Zeroable, Debug, PartialEq)]
pub struct Camera {
    pub projection_inverse: Mat4,
    pub view_inverse: Mat4,

    /// x - viewport width
    /// y - viewport height
    /// zw - unused
    pub screen: Vec4,
}

impl Camera {
    /// Returns camera's position in world-coordinates.
    pub fn origin(&self) -> Vec3 {
        self.view_inverse.w_axis.xyz()
    }

    pub fn screen_size(&self) -> UVec2 {
        self.screen.xy().as_uvec2()
    }

    /// Given a pixel, returns its center in screen-coordinates.
    pub fn pixel_center(&self, pixel: UVec2) -> Vec2 {
        pixel.as_vec2() + 0.5
    }

    /// Returns the undistorted, world-space direction from camera through
    /// given point in screen-coordinates (`0,0` being the top-left corner).
    pub fn view_direction(&self, screen_pos: Vec2) -> Vec3 {
        let ndc = screen_pos * 2.0 / self.screen.xy() - Vec2::ONE;
        let ndc = vec2(ndc.x, -ndc.y);

        let direction =
            (self.projection_inverse * vec4(ndc.x, ndc.y, 0.0, 1.0)).xyz();

        self.view_inverse.transform_vector3(direction).normalize()
    }

    /// Casts a ray from camera's origin through given point in
    /// screen-coordinates.
    pub fn ray(&self, screen_pos: Vec2) -> Ray {
        Ray::new(self.origin(), self.view_direction(screen_pos))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::vec3;

    use super::*;

    fn camera() -> Camera {
        let projection = Mat4::perspective_rh(1.0, 1.0, 0.1, 100.0);
        let view = Mat4::look_at_rh(vec3(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);

        Camera {
            projection_inverse: projection.inverse(),
            view_inverse: view.inverse(),
            screen: vec4(64.0, 64.0, 0.0, 0.0),
        }
    }

    #[test]
    fn origin() {
        let origin = camera().origin();

        assert_relative_eq!(origin.z, 5.0, epsilon = 1e-5);
    }

    #[test]
    fn view_direction_through_center() {
        let dir = camera().view_direction(vec2(32.0, 32.0));

        assert_relative_eq!(dir.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(dir.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(dir.z, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn view_direction_orientation() {
        let camera = camera();

        // Top-left of the screen looks up and to the left
        let dir = camera.view_direction(vec2(0.0, 0.0));

        assert!(dir.x < 0.0);
        assert!(dir.y > 0.0);
        assert_relative_eq!(dir.length(), 1.0, epsilon = 1e-5);
    }
}
