use std::fmt;

use glam::{vec4, Mat4, UVec2, Vec3};

use crate::gpu;

/// Camera the gem is being looked at through.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    /// Projection matrix (view -> clip)
    pub projection: Mat4,

    /// Camera's model matrix (view -> world), i.e. the inverse of the view
    /// matrix
    pub transform: Mat4,

    /// Viewport's size, in pixels
    pub viewport: UVec2,
}

impl Camera {
    /// Creates a perspective camera placed at `eye`, looking at `target`.
    ///
    /// `fov_y` is in radians.
    pub fn looking_at(
        eye: Vec3,
        target: Vec3,
        fov_y: f32,
        viewport: UVec2,
    ) -> Self {
        let aspect_ratio = viewport.x as f32 / viewport.y.max(1) as f32;

        Self {
            projection: Mat4::perspective_rh(fov_y, aspect_ratio, 0.1, 1000.0),
            transform: Mat4::look_at_rh(eye, target, Vec3::Y).inverse(),
            viewport,
        }
    }

    pub fn origin(&self) -> Vec3 {
        self.transform.w_axis.truncate()
    }

    pub fn describe(&self) -> impl fmt::Display + '_ {
        struct Describe<'a>(&'a Camera);

        impl fmt::Display for Describe<'_> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let origin = self.0.origin();

                write!(
                    f,
                    "{}x{} at ({:.2}, {:.2}, {:.2})",
                    self.0.viewport.x,
                    self.0.viewport.y,
                    origin.x,
                    origin.y,
                    origin.z,
                )
            }
        }

        Describe(self)
    }

    pub(crate) fn serialize(&self) -> gpu::Camera {
        gpu::Camera {
            projection_inverse: self.projection.inverse(),
            view_inverse: self.transform,
            screen: vec4(
                self.viewport.x as f32,
                self.viewport.y as f32,
                Default::default(),
                Default::default(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::{uvec2, vec2, vec3};

    use super::*;

    #[test]
    fn serialize() {
        let camera = Camera::looking_at(
            vec3(0.0, 0.0, 5.0),
            Vec3::ZERO,
            1.0,
            uvec2(64, 32),
        );

        let target = camera.serialize();

        assert_eq!(uvec2(64, 32), target.screen_size());
        assert_relative_eq!(target.origin().z, 5.0, epsilon = 1e-5);

        let direction = target.view_direction(vec2(32.0, 16.0));

        assert_relative_eq!(direction.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(direction.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(direction.z, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn serialize_follows_the_orientation() {
        let camera = Camera::looking_at(
            vec3(3.0, 0.0, 0.0),
            Vec3::ZERO,
            1.0,
            uvec2(32, 32),
        );

        let target = camera.serialize();

        let center = target.view_direction(vec2(16.0, 16.0));
        let top = target.view_direction(vec2(16.0, 0.0));

        assert_relative_eq!(center.x, -1.0, epsilon = 1e-5);
        assert!(top.y > 0.0);
    }

    #[test]
    fn describe() {
        let camera = Camera::looking_at(
            vec3(1.0, 2.0, 3.0),
            Vec3::ZERO,
            1.0,
            uvec2(640, 480),
        );

        assert_eq!(
            "640x480 at (1.00, 2.00, 3.00)",
            camera.describe().to_string(),
        );
    }
}
