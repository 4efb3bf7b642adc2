use std::sync::Arc;

use glam::{Affine3A, Mat4, Vec3};

use crate::{gpu, Geometry};

/// Invisible stand-in for the gem, used for picking.
///
/// Shares the BVH with the material it was created from.
#[derive(Clone, Debug)]
pub struct Collider {
    geometry: Arc<Geometry>,
    transform: Affine3A,
    transform_inverse: Affine3A,
}

impl Collider {
    pub(crate) fn new(geometry: Arc<Geometry>, transform: Mat4) -> Self {
        let transform = Affine3A::from_mat4(transform);

        Self {
            geometry,
            transform,
            transform_inverse: transform.inverse(),
        }
    }

    /// Casts a world-space ray against the gem, returning the nearest hit.
    pub fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
    ) -> Option<ColliderHit> {
        let direction = direction.try_normalize()?;
        let ray = gpu::Ray::new(origin, direction);
        let hit = self.geometry.trace(ray.transform(self.transform_inverse));

        if hit.is_none() {
            return None;
        }

        let point = self.transform.transform_point3(hit.point);

        let normal = self
            .transform_inverse
            .matrix3
            .transpose()
            .mul_vec3a(hit.normal.into())
            .normalize()
            .into();

        Some(ColliderHit {
            distance: origin.distance(point),
            point,
            normal,
            face_id: hit.face_id,
            front_face: hit.front_face,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColliderHit {
    /// Distance from ray's origin, in world-coordinates
    pub distance: f32,
    pub point: Vec3,

    /// Interpolated outward normal, in world-coordinates
    pub normal: Vec3,
    pub face_id: gpu::FaceId,

    /// Whether the ray hit the gem from the outside
    pub front_face: bool,
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::vec3;

    use super::*;
    use crate::Mesh;

    fn collider(transform: Mat4) -> Collider {
        let geometry = Geometry::new(Mesh::icosphere(3)).unwrap();

        Collider::new(Arc::new(geometry), transform)
    }

    #[test]
    fn raycast() {
        let target = collider(Mat4::IDENTITY);
        let hit = target.raycast(vec3(0.0, 0.0, 5.0), -Vec3::Z).unwrap();

        assert_relative_eq!(hit.distance, 4.0, epsilon = 0.01);
        assert_relative_eq!(hit.normal.z, 1.0, epsilon = 0.01);
        assert!(hit.front_face);
    }

    #[test]
    fn raycast_miss() {
        let target = collider(Mat4::IDENTITY);

        assert!(target.raycast(vec3(0.0, 3.0, 5.0), -Vec3::Z).is_none());
        assert!(target.raycast(vec3(0.0, 0.0, 5.0), Vec3::ZERO).is_none());
    }

    #[test]
    fn raycast_transformed() {
        let transform = Mat4::from_scale_rotation_translation(
            Vec3::splat(2.0),
            Default::default(),
            vec3(10.0, 0.0, 0.0),
        );

        let target = collider(transform);

        assert!(target.raycast(vec3(0.0, 0.0, 5.0), -Vec3::Z).is_none());

        let hit = target.raycast(vec3(10.0, 0.0, 5.0), -Vec3::Z).unwrap();

        assert_relative_eq!(hit.distance, 3.0, epsilon = 0.02);
        assert_relative_eq!(hit.point.z, 2.0, epsilon = 0.02);
        assert_relative_eq!(hit.normal.z, 1.0, epsilon = 0.01);
    }
}
