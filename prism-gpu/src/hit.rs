use glam::Vec3;

use crate::{FaceId, TriangleId};

/// Result of tracing a ray against the BVH.
///
/// "No hit" is a valid result (`distance == f32::MAX`), returned e.g. for rays
/// escaping an open surface.
#[derive(Clone, Copy, Debug)]
pub struct TriangleHit {
    pub distance: f32,
    pub point: Vec3,
    pub normal: Vec3,
    pub barycentric: Vec3,
    pub triangle_id: TriangleId,
    pub face_id: FaceId,
    pub front_face: bool,
}

impl TriangleHit {
    pub fn none() -> Self {
        Self {
            distance: f32::MAX,
            point: Default::default(),
            normal: Default::default(),
            barycentric: Default::default(),
            triangle_id: Default::default(),
            face_id: Default::default(),
            front_face: false,
        }
    }

    pub fn is_some(&self) -> bool {
        self.distance < f32::MAX
    }

    pub fn is_none(&self) -> bool {
        !self.is_some()
    }

    /// Returns the hit's normal flipped so that it points against `direction`,
    /// i.e. towards the side the ray came from.
    pub fn facing_normal(&self, direction: Vec3) -> Vec3 {
        if self.normal.dot(direction) > 0.0 {
            -self.normal
        } else {
            self.normal
        }
    }
}

impl Default for TriangleHit {
    fn default() -> Self {
        Self::none()
    }
}
