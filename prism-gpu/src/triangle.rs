use bytemuck::{Pod, Zeroable};
use glam::{vec3, Vec3, Vec4, Vec4Swizzles};

use crate::{Ray, TriangleHit};

/// Triangle as laid out in the GPU buffer.
///
/// `d0.w` carries the original face index (as bits), the rest of `w`
/// components are unused.
#[repr(C)]
#[derive(Copy, Clone, Default, Pod, Zeroable, Debug, PartialEq)]
pub struct Triangle {
    pub d0: Vec4,
    pub d1: Vec4,
    pub d2: Vec4,
    pub d3: Vec4,
    pub d4: Vec4,
    pub d5: Vec4,
}

impl Triangle {
    pub fn new(
        positions: [Vec3; 3],
        normals: [Vec3; 3],
        face_id: FaceId,
    ) -> Self {
        Self {
            d0: positions[0].extend(f32::from_bits(face_id.get())),
            d1: normals[0].extend(0.0),
            d2: positions[1].extend(0.0),
            d3: normals[1].extend(0.0),
            d4: positions[2].extend(0.0),
            d5: normals[2].extend(0.0),
        }
    }

    pub fn position0(&self) -> Vec3 {
        self.d0.xyz()
    }

    pub fn normal0(&self) -> Vec3 {
        self.d1.xyz()
    }

    pub fn position1(&self) -> Vec3 {
        self.d2.xyz()
    }

    pub fn normal1(&self) -> Vec3 {
        self.d3.xyz()
    }

    pub fn position2(&self) -> Vec3 {
        self.d4.xyz()
    }

    pub fn normal2(&self) -> Vec3 {
        self.d5.xyz()
    }

    pub fn face_id(&self) -> FaceId {
        FaceId::new(self.d0.w.to_bits())
    }

    pub fn positions(&self) -> [Vec3; 3] {
        [self.position0(), self.position1(), self.position2()]
    }

    pub fn normals(&self) -> [Vec3; 3] {
        [self.normal0(), self.normal1(), self.normal2()]
    }

    pub fn center(&self) -> Vec3 {
        self.positions().into_iter().sum::<Vec3>() / 3.0
    }

    /// Returns the normal following this triangle's winding order.
    pub fn geometric_normal(&self) -> Vec3 {
        let v0v1 = self.position1() - self.position0();
        let v0v2 = self.position2() - self.position0();

        v0v1.cross(v0v2).normalize_or_zero()
    }

    /// Intersects this triangle with given ray (Möller-Trumbore); updates
    /// `hit` and returns `true` if the intersection is closer than the one
    /// already stored there.
    pub fn hit(&self, ray: Ray, hit: &mut TriangleHit) -> bool {
        let v0v1 = self.position1() - self.position0();
        let v0v2 = self.position2() - self.position0();

        // ---

        let pvec = ray.direction().cross(v0v2);
        let det = v0v1.dot(pvec);

        if det.abs() < f32::EPSILON {
            return false;
        }

        // ---

        let inv_det = 1.0 / det;
        let tvec = ray.origin() - self.position0();
        let u = tvec.dot(pvec) * inv_det;
        let qvec = tvec.cross(v0v1);
        let v = ray.direction().dot(qvec) * inv_det;
        let distance = v0v2.dot(qvec) * inv_det;

        if (u < 0.0)
            | (u > 1.0)
            | (v < 0.0)
            | (u + v > 1.0)
            | (distance <= 0.0)
            | (distance >= hit.distance)
        {
            return false;
        }

        let barycentric = vec3(1.0 - u - v, u, v);

        let normal = barycentric.x * self.normal0()
            + barycentric.y * self.normal1()
            + barycentric.z * self.normal2();

        let normal = normal
            .try_normalize()
            .unwrap_or_else(|| self.geometric_normal());

        hit.distance = distance;
        hit.point = ray.at(distance);
        hit.normal = normal;
        hit.barycentric = barycentric;
        hit.face_id = self.face_id();
        hit.front_face = det > 0.0;

        true
    }
}

/// Slot of a triangle inside the (BVH-ordered) triangle buffer.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TriangleId(u32);

impl TriangleId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

/// Index of a triangle in the original mesh, before the BVH reordered it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FaceId(u32);

impl FaceId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}
