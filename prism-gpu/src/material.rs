use bytemuck::{Pod, Zeroable};
use glam::{Affine3A, Mat4, Vec3, Vec4};

use crate::Dispersion;

#[repr(C)]
#[derive(Clone, Copy, Default, Pod, Zeroable, Debug, PartialEq)]
pub struct Material {
    /// Model matrix (mesh-local -> world)
    pub transform: Mat4,

    /// Inverse of `transform` (world -> mesh-local)
    pub transform_inverse: Mat4,

    /// Tint multiplied into the final color; `w` is unused
    pub color: Vec4,

    pub ior: f32,
    pub bounces: u32,
    pub aberration_strength: f32,

    /// See `Material::FLAG_*`
    pub flags: u32,

    /// Half of the longest side of the mesh's bounding box, in mesh-local
    /// coordinates; ray biases are proportional to it
    pub scale: f32,
    pub _pad0: f32,
    pub _pad1: f32,
    pub _pad2: f32,
}

impl Material {
    pub const FLAG_CHROMATIC_ABERRATION: u32 = 1 << 0;
    pub const FLAG_CORRECT_MIPS: u32 = 1 << 1;
    pub const FLAG_ACCURATE_DISPERSION: u32 = 1 << 2;

    pub fn local_to_world(&self) -> Affine3A {
        Affine3A::from_mat4(self.transform)
    }

    pub fn world_to_local(&self) -> Affine3A {
        Affine3A::from_mat4(self.transform_inverse)
    }

    /// Transforms a mesh-local normal into world-coordinates.
    pub fn normal_to_world(&self, normal: Vec3) -> Vec3 {
        self.transform_inverse
            .transpose()
            .transform_vector3(normal)
            .normalize()
    }

    /// Returns the index of refraction as used for tracing; values below `1.0`
    /// would turn the gem into something less dense than air, so they get
    /// clamped.
    pub fn effective_ior(ior: f32) -> f32 {
        ior.max(1.0)
    }

    pub fn chromatic_aberration(&self) -> bool {
        self.flags & Self::FLAG_CHROMATIC_ABERRATION > 0
    }

    pub fn correct_mips(&self) -> bool {
        self.flags & Self::FLAG_CORRECT_MIPS > 0
    }

    pub fn dispersion(&self) -> Dispersion {
        if self.flags & Self::FLAG_ACCURATE_DISPERSION > 0 {
            Dispersion::Accurate
        } else {
            Dispersion::Fast
        }
    }
}
