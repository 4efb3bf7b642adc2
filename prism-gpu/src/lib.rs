//! Common structs and algorithms shared by prism's host code and its per-pixel
//! evaluators.
//!
//! Everything here is allocation-free and operates on flat buffers, so the
//! same code can back a CPU evaluator or be lowered into a shader.

#![allow(clippy::len_without_is_empty)]
#![allow(clippy::manual_range_contains)]

mod bvh_view;
mod camera;
mod environment;
mod hit;
mod material;
mod ray;
mod refraction;
mod shading;
mod triangle;
mod triangles;
mod utils;

pub use self::bvh_view::*;
pub use self::camera::*;
pub use self::environment::*;
pub use self::hit::*;
pub use self::material::*;
pub use self::ray::*;
pub use self::refraction::*;
pub use self::shading::*;
pub use self::triangle::*;
pub use self::triangles::*;
pub use self::utils::*;

pub mod prelude {
    pub use glam::*;

    pub use crate::*;
}

/// Stack used for nodes yet-to-be-visited when traversing the BVH.
pub type BvhStack = [u32; BVH_STACK_SIZE];

/// Maximum stack size when traversing the BVH.
///
/// Affects the maximum depth of the BVH tree (it must not grow deeper than
/// `BVH_STACK_SIZE` levels).
pub const BVH_STACK_SIZE: usize = 32;
