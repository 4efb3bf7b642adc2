//! Refraction engine for faceted gems.
//!
//! A [`GemMaterial`] owns a gem's mesh together with a BVH built over it and
//! traces light through the gem's interior: each covered pixel refracts into
//! the gem, bounces around (total internal reflection) until it refracts back
//! out, and then samples the environment, optionally dispersing the color
//! channels.
//!
//! The per-pixel algorithm lives in [`gpu`]; this crate prepares its inputs,
//! uploads them through `wgpu` and provides a CPU [`Renderer`].

#![allow(clippy::len_without_is_empty)]
#![allow(clippy::new_without_default)]

mod buffers;
mod bvh;
mod camera;
mod collider;
mod environment;
mod error;
mod geometry;
mod material;
mod mesh;
mod renderer;
mod utils;

pub use prism_gpu as gpu;

pub use self::buffers::Bindable;
pub(crate) use self::buffers::*;
pub use self::bvh::*;
pub use self::camera::*;
pub use self::collider::*;
pub use self::environment::*;
pub use self::error::*;
pub use self::geometry::*;
pub use self::material::*;
pub use self::mesh::*;
pub use self::renderer::*;
pub use self::utils::{Axis, BoundingBox};

/// Upper bound for [`GemMaterial::set_bounces()`].
pub const MAX_BOUNCES: u32 = 8;
