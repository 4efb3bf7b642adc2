use glam::Vec3;

use crate::{
    BvhStack, BvhView, Material, Ray, TrianglesView, Vec3Ext, BVH_STACK_SIZE,
};

// Ray biases below are fractions of `Material::scale`, applied in mesh-local
// space, so that they work the same for gems of any size.

/// How far the ray gets pushed into the gem after the initial refraction.
pub const ENTRY_BIAS: f32 = 0.01;

/// How far the ray gets pushed along its new direction after each internal
/// reflection.
pub const BOUNCE_BIAS: f32 = 0.001;

/// How far a hit point gets pulled back towards the ray's origin before
/// reflecting, so that it stays inside of the gem.
pub const HIT_PULLBACK: f32 = 0.001;

/// Fixed axis along which the fast dispersion mode spreads the red and blue
/// channels.
pub const DISPERSION_AXIS: Vec3 = Vec3::ONE;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Dispersion {
    /// Traces the green channel only and derives red and blue by offsetting
    /// its exit direction along [`DISPERSION_AXIS`].
    #[default]
    Fast,

    /// Traces each channel separately, with its own index of refraction.
    Accurate,
}

/// Point on the gem's surface covered by a pixel.
#[derive(Clone, Copy, Debug)]
pub struct Surface {
    /// Position, in world-coordinates
    pub point: Vec3,

    /// Outward normal, in world-coordinates
    pub normal: Vec3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitKind {
    /// Ray found its way out through a refraction.
    Refracted,

    /// Ray didn't hit anything while inside the gem, which can only happen
    /// for open (non-watertight) meshes; the ray keeps its last direction.
    Escaped,

    /// Ray bounced around for longer than the budget allowed; its last
    /// reflected direction is used as-is.
    Trapped,
}

#[derive(Clone, Copy, Debug)]
pub struct Exit {
    /// Direction in which the ray left the gem, in world-coordinates
    pub direction: Vec3,
    pub kind: ExitKind,

    /// Number of BVH queries performed
    pub queries: u32,
}

/// Exit directions for each color channel.
#[derive(Clone, Copy, Debug)]
pub struct ExitDirections {
    pub red: Vec3,
    pub green: Vec3,
    pub blue: Vec3,

    /// Whether all channels come from a single trace (no dispersion)
    pub achromatic: bool,

    /// Number of BVH queries performed, across all traces
    pub queries: u32,
}

impl ExitDirections {
    pub fn achromatic(exit: Exit) -> Self {
        Self {
            red: exit.direction,
            green: exit.direction,
            blue: exit.direction,
            achromatic: true,
            queries: exit.queries,
        }
    }

    /// Returns the angle between red and blue exit directions, in radians.
    pub fn spread(&self) -> f32 {
        self.red.angle(self.blue)
    }
}

/// Per-pixel refraction algorithm: traces light through the gem's interior,
/// bouncing until it manages to refract out (or runs out of bounces).
#[derive(Clone, Copy)]
pub struct Refraction<'a> {
    triangles: TrianglesView<'a>,
    bvh: BvhView<'a>,
    material: &'a Material,
}

impl<'a> Refraction<'a> {
    pub fn new(
        triangles: TrianglesView<'a>,
        bvh: BvhView<'a>,
        material: &'a Material,
    ) -> Self {
        Self {
            triangles,
            bvh,
            material,
        }
    }

    /// Traces the ray coming from `camera` and hitting `surface`, returning
    /// exit directions for all color channels according to the material's
    /// dispersion settings.
    pub fn trace_channels(
        &self,
        camera: Vec3,
        surface: Surface,
        stack: &mut BvhStack,
    ) -> ExitDirections {
        let ior = self.material.ior;

        if !self.material.chromatic_aberration() {
            return ExitDirections::achromatic(
                self.trace(camera, surface, ior, stack),
            );
        }

        let strength = self.material.aberration_strength;

        match self.material.dispersion() {
            Dispersion::Fast => {
                let green = self.trace(camera, surface, ior, stack);
                let offset = DISPERSION_AXIS * (strength / 2.0);

                let red = (green.direction + offset)
                    .try_normalize()
                    .unwrap_or(green.direction);

                let blue = (green.direction - offset)
                    .try_normalize()
                    .unwrap_or(green.direction);

                ExitDirections {
                    red,
                    green: green.direction,
                    blue,
                    achromatic: false,
                    queries: green.queries,
                }
            }

            Dispersion::Accurate => {
                let red =
                    self.trace(camera, surface, ior * (1.0 - strength), stack);

                let green = self.trace(camera, surface, ior, stack);

                let blue =
                    self.trace(camera, surface, ior * (1.0 + strength), stack);

                ExitDirections {
                    red: red.direction,
                    green: green.direction,
                    blue: blue.direction,
                    achromatic: false,
                    queries: red.queries + green.queries + blue.queries,
                }
            }
        }
    }

    /// Traces a single ray with given index of refraction.
    pub fn trace(
        &self,
        camera: Vec3,
        surface: Surface,
        ior: f32,
        stack: &mut BvhStack,
    ) -> Exit {
        let ior = Material::effective_ior(ior);
        let direction = (surface.point - camera).normalize();
        let normal = facing(surface.normal, direction);

        // Entering a denser medium never reflects totally, but a degenerate
        // normal could still get us here
        let direction = direction
            .refract(normal, 1.0 / ior)
            .unwrap_or(direction)
            .normalize();

        let scale = self.material.scale;

        let ray = Ray::new(surface.point, direction)
            .transform(self.material.world_to_local());

        let mut ray = Ray::new(ray.at(ENTRY_BIAS * scale), ray.direction());

        let mut kind = ExitKind::Trapped;
        let mut queries = 0;

        for _ in 0..self.material.bounces {
            queries += 1;

            let hit = ray.trace_nearest(self.triangles, self.bvh, stack);

            if hit.is_none() {
                kind = ExitKind::Escaped;
                break;
            }

            let normal = hit.facing_normal(ray.direction());

            if let Some(exit) = ray.direction().refract(normal, ior) {
                ray = Ray::new(hit.point, exit.normalize());
                kind = ExitKind::Refracted;
                break;
            }

            let direction = ray.direction().reflect(normal).normalize();
            let point =
                ray.at((hit.distance - HIT_PULLBACK * scale).max(0.0));

            ray = Ray::new(point + direction * BOUNCE_BIAS * scale, direction);
        }

        let direction = self
            .material
            .local_to_world()
            .transform_vector3(ray.direction())
            .normalize();

        Exit {
            direction,
            kind,
            queries,
        }
    }
}

/// Returns a fresh, empty traversal stack.
pub fn bvh_stack() -> BvhStack {
    [0; BVH_STACK_SIZE]
}

fn facing(normal: Vec3, direction: Vec3) -> Vec3 {
    if normal.dot(direction) > 0.0 {
        -normal
    } else {
        normal
    }
}
