use core::mem;

use glam::{Affine3A, Vec3, Vec4Swizzles};

use crate::{
    BvhStack, BvhView, TriangleHit, TriangleId, TrianglesView, BVH_STACK_SIZE,
};

#[derive(Copy, Clone, Debug, Default)]
pub struct Ray {
    origin: Vec3,
    direction: Vec3,
    inv_direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction,
            inv_direction: 1.0 / direction,
        }
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    pub fn at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }

    /// Moves this ray into another space (e.g. world -> mesh-local); the
    /// direction gets renormalized.
    pub fn transform(&self, transform: Affine3A) -> Self {
        Self::new(
            transform.transform_point3(self.origin),
            transform.transform_vector3(self.direction).normalize(),
        )
    }

    /// Traces this ray and returns its nearest hit.
    pub fn trace_nearest(
        self,
        triangles: TrianglesView,
        bvh: BvhView,
        stack: &mut BvhStack,
    ) -> TriangleHit {
        let mut hit = TriangleHit::none();

        self.trace(triangles, bvh, stack, &mut hit);

        hit
    }

    fn trace(
        self,
        triangles: TrianglesView,
        bvh: BvhView,
        stack: &mut BvhStack,
        hit: &mut TriangleHit,
    ) {
        if bvh.is_empty() {
            return;
        }

        // Index into the `bvh` array; points at the currently processed node
        let mut bvh_ptr = 0;

        // Index into the `stack` array
        let mut stack_ptr = 0;

        loop {
            let d0 = bvh.get(bvh_ptr);
            let is_internal_node = d0.w.to_bits() == BvhView::OP_INTERNAL;

            if is_internal_node {
                let d1 = bvh.get(bvh_ptr + 1);
                let d2 = bvh.get(bvh_ptr + 2);
                let d3 = bvh.get(bvh_ptr + 3);

                let mut near_ptr = bvh_ptr + 4;
                let mut far_ptr = d1.w.to_bits();

                let mut near_distance =
                    self.distance_to_node(d0.xyz(), d1.xyz());

                let mut far_distance =
                    self.distance_to_node(d2.xyz(), d3.xyz());

                if far_distance < near_distance {
                    mem::swap(&mut near_ptr, &mut far_ptr);
                    mem::swap(&mut near_distance, &mut far_distance);
                }

                // Visit the nearer child first, since it's more likely to
                // contain the closest triangle; the farther one waits on the
                // stack.
                if far_distance < hit.distance && stack_ptr < BVH_STACK_SIZE {
                    stack[stack_ptr] = far_ptr;
                    stack_ptr += 1;
                }

                if near_distance < hit.distance {
                    bvh_ptr = near_ptr;
                    continue;
                }
            } else {
                let has_more_triangles = d0.x.to_bits() & 1 == 1;
                let triangle_id = TriangleId::new(d0.y.to_bits());

                if triangles.get(triangle_id).hit(self, hit) {
                    hit.triangle_id = triangle_id;
                }

                if has_more_triangles {
                    bvh_ptr += 1;
                    continue;
                }
            }

            // We've either tested a leaf or missed both children of an
            // internal node, so it's time to pop the next node; empty stack
            // means we've seen everything there was to see.
            if stack_ptr > 0 {
                stack_ptr -= 1;
                bvh_ptr = stack[stack_ptr];
            } else {
                break;
            }
        }
    }

    fn distance_to_node(self, aabb_min: Vec3, aabb_max: Vec3) -> f32 {
        let hit_min = (aabb_min - self.origin) * self.inv_direction;
        let hit_max = (aabb_max - self.origin) * self.inv_direction;

        // A ray running within one of the box's planes yields `0 * inf = NaN`
        // on that axis; such a slab doesn't constrain the ray at all
        let parallel = hit_min.is_nan_mask() | hit_max.is_nan_mask();

        let tmin = Vec3::select(
            parallel,
            Vec3::NEG_INFINITY,
            hit_min.min(hit_max),
        )
        .max_element();

        let tmax =
            Vec3::select(parallel, Vec3::INFINITY, hit_min.max(hit_max))
                .min_element();

        if tmax >= tmin && tmax >= 0.0 {
            tmin
        } else {
            f32::MAX
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::vec3;

    use super::*;

    #[test]
    fn distance_to_node() {
        let ray = Ray::new(vec3(0.5, 0.5, 5.0), -Vec3::Z);

        assert_eq!(4.0, ray.distance_to_node(-Vec3::ONE, Vec3::ONE));
        assert_eq!(
            f32::MAX,
            ray.distance_to_node(Vec3::ONE, Vec3::splat(2.0)),
        );

        // Box behind the ray
        let ray = Ray::new(vec3(0.5, 0.5, 5.0), Vec3::Z);

        assert_eq!(f32::MAX, ray.distance_to_node(-Vec3::ONE, Vec3::ONE));
    }

    #[test]
    fn distance_to_node_along_box_planes() {
        let ray = Ray::new(vec3(0.0, 0.0, 5.0), -Vec3::Z);

        // Ray runs along the `x = 0` and `y = 0` planes of both boxes
        assert_eq!(5.0, ray.distance_to_node(-Vec3::ONE, Vec3::ZERO));
        assert_eq!(4.0, ray.distance_to_node(Vec3::ZERO, Vec3::ONE));

        assert_eq!(
            4.0,
            ray.distance_to_node(vec3(-1.0, 0.0, -1.0), vec3(0.0, 1.0, 1.0)),
        );

        // ... but misses a box that only touches the ray's line on one axis
        assert_eq!(
            f32::MAX,
            ray.distance_to_node(vec3(0.0, 0.5, -1.0), vec3(1.0, 1.0, 1.0)),
        );
    }
}
