use std::collections::VecDeque;

use glam::UVec3;
use prism_gpu as gpu;

use super::{
    BvhNode, BvhNodeId, BvhNodes, BvhPrimitiveId, BvhPrimitives,
    BvhPrimitivesRef,
};
use crate::{Axis, BoundingBox};

const BINS: usize = 12;

/// Nodes with this many primitives (or fewer) are not split any further.
pub const MAX_LEAF_SIZE: usize = 4;

/// Builds the tree top-down, choosing splits using binned SAH.
///
/// Special thanks to:
/// - https://jacco.ompf2.com/2022/04/18/how-to-build-a-bvh-part-2-faster-rays/,
/// - https://github.com/svenstaro/bvh.
pub fn run(primitives: &mut BvhPrimitives) -> BvhNodes {
    let mut nodes = BvhNodes::default();

    let bounds = primitives
        .get(primitives.all_ref())
        .iter()
        .map(|primitive| primitive.bounds)
        .collect();

    let root = nodes.add(BvhNode::Leaf {
        bounds,
        primitives_ref: primitives.all_ref(),
    });

    let mut stack = VecDeque::from_iter([BvhNodeRef { id: root, depth: 0 }]);

    while let Some(node) = stack.pop_front() {
        if let Some((left, right)) = balance(&mut nodes, primitives, node) {
            stack.push_back(left);
            stack.push_back(right);
        }
    }

    nodes
}

fn balance(
    nodes: &mut BvhNodes,
    primitives: &mut BvhPrimitives,
    node_ref: BvhNodeRef,
) -> Option<(BvhNodeRef, BvhNodeRef)> {
    // Every level of the tree can occupy one slot of the traversal stack
    if node_ref.depth + 1 >= gpu::BVH_STACK_SIZE {
        return None;
    }

    let plane = find_splitting_plane(nodes, primitives, node_ref.id)?;

    if plane.split_cost < nodes[node_ref.id].sah_cost() {
        split(nodes, primitives, node_ref, plane)
    } else {
        None
    }
}

fn find_splitting_plane(
    nodes: &BvhNodes,
    primitives: &BvhPrimitives,
    node_id: BvhNodeId,
) -> Option<SplittingPlane> {
    let BvhNode::Leaf { primitives_ref, .. } = nodes[node_id] else {
        unreachable!();
    };

    if primitives_ref.len() <= MAX_LEAF_SIZE {
        return None;
    }

    let primitives = primitives.get(primitives_ref);

    // ---

    let centroid_bb: BoundingBox = primitives
        .iter()
        .map(|primitive| primitive.center)
        .collect();

    let extent = centroid_bb.extent();
    let mut bins = [[Bin::default(); BINS]; 3];
    let scale = (BINS as f32) / extent;

    for primitive in primitives {
        // Axes with no extent produce NaNs here, which saturate to zero; such
        // axes are not considered for splitting anyway
        let bin_id = scale * (primitive.center - centroid_bb.min());
        let bin_id = bin_id.as_uvec3().min(UVec3::splat((BINS as u32) - 1));

        for axis in 0..3 {
            let bin = &mut bins[axis][bin_id[axis] as usize];

            bin.count += 1;
            bin.bounds += primitive.bounds;
        }
    }

    // ---

    let mut left_areas = [[0.0; BINS - 1]; 3];
    let mut right_areas = [[0.0; BINS - 1]; 3];
    let mut left_counts = [[0; BINS - 1]; 3];
    let mut right_counts = [[0; BINS - 1]; 3];

    for axis in 0..3 {
        let mut left_bb = BoundingBox::default();
        let mut right_bb = BoundingBox::default();
        let mut left_count = 0;
        let mut right_count = 0;

        for i in 0..(BINS - 1) {
            let left_bin = bins[axis][i];

            left_count += left_bin.count;
            left_counts[axis][i] = left_count;
            left_bb += left_bin.bounds;
            left_areas[axis][i] = left_bb.half_area();

            // ---

            let right_bin = bins[axis][BINS - 1 - i];

            right_count += right_bin.count;
            right_counts[axis][BINS - 2 - i] = right_count;
            right_bb += right_bin.bounds;
            right_areas[axis][BINS - 2 - i] = right_bb.half_area();
        }
    }

    // ---

    let mut best: Option<SplittingPlane> = None;
    let scale = extent / (BINS as f32);

    for axis in 0..3 {
        if extent[axis] <= 0.0 {
            continue;
        }

        for i in 0..(BINS - 1) {
            let left_count = left_counts[axis][i];
            let right_count = right_counts[axis][i];

            if left_count == 0 || right_count == 0 {
                continue;
            }

            let split_cost = (left_count as f32) * left_areas[axis][i]
                + (right_count as f32) * right_areas[axis][i];

            let is_current_bin_better =
                best.map_or(true, |best| split_cost < best.split_cost);

            if is_current_bin_better {
                let split_by = Axis::from(axis);

                let split_at = centroid_bb.min()[split_by]
                    + scale[split_by] * ((i + 1) as f32);

                best = Some(SplittingPlane {
                    split_by,
                    split_at,
                    split_cost,
                });
            }
        }
    }

    best
}

fn split(
    nodes: &mut BvhNodes,
    primitives: &mut BvhPrimitives,
    node_ref: BvhNodeRef,
    plane: SplittingPlane,
) -> Option<(BvhNodeRef, BvhNodeRef)> {
    let BvhNode::Leaf {
        bounds,
        primitives_ref,
    } = nodes[node_ref.id]
    else {
        unreachable!();
    };

    // ---

    let primitives_data = primitives.get_mut(primitives_ref);

    let mut left_prim_idx = 0;
    let mut right_prim_idx = (primitives_data.len() - 1) as i32;

    let mut left_bounds = BoundingBox::default();
    let mut right_bounds = BoundingBox::default();

    while left_prim_idx <= right_prim_idx {
        let primitive = primitives_data[left_prim_idx as usize];

        if primitive.center[plane.split_by] < plane.split_at {
            left_prim_idx += 1;
            left_bounds += primitive.bounds;
        } else {
            primitives_data
                .swap(left_prim_idx as usize, right_prim_idx as usize);

            right_prim_idx -= 1;
            right_bounds += primitive.bounds;
        }
    }

    // Floating-point rounding can put the plane right at the edge of the
    // centroids, leaving one side empty; keep the node as a leaf then
    if left_prim_idx == 0 || left_prim_idx as usize == primitives_data.len() {
        return None;
    }

    let pivot = BvhPrimitiveId::new(
        primitives_ref.start().get() + (left_prim_idx as u32),
    );

    // ---

    let left_id = nodes.add(BvhNode::Leaf {
        bounds: left_bounds,
        primitives_ref: BvhPrimitivesRef::new(primitives_ref.start(), pivot),
    });

    let right_id = nodes.add(BvhNode::Leaf {
        bounds: right_bounds,
        primitives_ref: BvhPrimitivesRef::new(pivot, primitives_ref.end()),
    });

    nodes[node_ref.id] = BvhNode::Internal {
        bounds,
        left_id,
        right_id,
    };

    let depth = node_ref.depth + 1;

    Some((
        BvhNodeRef { id: left_id, depth },
        BvhNodeRef {
            id: right_id,
            depth,
        },
    ))
}

#[derive(Clone, Copy, Debug)]
struct SplittingPlane {
    split_by: Axis,
    split_at: f32,
    split_cost: f32,
}

#[derive(Clone, Copy, Default, Debug)]
struct Bin {
    bounds: BoundingBox,
    count: u32,
}

#[derive(Clone, Copy, Debug)]
struct BvhNodeRef {
    id: BvhNodeId,
    depth: usize,
}
