use std::hash::{Hash, Hasher};

use fxhash::FxHasher;
use glam::{vec4, Vec4};
use prism_gpu as gpu;

use super::{BvhNode, BvhNodeId, BvhNodes, BvhPrimitives};
use crate::Mesh;

/// BVH flattened into the layout described by [`gpu::BvhView`], together
/// with triangles reordered so that each leaf's triangles are adjacent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SerializedBvh {
    nodes: Vec<Vec4>,
    triangles: Vec<gpu::Triangle>,
}

impl SerializedBvh {
    pub fn nodes(&self) -> &[Vec4] {
        &self.nodes
    }

    pub fn triangles(&self) -> &[gpu::Triangle] {
        &self.triangles
    }

    pub fn bvh_view(&self) -> gpu::BvhView<'_> {
        gpu::BvhView::new(&self.nodes)
    }

    pub fn triangles_view(&self) -> gpu::TrianglesView<'_> {
        gpu::TrianglesView::new(&self.triangles)
    }

    /// Returns a hash of both buffers' exact bit patterns.
    ///
    /// Building and serializing the same mesh twice yields the same
    /// fingerprint.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = FxHasher::default();

        for node in &self.nodes {
            for component in node.to_array() {
                component.to_bits().hash(&mut hasher);
            }
        }

        bytemuck::cast_slice::<_, u8>(&self.triangles).hash(&mut hasher);

        hasher.finish()
    }

    /// Traces given ray (in mesh-local space) and returns its nearest hit.
    pub fn trace(&self, ray: gpu::Ray) -> gpu::TriangleHit {
        ray.trace_nearest(
            self.triangles_view(),
            self.bvh_view(),
            &mut gpu::bvh_stack(),
        )
    }
}

pub fn run(
    mesh: &Mesh,
    nodes: &BvhNodes,
    primitives: &BvhPrimitives,
) -> SerializedBvh {
    let mut out = SerializedBvh {
        nodes: Vec::with_capacity(nodes.len() * 2),
        triangles: Vec::with_capacity(primitives.len()),
    };

    if !nodes.is_empty() {
        walk(mesh, nodes, primitives, &mut out, BvhNodeId::root());
    }

    out
}

fn walk(
    mesh: &Mesh,
    nodes: &BvhNodes,
    primitives: &BvhPrimitives,
    out: &mut SerializedBvh,
    id: BvhNodeId,
) -> u32 {
    let ptr = out.nodes.len();

    match nodes[id] {
        BvhNode::Internal {
            left_id, right_id, ..
        } => {
            out.nodes.push(Default::default());
            out.nodes.push(Default::default());
            out.nodes.push(Default::default());
            out.nodes.push(Default::default());

            // Left child lands right after its parent, at `ptr + 4`
            walk(mesh, nodes, primitives, out, left_id);

            let right_ptr = walk(mesh, nodes, primitives, out, right_id);

            serialize_internal_node(
                nodes,
                &mut out.nodes[ptr..],
                left_id,
                right_id,
                right_ptr,
            );
        }

        BvhNode::Leaf { primitives_ref, .. } => {
            let primitives = primitives.get(primitives_ref);

            for (primitive_idx, primitive) in primitives.iter().enumerate() {
                let has_more = primitive_idx + 1 < primitives.len();
                let face_idx = primitive.face_id.get() as usize;
                let triangle = mesh.triangles()[face_idx];
                let slot = gpu::TriangleId::new(out.triangles.len() as u32);

                out.triangles.push(gpu::Triangle::new(
                    triangle.positions(),
                    triangle.normals(),
                    primitive.face_id,
                ));

                out.nodes.push(vec4(
                    f32::from_bits(has_more as u32),
                    f32::from_bits(slot.get()),
                    f32::from_bits(primitive.face_id.get()),
                    f32::from_bits(gpu::BvhView::OP_LEAF),
                ));
            }
        }
    }

    ptr as u32
}

fn serialize_internal_node(
    nodes: &BvhNodes,
    buffer: &mut [Vec4],
    left_id: BvhNodeId,
    right_id: BvhNodeId,
    right_ptr: u32,
) {
    let left_bb = nodes[left_id].bounds();
    let right_bb = nodes[right_id].bounds();

    buffer[0] = left_bb
        .min()
        .extend(f32::from_bits(gpu::BvhView::OP_INTERNAL));

    buffer[1] = left_bb.max().extend(f32::from_bits(right_ptr));
    buffer[2] = right_bb.min().extend(0.0);
    buffer[3] = right_bb.max().extend(0.0);
}
