mod builder;
mod node;
mod nodes;
mod primitive;
mod primitives;
mod serializer;

use log::{debug, info, warn};

pub use self::builder::MAX_LEAF_SIZE;
pub use self::node::*;
pub use self::nodes::*;
pub use self::primitive::*;
pub use self::primitives::*;
pub use self::serializer::SerializedBvh;
use crate::{gpu, utils, BoundingBox, Mesh, Result};

/// Bounding volume hierarchy built over a mesh's triangles.
///
/// The tree is static: it's built once and never refitted.
#[derive(Debug)]
pub struct Bvh {
    nodes: BvhNodes,
    primitives: BvhPrimitives,
}

impl Bvh {
    pub fn build(mesh: &Mesh) -> Result<Self> {
        mesh.validate()?;

        let this = utils::measure("bvh::build", || {
            let mut primitives = BvhPrimitives::default();

            for (face_id, triangle) in mesh.triangles().iter().enumerate() {
                primitives.add(BvhPrimitive {
                    face_id: gpu::FaceId::new(face_id as u32),
                    center: triangle.center(),
                    bounds: triangle.positions().into_iter().collect(),
                });
            }

            let nodes = builder::run(&mut primitives);

            Self { nodes, primitives }
        });

        if this.root_bounds().half_area() == 0.0 {
            warn!("Mesh has zero surface area; nothing will be hit");
        }

        info!(
            "Built BVH over {} triangles ({} nodes, depth {})",
            this.primitives.len(),
            this.nodes.len(),
            this.depth(),
        );

        debug!("BVH bounds: {:?}", this.root_bounds());

        #[cfg(debug_assertions)]
        this.validate();

        Ok(this)
    }

    /// Flattens this tree into the layout consumed by the per-pixel code.
    ///
    /// `mesh` must be the mesh this tree was built from.
    pub fn serialize(&self, mesh: &Mesh) -> SerializedBvh {
        utils::measure("bvh::serialize", || {
            serializer::run(mesh, &self.nodes, &self.primitives)
        })
    }

    pub fn root(&self) -> &BvhNode {
        &self.nodes[BvhNodeId::root()]
    }

    pub fn root_bounds(&self) -> BoundingBox {
        self.root().bounds()
    }

    pub fn nodes(&self) -> &BvhNodes {
        &self.nodes
    }

    pub fn primitives(&self) -> &BvhPrimitives {
        &self.primitives
    }

    /// Returns the number of levels in the tree (a single leaf has depth 1).
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut stack = vec![(BvhNodeId::root(), 1)];

        while let Some((id, level)) = stack.pop() {
            depth = depth.max(level);

            if let BvhNode::Internal {
                left_id, right_id, ..
            } = self.nodes[id]
            {
                stack.push((left_id, level + 1));
                stack.push((right_id, level + 1));
            }
        }

        depth
    }

    /// Asserts that each node's box encloses its entire subtree and that every
    /// primitive is owned by exactly one leaf.
    pub fn validate(&self) {
        let mut visited = 0;
        let mut stack = vec![BvhNodeId::root()];

        while let Some(id) = stack.pop() {
            let node = self.nodes[id];

            match node {
                BvhNode::Internal {
                    bounds,
                    left_id,
                    right_id,
                } => {
                    for child_id in [left_id, right_id] {
                        let child_bounds = self.nodes[child_id].bounds();

                        assert!(
                            bounds.contains(&child_bounds, 1e-5),
                            "node {} doesn't contain its child {}",
                            id.get(),
                            child_id.get(),
                        );

                        stack.push(child_id);
                    }
                }

                BvhNode::Leaf {
                    bounds,
                    primitives_ref,
                } => {
                    assert!(
                        !primitives_ref.is_empty(),
                        "leaf {} is empty",
                        id.get(),
                    );

                    for primitive in self.primitives.get(primitives_ref) {
                        assert!(
                            bounds.contains(&primitive.bounds, 1e-5),
                            "leaf {} doesn't contain face {}",
                            id.get(),
                            primitive.face_id.get(),
                        );
                    }

                    visited += primitives_ref.len();
                }
            }
        }

        assert_eq!(self.primitives.len(), visited);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use approx::assert_relative_eq;
    use glam::{vec3, Vec3, Vec4Swizzles};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::{Error, MeshTriangle};

    fn random_rays(seed: u64, count: usize) -> Vec<gpu::Ray> {
        let mut rng = StdRng::seed_from_u64(seed);

        (0..count)
            .map(|_| {
                let origin = vec3(
                    rng.gen_range(-3.0..3.0),
                    rng.gen_range(-3.0..3.0),
                    rng.gen_range(-3.0..3.0),
                );

                let target = vec3(
                    rng.gen_range(-0.5..0.5),
                    rng.gen_range(-0.5..0.5),
                    rng.gen_range(-0.5..0.5),
                );

                gpu::Ray::new(origin, (target - origin).normalize())
            })
            .collect()
    }

    /// Rays parallel to the axes, going through the origin and through some
    /// of the mesh's vertices; they run exactly along the planes the builder
    /// tends to split on.
    fn axis_aligned_rays(mesh: &Mesh) -> Vec<gpu::Ray> {
        let axes = [Vec3::X, -Vec3::X, Vec3::Y, -Vec3::Y, Vec3::Z, -Vec3::Z];

        let targets = mesh
            .triangles()
            .iter()
            .step_by(7)
            .flat_map(|triangle| triangle.positions())
            .chain([Vec3::ZERO]);

        targets
            .flat_map(|target| {
                axes.into_iter().flat_map(move |axis| {
                    [
                        gpu::Ray::new(target - axis * 5.0, axis),
                        gpu::Ray::new(
                            vec3(0.0, target.y, target.z) - axis * 5.0,
                            axis,
                        ),
                    ]
                })
            })
            .collect()
    }

    fn brute_force(mesh: &Mesh, ray: gpu::Ray) -> gpu::TriangleHit {
        let mut hit = gpu::TriangleHit::none();

        for (face_id, triangle) in mesh.triangles().iter().enumerate() {
            gpu::Triangle::new(
                triangle.positions(),
                triangle.normals(),
                gpu::FaceId::new(face_id as u32),
            )
            .hit(ray, &mut hit);
        }

        hit
    }

    #[test]
    fn empty_mesh() {
        let result = Bvh::build(&Mesh::default());

        assert!(matches!(result, Err(Error::EmptyMesh)));
    }

    #[test]
    fn non_finite_mesh() {
        let mesh = Mesh::new(vec![MeshTriangle::new([
            Vec3::ZERO,
            Vec3::X,
            vec3(f32::NAN, 1.0, 0.0),
        ])]);

        let result = Bvh::build(&mesh);

        assert!(matches!(result, Err(Error::InvalidGeometry(_))));
    }

    #[test]
    fn single_leaf() {
        let mesh = Mesh::icosphere(0);
        let target = Bvh::build(&mesh).unwrap();

        // 20 triangles are above the leaf threshold, so the root must get
        // split
        assert!(matches!(target.root(), BvhNode::Internal { .. }));

        let mesh = Mesh::new(mesh.triangles()[..MAX_LEAF_SIZE].to_vec());
        let target = Bvh::build(&mesh).unwrap();

        assert!(matches!(target.root(), BvhNode::Leaf { .. }));
        assert_eq!(1, target.depth());

        let serialized = target.serialize(&mesh);

        assert_eq!(MAX_LEAF_SIZE, serialized.nodes().len());
        assert_eq!(MAX_LEAF_SIZE, serialized.triangles().len());

        for (idx, entry) in serialized.nodes().iter().enumerate() {
            let has_more = idx + 1 < MAX_LEAF_SIZE;

            assert_eq!(has_more as u32, entry.x.to_bits());
            assert_eq!(idx as u32, entry.y.to_bits());
            assert_eq!(gpu::BvhView::OP_LEAF, entry.w.to_bits());
        }
    }

    #[test]
    fn containment() {
        let mesh = Mesh::icosphere(3);
        let target = Bvh::build(&mesh).unwrap();

        target.validate();

        let root = target.root_bounds();

        for triangle in mesh.triangles() {
            let bounds: BoundingBox =
                triangle.positions().into_iter().collect();

            assert!(root.contains(&bounds, 1e-5));
        }

        assert!(root.min().cmpge(Vec3::splat(-1.0 - 1e-5)).all());
        assert!(root.max().cmple(Vec3::splat(1.0 + 1e-5)).all());
    }

    #[test]
    fn leaves_respect_threshold() {
        let mesh = Mesh::icosphere(3);
        let target = Bvh::build(&mesh).unwrap();

        for id in 0..target.nodes().len() {
            if let BvhNode::Leaf { primitives_ref, .. } =
                target.nodes()[BvhNodeId::new(id as u32)]
            {
                assert!(primitives_ref.len() <= MAX_LEAF_SIZE);
            }
        }

        assert!(target.depth() < gpu::BVH_STACK_SIZE);
    }

    #[test]
    fn coincident_centroids_stay_in_one_leaf() {
        let triangle =
            MeshTriangle::new([vec3(-1.0, 0.0, 0.0), Vec3::X, Vec3::Y]);

        let mesh = Mesh::new(vec![triangle; 10]);
        let target = Bvh::build(&mesh).unwrap();

        assert!(matches!(target.root(), BvhNode::Leaf { .. }));
        assert_eq!(10, target.serialize(&mesh).triangles().len());
    }

    #[test]
    fn serializer_layout() {
        let mesh = Mesh::icosphere(2);
        let target = Bvh::build(&mesh).unwrap();
        let serialized = target.serialize(&mesh);

        let BvhNode::Internal {
            left_id, right_id, ..
        } = *target.root()
        else {
            panic!("root should be an internal node");
        };

        let nodes = serialized.nodes();

        assert_eq!(gpu::BvhView::OP_INTERNAL, nodes[0].w.to_bits());

        let left_bb = target.nodes()[left_id].bounds();
        let right_bb = target.nodes()[right_id].bounds();

        assert_eq!(left_bb.min(), nodes[0].xyz());
        assert_eq!(left_bb.max(), nodes[1].xyz());
        assert_eq!(right_bb.min(), nodes[2].xyz());
        assert_eq!(right_bb.max(), nodes[3].xyz());

        let right_ptr = nodes[1].w.to_bits() as usize;

        assert!(right_ptr > 4);
        assert!(right_ptr < nodes.len());

        // Left child follows its parent directly
        match target.nodes()[left_id] {
            BvhNode::Internal { left_id, .. } => {
                let bb = target.nodes()[left_id].bounds();

                assert_eq!(gpu::BvhView::OP_INTERNAL, nodes[4].w.to_bits());
                assert_eq!(bb.min(), nodes[4].xyz());
            }

            BvhNode::Leaf { .. } => {
                assert_eq!(gpu::BvhView::OP_LEAF, nodes[4].w.to_bits());
            }
        }

        // Every face appears exactly once, in a leaf entry pointing at a
        // triangle slot that carries the same face
        let mut faces = HashSet::new();

        for entry in nodes {
            if entry.w.to_bits() != gpu::BvhView::OP_LEAF {
                continue;
            }

            let slot = entry.y.to_bits() as usize;
            let face_id = entry.z.to_bits();

            assert_eq!(face_id, serialized.triangles()[slot].face_id().get());
            assert!(faces.insert(face_id));
        }

        assert_eq!(mesh.len(), faces.len());
        assert_eq!(mesh.len(), serialized.triangles().len());
    }

    #[test]
    fn traversal_matches_brute_force() {
        let mesh = Mesh::icosphere(2);
        let serialized = Bvh::build(&mesh).unwrap().serialize(&mesh);

        for ray in random_rays(1234, 500) {
            let expected = brute_force(&mesh, ray);
            let actual = serialized.trace(ray);

            assert_eq!(expected.is_some(), actual.is_some());

            if expected.is_some() {
                assert_eq!(expected.face_id, actual.face_id);
                assert_relative_eq!(expected.distance, actual.distance);
            }
        }
    }

    #[test]
    fn traversal_matches_brute_force_for_axis_aligned_rays() {
        for mesh in [Mesh::icosphere(2), Mesh::icosphere(3)] {
            let serialized = Bvh::build(&mesh).unwrap().serialize(&mesh);

            for ray in axis_aligned_rays(&mesh) {
                let expected = brute_force(&mesh, ray);
                let actual = serialized.trace(ray);

                assert_eq!(
                    expected.is_some(),
                    actual.is_some(),
                    "ray from {} towards {}",
                    ray.origin(),
                    ray.direction(),
                );

                // Rays going through vertices hit a few triangles at the
                // same distance, so which one wins is up to the traversal
                // order
                if expected.is_some() {
                    assert_relative_eq!(
                        expected.distance,
                        actual.distance,
                        epsilon = 1e-5
                    );
                }
            }

            let hit = serialized.trace(gpu::Ray::new(5.0 * Vec3::Z, -Vec3::Z));

            assert!(hit.is_some());
            assert_relative_eq!(hit.distance, 4.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn idempotence() {
        let mesh = Mesh::gem(16, 0.3, 0.8);

        let a = Bvh::build(&mesh).unwrap().serialize(&mesh);
        let b = Bvh::build(&mesh).unwrap().serialize(&mesh);

        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a, b);

        for ray in random_rays(4321, 200) {
            let hit_a = a.trace(ray);
            let hit_b = b.trace(ray);

            assert_eq!(hit_a.is_some(), hit_b.is_some());
            assert_eq!(hit_a.face_id, hit_b.face_id);
            assert_eq!(hit_a.distance.to_bits(), hit_b.distance.to_bits());
        }
    }

    #[test]
    fn different_meshes_have_different_fingerprints() {
        let a = Mesh::icosphere(1);
        let b = Mesh::icosphere(2);

        let a = Bvh::build(&a).unwrap().serialize(&a);
        let b = Bvh::build(&b).unwrap().serialize(&b);

        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
