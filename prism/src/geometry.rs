use glam::Vec4;
use log::{debug, info};

use crate::{
    gpu, Bindable, Bvh, MappedStorageBuffer, Mesh, Result, SerializedBvh,
};

/// Mesh together with its BVH, in both the tree and the flattened form.
///
/// Immutable once built; materials share it through an `Arc`.
#[derive(Debug)]
pub struct Geometry {
    mesh: Mesh,
    bvh: Bvh,
    serialized: SerializedBvh,
    fingerprint: u64,
}

impl Geometry {
    pub fn new(mesh: Mesh) -> Result<Self> {
        let bvh = Bvh::build(&mesh)?;
        let serialized = bvh.serialize(&mesh);
        let fingerprint = serialized.fingerprint();

        debug!(
            "Geometry ready; nodes={}, triangles={}, fingerprint={fingerprint:x}",
            serialized.nodes().len(),
            serialized.triangles().len(),
        );

        Ok(Self {
            mesh,
            bvh,
            serialized,
            fingerprint,
        })
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn bvh(&self) -> &Bvh {
        &self.bvh
    }

    pub fn serialized(&self) -> &SerializedBvh {
        &self.serialized
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Returns half of the longest side of the mesh's bounding box.
    pub fn scale(&self) -> f32 {
        self.bvh.root_bounds().extent().max_element() / 2.0
    }

    /// Traces given ray (in mesh-local space) and returns its nearest hit.
    pub fn trace(&self, ray: gpu::Ray) -> gpu::TriangleHit {
        self.serialized.trace(ray)
    }
}

/// [`Geometry`] uploaded into VRAM.
///
/// Dropping this object releases both buffers.
#[derive(Debug)]
pub struct GpuGeometry {
    fingerprint: u64,
    nodes: MappedStorageBuffer<Vec<Vec4>>,
    triangles: MappedStorageBuffer<Vec<gpu::Triangle>>,
}

impl GpuGeometry {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        geometry: &Geometry,
    ) -> Self {
        info!(
            "Uploading geometry {:x} ({} triangles)",
            geometry.fingerprint,
            geometry.serialized.triangles().len(),
        );

        let mut nodes = MappedStorageBuffer::new(
            device,
            "prism_bvh_nodes",
            geometry.serialized.nodes().to_vec(),
        );

        let mut triangles = MappedStorageBuffer::new(
            device,
            "prism_bvh_triangles",
            geometry.serialized.triangles().to_vec(),
        );

        nodes.flush(queue);
        triangles.flush(queue);

        Self {
            fingerprint: geometry.fingerprint,
            nodes,
            triangles,
        }
    }

    /// Returns whether this upload mirrors given geometry.
    pub fn is_for(&self, geometry: &Geometry) -> bool {
        self.fingerprint == geometry.fingerprint
    }

    pub fn size(&self) -> u64 {
        self.nodes.size() + self.triangles.size()
    }
}

impl Bindable for GpuGeometry {
    /// Binds nodes at `binding` and triangles at `binding + 1`.
    fn bind(
        &self,
        binding: u32,
    ) -> Vec<(wgpu::BindGroupLayoutEntry, wgpu::BindingResource)> {
        let mut entries = self.nodes.bind(binding);

        entries.extend(self.triangles.bind(binding + 1));
        entries
    }
}

impl Drop for GpuGeometry {
    fn drop(&mut self) {
        debug!("Releasing geometry {:x}", self.fingerprint);
    }
}
