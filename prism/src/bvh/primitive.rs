use std::ops::Range;

use glam::Vec3;
use prism_gpu as gpu;

use crate::BoundingBox;

#[derive(Clone, Copy, Debug)]
pub struct BvhPrimitive {
    pub face_id: gpu::FaceId,
    pub center: Vec3,
    pub bounds: BoundingBox,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BvhPrimitiveId(u32);

impl BvhPrimitiveId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

/// Contiguous range of primitives owned by a leaf.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BvhPrimitivesRef {
    start: BvhPrimitiveId,
    end: BvhPrimitiveId,
}

impl BvhPrimitivesRef {
    pub fn new(start: BvhPrimitiveId, end: BvhPrimitiveId) -> Self {
        Self { start, end }
    }

    pub fn start(&self) -> BvhPrimitiveId {
        self.start
    }

    pub fn end(&self) -> BvhPrimitiveId {
        self.end
    }

    pub fn as_range(&self) -> Range<usize> {
        let start = self.start.get() as usize;
        let end = self.end.get() as usize;

        start..end
    }

    pub fn len(&self) -> usize {
        (self.end.get() - self.start.get()) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for BvhPrimitivesRef {
    fn default() -> Self {
        Self::new(BvhPrimitiveId::new(0), BvhPrimitiveId::new(0))
    }
}
