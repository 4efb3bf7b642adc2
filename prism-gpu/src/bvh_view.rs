use glam::Vec4;

/// Read-only view into a serialized BVH.
///
/// Internal nodes take four entries:
///
/// - `[0]` = left child's `aabb_min` + opcode (`0`) encoded in `w`,
/// - `[1]` = left child's `aabb_max` + pointer to the right child in `w`,
/// - `[2]` = right child's `aabb_min`,
/// - `[3]` = right child's `aabb_max`.
///
/// The left child always follows its parent directly, at `ptr + 4`.
///
/// Leaves take one entry per triangle:
///
/// - `x` = whether the next entry belongs to the same leaf,
/// - `y` = triangle slot (see [`crate::TrianglesView`]),
/// - `z` = original face index,
/// - `w` = opcode (`1`).
#[derive(Clone, Copy)]
pub struct BvhView<'a> {
    buffer: &'a [Vec4],
}

impl<'a> BvhView<'a> {
    pub const OP_INTERNAL: u32 = 0;
    pub const OP_LEAF: u32 = 1;

    pub fn new(buffer: &'a [Vec4]) -> Self {
        Self { buffer }
    }

    pub fn get(&self, ptr: u32) -> Vec4 {
        self.buffer[ptr as usize]
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
