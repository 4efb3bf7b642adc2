use super::{BvhPrimitive, BvhPrimitiveId, BvhPrimitivesRef};

#[derive(Debug, Default)]
pub struct BvhPrimitives {
    items: Vec<BvhPrimitive>,
}

impl BvhPrimitives {
    pub fn add(&mut self, prim: BvhPrimitive) {
        self.items.push(prim);
    }

    pub fn all_ref(&self) -> BvhPrimitivesRef {
        BvhPrimitivesRef::new(
            BvhPrimitiveId::new(0),
            BvhPrimitiveId::new(self.items.len() as u32),
        )
    }

    pub fn get(&self, range: BvhPrimitivesRef) -> &[BvhPrimitive] {
        &self.items[range.as_range()]
    }

    pub fn get_mut(&mut self, range: BvhPrimitivesRef) -> &mut [BvhPrimitive] {
        &mut self.items[range.as_range()]
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
