use std::ops::{Add, AddAssign};

use glam::Vec3;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    min: Vec3,
    max: Vec3,
}

impl BoundingBox {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn min(&self) -> Vec3 {
        self.min
    }

    pub fn max(&self) -> Vec3 {
        self.max
    }

    pub fn extent(&self) -> Vec3 {
        self.max() - self.min()
    }

    pub fn center(&self) -> Vec3 {
        (self.min() + self.max()) / 2.0
    }

    pub fn half_area(&self) -> f32 {
        if !self.is_set() {
            return 0.0;
        }

        let extent = self.extent();

        extent.x * extent.y + extent.y * extent.z + extent.z * extent.x
    }

    pub fn is_set(&self) -> bool {
        self.min.x != Self::default().min.x
    }

    /// Returns whether `other` lies entirely inside of this box, allowing for
    /// `epsilon` of slack.
    pub fn contains(&self, other: &Self, epsilon: f32) -> bool {
        if !other.is_set() {
            return true;
        }

        (other.min + epsilon).cmpge(self.min).all()
            && (other.max - epsilon).cmple(self.max).all()
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::new(Vec3::MAX, Vec3::MIN)
    }
}

impl Add<Vec3> for BoundingBox {
    type Output = Self;

    fn add(mut self, rhs: Vec3) -> Self::Output {
        self += rhs;
        self
    }
}

impl AddAssign<Vec3> for BoundingBox {
    fn add_assign(&mut self, rhs: Vec3) {
        self.min = self.min.min(rhs);
        self.max = self.max.max(rhs);
    }
}

impl FromIterator<Vec3> for BoundingBox {
    fn from_iter<T>(iter: T) -> Self
    where
        T: IntoIterator<Item = Vec3>,
    {
        let mut this = Self::default();

        for item in iter {
            this += item;
        }

        this
    }
}

impl Add<Self> for BoundingBox {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self::Output {
        self += rhs;
        self
    }
}

impl AddAssign<Self> for BoundingBox {
    fn add_assign(&mut self, rhs: Self) {
        if rhs.is_set() {
            *self += rhs.min;
            *self += rhs.max;
        }
    }
}

impl FromIterator<Self> for BoundingBox {
    fn from_iter<T>(iter: T) -> Self
    where
        T: IntoIterator<Item = Self>,
    {
        let mut this = Self::default();

        for item in iter {
            this += item;
        }

        this
    }
}

#[cfg(test)]
mod tests {
    use glam::vec3;

    use super::*;

    #[test]
    fn from_points() {
        let bb: BoundingBox =
            [vec3(1.0, 2.0, 3.0), vec3(-1.0, 5.0, 0.0)].into_iter().collect();

        assert_eq!(vec3(-1.0, 2.0, 0.0), bb.min());
        assert_eq!(vec3(1.0, 5.0, 3.0), bb.max());
        assert_eq!(2.0 * 3.0 + 3.0 * 3.0 + 3.0 * 2.0, bb.half_area());
    }

    #[test]
    fn unset_box_is_neutral() {
        let bb = BoundingBox::new(Vec3::ZERO, Vec3::ONE);

        assert_eq!(bb, bb + BoundingBox::default());
        assert_eq!(0.0, BoundingBox::default().half_area());
    }

    #[test]
    fn contains() {
        let outer = BoundingBox::new(Vec3::ZERO, Vec3::ONE);
        let inner = BoundingBox::new(Vec3::splat(0.25), Vec3::splat(0.75));

        assert!(outer.contains(&inner, 0.0));
        assert!(!inner.contains(&outer, 0.0));
        assert!(outer.contains(&BoundingBox::default(), 0.0));
    }
}
