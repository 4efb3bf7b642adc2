use glam::Vec3;

/// Directional radiance source (e.g. a cube map) sampled by the exit rays.
pub trait Environment {
    /// Samples radiance in given direction, selecting the level of detail from
    /// explicit screen-space derivatives (as `textureGrad()` does).
    fn sample_grad(&self, direction: Vec3, gradient: Gradient) -> Vec3;
}

impl<T> Environment for &T
where
    T: Environment + ?Sized,
{
    fn sample_grad(&self, direction: Vec3, gradient: Gradient) -> Vec3 {
        T::sample_grad(self, direction, gradient)
    }
}

/// Screen-space derivatives of a direction field, i.e. how much the direction
/// changes when moving one pixel right (`ddx`) and one pixel down (`ddy`).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Gradient {
    pub ddx: Vec3,
    pub ddy: Vec3,
}

impl Gradient {
    pub fn new(ddx: Vec3, ddy: Vec3) -> Self {
        Self { ddx, ddy }
    }

    /// Returns the larger of both derivatives' lengths, i.e. how many radians
    /// (approximately) a single pixel spans.
    pub fn footprint(&self) -> f32 {
        self.ddx.length().max(self.ddy.length())
    }
}
