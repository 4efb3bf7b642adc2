use glam::Vec3;

pub trait Vec3Ext
where
    Self: Sized,
{
    /// Reflects this direction-vector around `normal`.
    fn reflect(self, normal: Self) -> Self;

    /// Refracts this direction-vector through a surface with given `normal`,
    /// where `eta` is the ratio of indices of refraction (incoming over
    /// outgoing medium).
    ///
    /// `normal` must point against `self`; returns `None` on total internal
    /// reflection.
    fn refract(self, normal: Self, eta: f32) -> Option<Self>;

    /// Returns angle between two direction-vectors, in radians.
    fn angle(self, other: Self) -> f32;
}

impl Vec3Ext for Vec3 {
    fn reflect(self, normal: Self) -> Self {
        self - 2.0 * normal.dot(self) * normal
    }

    fn refract(self, normal: Self, eta: f32) -> Option<Self> {
        let cos_i = normal.dot(self);
        let k = 1.0 - eta * eta * (1.0 - cos_i * cos_i);

        if k < 0.0 {
            None
        } else {
            Some(eta * self - (eta * cos_i + k.sqrt()) * normal)
        }
    }

    fn angle(self, other: Self) -> f32 {
        self.normalize().dot(other.normalize()).clamp(-1.0, 1.0).acos()
    }
}
