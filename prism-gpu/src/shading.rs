use glam::{vec3, Vec3, Vec4Swizzles};

use crate::{Environment, ExitDirections, Gradient, Material};

/// Returns the direction whose screen-space derivatives select the
/// environment's level of detail for this pixel.
///
/// Exit directions change abruptly between neighbouring pixels (each facet
/// sends light elsewhere), so deriving mips from them makes the texture
/// shimmer; with `correct_mips` enabled we use the undistorted view direction
/// instead.
pub fn derivative_source(
    material: &Material,
    view_direction: Vec3,
    exits: &ExitDirections,
) -> Vec3 {
    if material.correct_mips() {
        view_direction
    } else {
        exits.green
    }
}

/// Samples the environment along each channel's exit direction and tints the
/// result.
pub fn shade<E>(
    environment: &E,
    material: &Material,
    exits: &ExitDirections,
    gradient: Gradient,
) -> Vec3
where
    E: Environment + ?Sized,
{
    let color = if exits.achromatic {
        environment.sample_grad(exits.green, gradient)
    } else {
        let red = environment.sample_grad(exits.red, gradient);
        let green = environment.sample_grad(exits.green, gradient);
        let blue = environment.sample_grad(exits.blue, gradient);

        vec3(red.x, green.y, blue.z)
    };

    color * material.color.xyz()
}

#[cfg(test)]
mod tests {
    use glam::{vec4, Vec4};

    use super::*;

    /// Environment where each channel lights up in a different direction.
    struct Axes;

    impl Environment for Axes {
        fn sample_grad(&self, direction: Vec3, _: Gradient) -> Vec3 {
            direction.max(Vec3::ZERO)
        }
    }

    fn exits() -> ExitDirections {
        ExitDirections {
            red: Vec3::X,
            green: Vec3::Y,
            blue: Vec3::Z,
            achromatic: false,
            queries: 0,
        }
    }

    #[test]
    fn shade_composes_channels() {
        let material = Material {
            color: Vec4::ONE,
            ..Default::default()
        };

        let color = shade(&Axes, &material, &exits(), Gradient::default());

        assert_eq!(Vec3::ONE, color);
    }

    #[test]
    fn shade_applies_tint() {
        let material = Material {
            color: vec4(0.5, 0.25, 1.0, 1.0),
            ..Default::default()
        };

        let color = shade(&Axes, &material, &exits(), Gradient::default());

        assert_eq!(vec3(0.5, 0.25, 1.0), color);
    }

    #[test]
    fn derivative_source_follows_correct_mips() {
        let exits = exits();
        let view = vec3(0.0, 0.0, -1.0);

        let mut material = Material::default();

        assert_eq!(Vec3::Y, derivative_source(&material, view, &exits));

        material.flags |= Material::FLAG_CORRECT_MIPS;

        assert_eq!(view, derivative_source(&material, view, &exits));
    }
}
