use cgmath::{InnerSpace, Matrix4, Vector3};

use crate::gfx::device::{LightUniform, LIGHT_DIRECTIONAL, LIGHT_POINT};
use crate::gfx::transform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightKind {
    /// Uniform fill; summed into one ambient term.
    Ambient,
    /// Parallel rays along the node's world -Z axis.
    Directional,
    /// Radiates from the node's world position, attenuated with distance.
    Point,
}

/// Constant, linear and quadratic falloff used when none is given.
pub const DEFAULT_ATTENUATION: [f32; 3] = [1.0, 0.0, 0.1];

/// Light payload of a scene node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub color: [f32; 3],
    /// Constant, linear and quadratic falloff factors (point lights).
    pub attenuation: [f32; 3],
    /// Only directional lights can cast shadows.
    pub casts_shadow: bool,
}

impl Light {
    pub fn ambient(color: [f32; 3]) -> Self {
        Self {
            kind: LightKind::Ambient,
            color,
            attenuation: [1.0, 0.0, 0.0],
            casts_shadow: false,
        }
    }

    pub fn directional(color: [f32; 3]) -> Self {
        Self {
            kind: LightKind::Directional,
            color,
            attenuation: [1.0, 0.0, 0.0],
            casts_shadow: true,
        }
    }

    pub fn point(color: [f32; 3], attenuation: [f32; 3]) -> Self {
        Self {
            kind: LightKind::Point,
            color,
            attenuation,
            casts_shadow: false,
        }
    }

    pub fn with_shadow(mut self, casts_shadow: bool) -> Self {
        self.casts_shadow = casts_shadow && self.kind == LightKind::Directional;
        self
    }
}

/// Something that contributes light to the draw uniforms.
pub trait Illuminates {
    fn light(&self) -> &Light;

    fn is_ambient(&self) -> bool {
        self.light().kind == LightKind::Ambient
    }

    /// Uniform slot for a light placed by `world`. Ambient lights have no
    /// slot and yield an empty one.
    fn to_uniform(&self, world: &Matrix4<f32>) -> LightUniform {
        let light = self.light();
        let [r, g, b] = light.color;
        let kind = match light.kind {
            LightKind::Ambient => return LightUniform::default(),
            LightKind::Directional => LIGHT_DIRECTIONAL,
            LightKind::Point => LIGHT_POINT,
        };
        let forward = transform::rotation_part(world) * Vector3::new(0.0, 0.0, -1.0);
        let forward = if forward.magnitude2() > 0.0 {
            forward.normalize()
        } else {
            Vector3::new(0.0, -1.0, 0.0)
        };
        let position = transform::position_of(world);
        let [c, l, q] = light.attenuation;
        LightUniform {
            color: [r, g, b, kind],
            direction: [forward.x, forward.y, forward.z, 0.0],
            position: [position.x, position.y, position.z, 1.0],
            attenuation: [c, l, q, 0.0],
        }
    }
}

impl Illuminates for Light {
    fn light(&self) -> &Light {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::transform::{rotation_x, translation};
    use approx::assert_relative_eq;

    #[test]
    fn test_point_light_uses_world_position() {
        let light = Light::point([1.0, 0.5, 0.0], [1.0, 0.0, 0.1]);
        let uniform = light.to_uniform(&translation(1.0, 2.0, 3.0));
        assert_eq!(uniform.position, [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(uniform.color, [1.0, 0.5, 0.0, LIGHT_POINT]);
        assert_eq!(uniform.attenuation, [1.0, 0.0, 0.1, 0.0]);
    }

    #[test]
    fn test_directional_light_points_along_forward_axis() {
        let light = Light::directional([1.0; 3]);
        let uniform = light.to_uniform(&rotation_x(-std::f32::consts::FRAC_PI_2));
        assert_relative_eq!(uniform.direction[1], -1.0, epsilon = 1e-6);
        assert_relative_eq!(uniform.direction[2], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_only_directional_lights_cast_shadows() {
        assert!(!Light::point([1.0; 3], [1.0, 0.0, 0.0]).with_shadow(true).casts_shadow);
        assert!(!Light::directional([1.0; 3]).with_shadow(false).casts_shadow);
        assert!(Light::ambient([0.2; 3]).to_uniform(&transform::identity()).is_empty());
    }
}
