use cgmath::Matrix4;

use crate::gfx::device::{LightUniform, MAX_LIGHTS};
use crate::gfx::scene::{Illuminates, LightKind, NodeId, Scene};

/// The directional light whose view feeds the shadow pass.
#[derive(Debug, Clone, Copy)]
pub struct ShadowCaster {
    pub node: NodeId,
    /// Position among the non-ambient lights, i.e. the uniform slot it lands in.
    pub slot: usize,
    pub world: Matrix4<f32>,
}

/// Lights gathered from one frame's traversal.
#[derive(Debug, Default)]
pub struct LightEnvironment {
    ambient: [f32; 3],
    lights: Vec<LightUniform>,
    shadow_caster: Option<ShadowCaster>,
}

impl LightEnvironment {
    /// Sums ambient lights and lists the others in traversal order. The first
    /// shadow-casting directional light becomes the shadow caster.
    pub fn collect(scene: &Scene, visible: &[(NodeId, Matrix4<f32>)]) -> Self {
        let mut environment = Self::default();
        for (id, world) in visible {
            let Some(light) = scene.get(*id).and_then(|node| node.as_light()) else {
                continue;
            };
            if light.is_ambient() {
                for (sum, c) in environment.ambient.iter_mut().zip(light.color) {
                    *sum += c;
                }
                continue;
            }
            if environment.shadow_caster.is_none()
                && light.kind == LightKind::Directional
                && light.casts_shadow
            {
                environment.shadow_caster = Some(ShadowCaster {
                    node: *id,
                    slot: environment.lights.len(),
                    world: *world,
                });
            }
            environment.lights.push(light.to_uniform(world));
        }
        environment
    }

    pub fn ambient(&self) -> [f32; 3] {
        self.ambient
    }

    /// Non-ambient lights, in traversal order.
    pub fn lights(&self) -> &[LightUniform] {
        &self.lights
    }

    pub fn shadow_caster(&self) -> Option<&ShadowCaster> {
        self.shadow_caster.as_ref()
    }

    /// Copies the first `count` lights into `slots`, clearing the rest.
    /// Returns how many slots were filled.
    pub fn fill(&self, slots: &mut [LightUniform; MAX_LIGHTS], count: usize) -> usize {
        let filled = count.min(MAX_LIGHTS).min(self.lights.len());
        if filled < self.lights.len() && count > 0 {
            log::trace!(
                "material takes {filled} of {} lights; the rest are ignored",
                self.lights.len()
            );
        }
        for (i, slot) in slots.iter_mut().enumerate() {
            *slot = if i < filled {
                self.lights[i]
            } else {
                LightUniform::default()
            };
        }
        filled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::device::{LIGHT_DIRECTIONAL, LIGHT_POINT};
    use crate::gfx::scene::{Light, Positionable};

    #[test]
    fn test_ambient_is_summed_and_order_kept() {
        let mut scene = Scene::new();
        scene.add_ambient_light([0.1, 0.1, 0.1]);
        scene.add_point_light([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.1]);
        scene.add_ambient_light([0.2, 0.0, 0.0]);
        scene.add_directional_light([1.0; 3], [0.0, -1.0, 0.0]);

        let environment = LightEnvironment::collect(&scene, &scene.world_transforms());
        let ambient = environment.ambient();
        assert!((ambient[0] - 0.3).abs() < 1e-6);
        let kinds: Vec<f32> = environment.lights().iter().map(|l| l.color[3]).collect();
        assert_eq!(kinds, vec![LIGHT_POINT, LIGHT_DIRECTIONAL]);
        assert_eq!(environment.shadow_caster().map(|c| c.slot), Some(1));
    }

    #[test]
    fn test_hidden_and_non_casting_lights() {
        let mut scene = Scene::new();
        let hidden = scene.add_directional_light([1.0; 3], [0.0, -1.0, 0.0]);
        scene.node_mut(hidden).unwrap().visible = false;
        let mut quiet = crate::gfx::scene::Node::new(
            "quiet",
            crate::gfx::scene::NodeKind::Light(Light::directional([1.0; 3]).with_shadow(false)),
        );
        quiet.set_direction([0.0, 0.0, -1.0]);
        scene.add(quiet);

        let environment = LightEnvironment::collect(&scene, &scene.world_transforms());
        assert_eq!(environment.lights().len(), 1);
        assert!(environment.shadow_caster().is_none());
    }

    #[test]
    fn test_fill_clears_unused_slots() {
        let mut scene = Scene::new();
        for x in 0..3 {
            scene.add_point_light([1.0; 3], [x as f32, 0.0, 0.0], [1.0, 0.0, 0.0]);
        }
        let environment = LightEnvironment::collect(&scene, &scene.world_transforms());
        let mut slots = [LightUniform::default(); MAX_LIGHTS];
        slots[3].color[3] = LIGHT_POINT;

        assert_eq!(environment.fill(&mut slots, 2), 2);
        assert_eq!(slots[1].position[0], 1.0);
        assert!(slots[2].is_empty() && slots[3].is_empty());
        assert_eq!(environment.fill(&mut slots, 8), 3);
    }
}
