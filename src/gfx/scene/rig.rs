use winit::keyboard::KeyCode;

use super::{Node, NodeId, NodeKind, Positionable, Scene};
use crate::error::Result;
use crate::input::InputSnapshot;

/// Keyboard-driven fly rig: a base node that moves and turns about Y, with a
/// look attachment that pitches. Attach the camera to the look node.
#[derive(Debug, Clone, Copy)]
pub struct MovementRig {
    base: NodeId,
    look: NodeId,
    pub units_per_second: f32,
    pub degrees_per_second: f32,
}

impl MovementRig {
    /// Adds the base under the scene root and the look node under the base.
    pub fn new(scene: &mut Scene) -> Result<Self> {
        let base = scene.add_group("rig base");
        let look = scene.add_to(base, Node::new("rig look", NodeKind::Group))?;
        Ok(Self {
            base,
            look,
            units_per_second: 1.0,
            degrees_per_second: 60.0,
        })
    }

    pub fn with_speed(mut self, units_per_second: f32, degrees_per_second: f32) -> Self {
        self.units_per_second = units_per_second;
        self.degrees_per_second = degrees_per_second;
        self
    }

    pub fn base(&self) -> NodeId {
        self.base
    }

    pub fn look(&self) -> NodeId {
        self.look
    }

    pub fn attach(&self, scene: &mut Scene, node: NodeId) -> Result<()> {
        scene.add_child(self.look, node)
    }

    pub fn set_position(&self, scene: &mut Scene, position: [f32; 3]) -> Result<()> {
        scene.node_mut(self.base)?.set_position(position);
        Ok(())
    }

    pub fn update(&self, scene: &mut Scene, input: &InputSnapshot, delta_time: f32) -> Result<()> {
        let step = self.units_per_second * delta_time;
        let turn = self.degrees_per_second.to_radians() * delta_time;
        let axis = |positive: KeyCode, negative: KeyCode| {
            let mut value = 0.0;
            if input.is_key_down(positive) {
                value += 1.0;
            }
            if input.is_key_down(negative) {
                value -= 1.0;
            }
            value
        };

        let base = scene.node_mut(self.base)?;
        let (x, y, z) = (
            axis(KeyCode::KeyD, KeyCode::KeyA),
            axis(KeyCode::KeyR, KeyCode::KeyF),
            axis(KeyCode::KeyS, KeyCode::KeyW),
        );
        if x != 0.0 || y != 0.0 || z != 0.0 {
            base.translate(x * step, y * step, z * step, true);
        }
        let yaw = axis(KeyCode::KeyQ, KeyCode::KeyE);
        if yaw != 0.0 {
            base.rotate_y(yaw * turn, true);
        }

        let pitch = axis(KeyCode::KeyT, KeyCode::KeyG);
        if pitch != 0.0 {
            scene.node_mut(self.look)?.rotate_x(pitch * turn, true);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::scene::Camera;
    use crate::input::InputState;
    use approx::assert_relative_eq;
    use winit::event::ElementState;

    fn holding(keys: &[KeyCode]) -> InputSnapshot {
        let mut input = InputState::new();
        for key in keys {
            input.apply_key(*key, ElementState::Pressed, false);
        }
        input.snapshot()
    }

    #[test]
    fn test_forward_moves_along_negative_z() {
        let mut scene = Scene::new();
        let rig = MovementRig::new(&mut scene).unwrap();
        rig.update(&mut scene, &holding(&[KeyCode::KeyW]), 0.5).unwrap();

        let position = scene.world_position(rig.base()).unwrap();
        assert_relative_eq!(position.z, -0.5, epsilon = 1e-6);
        assert_relative_eq!(position.x, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_turning_changes_heading_of_attached_camera() {
        let mut scene = Scene::new();
        let rig = MovementRig::new(&mut scene).unwrap();
        let camera = scene.add_camera("camera", Camera::default());
        rig.attach(&mut scene, camera).unwrap();

        // 90 degrees to the left.
        rig.update(&mut scene, &holding(&[KeyCode::KeyQ]), 1.5).unwrap();
        let forward = scene.world_direction(camera).unwrap();
        assert_relative_eq!(forward.x, -1.0, epsilon = 1e-5);

        rig.update(&mut scene, &holding(&[KeyCode::KeyW]), 1.0).unwrap();
        let position = scene.world_position(camera).unwrap();
        assert_relative_eq!(position.x, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_opposing_keys_cancel() {
        let mut scene = Scene::new();
        let rig = MovementRig::new(&mut scene).unwrap();
        rig.set_position(&mut scene, [1.0, 2.0, 3.0]).unwrap();
        rig.update(&mut scene, &holding(&[KeyCode::KeyA, KeyCode::KeyD]), 1.0)
            .unwrap();
        let position = scene.world_position(rig.base()).unwrap();
        assert_eq!(position, cgmath::Vector3::new(1.0, 2.0, 3.0));
    }
}
