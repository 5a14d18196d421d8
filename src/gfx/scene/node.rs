use cgmath::{EuclideanSpace, InnerSpace, Matrix3, Matrix4, Point3, Vector3, Vector4};

use super::{Camera, Light, Mesh, NodeId};
use crate::gfx::transform;

/// What a node is, beyond a place in the hierarchy.
#[derive(Debug)]
pub enum NodeKind {
    Group,
    Mesh(Mesh),
    Camera(Camera),
    Light(Light),
}

/// Payload-free discriminant of [`NodeKind`], for type queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKindTag {
    Group,
    Mesh,
    Camera,
    Light,
}

impl NodeKind {
    pub fn tag(&self) -> NodeKindTag {
        match self {
            NodeKind::Group => NodeKindTag::Group,
            NodeKind::Mesh(_) => NodeKindTag::Mesh,
            NodeKind::Camera(_) => NodeKindTag::Camera,
            NodeKind::Light(_) => NodeKindTag::Light,
        }
    }
}

/// One entry of the scene arena.
#[derive(Debug)]
pub struct Node {
    pub name: String,
    pub visible: bool,
    pub kind: NodeKind,
    local_transform: Matrix4<f32>,
    pub(super) parent: Option<NodeId>,
    pub(super) children: Vec<NodeId>,
}

impl Node {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            visible: true,
            kind,
            local_transform: transform::identity(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn tag(&self) -> NodeKindTag {
        self.kind.tag()
    }

    pub fn as_mesh(&self) -> Option<&Mesh> {
        match &self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn as_mesh_mut(&mut self) -> Option<&mut Mesh> {
        match &mut self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn as_camera(&self) -> Option<&Camera> {
        match &self.kind {
            NodeKind::Camera(camera) => Some(camera),
            _ => None,
        }
    }

    pub fn as_camera_mut(&mut self) -> Option<&mut Camera> {
        match &mut self.kind {
            NodeKind::Camera(camera) => Some(camera),
            _ => None,
        }
    }

    pub fn as_light(&self) -> Option<&Light> {
        match &self.kind {
            NodeKind::Light(light) => Some(light),
            _ => None,
        }
    }

    pub fn as_light_mut(&mut self) -> Option<&mut Light> {
        match &mut self.kind {
            NodeKind::Light(light) => Some(light),
            _ => None,
        }
    }
}

/// Placement relative to the parent node.
///
/// Each incremental operation is applied either in the object's own frame
/// (`local = true`, post-multiplied) or in the parent's frame (pre-multiplied).
pub trait Positionable {
    fn local_transform(&self) -> &Matrix4<f32>;
    fn local_transform_mut(&mut self) -> &mut Matrix4<f32>;

    fn set_local_transform(&mut self, matrix: Matrix4<f32>) {
        *self.local_transform_mut() = matrix;
    }

    fn apply_matrix(&mut self, matrix: &Matrix4<f32>, local: bool) {
        let current = *self.local_transform();
        *self.local_transform_mut() = if local {
            transform::compose(&current, matrix)
        } else {
            transform::compose(matrix, &current)
        };
    }

    fn translate(&mut self, x: f32, y: f32, z: f32, local: bool) {
        self.apply_matrix(&transform::translation(x, y, z), local);
    }

    fn rotate_x(&mut self, angle: f32, local: bool) {
        self.apply_matrix(&transform::rotation_x(angle), local);
    }

    fn rotate_y(&mut self, angle: f32, local: bool) {
        self.apply_matrix(&transform::rotation_y(angle), local);
    }

    fn rotate_z(&mut self, angle: f32, local: bool) {
        self.apply_matrix(&transform::rotation_z(angle), local);
    }

    fn scale(&mut self, s: f32, local: bool) {
        self.apply_matrix(&transform::uniform_scale(s), local);
    }

    fn position(&self) -> Vector3<f32> {
        transform::position_of(self.local_transform())
    }

    fn set_position(&mut self, position: [f32; 3]) {
        let [x, y, z] = position;
        self.local_transform_mut().w = Vector4::new(x, y, z, 1.0);
    }

    fn rotation_matrix(&self) -> Matrix3<f32> {
        transform::rotation_part(self.local_transform())
    }

    /// The local -Z axis in parent space.
    fn direction(&self) -> Vector3<f32> {
        self.rotation_matrix() * Vector3::new(0.0, 0.0, -1.0)
    }

    /// Turns to face `target` (parent space), replacing rotation and scale.
    fn look_at(&mut self, target: [f32; 3]) {
        let eye = self.position();
        let target = Vector3::from(target);
        if (target - eye).magnitude2() < 1e-12 {
            log::warn!("look_at target coincides with the object position; ignored");
            return;
        }
        self.set_local_transform(transform::look_at(
            Point3::from_vec(eye),
            Point3::from_vec(target),
            Vector3::unit_y(),
        ));
    }

    /// Points the local -Z axis along `direction` (parent space).
    fn set_direction(&mut self, direction: [f32; 3]) {
        let target = self.position() + Vector3::from(direction);
        self.look_at(target.into());
    }
}

impl Positionable for Node {
    fn local_transform(&self) -> &Matrix4<f32> {
        &self.local_transform
    }

    fn local_transform_mut(&mut self) -> &mut Matrix4<f32> {
        &mut self.local_transform
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    fn group() -> Node {
        Node::new("group", NodeKind::Group)
    }

    #[test]
    fn test_local_and_global_application_differ() {
        let mut local = group();
        local.rotate_y(FRAC_PI_2, true);
        local.translate(0.0, 0.0, -1.0, true);
        // Moving along its own -Z after turning left goes to -X.
        assert_relative_eq!(local.position().x, -1.0, epsilon = 1e-6);

        let mut global = group();
        global.rotate_y(FRAC_PI_2, true);
        global.translate(0.0, 0.0, -1.0, false);
        assert_relative_eq!(global.position().z, -1.0, epsilon = 1e-6);
        assert_relative_eq!(global.position().x, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_set_position_keeps_rotation() {
        let mut node = group();
        node.rotate_x(0.3, true);
        let rotation = node.rotation_matrix();
        node.set_position([1.0, 2.0, 3.0]);
        assert_eq!(node.rotation_matrix(), rotation);
        assert_eq!(node.position(), Vector3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_set_direction_points_forward_axis() {
        let mut node = group();
        node.set_position([2.0, 4.0, 0.0]);
        node.set_direction([-1.0, -1.0, 0.0]);
        let d = node.direction();
        let expected = Vector3::new(-1.0f32, -1.0, 0.0).normalize();
        assert_relative_eq!(d.x, expected.x, epsilon = 1e-5);
        assert_relative_eq!(d.y, expected.y, epsilon = 1e-5);
        assert_relative_eq!(d.z, expected.z, epsilon = 1e-5);
        assert_eq!(node.position(), Vector3::new(2.0, 4.0, 0.0));
    }
}
