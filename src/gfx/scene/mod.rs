//! # Scene graph
//!
//! A [`Scene`] is an arena of [`Node`]s rooted at a group node. Nodes own
//! their local transform and payload ([`NodeKind`]); parent links are plain
//! ids, so re-parenting never moves or destroys anything.
//!
//! ```no_run
//! use lumen::gfx::scene::{Camera, Positionable, Scene};
//!
//! let mut scene = Scene::new();
//! let rig = scene.add_group("rig");
//! let camera = scene.add_camera("camera", Camera::default());
//! scene.add_child(rig, camera).unwrap();
//! scene.node_mut(rig).unwrap().set_position([0.0, 2.0, 5.0]);
//! let view = scene.view_matrix(camera).unwrap();
//! ```

mod camera;
pub mod helpers;
mod light;
mod mesh;
mod node;
mod rig;

pub use camera::Camera;
pub use light::{Illuminates, Light, LightKind, DEFAULT_ATTENUATION};
pub use mesh::{Drawable, Mesh};
pub use node::{Node, NodeKind, NodeKindTag, Positionable};
pub use rig::MovementRig;

use cgmath::{Matrix4, Point3, Vector3};
use slotmap::{new_key_type, SlotMap};

use crate::error::{EngineError, Result};
use crate::gfx::device::GpuDevice;
use crate::gfx::transform;

new_key_type! {
    /// Stable id of a node within one [`Scene`].
    pub struct NodeId;
}

/// Node arena with a root group.
#[derive(Debug)]
pub struct Scene {
    nodes: SlotMap<NodeId, Node>,
    root: NodeId,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node::new("root", NodeKind::Group));
        Self { nodes, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id).ok_or_else(|| not_found(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(id).ok_or_else(|| not_found(id))
    }

    /// Inserts `node` under the root.
    pub fn add(&mut self, node: Node) -> NodeId {
        let id = self.nodes.insert(node);
        self.link(self.root, id);
        id
    }

    /// Inserts `node` under `parent`.
    pub fn add_to(&mut self, parent: NodeId, node: Node) -> Result<NodeId> {
        self.node(parent)?;
        let id = self.nodes.insert(node);
        self.link(parent, id);
        Ok(id)
    }

    pub fn add_group(&mut self, name: &str) -> NodeId {
        self.add(Node::new(name, NodeKind::Group))
    }

    pub fn add_mesh(&mut self, name: &str, mesh: Mesh) -> NodeId {
        self.add(Node::new(name, NodeKind::Mesh(mesh)))
    }

    pub fn add_camera(&mut self, name: &str, camera: Camera) -> NodeId {
        self.add(Node::new(name, NodeKind::Camera(camera)))
    }

    pub fn add_light(&mut self, name: &str, light: Light) -> NodeId {
        self.add(Node::new(name, NodeKind::Light(light)))
    }

    pub fn add_ambient_light(&mut self, color: [f32; 3]) -> NodeId {
        self.add_light("ambient light", Light::ambient(color))
    }

    /// A directional light whose forward axis points along `direction`.
    pub fn add_directional_light(&mut self, color: [f32; 3], direction: [f32; 3]) -> NodeId {
        let mut node = Node::new("directional light", NodeKind::Light(Light::directional(color)));
        node.set_direction(direction);
        self.add(node)
    }

    pub fn add_point_light(
        &mut self,
        color: [f32; 3],
        position: [f32; 3],
        attenuation: [f32; 3],
    ) -> NodeId {
        let mut node = Node::new("point light", NodeKind::Light(Light::point(color, attenuation)));
        node.set_position(position);
        self.add(node)
    }

    fn link(&mut self, parent: NodeId, child: NodeId) {
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.push(child);
        }
    }

    /// Whether `ancestor` lies on the parent chain of `id` (or is `id`).
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node_id) = current {
            if node_id == ancestor {
                return true;
            }
            current = self.nodes.get(node_id).and_then(|n| n.parent);
        }
        false
    }

    /// Moves `child` (and its subtree) under `parent`, appended last.
    ///
    /// Fails with `CycleDetected`, leaving the tree unchanged, when `child`
    /// is `parent`, one of its ancestors, or the root. The root never has a
    /// parent, even when `parent` is a detached node.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.node(parent)?;
        self.node(child)?;
        if child == self.root || self.is_ancestor(child, parent) {
            return Err(EngineError::CycleDetected {
                parent: format!("{parent:?}"),
                child: format!("{child:?}"),
            });
        }
        self.detach(child)?;
        self.link(parent, child);
        Ok(())
    }

    /// Unlinks `child` from `parent`; a no-op when it is not a child of
    /// `parent`. The detached subtree stays in the arena.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let parent_node = self.node_mut(parent)?;
        let Some(index) = parent_node.children.iter().position(|c| *c == child) else {
            return Ok(());
        };
        parent_node.children.remove(index);
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = None;
        }
        Ok(())
    }

    /// Unlinks `id` from whatever parent it has.
    pub fn detach(&mut self, id: NodeId) -> Result<()> {
        match self.node(id)?.parent {
            Some(parent) => self.remove_child(parent, id),
            None => Ok(()),
        }
    }

    /// Parent's world transform times the local one; O(depth).
    pub fn world_transform(&self, id: NodeId) -> Result<Matrix4<f32>> {
        let mut world = *self.node(id)?.local_transform();
        let mut current = self.node(id)?.parent;
        while let Some(parent_id) = current {
            let parent = self.node(parent_id)?;
            world = transform::compose(parent.local_transform(), &world);
            current = parent.parent;
        }
        Ok(world)
    }

    pub fn world_position(&self, id: NodeId) -> Result<Vector3<f32>> {
        Ok(transform::position_of(&self.world_transform(id)?))
    }

    /// World-space forward (-Z) axis, normalized.
    pub fn world_direction(&self, id: NodeId) -> Result<Vector3<f32>> {
        use cgmath::InnerSpace;
        let forward = transform::rotation_part(&self.world_transform(id)?) * -Vector3::unit_z();
        Ok(forward.normalize())
    }

    /// Turns `id` to face a world-space point, keeping its world position.
    pub fn look_at(&mut self, id: NodeId, target: [f32; 3]) -> Result<()> {
        use cgmath::EuclideanSpace;
        let world = self.world_transform(id)?;
        let eye = Point3::from_vec(transform::position_of(&world));
        let placement = transform::look_at(eye, Point3::from(target), Vector3::unit_y());
        let parent_world = match self.node(id)?.parent {
            Some(parent) => self.world_transform(parent)?,
            None => transform::identity(),
        };
        let local = transform::compose(&transform::inverse(&parent_world), &placement);
        self.node_mut(id)?.set_local_transform(local);
        Ok(())
    }

    pub fn camera(&self, id: NodeId) -> Result<&Camera> {
        self.node(id)?
            .as_camera()
            .ok_or_else(|| EngineError::NotACamera(format!("{id:?}")))
    }

    pub fn camera_mut(&mut self, id: NodeId) -> Result<&mut Camera> {
        self.node_mut(id)?
            .as_camera_mut()
            .ok_or_else(|| EngineError::NotACamera(format!("{id:?}")))
    }

    /// Inverse of the camera node's world transform.
    pub fn view_matrix(&self, camera: NodeId) -> Result<Matrix4<f32>> {
        self.camera(camera)?;
        Ok(transform::inverse(&self.world_transform(camera)?))
    }

    /// Depth-first pre-order walk of `id`'s subtree, `id` first. Calling
    /// again restarts the walk. Unknown ids yield nothing.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        let stack = if self.nodes.contains_key(id) {
            vec![id]
        } else {
            Vec::new()
        };
        Descendants { scene: self, stack }
    }

    pub fn descendants_of_type(
        &self,
        id: NodeId,
        tag: NodeKindTag,
    ) -> impl Iterator<Item = NodeId> + '_ {
        self.descendants(id)
            .filter(move |d| self.nodes.get(*d).is_some_and(|n| n.tag() == tag))
    }

    /// Visible nodes under the root with their world transforms, in
    /// traversal order. A hidden node hides its subtree.
    pub fn world_transforms(&self) -> Vec<(NodeId, Matrix4<f32>)> {
        let mut flattened = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(self.root, transform::identity())];
        while let Some((id, parent_world)) = stack.pop() {
            let Some(node) = self.nodes.get(id) else { continue };
            if !node.visible {
                continue;
            }
            let world = transform::compose(&parent_world, node.local_transform());
            flattened.push((id, world));
            for child in node.children.iter().rev() {
                stack.push((*child, world));
            }
        }
        flattened
    }

    /// Removes `id` and its subtree, releasing mesh resources. Destroying the
    /// root empties the scene but keeps the root itself.
    pub fn destroy(&mut self, device: &mut dyn GpuDevice, id: NodeId) -> Result<()> {
        self.node(id)?;
        let doomed: Vec<NodeId> = if id == self.root {
            let children = self.nodes[id].children.clone();
            self.nodes[id].children.clear();
            children
                .into_iter()
                .flat_map(|child| self.descendants(child).collect::<Vec<_>>())
                .collect()
        } else {
            self.detach(id)?;
            self.descendants(id).collect()
        };
        for doomed_id in doomed {
            if let Some(mut node) = self.nodes.remove(doomed_id) {
                if let Some(mesh) = node.as_mesh_mut() {
                    mesh.release(device);
                }
            }
        }
        Ok(())
    }

    /// Releases every mesh, detached subtrees included, and resets the
    /// scene to a bare root.
    pub fn teardown(&mut self, device: &mut dyn GpuDevice) {
        let mut released = 0;
        for (_, mut node) in self.nodes.drain() {
            if let Some(mesh) = node.as_mesh_mut() {
                mesh.release(device);
                released += 1;
            }
        }
        log::debug!("scene teardown released {released} mesh(es)");
        self.root = self.nodes.insert(Node::new("root", NodeKind::Group));
    }
}

fn not_found(id: NodeId) -> EngineError {
    EngineError::NodeNotFound(format!("{id:?}"))
}

/// Iterator returned by [`Scene::descendants`].
pub struct Descendants<'a> {
    scene: &'a Scene,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        if let Some(node) = self.scene.nodes.get(id) {
            self.stack.extend(node.children.iter().rev());
        }
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::device::HeadlessDevice;
    use crate::gfx::geometry::box_geometry;
    use crate::gfx::material::{Material, MaterialKind};
    use crate::gfx::transform::{rotation_y, translation};
    use approx::assert_relative_eq;

    fn chain(scene: &mut Scene) -> (NodeId, NodeId, NodeId) {
        let a = scene.add_group("a");
        let b = scene.add_group("b");
        let c = scene.add_group("c");
        scene.add_child(a, b).unwrap();
        scene.add_child(b, c).unwrap();
        (a, b, c)
    }

    #[test]
    fn test_cycles_are_rejected_and_tree_is_unchanged() {
        let mut scene = Scene::new();
        let (a, b, c) = chain(&mut scene);

        for (parent, child) in [(c, a), (b, b), (c, scene.root())] {
            let err = scene.add_child(parent, child).unwrap_err();
            assert!(matches!(err, EngineError::CycleDetected { .. }));
        }
        assert_eq!(scene.node(a).unwrap().children(), &[b]);
        assert_eq!(scene.node(b).unwrap().children(), &[c]);
        assert_eq!(scene.node(a).unwrap().parent(), Some(scene.root()));
    }

    #[test]
    fn test_root_cannot_move_under_detached_node() {
        let mut scene = Scene::new();
        let (a, b, _) = chain(&mut scene);
        scene.node_mut(a).unwrap().set_position([5.0, 0.0, 0.0]);
        scene.detach(b).unwrap();

        let err = scene.add_child(b, scene.root()).unwrap_err();
        assert!(matches!(err, EngineError::CycleDetected { .. }));
        assert_eq!(scene.node(scene.root()).unwrap().parent(), None);
        assert_eq!(scene.node(b).unwrap().children().len(), 1);

        let renderer_view = scene
            .world_transforms()
            .into_iter()
            .find(|(id, _)| *id == a)
            .map(|(_, world)| world)
            .unwrap();
        assert_eq!(scene.world_transform(a).unwrap(), renderer_view);

        scene.add_child(a, b).unwrap();
        assert_eq!(scene.node(b).unwrap().parent(), Some(a));
    }

    #[test]
    fn test_reparenting_moves_subtree() {
        let mut scene = Scene::new();
        let (a, b, c) = chain(&mut scene);
        scene.add_child(scene.root(), b).unwrap();

        assert!(scene.node(a).unwrap().children().is_empty());
        assert_eq!(scene.node(b).unwrap().parent(), Some(scene.root()));
        assert_eq!(scene.node(c).unwrap().parent(), Some(b));
    }

    #[test]
    fn test_remove_child_detaches_without_destroying() {
        let mut scene = Scene::new();
        let (a, b, c) = chain(&mut scene);
        scene.remove_child(a, c).unwrap();
        assert_eq!(scene.node(b).unwrap().children(), &[c]);

        scene.remove_child(a, b).unwrap();
        assert!(scene.contains(b));
        assert_eq!(scene.node(b).unwrap().parent(), None);
        assert!(!scene.descendants(scene.root()).any(|id| id == b));
    }

    #[test]
    fn test_world_transform_composes_ancestors() {
        let mut scene = Scene::new();
        let (a, b, c) = chain(&mut scene);
        let ta = translation(1.0, 0.0, 0.0);
        let tb = rotation_y(0.7);
        let tc = translation(0.0, 2.0, -3.0);
        scene.node_mut(a).unwrap().set_local_transform(ta);
        scene.node_mut(b).unwrap().set_local_transform(tb);
        scene.node_mut(c).unwrap().set_local_transform(tc);

        let expected = ta * tb * tc;
        let world = transform::to_array(&scene.world_transform(c).unwrap());
        let expected = transform::to_array(&expected);
        for (w, e) in world.iter().flatten().zip(expected.iter().flatten()) {
            assert_relative_eq!(*w, *e, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_descendants_preorder_and_restartable() {
        let mut scene = Scene::new();
        let (a, b, c) = chain(&mut scene);
        let d = scene.add_group("d");
        scene.add_child(a, d).unwrap();

        let order: Vec<_> = scene.descendants(a).collect();
        assert_eq!(order, vec![a, b, c, d]);
        assert_eq!(scene.descendants(a).collect::<Vec<_>>(), order);
        assert_eq!(
            scene.descendants_of_type(scene.root(), NodeKindTag::Group).count(),
            5
        );
    }

    #[test]
    fn test_view_matrix_requires_camera() {
        let mut scene = Scene::new();
        let group = scene.add_group("g");
        assert!(matches!(
            scene.view_matrix(group),
            Err(EngineError::NotACamera(_))
        ));

        let camera = scene.add_camera("camera", Camera::default());
        scene.node_mut(camera).unwrap().set_position([0.0, 0.0, 5.0]);
        let view = scene.view_matrix(camera).unwrap();
        assert_relative_eq!(view.w.z, -5.0, epsilon = 1e-6);
    }

    #[test]
    fn test_hidden_nodes_hide_subtrees() {
        let mut scene = Scene::new();
        let (a, b, _) = chain(&mut scene);
        scene.node_mut(b).unwrap().visible = false;
        let visible: Vec<_> = scene.world_transforms().into_iter().map(|(id, _)| id).collect();
        assert_eq!(visible, vec![scene.root(), a]);
    }

    #[test]
    fn test_destroy_releases_mesh_resources() {
        let mut device = HeadlessDevice::default();
        let mut scene = Scene::new();
        let group = scene.add_group("group");
        let geometry = box_geometry(1.0, 1.0, 1.0).build(&mut device);
        let material = Material::new(&mut device, MaterialKind::Surface).unwrap();
        let mesh = scene.add_mesh("box", Mesh::new(&mut device, geometry, material).unwrap());
        scene.add_child(group, mesh).unwrap();

        scene.destroy(&mut device, group).unwrap();
        assert!(!scene.contains(mesh));
        assert_eq!(device.live_resources().total(), 0);
        assert!(matches!(scene.node(group), Err(EngineError::NodeNotFound(_))));
    }

    #[test]
    fn test_look_at_keeps_world_position_under_parent() {
        let mut scene = Scene::new();
        let parent = scene.add_group("parent");
        scene.node_mut(parent).unwrap().set_position([1.0, 0.0, 0.0]);
        let child = scene.add_to(parent, Node::new("child", NodeKind::Group)).unwrap();
        scene.node_mut(child).unwrap().set_position([0.0, 0.0, 2.0]);

        scene.look_at(child, [1.0, 0.0, -10.0]).unwrap();
        let position = scene.world_position(child).unwrap();
        assert_relative_eq!(position.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(position.z, 2.0, epsilon = 1e-5);
        let forward = scene.world_direction(child).unwrap();
        assert_relative_eq!(forward.z, -1.0, epsilon = 1e-5);
    }
}
