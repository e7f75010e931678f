//! Arena-backed scene graph: groups, meshes, lines and sprites with local
//! transforms, names and JSON user data.

mod material;

pub use material::{Axis, Blending, Material, Rgb, Shading, Side};

use crate::geometry::{Aabb, Geometry};
use glam::{DMat4, DQuat, DVec3};
use serde_json::{Map, Value};

/// Face angle above which mesh edges are drawn in wireframe
const FEATURE_EDGE_ANGLE: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Local translation / rotation / scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: DVec3,
    pub rotation: DQuat,
    pub scale: DVec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: DVec3::ZERO,
            rotation: DQuat::IDENTITY,
            scale: DVec3::ONE,
        }
    }
}

impl Transform {
    pub fn matrix(&self) -> DMat4 {
        DMat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Rotate about the object's own X axis
    pub fn rotate_x(&mut self, angle: f64) {
        self.rotation *= DQuat::from_rotation_x(angle);
    }

    /// Rotate about the object's own Y axis
    pub fn rotate_y(&mut self, angle: f64) {
        self.rotation *= DQuat::from_rotation_y(angle);
    }

    /// Rotate about the object's own Z axis
    pub fn rotate_z(&mut self, angle: f64) {
        self.rotation *= DQuat::from_rotation_z(angle);
    }
}

/// Triangle mesh with one material per draw group
#[derive(Debug, Clone)]
pub struct Mesh {
    geometry: Geometry,
    pub materials: Vec<Material>,
    bounds: Aabb,
    edges: Vec<(DVec3, DVec3)>,
}

impl Mesh {
    pub fn new(geometry: Geometry, materials: Vec<Material>) -> Self {
        let bounds = geometry.bounding_box();
        let edges = geometry.feature_edges(FEATURE_EDGE_ANGLE);
        Self { geometry, materials, bounds, edges }
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Local-space bounds
    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    /// Wireframe edges in local space
    pub fn edges(&self) -> &[(DVec3, DVec3)] {
        &self.edges
    }

    /// Material for triangle `tri`, falling back to the first slot
    pub fn material_for(&self, tri: usize) -> Option<&Material> {
        let slot = self.geometry.material_index(tri);
        self.materials.get(slot).or_else(|| self.materials.first())
    }
}

/// Polyline through `points`
#[derive(Debug, Clone)]
pub struct Line {
    pub points: Vec<DVec3>,
    pub material: Material,
}

/// Camera-facing marker; its size is the node scale
#[derive(Debug, Clone)]
pub struct Sprite {
    pub material: Material,
    pub glyph: char,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Group,
    Mesh(Mesh),
    Line(Line),
    Sprite(Sprite),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    pub transform: Transform,
    pub visible: bool,
    pub render_order: i32,
    pub user_data: Map<String, Value>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    fn with_kind(name: &str, kind: NodeKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            transform: Transform::default(),
            visible: true,
            render_order: 0,
            user_data: Map::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn group(name: &str) -> Self {
        Self::with_kind(name, NodeKind::Group)
    }

    pub fn mesh(name: &str, mesh: Mesh) -> Self {
        Self::with_kind(name, NodeKind::Mesh(mesh))
    }

    pub fn line(name: &str, line: Line) -> Self {
        Self::with_kind(name, NodeKind::Line(line))
    }

    pub fn sprite(name: &str, sprite: Sprite) -> Self {
        Self::with_kind(name, NodeKind::Sprite(sprite))
    }

    pub fn at(mut self, translation: DVec3) -> Self {
        self.transform.translation = translation;
        self
    }

    pub fn with_scale(mut self, scale: DVec3) -> Self {
        self.transform.scale = scale;
        self
    }

    pub fn with_render_order(mut self, order: i32) -> Self {
        self.render_order = order;
        self
    }

    pub fn with_user_data(mut self, key: &str, value: Value) -> Self {
        self.user_data.insert(key.to_string(), value);
        self
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Scene graph rooted at a single group named `scene`
pub struct Scene {
    nodes: Vec<Option<Node>>,
    root: NodeId,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            nodes: vec![Some(Node::group("scene"))],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes (including the root)
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert `node` as the last child of `parent`
    pub fn add(&mut self, parent: NodeId, mut node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        node.children.clear();
        node.parent = None;
        if let Some(p) = self.get_mut(parent) {
            p.children.push(id);
            node.parent = Some(parent);
        }
        self.nodes.push(Some(node));
        id
    }

    /// Empty group named `name` under `parent`
    pub fn add_group(&mut self, parent: NodeId, name: &str) -> NodeId {
        self.add(parent, Node::group(name))
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    pub fn find_child_by_name(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|&c| self.get(c).is_some_and(|n| n.name == name))
    }

    /// First node named `name` in pre-order below (and including) `id`
    pub fn find_by_name(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.traverse(id)
            .into_iter()
            .find(|&n| self.get(n).is_some_and(|node| node.name == name))
    }

    /// Depth-first pre-order walk
    pub fn traverse(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.get(current) else {
                continue;
            };
            out.push(current);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Composed transform from the root down to `id`
    pub fn world_matrix(&self, id: NodeId) -> DMat4 {
        let mut matrix = DMat4::IDENTITY;
        let mut current = Some(id);
        while let Some(node_id) = current {
            let Some(node) = self.get(node_id) else {
                break;
            };
            matrix = node.transform.matrix() * matrix;
            current = node.parent;
        }
        matrix
    }

    /// Visible when it and every ancestor are visible
    pub fn is_visible(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node_id) = current {
            match self.get(node_id) {
                Some(node) if node.visible => current = node.parent,
                _ => return false,
            }
        }
        true
    }

    /// Deep-copy the subtree at `id` under `parent`, returning the new root
    pub fn clone_subtree(&mut self, id: NodeId, parent: NodeId) -> Option<NodeId> {
        let node = self.get(id)?.clone();
        let children = node.children.clone();
        let copy = self.add(parent, node);
        for child in children {
            self.clone_subtree(child, copy);
        }
        Some(copy)
    }

    /// Detach and drop the subtree at `id`. The root cannot be removed.
    pub fn remove(&mut self, id: NodeId) {
        if id == self.root {
            return;
        }
        if let Some(parent) = self.parent(id).and_then(|p| self.get_mut(p)) {
            parent.children.retain(|&c| c != id);
        }
        for node in self.traverse(id) {
            self.nodes[node.0] = None;
        }
    }

    pub fn mesh_mut(&mut self, id: NodeId) -> Option<&mut Mesh> {
        match &mut self.get_mut(id)?.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn line_mut(&mut self, id: NodeId) -> Option<&mut Line> {
        match &mut self.get_mut(id)?.kind {
            NodeKind::Line(line) => Some(line),
            _ => None,
        }
    }

    pub fn sprite_mut(&mut self, id: NodeId) -> Option<&mut Sprite> {
        match &mut self.get_mut(id)?.kind {
            NodeKind::Sprite(sprite) => Some(sprite),
            _ => None,
        }
    }

    pub fn set_visible(&mut self, id: NodeId, visible: bool) {
        if let Some(node) = self.get_mut(id) {
            node.visible = visible;
        }
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::box_geometry;
    use std::f64::consts::FRAC_PI_2;

    fn unit_box() -> Mesh {
        Mesh::new(box_geometry(1.0, 1.0, 1.0), vec![Material::basic(Rgb::WHITE)])
    }

    #[test]
    fn test_add_and_find() {
        let mut scene = Scene::new();
        let group = scene.add_group(scene.root(), "province_group");
        let mesh = scene.add(group, Node::mesh("province_mesh", unit_box()));
        assert_eq!(scene.parent(mesh), Some(group));
        assert_eq!(scene.find_child_by_name(group, "province_mesh"), Some(mesh));
        assert_eq!(scene.find_by_name(scene.root(), "province_mesh"), Some(mesh));
        assert_eq!(scene.traverse(scene.root()), vec![scene.root(), group, mesh]);
        assert_eq!(scene.len(), 3);
    }

    #[test]
    fn test_world_matrix_composes_parents() {
        let mut scene = Scene::new();
        let outer = scene.add(scene.root(), Node::group("outer").at(DVec3::new(10.0, 0.0, 0.0)));
        let mut inner = Node::group("inner").at(DVec3::new(0.0, 1.0, 0.0));
        inner.transform.rotate_z(FRAC_PI_2);
        let inner = scene.add(outer, inner);

        let p = scene.world_matrix(inner).transform_point3(DVec3::X);
        assert!((p - DVec3::new(10.0, 2.0, 0.0)).length() < 1e-9);
    }

    #[test]
    fn test_clone_and_remove_subtree() {
        let mut scene = Scene::new();
        let bar = scene.add(scene.root(), Node::group("bar"));
        scene.add(bar, Node::mesh("halo", unit_box()));

        let copy = scene.clone_subtree(bar, scene.root()).unwrap();
        assert_ne!(copy, bar);
        assert_eq!(scene.children(copy).len(), 1);
        assert_eq!(scene.len(), 5);

        scene.remove(bar);
        assert!(!scene.contains(bar));
        assert_eq!(scene.children(scene.root()), &[copy]);
        assert_eq!(scene.len(), 3);
    }

    #[test]
    fn test_visibility_inherits() {
        let mut scene = Scene::new();
        let group = scene.add(scene.root(), Node::group("g"));
        let mesh = scene.add(group, Node::mesh("m", unit_box()));
        assert!(scene.is_visible(mesh));
        scene.set_visible(group, false);
        assert!(!scene.is_visible(mesh));
    }
}
