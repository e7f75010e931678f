//! Ray picking against scene meshes, lines and sprites.

mod ray;

pub use ray::Ray;

use crate::camera::PerspectiveCamera;
use crate::scene::{Line, Mesh, NodeId, NodeKind, Scene};
use glam::{DMat4, DVec2, DVec3};

/// One object hit by the ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    /// World distance from the ray origin
    pub distance: f64,
    /// World hit point
    pub point: DVec3,
    pub node: NodeId,
    /// Triangle index for meshes, segment index for lines
    pub face_index: Option<usize>,
}

pub struct Raycaster {
    pub ray: Ray,
    pub near: f64,
    pub far: f64,
    /// Pick distance around line segments, in world units
    pub line_threshold: f64,
}

impl Default for Raycaster {
    fn default() -> Self {
        Self {
            ray: Ray::new(DVec3::ZERO, DVec3::NEG_Z),
            near: 0.0,
            far: f64::INFINITY,
            line_threshold: 1.0,
        }
    }
}

impl Raycaster {
    pub fn new(line_threshold: f64) -> Self {
        Self {
            line_threshold,
            ..Self::default()
        }
    }

    pub fn set_from_camera(&mut self, ndc: DVec2, camera: &PerspectiveCamera) {
        self.ray = camera.ray_from_ndc(ndc);
        self.near = camera.near;
        self.far = camera.far;
    }

    /// Hits on `roots` (and their descendants when `recursive`), nearest first.
    /// Hidden nodes and their subtrees are skipped.
    pub fn intersect_objects(
        &self,
        scene: &Scene,
        roots: &[NodeId],
        recursive: bool,
    ) -> Vec<Intersection> {
        let mut hits = Vec::new();
        for &root in roots {
            if !scene.contains(root) {
                continue;
            }
            let parent_world = scene
                .parent(root)
                .map(|p| scene.world_matrix(p))
                .unwrap_or(DMat4::IDENTITY);
            if scene.parent(root).is_some_and(|p| !scene.is_visible(p)) {
                continue;
            }
            self.visit(scene, root, &parent_world, recursive, &mut hits);
        }
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }

    fn visit(
        &self,
        scene: &Scene,
        id: NodeId,
        parent_world: &DMat4,
        recursive: bool,
        hits: &mut Vec<Intersection>,
    ) {
        let Some(node) = scene.get(id) else {
            return;
        };
        if !node.visible {
            return;
        }
        let world = *parent_world * node.transform.matrix();

        match &node.kind {
            NodeKind::Group => {}
            NodeKind::Mesh(mesh) => self.intersect_mesh(id, mesh, &world, hits),
            NodeKind::Line(line) => self.intersect_line(id, line, &world, hits),
            NodeKind::Sprite(_) => self.intersect_sprite(id, &world, hits),
        }

        if recursive {
            for &child in node.children() {
                self.visit(scene, child, &world, recursive, hits);
            }
        }
    }

    fn in_range(&self, distance: f64) -> bool {
        distance >= self.near && distance <= self.far
    }

    fn intersect_mesh(&self, id: NodeId, mesh: &Mesh, world: &DMat4, hits: &mut Vec<Intersection>) {
        let inverse = world.inverse();
        let local = self.ray.transformed(&inverse);
        if local.intersect_aabb(mesh.bounds()).is_none() {
            return;
        }

        let geometry = mesh.geometry();
        let mut best: Option<Intersection> = None;
        for tri in 0..geometry.triangle_count() {
            let Some(material) = mesh.material_for(tri) else {
                continue;
            };
            let [a, b, c] = geometry.triangle(tri);
            let Some(t) = local.intersect_triangle(a, b, c, material.side) else {
                continue;
            };
            let point = world.transform_point3(local.at(t));
            let distance = self.ray.origin.distance(point);
            if !self.in_range(distance) {
                continue;
            }
            if best.map_or(true, |b| distance < b.distance) {
                best = Some(Intersection {
                    distance,
                    point,
                    node: id,
                    face_index: Some(tri),
                });
            }
        }
        hits.extend(best);
    }

    fn intersect_line(&self, id: NodeId, line: &Line, world: &DMat4, hits: &mut Vec<Intersection>) {
        if line.points.len() < 2 {
            return;
        }
        let inverse = world.inverse();
        let local = self.ray.transformed(&inverse);
        let (scale, _, _) = world.to_scale_rotation_translation();
        let avg_scale = (scale.x + scale.y + scale.z) / 3.0;
        let threshold = self.line_threshold / avg_scale.max(f64::EPSILON);
        let threshold_sq = threshold * threshold;

        for (i, pair) in line.points.windows(2).enumerate() {
            let (dist_sq, on_ray, on_segment) = local.distance_sq_to_segment(pair[0], pair[1]);
            if dist_sq > threshold_sq {
                continue;
            }
            let on_ray = world.transform_point3(on_ray);
            let distance = self.ray.origin.distance(on_ray);
            if !self.in_range(distance) {
                continue;
            }
            hits.push(Intersection {
                distance,
                point: world.transform_point3(on_segment),
                node: id,
                face_index: Some(i),
            });
        }
    }

    fn intersect_sprite(&self, id: NodeId, world: &DMat4, hits: &mut Vec<Intersection>) {
        let (scale, _, center) = world.to_scale_rotation_translation();
        let radius = scale.max_element() * 0.5;
        if let Some(t) = self.ray.intersect_sphere(center, radius) {
            if self.in_range(t) {
                hits.push(Intersection {
                    distance: t,
                    point: self.ray.at(t),
                    node: id,
                    face_index: None,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{box_geometry, plane_geometry};
    use crate::scene::{Material, Node, Rgb, Sprite};

    fn looking_down(x: f64, y: f64) -> Raycaster {
        Raycaster {
            ray: Ray::new(DVec3::new(x, y, 100.0), DVec3::NEG_Z),
            ..Raycaster::default()
        }
    }

    fn box_node(name: &str, z: f64) -> Node {
        Node::mesh(
            name,
            Mesh::new(box_geometry(2.0, 2.0, 2.0), vec![Material::basic(Rgb::WHITE)]),
        )
        .at(DVec3::new(0.0, 0.0, z))
    }

    #[test]
    fn test_hits_sorted_by_distance() {
        let mut scene = Scene::new();
        let root = scene.root();
        let low = scene.add(root, box_node("low", 0.0));
        let high = scene.add(root, box_node("high", 10.0));

        let hits = looking_down(0.0, 0.0).intersect_objects(&scene, &[root], true);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].node, high);
        assert!((hits[0].distance - 89.0).abs() < 1e-9);
        assert!((hits[0].point.z - 11.0).abs() < 1e-9);
        assert_eq!(hits[1].node, low);

        // Non-recursive only tests the root itself
        assert!(looking_down(0.0, 0.0).intersect_objects(&scene, &[root], false).is_empty());
    }

    #[test]
    fn test_hidden_subtree_skipped() {
        let mut scene = Scene::new();
        let root = scene.root();
        let group = scene.add(root, Node::group("g"));
        scene.add(group, box_node("b", 0.0));
        scene.set_visible(group, false);
        assert!(looking_down(0.0, 0.0).intersect_objects(&scene, &[root], true).is_empty());
    }

    #[test]
    fn test_parent_transform_applies() {
        let mut scene = Scene::new();
        let root = scene.root();
        let group = scene.add(root, Node::group("g").at(DVec3::new(50.0, 0.0, 0.0)));
        let mesh = scene.add(group, box_node("b", 0.0));
        assert!(looking_down(0.0, 0.0).intersect_objects(&scene, &[mesh], false).is_empty());
        let hits = looking_down(50.5, 0.0).intersect_objects(&scene, &[mesh], false);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_front_side_plane_seen_from_behind() {
        let mut scene = Scene::new();
        let root = scene.root();
        let mut node = Node::mesh("plane", Mesh::new(plane_geometry(2.0, 2.0), vec![Material::basic(Rgb::WHITE)]));
        node.transform.rotate_x(std::f64::consts::PI);
        scene.add(root, node);
        assert!(looking_down(0.0, 0.0).intersect_objects(&scene, &[root], true).is_empty());
    }

    #[test]
    fn test_line_threshold() {
        let mut scene = Scene::new();
        let root = scene.root();
        let line = Line {
            points: vec![DVec3::new(-5.0, 0.0, 0.0), DVec3::new(5.0, 0.0, 0.0)],
            material: Material::basic(Rgb::WHITE),
        };
        let id = scene.add(root, Node::line("province_line", line));
        let hits = looking_down(0.0, 0.8).intersect_objects(&scene, &[root], true);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].node, id);
        assert!((hits[0].point - DVec3::ZERO).length() < 1e-9);
        assert!(looking_down(0.0, 1.5).intersect_objects(&scene, &[root], true).is_empty());
    }

    #[test]
    fn test_sprite_sphere() {
        let mut scene = Scene::new();
        let root = scene.root();
        let sprite = Sprite {
            material: Material::basic(Rgb::WHITE),
            glyph: '◆',
        };
        scene.add(root, Node::sprite("marker", sprite).with_scale(DVec3::splat(3.0)));
        assert_eq!(looking_down(1.0, 0.0).intersect_objects(&scene, &[root], true).len(), 1);
        assert!(looking_down(2.0, 0.0).intersect_objects(&scene, &[root], true).is_empty());
    }
}
