mod extrude;
mod primitives;

pub use extrude::{extrude, Shape};
pub use primitives::{box_geometry, plane_geometry, ring_geometry};

use glam::{DMat4, DVec3};
use std::collections::HashMap;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    /// An empty box that any point expands
    pub fn empty() -> Self {
        Self {
            min: DVec3::splat(f64::INFINITY),
            max: DVec3::splat(f64::NEG_INFINITY),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn expand(&mut self, p: DVec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }

    /// Bounds of this box after transforming all 8 corners
    pub fn transformed(&self, m: &DMat4) -> Aabb {
        let mut out = Aabb::empty();
        if self.is_empty() {
            return out;
        }
        for i in 0..8 {
            let corner = DVec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            out.expand(m.transform_point3(corner));
        }
        out
    }
}

/// Range of indices drawn with a single material slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawGroup {
    pub start: usize,
    pub count: usize,
    pub material_index: usize,
}

/// Indexed triangle geometry.
/// `groups` split the index buffer between material slots; indices not
/// covered by any group use slot 0.
#[derive(Debug, Clone, Default)]
pub struct Geometry {
    pub positions: Vec<DVec3>,
    pub indices: Vec<u32>,
    pub groups: Vec<DrawGroup>,
}

impl Geometry {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Corners of triangle `tri`
    #[inline]
    pub fn triangle(&self, tri: usize) -> [DVec3; 3] {
        let i = tri * 3;
        [
            self.positions[self.indices[i] as usize],
            self.positions[self.indices[i + 1] as usize],
            self.positions[self.indices[i + 2] as usize],
        ]
    }

    /// Material slot used by triangle `tri`
    pub fn material_index(&self, tri: usize) -> usize {
        let index = tri * 3;
        self.groups
            .iter()
            .find(|g| index >= g.start && index < g.start + g.count)
            .map(|g| g.material_index)
            .unwrap_or(0)
    }

    pub fn translate(&mut self, offset: DVec3) {
        for p in &mut self.positions {
            *p += offset;
        }
    }

    pub fn bounding_box(&self) -> Aabb {
        let mut bounds = Aabb::empty();
        for &p in &self.positions {
            bounds.expand(p);
        }
        bounds
    }

    /// Edges worth drawing in a wireframe: boundary edges plus edges whose
    /// adjacent faces meet at more than `threshold_deg`. Vertices are matched
    /// by position so split vertices along hard edges still pair up.
    pub fn feature_edges(&self, threshold_deg: f64) -> Vec<(DVec3, DVec3)> {
        let threshold_dot = threshold_deg.to_radians().cos();
        // key -> (first face normal, endpoints, still unmatched)
        let mut seen: HashMap<(EdgeKey, EdgeKey), (DVec3, DVec3, DVec3, bool)> = HashMap::new();
        let mut edges = Vec::new();

        for tri in 0..self.triangle_count() {
            let [a, b, c] = self.triangle(tri);
            let normal = (b - a).cross(c - a);
            if normal.length_squared() <= f64::EPSILON {
                continue;
            }
            let normal = normal.normalize();

            for (p, q) in [(a, b), (b, c), (c, a)] {
                let (kp, kq) = (EdgeKey::of(p), EdgeKey::of(q));
                let key = if kp <= kq { (kp, kq) } else { (kq, kp) };
                match seen.get_mut(&key) {
                    Some(entry) if entry.3 => {
                        entry.3 = false;
                        if entry.0.dot(normal) <= threshold_dot {
                            edges.push((entry.1, entry.2));
                        }
                    }
                    Some(_) => {}
                    None => {
                        seen.insert(key, (normal, p, q, true));
                    }
                }
            }
        }

        edges.extend(
            seen.into_values()
                .filter(|entry| entry.3)
                .map(|entry| (entry.1, entry.2)),
        );
        edges
    }
}

/// Quantized vertex position for edge matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct EdgeKey(i64, i64, i64);

impl EdgeKey {
    const PRECISION: f64 = 1e4;

    fn of(p: DVec3) -> Self {
        Self(
            (p.x * Self::PRECISION).round() as i64,
            (p.y * Self::PRECISION).round() as i64,
            (p.z * Self::PRECISION).round() as i64,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aabb_transform() {
        let mut bounds = Aabb::empty();
        assert!(bounds.is_empty());
        bounds.expand(DVec3::new(-1.0, -1.0, 0.0));
        bounds.expand(DVec3::new(1.0, 1.0, 2.0));
        let moved = bounds.transformed(&DMat4::from_translation(DVec3::new(10.0, 0.0, 0.0)));
        assert_eq!(moved.min, DVec3::new(9.0, -1.0, 0.0));
        assert_eq!(moved.center(), DVec3::new(10.0, 0.0, 1.0));
    }

    #[test]
    fn test_material_index_falls_back_to_zero() {
        let mut geo = plane_geometry(2.0, 2.0);
        assert_eq!(geo.material_index(1), 0);
        geo.groups.push(DrawGroup { start: 3, count: 3, material_index: 1 });
        assert_eq!(geo.material_index(0), 0);
        assert_eq!(geo.material_index(1), 1);
    }

    #[test]
    fn test_box_has_twelve_feature_edges() {
        let geo = box_geometry(1.0, 1.0, 1.0);
        assert_eq!(geo.feature_edges(30.0).len(), 12);
    }

    #[test]
    fn test_plane_drops_diagonal() {
        let geo = plane_geometry(6.0, 3.0);
        assert_eq!(geo.feature_edges(30.0).len(), 4);
    }
}
