use super::{DrawGroup, Geometry};
use glam::{DVec2, DVec3};
use tracing::debug;

/// Material slot for top and bottom caps
pub const CAP_MATERIAL: usize = 0;
/// Material slot for side walls
pub const SIDE_MATERIAL: usize = 1;

const EPSILON: f64 = 1e-9;

/// Planar outline with optional holes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shape {
    pub outer: Vec<DVec2>,
    pub holes: Vec<Vec<DVec2>>,
}

impl Shape {
    pub fn new(outer: Vec<DVec2>) -> Self {
        Self { outer, holes: Vec::new() }
    }

    pub fn with_hole(mut self, hole: Vec<DVec2>) -> Self {
        self.holes.push(hole);
        self
    }
}

/// Extrude `shape` from z = 0 up to z = `depth` without bevel.
///
/// Caps come first in the index buffer (slot 0), side walls after (slot 1).
/// Non-finite points and repeated points are dropped; an outer ring with
/// fewer than three usable points yields an empty geometry.
pub fn extrude(shape: &Shape, depth: f64) -> Geometry {
    let mut outer = clean_ring(&shape.outer);
    if outer.len() < 3 {
        return Geometry::default();
    }
    if signed_area(&outer) < 0.0 {
        outer.reverse();
    }

    let mut rings = vec![outer];
    for hole in &shape.holes {
        let mut hole = clean_ring(hole);
        if hole.len() < 3 {
            continue;
        }
        if signed_area(&hole) > 0.0 {
            hole.reverse();
        }
        rings.push(hole);
    }

    let mut flat: Vec<f64> = Vec::new();
    let mut hole_indices: Vec<usize> = Vec::new();
    let mut contour: Vec<DVec2> = Vec::new();
    for (i, ring) in rings.iter().enumerate() {
        if i > 0 {
            hole_indices.push(contour.len());
        }
        for p in ring {
            flat.push(p.x);
            flat.push(p.y);
            contour.push(*p);
        }
    }

    let triangles = match earcutr::earcut(&flat, &hole_indices, 2) {
        Ok(ix) => ix,
        Err(e) => {
            debug!("triangulation failed: {e:?}");
            return Geometry::default();
        }
    };
    if triangles.is_empty() {
        return Geometry::default();
    }

    let n = contour.len() as u32;
    let mut geo = Geometry::default();
    geo.positions.extend(contour.iter().map(|p| DVec3::new(p.x, p.y, 0.0)));
    geo.positions.extend(contour.iter().map(|p| DVec3::new(p.x, p.y, depth)));

    for tri in triangles.chunks_exact(3) {
        let (mut a, b, mut c) = (tri[0] as u32, tri[1] as u32, tri[2] as u32);
        let area = (contour[b as usize] - contour[a as usize])
            .perp_dot(contour[c as usize] - contour[a as usize]);
        if area < 0.0 {
            std::mem::swap(&mut a, &mut c);
        }
        // bottom faces down, top faces up
        geo.indices.extend([c, b, a]);
        geo.indices.extend([a + n, b + n, c + n]);
    }
    geo.groups.push(DrawGroup {
        start: 0,
        count: geo.indices.len(),
        material_index: CAP_MATERIAL,
    });

    let side_start = geo.indices.len();
    for ring in &rings {
        for i in 0..ring.len() {
            let a = ring[i];
            let b = ring[(i + 1) % ring.len()];
            let base = geo.positions.len() as u32;
            geo.positions.extend([
                DVec3::new(a.x, a.y, 0.0),
                DVec3::new(b.x, b.y, 0.0),
                DVec3::new(b.x, b.y, depth),
                DVec3::new(a.x, a.y, depth),
            ]);
            geo.indices.extend([base, base + 1, base + 2, base, base + 2, base + 3]);
        }
    }
    geo.groups.push(DrawGroup {
        start: side_start,
        count: geo.indices.len() - side_start,
        material_index: SIDE_MATERIAL,
    });

    geo
}

/// Drop non-finite points, consecutive duplicates and the closing point
fn clean_ring(ring: &[DVec2]) -> Vec<DVec2> {
    let mut out: Vec<DVec2> = Vec::with_capacity(ring.len());
    for &p in ring {
        if !p.is_finite() {
            continue;
        }
        if out.last().is_some_and(|last| last.distance_squared(p) < EPSILON) {
            continue;
        }
        out.push(p);
    }
    while out.len() > 1 && out[0].distance_squared(out[out.len() - 1]) < EPSILON {
        out.pop();
    }
    out
}

/// Shoelace area; positive for counter-clockwise rings
fn signed_area(ring: &[DVec2]) -> f64 {
    let mut area = 0.0;
    for i in 0..ring.len() {
        let a = ring[i];
        let b = ring[(i + 1) % ring.len()];
        area += a.perp_dot(b);
    }
    area * 0.5
}
