use super::Geometry;
use glam::DVec3;
use std::f64::consts::TAU;

/// Box centered on the origin; `depth` runs along z.
/// Each face has its own four vertices so faces stay flat-shaded.
pub fn box_geometry(width: f64, height: f64, depth: f64) -> Geometry {
    let h = DVec3::new(width, height, depth) * 0.5;
    // (normal axis, sign) for the six faces
    let faces: [(DVec3, DVec3, DVec3); 6] = [
        (DVec3::X, DVec3::Y, DVec3::Z),
        (DVec3::NEG_X, DVec3::Z, DVec3::Y),
        (DVec3::Y, DVec3::Z, DVec3::X),
        (DVec3::NEG_Y, DVec3::X, DVec3::Z),
        (DVec3::Z, DVec3::X, DVec3::Y),
        (DVec3::NEG_Z, DVec3::Y, DVec3::X),
    ];

    let mut geo = Geometry::default();
    for (normal, u, v) in faces {
        let base = geo.positions.len() as u32;
        let center = normal * h;
        let du = u * h;
        let dv = v * h;
        geo.positions.extend([
            center - du - dv,
            center + du - dv,
            center + du + dv,
            center - du + dv,
        ]);
        // Keep the winding counter-clockwise seen from outside
        if du.cross(dv).dot(normal) >= 0.0 {
            geo.indices.extend([base, base + 1, base + 2, base, base + 2, base + 3]);
        } else {
            geo.indices.extend([base, base + 2, base + 1, base, base + 3, base + 2]);
        }
    }
    geo
}

/// Rectangle in the XY plane centered on the origin, facing +z
pub fn plane_geometry(width: f64, height: f64) -> Geometry {
    let (hw, hh) = (width * 0.5, height * 0.5);
    Geometry {
        positions: vec![
            DVec3::new(-hw, -hh, 0.0),
            DVec3::new(hw, -hh, 0.0),
            DVec3::new(hw, hh, 0.0),
            DVec3::new(-hw, hh, 0.0),
        ],
        indices: vec![0, 1, 2, 0, 2, 3],
        groups: Vec::new(),
    }
}

/// Flat annulus in the XY plane
pub fn ring_geometry(inner_radius: f64, outer_radius: f64, segments: usize) -> Geometry {
    let segments = segments.max(3);
    let mut geo = Geometry::default();

    for i in 0..segments {
        let angle = i as f64 / segments as f64 * TAU;
        let (sin, cos) = angle.sin_cos();
        geo.positions.push(DVec3::new(cos * inner_radius, sin * inner_radius, 0.0));
        geo.positions.push(DVec3::new(cos * outer_radius, sin * outer_radius, 0.0));
    }

    let n = segments as u32;
    for i in 0..n {
        let inner = i * 2;
        let outer = inner + 1;
        let next_inner = ((i + 1) % n) * 2;
        let next_outer = next_inner + 1;
        geo.indices.extend([inner, outer, next_outer, inner, next_outer, next_inner]);
    }
    geo
}
