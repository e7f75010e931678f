//! Builds the extruded province map and its light pillars into a scene.

mod pillar;

pub use pillar::Pillar;

use crate::config::{MapStyle, PillarStyle};
use crate::geo::{DataPoint, PolygonRings, Projection, Province};
use crate::geometry::{extrude, Shape};
use crate::scene::{Line, Material, Mesh, Node, NodeId, Scene};
use glam::{DVec2, DVec3};
use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, info};

pub const MAP_GROUP: &str = "map_group";
pub const PROVINCE_GROUP: &str = "province_group";
pub const PROVINCE_LINE: &str = "province_line";
pub const PROVINCE_MESH: &str = "province_mesh";
pub const PILLAR_GROUP: &str = "pillar_group";
pub const LIGHT_PILLAR: &str = "light_pillar";
pub const PILLAR_HALO: &str = "pillar_halo";
pub const GLOW_RING: &str = "glow_ring";
pub const PILLAR_MARKER: &str = "pillar_marker";

/// User-data key holding the GeoJSON feature properties
pub const PROPERTIES_KEY: &str = "properties";

/// Floating text that follows a node
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub text: String,
    pub node: NodeId,
}

/// Handles to what [`GeoMap::create`] put in the scene
#[derive(Debug, Clone, Default)]
pub struct BuiltMap {
    pub root: Option<NodeId>,
    pub provinces: Vec<NodeId>,
    pub pillars: Vec<Pillar>,
    pub labels: Vec<Label>,
}

/// Province outline ready to insert: boundary lines plus extruded mesh
struct ProvincePart {
    lines: Vec<Line>,
    mesh: Mesh,
}

pub struct GeoMap<'a> {
    style: &'a MapStyle,
    pillar_style: &'a PillarStyle,
    projection: Projection,
}

impl<'a> GeoMap<'a> {
    pub fn new(style: &'a MapStyle, pillar_style: &'a PillarStyle, projection: Projection) -> Self {
        Self {
            style,
            pillar_style,
            projection,
        }
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Build the map under `parent`. With no provinces nothing is added.
    ///
    /// Every polygon gets its own `province_group` carrying the feature
    /// properties, a `province_line` at the top face and a `province_mesh`.
    pub fn create(
        &self,
        scene: &mut Scene,
        parent: NodeId,
        provinces: &[Province],
        series: &[DataPoint],
    ) -> BuiltMap {
        if provinces.is_empty() {
            return BuiltMap::default();
        }

        let root = scene.add_group(parent, MAP_GROUP);

        let parts: Vec<Vec<ProvincePart>> = provinces
            .par_iter()
            .map(|province| {
                province
                    .polygons
                    .iter()
                    .filter_map(|polygon| self.build_polygon(polygon))
                    .collect()
            })
            .collect();

        let mut groups = Vec::new();
        for (province, parts) in provinces.iter().zip(parts) {
            if parts.is_empty() {
                debug!(name = %province.name, "province has no drawable polygon");
            }
            for part in parts {
                let group = scene.add(
                    root,
                    Node::group(PROVINCE_GROUP)
                        .with_user_data(PROPERTIES_KEY, Value::Object(province.properties.clone())),
                );
                for line in part.lines {
                    scene.add(group, Node::line(PROVINCE_LINE, line));
                }
                scene.add(group, Node::mesh(PROVINCE_MESH, part.mesh));
                groups.push(group);
            }
        }

        let (pillars, labels) = self.create_bars(scene, root, series);
        info!(
            provinces = provinces.len(),
            groups = groups.len(),
            pillars = pillars.len(),
            "map built"
        );

        BuiltMap {
            root: Some(root),
            provinces: groups,
            pillars,
            labels,
        }
    }

    /// Project a ring onto the map plane, skipping points that fail to project
    fn project_ring(&self, ring: &[(f64, f64)]) -> Vec<DVec2> {
        ring.iter()
            .filter_map(|&(lon, lat)| self.projection.to_plane(lon, lat))
            .collect()
    }

    fn build_polygon(&self, polygon: &PolygonRings) -> Option<ProvincePart> {
        let outer = self.project_ring(&polygon.exterior);
        if outer.len() < 3 {
            return None;
        }
        let holes: Vec<Vec<DVec2>> = polygon
            .holes
            .iter()
            .map(|h| self.project_ring(h))
            .filter(|h| h.len() >= 3)
            .collect();

        let deep = self.style.deep;
        let line_material = Material::basic(self.style.line_color);
        let lines = std::iter::once(&outer)
            .chain(holes.iter())
            .map(|ring| Line {
                points: ring.iter().map(|p| p.extend(deep)).collect(),
                material: line_material.clone(),
            })
            .collect();

        let shape = Shape { outer, holes };
        let geometry = extrude(&shape, deep);
        if geometry.is_empty() {
            return None;
        }
        let materials = vec![
            Material::basic(self.style.plane_color).with_opacity(0.9),
            Material::basic(self.style.side_color).with_opacity(0.5),
        ];

        Some(ProvincePart {
            lines,
            mesh: Mesh::new(geometry, materials),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::data::{builtin_provinces, default_series};
    use crate::scene::NodeKind;

    fn build(provinces: &[Province], series: &[DataPoint]) -> (Scene, BuiltMap) {
        let style = MapStyle::default();
        let pillars = PillarStyle::default();
        let geo_map = GeoMap::new(&style, &pillars, Projection::mercator());
        let mut scene = Scene::new();
        let root = scene.root();
        let built = geo_map.create(&mut scene, root, provinces, series);
        (scene, built)
    }

    #[test]
    fn test_empty_input_builds_nothing() {
        let (scene, built) = build(&[], &default_series());
        assert!(built.root.is_none());
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn test_province_groups_in_input_order() {
        let provinces = builtin_provinces();
        let (scene, built) = build(&provinces, &[]);
        assert_eq!(built.provinces.len(), provinces.len());

        for (group, province) in built.provinces.iter().zip(&provinces) {
            let node = scene.get(*group).unwrap();
            assert_eq!(node.name, PROVINCE_GROUP);
            let props = node.user_data[PROPERTIES_KEY].as_object().unwrap();
            assert_eq!(props["name"], province.name.as_str());

            let line = scene.find_child_by_name(*group, PROVINCE_LINE).unwrap();
            let mesh = scene.find_child_by_name(*group, PROVINCE_MESH).unwrap();
            match &scene.get(line).unwrap().kind {
                NodeKind::Line(line) => assert!(line.points.iter().all(|p| p.z == 8.0)),
                other => panic!("expected line, got {other:?}"),
            }
            match &scene.get(mesh).unwrap().kind {
                NodeKind::Mesh(mesh) => {
                    assert_eq!(mesh.materials.len(), 2);
                    assert_eq!(mesh.materials[0].opacity, 0.9);
                    assert_eq!(mesh.materials[1].opacity, 0.5);
                    assert!((mesh.bounds().max.z - 8.0).abs() < 1e-9);
                }
                other => panic!("expected mesh, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_multipolygon_gets_group_per_polygon() {
        let mut province = builtin_provinces().remove(0);
        let mut island = province.polygons[0].clone();
        for p in &mut island.exterior {
            p.0 += 30.0;
        }
        province.polygons.push(island);
        let (_, built) = build(&[province], &[]);
        assert_eq!(built.provinces.len(), 2);
    }

    #[test]
    fn test_unprojectable_polygon_is_skipped() {
        let mut province = builtin_provinces().remove(0);
        province.polygons[0].exterior = vec![(100.0, 90.0), (101.0, 90.0), (f64::NAN, 1.0)];
        let (_, built) = build(&[province], &[]);
        assert!(built.provinces.is_empty());
        assert!(built.root.is_some());
    }
}
