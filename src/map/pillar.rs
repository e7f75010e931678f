use super::{
    GeoMap, Label, GLOW_RING, LIGHT_PILLAR, PILLAR_GROUP, PILLAR_HALO, PILLAR_MARKER,
};
use crate::geo::DataPoint;
use crate::geometry::{box_geometry, plane_geometry, ring_geometry};
use crate::scene::{Axis, Material, Mesh, Node, NodeId, Scene, Shading, Sprite};
use glam::{DVec2, DVec3};
use std::f64::consts::FRAC_PI_2;
use tracing::warn;

/// Texture name used by the halo planes
pub const HALO_TEXTURE: &str = "huiguang";

/// Scene handles for one data point
#[derive(Debug, Clone, PartialEq)]
pub struct Pillar {
    pub group: NodeId,
    pub bar: NodeId,
    pub halos: Vec<NodeId>,
    pub ring: NodeId,
    pub marker: NodeId,
    pub point: DataPoint,
    pub height: f64,
}

impl GeoMap<'_> {
    /// One light pillar per usable data point, heights scaled to the series maximum
    pub(super) fn create_bars(
        &self,
        scene: &mut Scene,
        parent: NodeId,
        series: &[DataPoint],
    ) -> (Vec<Pillar>, Vec<Label>) {
        let max = series
            .iter()
            .map(|p| p.value)
            .filter(|v| v.is_finite())
            .fold(0.0_f64, f64::max);

        let mut pillars = Vec::new();
        let mut labels = Vec::new();
        for point in series {
            if !point.value.is_finite() || point.value <= 0.0 {
                warn!(name = %point.name, value = point.value, "skipping pillar without a positive value");
                continue;
            }
            let Some(position) = self.projection.to_plane(point.lon, point.lat) else {
                warn!(name = %point.name, "pillar position does not project");
                continue;
            };
            let height = self.pillar_style.max_height() * (point.value / max);
            let pillar = self.create_bar(scene, parent, point, position, height);

            labels.push(Label {
                text: format!("{} {}", point.name, point.value),
                node: pillar.marker,
            });
            pillars.push(pillar);
        }
        (pillars, labels)
    }

    fn create_bar(
        &self,
        scene: &mut Scene,
        parent: NodeId,
        point: &DataPoint,
        position: DVec2,
        height: f64,
    ) -> Pillar {
        let ps = self.pillar_style;
        let group = scene.add(
            parent,
            Node::group(PILLAR_GROUP).at(position.extend(self.style.deep)),
        );

        let mut geometry = box_geometry(ps.bar_width, ps.bar_width, height);
        geometry.translate(DVec3::new(0.0, 0.0, height / 2.0));
        let material = Material::basic(ps.bar_color)
            .with_opacity(ps.bar_opacity)
            .without_depth_test()
            .with_shading(Shading::Gradient {
                from: ps.gradient_from,
                to: ps.gradient_to,
                size: height,
                axis: Axis::Z,
            });
        let bar = scene.add(
            group,
            Node::mesh(LIGHT_PILLAR, Mesh::new(geometry, vec![material]))
                .at(DVec3::new(0.0, 0.0, ps.lift)),
        );
        let halos = self.create_halos(scene, bar, height);

        let ring = scene.add(
            group,
            Node::mesh(
                GLOW_RING,
                Mesh::new(
                    ring_geometry(ps.ring_radius * 0.5, ps.ring_radius, 32),
                    vec![Material::basic(ps.ring_color)
                        .with_opacity(0.8)
                        .additive()
                        .double_sided()
                        .without_depth_write()],
                ),
            )
            .at(DVec3::new(0.0, 0.0, ps.lift * 0.5)),
        );

        let marker = scene.add(
            group,
            Node::sprite(
                PILLAR_MARKER,
                Sprite {
                    material: Material::basic(ps.marker_color).without_depth_test(),
                    glyph: '◆',
                },
            )
            .at(DVec3::new(0.0, 0.0, ps.lift + height + 2.0))
            .with_scale(DVec3::splat(3.0)),
        );

        Pillar {
            group,
            bar,
            halos,
            ring,
            marker,
            point: point.clone(),
            height,
        }
    }

    /// Three crossed additive planes around the bar, 60° apart
    fn create_halos(&self, scene: &mut Scene, bar: NodeId, height: f64) -> Vec<NodeId> {
        let ps = self.pillar_style;
        let mut geometry = plane_geometry(ps.halo_width, height);
        geometry.translate(DVec3::new(0.0, height / 2.0, 0.0));
        let material = Material::basic(ps.halo_color)
            .with_opacity(ps.halo_opacity)
            .without_depth_write()
            .double_sided()
            .additive()
            .with_shading(Shading::Textured {
                texture: HALO_TEXTURE.to_string(),
                offset: DVec2::ZERO,
                repeat: DVec2::ONE,
            });

        let mut node = Node::mesh(PILLAR_HALO, Mesh::new(geometry, vec![material])).with_render_order(10);
        node.transform.rotate_x(FRAC_PI_2);
        let first = scene.add(bar, node);

        let mut halos = vec![first];
        for degrees in [60.0_f64, 120.0] {
            if let Some(copy) = scene.clone_subtree(first, bar) {
                if let Some(n) = scene.get_mut(copy) {
                    n.transform.rotate_y(degrees.to_radians());
                }
                halos.push(copy);
            }
        }
        halos
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{MapStyle, PillarStyle};
    use crate::geo::data::builtin_provinces;
    use crate::geo::{DataPoint, Projection};
    use crate::map::{GeoMap, PILLAR_HALO};
    use crate::scene::{NodeKind, Scene};
    use glam::DVec3;

    fn point(name: &str, value: f64) -> DataPoint {
        DataPoint {
            name: name.to_string(),
            lon: 110.109828,
            lat: 25.047893,
            value,
        }
    }

    fn build(series: &[DataPoint]) -> (Scene, crate::map::BuiltMap) {
        let style = MapStyle::default();
        let pillar_style = PillarStyle::default();
        let geo_map = GeoMap::new(&style, &pillar_style, Projection::mercator());
        let mut scene = Scene::new();
        let root = scene.root();
        let built = geo_map.create(&mut scene, root, &builtin_provinces(), series);
        (scene, built)
    }

    #[test]
    fn test_single_point_has_reference_height() {
        let (scene, built) = build(&[point("桂林", 5.0)]);
        assert_eq!(built.pillars.len(), 1);
        let pillar = &built.pillars[0];
        assert!((pillar.height - 17.5).abs() < 1e-9);

        // Bar foot sits just above the map top
        let world = scene.world_matrix(pillar.bar);
        let foot = world.transform_point3(DVec3::ZERO);
        assert!((foot.z - 8.3).abs() < 1e-9);

        let expected = Projection::mercator().to_plane(110.109828, 25.047893).unwrap();
        assert!((foot.x - expected.x).abs() < 1e-9);
        assert!((foot.y - expected.y).abs() < 1e-9);

        match &scene.get(pillar.bar).unwrap().kind {
            NodeKind::Mesh(mesh) => {
                let bounds = mesh.bounds();
                assert!((bounds.min.z).abs() < 1e-9);
                assert!((bounds.max.z - 17.5).abs() < 1e-9);
            }
            other => panic!("expected mesh, got {other:?}"),
        }
    }

    #[test]
    fn test_heights_scale_to_max() {
        let (_, built) = build(&[point("a", 10.0), point("b", 5.0)]);
        assert!((built.pillars[0].height - 17.5).abs() < 1e-9);
        assert!((built.pillars[1].height - 8.75).abs() < 1e-9);
        assert_eq!(built.labels[1].text, "b 5");
    }

    #[test]
    fn test_non_positive_values_skipped() {
        let (_, built) = build(&[point("zero", 0.0), point("nan", f64::NAN), point("ok", 1.0)]);
        assert_eq!(built.pillars.len(), 1);
        assert_eq!(built.pillars[0].point.name, "ok");
    }

    #[test]
    fn test_halos_stand_upright_and_fan_out() {
        let (scene, built) = build(&[point("桂林", 1.0)]);
        let pillar = &built.pillars[0];
        assert_eq!(pillar.halos.len(), 3);

        let mut normals = Vec::new();
        for &halo in &pillar.halos {
            let node = scene.get(halo).unwrap();
            assert_eq!(node.name, PILLAR_HALO);
            assert_eq!(node.render_order, 10);
            // Plane's +y (its height) now runs up the pillar
            let up = node.transform.rotation * DVec3::Y;
            assert!((up - DVec3::Z).length() < 1e-9);
            normals.push(node.transform.rotation * DVec3::Z);
        }
        let angle = normals[0].angle_between(normals[1]).to_degrees();
        assert!((angle - 60.0).abs() < 1e-6);
        let angle = normals[0].angle_between(normals[2]).to_degrees();
        assert!((angle - 120.0).abs() < 1e-6);
    }
}
