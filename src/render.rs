//! Terminal wireframe of the scene on braille canvases, one per colour.

use crate::braille::draw::{draw_disc, draw_segment};
use crate::braille::BrailleCanvas;
use crate::camera::{ndc_to_screen, PerspectiveCamera};
use crate::map::Label;
use crate::scene::{Material, Mesh, NodeId, NodeKind, Rgb, Scene, Shading};
use glam::{DMat4, DVec2, DVec3, DVec4};
use std::collections::HashMap;

/// Pieces a gradient edge is split into so the ramp stays visible
const GRADIENT_STEPS: usize = 4;
/// Pieces a textured edge is split into for its bands
const TEXTURE_STEPS: usize = 16;

pub struct Layer {
    pub color: Rgb,
    pub canvas: BrailleCanvas,
}

/// Text placed at a character cell
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenText {
    pub x: u16,
    pub y: u16,
    pub text: String,
    pub color: Rgb,
}

/// Output of one frame, back to front
#[derive(Default)]
pub struct MapLayers {
    pub layers: Vec<Layer>,
    /// Sprite glyphs
    pub glyphs: Vec<ScreenText>,
    pub labels: Vec<ScreenText>,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub show_labels: bool,
    /// Materials fainter than this are not drawn
    pub min_opacity: f64,
    pub label_color: Rgb,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            show_labels: true,
            min_opacity: 0.05,
            label_color: Rgb::WHITE,
        }
    }
}

#[derive(Default)]
pub struct WireframeRenderer {
    pub settings: RenderSettings,
}

struct Frame<'a> {
    camera: &'a PerspectiveCamera,
    view_projection: DMat4,
    width: usize,
    height: usize,
    layers: Vec<Layer>,
    index: HashMap<Rgb, usize>,
}

impl Frame<'_> {
    fn pixel_size(&self) -> DVec2 {
        DVec2::new(self.width as f64 * 2.0, self.height as f64 * 4.0)
    }

    fn canvas(&mut self, color: Rgb) -> &mut BrailleCanvas {
        let i = match self.index.get(&color) {
            Some(&i) => i,
            None => {
                self.layers.push(Layer {
                    color,
                    canvas: BrailleCanvas::new(self.width, self.height),
                });
                self.index.insert(color, self.layers.len() - 1);
                self.layers.len() - 1
            }
        };
        &mut self.layers[i].canvas
    }

    fn to_pixel(&self, clip: DVec4) -> DVec2 {
        let ndc = clip.truncate().truncate() / clip.w;
        let size = self.pixel_size();
        ndc_to_screen(ndc, size.x, size.y)
    }

    /// Segment in world space, cut at the near plane
    fn segment(&mut self, a: DVec3, b: DVec3, color: Rgb) {
        let near = self.camera.near;
        let mut c0 = self.view_projection * a.extend(1.0);
        let mut c1 = self.view_projection * b.extend(1.0);
        if c0.w < near && c1.w < near {
            return;
        }
        if c0.w < near {
            c0 = c0 + (c1 - c0) * ((near - c0.w) / (c1.w - c0.w));
        } else if c1.w < near {
            c1 = c1 + (c0 - c1) * ((near - c1.w) / (c0.w - c1.w));
        }
        let (p0, p1) = (self.to_pixel(c0), self.to_pixel(c1));
        draw_segment(self.canvas(color), p0, p1);
    }

    /// Dot position of a world point inside the view volume
    fn point(&self, world: DVec3) -> Option<DVec2> {
        let ndc = self.camera.project(world)?;
        if !(-1.0..=1.0).contains(&ndc.z) {
            return None;
        }
        let size = self.pixel_size();
        Some(ndc_to_screen(ndc.truncate(), size.x, size.y))
    }

    fn cell(&self, pixel: DVec2) -> Option<(u16, u16)> {
        if pixel.x < 0.0 || pixel.y < 0.0 {
            return None;
        }
        let (cx, cy) = ((pixel.x / 2.0) as usize, (pixel.y / 4.0) as usize);
        (cx < self.width && cy < self.height).then_some((cx as u16, cy as u16))
    }
}

impl WireframeRenderer {
    pub fn new(settings: RenderSettings) -> Self {
        Self { settings }
    }

    pub fn toggle_labels(&mut self) {
        self.settings.show_labels = !self.settings.show_labels;
    }

    /// Draw every visible node into a `width` x `height` character area
    pub fn render(
        &self,
        scene: &Scene,
        camera: &PerspectiveCamera,
        width: usize,
        height: usize,
        labels: &[Label],
    ) -> MapLayers {
        if width == 0 || height == 0 {
            return MapLayers::default();
        }

        let mut drawables = Vec::new();
        collect(scene, scene.root(), &DMat4::IDENTITY, &mut drawables);
        drawables.sort_by_key(|&(order, _, _)| order);

        let mut frame = Frame {
            camera,
            view_projection: camera.view_projection(),
            width,
            height,
            layers: Vec::new(),
            index: HashMap::new(),
        };
        let mut glyphs = Vec::new();

        for (_, id, world) in drawables {
            let Some(node) = scene.get(id) else {
                continue;
            };
            match &node.kind {
                NodeKind::Group => {}
                NodeKind::Mesh(mesh) => self.draw_mesh(&mut frame, mesh, &world),
                NodeKind::Line(line) => {
                    if line.material.opacity < self.settings.min_opacity {
                        continue;
                    }
                    for pair in line.points.windows(2) {
                        frame.segment(
                            world.transform_point3(pair[0]),
                            world.transform_point3(pair[1]),
                            line.material.color,
                        );
                    }
                }
                NodeKind::Sprite(sprite) => {
                    if sprite.material.opacity < self.settings.min_opacity {
                        continue;
                    }
                    let Some(pixel) = frame.point(world.transform_point3(DVec3::ZERO)) else {
                        continue;
                    };
                    draw_disc(
                        frame.canvas(sprite.material.color),
                        pixel.x.round() as i32,
                        pixel.y.round() as i32,
                        1,
                    );
                    if let Some((x, y)) = frame.cell(pixel) {
                        glyphs.push(ScreenText {
                            x,
                            y,
                            text: sprite.glyph.to_string(),
                            color: sprite.material.color,
                        });
                    }
                }
            }
        }

        let labels = if self.settings.show_labels {
            self.place_labels(&frame, scene, labels)
        } else {
            Vec::new()
        };

        MapLayers {
            layers: frame.layers,
            glyphs,
            labels,
        }
    }

    /// Feature edges; edges off the top face take the side material when
    /// there is one
    fn draw_mesh(&self, frame: &mut Frame, mesh: &Mesh, world: &DMat4) {
        let Some(cap) = mesh.materials.first() else {
            return;
        };
        let side = mesh.materials.get(1).unwrap_or(cap);
        let bounds = mesh.bounds();
        let top = bounds.max.z;
        // Texture v runs along local y
        let v_span = (bounds.min.y, bounds.max.y - bounds.min.y);

        for &(a, b) in mesh.edges() {
            let on_top = a.z >= top - 1e-9 && b.z >= top - 1e-9;
            let material = if on_top { cap } else { side };
            if material.opacity < self.settings.min_opacity {
                continue;
            }
            self.draw_edge(frame, material, (a, b), v_span, world);
        }
    }

    fn draw_edge(
        &self,
        frame: &mut Frame,
        material: &Material,
        (a, b): (DVec3, DVec3),
        (v_min, v_len): (f64, f64),
        world: &DMat4,
    ) {
        let steps = match material.shading {
            Shading::Gradient { .. } => GRADIENT_STEPS,
            Shading::Textured { .. } => TEXTURE_STEPS,
            Shading::Flat => 1,
        };
        for i in 0..steps {
            let t0 = i as f64 / steps as f64;
            let t1 = (i + 1) as f64 / steps as f64;
            let (p0, p1) = (a.lerp(b, t0), a.lerp(b, t1));
            let mid = (p0 + p1) * 0.5;
            let v = if v_len > 0.0 { (mid.y - v_min) / v_len } else { 0.0 };
            if !material.shading.lit_at(v) {
                continue;
            }
            let color = material.color_at(mid);
            frame.segment(world.transform_point3(p0), world.transform_point3(p1), color);
        }
    }

    /// Labels follow their node, one cell right of it
    fn place_labels(&self, frame: &Frame, scene: &Scene, labels: &[Label]) -> Vec<ScreenText> {
        labels
            .iter()
            .filter(|label| scene.is_visible(label.node))
            .filter_map(|label| {
                let world = scene.world_matrix(label.node).transform_point3(DVec3::ZERO);
                let (x, y) = frame.cell(frame.point(world)?)?;
                let x = x.checked_add(2)?;
                ((x as usize) < frame.width).then(|| ScreenText {
                    x,
                    y,
                    text: label.text.clone(),
                    color: self.settings.label_color,
                })
            })
            .collect()
    }
}

/// Visible nodes with their world matrices, in traversal order
fn collect(scene: &Scene, id: NodeId, parent: &DMat4, out: &mut Vec<(i32, NodeId, DMat4)>) {
    let Some(node) = scene.get(id) else {
        return;
    };
    if !node.visible {
        return;
    }
    let world = *parent * node.transform.matrix();
    out.push((node.render_order, id, world));
    for &child in node.children() {
        collect(scene, child, &world, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CameraSettings;
    use crate::geometry::{box_geometry, plane_geometry};
    use crate::scene::{Line, Node, Sprite};

    const W: usize = 40;
    const H: usize = 20;

    fn camera() -> PerspectiveCamera {
        let settings = CameraSettings {
            position: [0.0, 0.0, 100.0],
            ..CameraSettings::default()
        };
        PerspectiveCamera::new(&settings, (W * 2) as f64 / (H * 4) as f64)
    }

    fn line(a: DVec3, b: DVec3, color: u32) -> Node {
        Node::line(
            "l",
            Line {
                points: vec![a, b],
                material: Material::basic(Rgb(color)),
            },
        )
    }

    fn layer(out: &MapLayers, color: u32) -> Option<&Layer> {
        out.layers.iter().find(|l| l.color == Rgb(color))
    }

    #[test]
    fn test_line_lands_on_its_layer() {
        let mut scene = Scene::new();
        let root = scene.root();
        scene.add(root, line(DVec3::new(-10.0, 0.0, 0.0), DVec3::new(10.0, 0.0, 0.0), 0xbfe5f4));

        let out = WireframeRenderer::default().render(&scene, &camera(), W, H, &[]);
        assert_eq!(out.layers.len(), 1);
        let canvas = &layer(&out, 0xbfe5f4).unwrap().canvas;
        assert!(!canvas.is_blank());
        assert!(canvas.cell(W / 2, H / 2).is_some() || canvas.cell(W / 2, H / 2 - 1).is_some());
    }

    #[test]
    fn test_behind_camera_is_clipped() {
        let mut scene = Scene::new();
        let root = scene.root();
        scene.add(root, line(DVec3::new(0.0, 0.0, 200.0), DVec3::new(5.0, 0.0, 300.0), 0xff0000));
        // Crosses the near plane
        scene.add(root, line(DVec3::new(-10.0, 0.0, 0.0), DVec3::new(-10.0, 0.0, 200.0), 0x00ff00));

        let out = WireframeRenderer::default().render(&scene, &camera(), W, H, &[]);
        assert!(layer(&out, 0xff0000).is_none());
        assert!(!layer(&out, 0x00ff00).unwrap().canvas.is_blank());
    }

    #[test]
    fn test_hidden_and_faint_nodes_skipped() {
        let mut scene = Scene::new();
        let root = scene.root();
        let hidden = scene.add(root, line(DVec3::new(-10.0, 0.0, 0.0), DVec3::X * 10.0, 0xff0000));
        scene.set_visible(hidden, false);
        let mut faint = line(DVec3::new(-10.0, 5.0, 0.0), DVec3::new(10.0, 5.0, 0.0), 0x00ff00);
        if let NodeKind::Line(l) = &mut faint.kind {
            l.material.opacity = 0.0;
        }
        scene.add(root, faint);

        let out = WireframeRenderer::default().render(&scene, &camera(), W, H, &[]);
        assert!(out.layers.is_empty());
    }

    #[test]
    fn test_render_order_sorts_layers() {
        let mut scene = Scene::new();
        let root = scene.root();
        scene.add(
            root,
            line(DVec3::new(-10.0, 0.0, 0.0), DVec3::X * 10.0, 0xff0000).with_render_order(10),
        );
        scene.add(root, line(DVec3::new(-10.0, 3.0, 0.0), DVec3::new(10.0, 3.0, 0.0), 0x00ff00));

        let out = WireframeRenderer::default().render(&scene, &camera(), W, H, &[]);
        let colors: Vec<Rgb> = out.layers.iter().map(|l| l.color).collect();
        assert_eq!(colors, vec![Rgb(0x00ff00), Rgb(0xff0000)]);
    }

    #[test]
    fn test_mesh_sides_use_second_material() {
        let mut scene = Scene::new();
        let root = scene.root();
        let mesh = Mesh::new(
            box_geometry(20.0, 20.0, 10.0),
            vec![Material::basic(Rgb(0x2d9bd8)), Material::basic(Rgb(0x094869))],
        );
        scene.add(root, Node::mesh("m", mesh));

        let mut cam = camera();
        cam.position = DVec3::new(0.0, -60.0, 60.0);
        let out = WireframeRenderer::default().render(&scene, &cam, W, H, &[]);
        assert!(!layer(&out, 0x2d9bd8).unwrap().canvas.is_blank());
        assert!(!layer(&out, 0x094869).unwrap().canvas.is_blank());
    }

    fn dots(canvas: &BrailleCanvas) -> Vec<String> {
        canvas.rows().collect()
    }

    #[test]
    fn test_texture_offset_moves_bands() {
        let mut scene = Scene::new();
        let root = scene.root();
        let halo = Material::basic(Rgb(0xfbdf88)).with_shading(Shading::Textured {
            texture: "halo".to_string(),
            offset: DVec2::ZERO,
            repeat: DVec2::ONE,
        });
        let mesh = Mesh::new(plane_geometry(10.0, 30.0), vec![halo]);
        let plane = scene.add(root, Node::mesh("halo", mesh));

        let renderer = WireframeRenderer::default();
        let before = renderer.render(&scene, &camera(), W, H, &[]);
        let before = dots(&layer(&before, 0xfbdf88).unwrap().canvas);

        // Half a band
        if let Some(mesh) = scene.mesh_mut(plane) {
            if let Shading::Textured { offset, .. } = &mut mesh.materials[0].shading {
                offset.y = 0.125;
            }
        }
        let after = renderer.render(&scene, &camera(), W, H, &[]);
        let after = dots(&layer(&after, 0xfbdf88).unwrap().canvas);

        assert_ne!(before, after);
    }

    #[test]
    fn test_sprite_glyph_and_labels() {
        let mut scene = Scene::new();
        let root = scene.root();
        let marker = scene.add(
            root,
            Node::sprite(
                "marker",
                Sprite {
                    material: Material::basic(Rgb(0xfbdf88)),
                    glyph: '◆',
                },
            ),
        );
        let labels = vec![Label {
            text: "北京 2189".to_string(),
            node: marker,
        }];

        let mut renderer = WireframeRenderer::default();
        let out = renderer.render(&scene, &camera(), W, H, &labels);
        assert_eq!(out.glyphs.len(), 1);
        assert_eq!(out.glyphs[0].text, "◆");
        assert_eq!(out.labels.len(), 1);
        assert_eq!(out.labels[0].x, out.glyphs[0].x + 2);

        renderer.toggle_labels();
        assert!(renderer.render(&scene, &camera(), W, H, &labels).labels.is_empty());
    }

    #[test]
    fn test_zero_area() {
        let scene = Scene::new();
        let out = WireframeRenderer::default().render(&scene, &camera(), 0, 10, &[]);
        assert!(out.layers.is_empty() && out.labels.is_empty());
    }
}
