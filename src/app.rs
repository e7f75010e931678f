use geoworld::animation::Animator;
use geoworld::camera::{ndc_to_screen, OrbitControls, PerspectiveCamera};
use geoworld::config::Config;
use geoworld::geo::data::{province_values, MapData};
use geoworld::geo::Projection;
use geoworld::interaction::{Interaction, InteractionEvent, Pointer, Tooltip};
use geoworld::map::{BuiltMap, GeoMap, PROPERTIES_KEY};
use geoworld::render::{MapLayers, WireframeRenderer};
use geoworld::scene::{NodeId, Scene};
use glam::{DVec2, DVec3};
use tracing::info;

/// Radians per key press
const ROTATE_STEP: f64 = 0.08;
/// Radians per dragged cell
const DRAG_SPEED: f64 = 0.03;
const DOLLY_STEP: f64 = 1.15;

/// Application state
pub struct App {
    pub config: Config,
    pub scene: Scene,
    pub built: BuiltMap,
    pub camera: PerspectiveCamera,
    pub controls: OrbitControls,
    pub interaction: Interaction,
    pub animator: Animator,
    pub renderer: WireframeRenderer,
    /// Projection the map was built with, for coordinate readouts
    pub projection: Projection,
    pub show_pillars: bool,
    pub should_quit: bool,
    /// Last mouse position for drag tracking
    pub last_mouse: Option<(u16, u16)>,
    /// Current mouse position, terminal cells
    pub mouse_pos: Option<(u16, u16)>,
    /// Latest interaction, for the status bar
    pub last_event: Option<String>,
    dragged: bool,
    /// Map area inside the border, in characters
    map_width: usize,
    map_height: usize,
}

impl App {
    pub fn new(config: Config, data: &MapData, width: usize, height: usize) -> Self {
        let mut scene = Scene::new();
        let root = scene.root();
        let projection = Projection::new(config.projection);
        let built = GeoMap::new(&config.style, &config.pillars, projection).create(
            &mut scene,
            root,
            &data.provinces,
            &data.series,
        );
        let animator = Animator::for_pillars(&scene, &built.pillars);
        let interaction = Interaction::new(&config.style, config.line_pick_threshold)
            .with_values(province_values(&data.provinces, &data.series));
        let camera = PerspectiveCamera::new(&config.camera, 1.0);

        let mut app = Self {
            config,
            scene,
            built,
            camera,
            controls: OrbitControls::default(),
            interaction,
            animator,
            renderer: WireframeRenderer::default(),
            projection,
            show_pillars: true,
            should_quit: false,
            last_mouse: None,
            mouse_pos: None,
            last_event: None,
            dragged: false,
            map_width: 0,
            map_height: 0,
        };
        app.resize(width, height);
        app
    }

    /// Terminal size changed. Accounts for the border and status bar.
    pub fn resize(&mut self, width: usize, height: usize) {
        self.map_width = width.saturating_sub(2);
        self.map_height = height.saturating_sub(3);
        self.camera
            .set_aspect((self.map_width * 2) as f64, (self.map_height * 4) as f64);
    }

    pub fn map_size(&self) -> (usize, usize) {
        (self.map_width, self.map_height)
    }

    /// Back to the configured camera
    pub fn reset_view(&mut self) {
        let aspect = self.camera.aspect;
        self.camera = PerspectiveCamera::new(&self.config.camera, aspect);
        self.controls = OrbitControls::default();
    }

    pub fn rotate(&mut self, left: f64, up: f64) {
        self.controls.rotate_left(left * ROTATE_STEP);
        self.controls.rotate_up(up * ROTATE_STEP);
    }

    pub fn dolly_in(&mut self) {
        self.controls.dolly_in(DOLLY_STEP);
    }

    pub fn dolly_out(&mut self) {
        self.controls.dolly_out(DOLLY_STEP);
    }

    pub fn toggle_labels(&mut self) {
        self.renderer.toggle_labels();
    }

    /// Hidden pillars are neither drawn nor picked
    pub fn toggle_pillars(&mut self) {
        self.show_pillars = !self.show_pillars;
        for pillar in &self.built.pillars {
            self.scene.set_visible(pillar.group, self.show_pillars);
        }
    }

    pub fn toggle_animation(&mut self) {
        self.animator.toggle();
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    /// Track the cursor; outside the map the pointer is dropped
    pub fn set_mouse_pos(&mut self, col: u16, row: u16) {
        self.mouse_pos = Some((col, row));
        match self.mouse_pixel_pos() {
            Some((px, py)) => {
                let (w, h) = ((self.map_width * 2) as f64, (self.map_height * 4) as f64);
                // Centre of the cell's dot grid
                let pointer = Pointer::from_client(px as f64 + 1.0, py as f64 + 2.0, w, h);
                self.interaction.set_pointer(pointer);
            }
            None => self.interaction.clear_pointer(),
        }
    }

    /// Mouse position in braille dots inside the map, if it is over the map
    pub fn mouse_pixel_pos(&self) -> Option<(i32, i32)> {
        let (col, row) = self.mouse_pos?;
        // Border is one cell
        let (cx, cy) = (col.checked_sub(1)? as usize, row.checked_sub(1)? as usize);
        (cx < self.map_width && cy < self.map_height).then(|| (cx as i32 * 2, cy as i32 * 4))
    }

    pub fn begin_drag(&mut self, col: u16, row: u16) {
        self.last_mouse = Some((col, row));
        self.dragged = false;
    }

    /// Dragging orbits the camera
    pub fn handle_drag(&mut self, col: u16, row: u16) {
        if let Some((last_x, last_y)) = self.last_mouse {
            let dx = col as f64 - last_x as f64;
            let dy = row as f64 - last_y as f64;
            if dx != 0.0 || dy != 0.0 {
                self.controls.rotate_left(dx * DRAG_SPEED);
                self.controls.rotate_up(dy * DRAG_SPEED);
                self.dragged = true;
            }
        }
        self.last_mouse = Some((col, row));
        self.set_mouse_pos(col, row);
    }

    /// A press released without dragging is a click
    pub fn end_drag(&mut self) {
        if self.last_mouse.is_some() && !self.dragged {
            self.interaction.click();
        }
        self.last_mouse = None;
        self.dragged = false;
    }

    /// Advance one frame: camera, animations, then picking
    pub fn tick(&mut self, dt: f64) {
        self.controls.update(&mut self.camera);
        self.animator.tick(&mut self.scene, dt);

        let events = self
            .interaction
            .update(&mut self.scene, &self.camera, &self.built.provinces);
        for event in events {
            let text = match event {
                InteractionEvent::HoverChanged { to: Some(group), .. } => {
                    format!("hover {}", self.province_name(group))
                }
                InteractionEvent::HoverChanged { to: None, .. } => continue,
                InteractionEvent::Selected(group) => {
                    format!("selected {}", self.province_name(group))
                }
                InteractionEvent::Cleared => "selection cleared".to_string(),
            };
            info!(event = ?event, "{text}");
            self.last_event = Some(text);
        }
    }

    fn province_name(&self, group: NodeId) -> String {
        self.scene
            .get(group)
            .and_then(|n| n.user_data.get(PROPERTIES_KEY))
            .and_then(|p| p.get("name"))
            .and_then(|v| v.as_str())
            .unwrap_or("?")
            .to_string()
    }

    pub fn layers(&self, width: usize, height: usize) -> MapLayers {
        self.renderer
            .render(&self.scene, &self.camera, width, height, &self.built.labels)
    }

    pub fn tooltip(&self) -> Option<Tooltip> {
        self.interaction.tooltip(&self.scene)
    }

    /// Character cell of a world point inside a `width` x `height` map
    pub fn cell_of(&self, world: DVec3, width: u16, height: u16) -> Option<(u16, u16)> {
        let ndc = self.camera.project(world)?;
        let (w, h) = (width as f64 * 2.0, height as f64 * 4.0);
        let p = ndc_to_screen(DVec2::new(ndc.x, ndc.y), w, h);
        if p.x < 0.0 || p.y < 0.0 || p.x >= w || p.y >= h {
            return None;
        }
        Some(((p.x / 2.0) as u16, (p.y / 4.0) as u16))
    }

    /// (lon, lat) of the point under the cursor on the hovered province
    pub fn hover_lon_lat(&self) -> Option<(f64, f64)> {
        let point = self.interaction.hover_point()?;
        self.projection.from_plane(point.truncate())
    }

    pub fn camera_info(&self) -> String {
        format!("dist {:.0}", self.camera.distance())
    }
}
