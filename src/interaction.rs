//! Per-frame hover / click picking on province meshes.

use crate::camera::PerspectiveCamera;
use crate::config::MapStyle;
use crate::map::{PROPERTIES_KEY, PROVINCE_LINE, PROVINCE_MESH};
use crate::picking::Raycaster;
use crate::scene::{NodeId, NodeKind, Scene};
use glam::{DVec2, DVec3};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;

/// Pointer position in normalized device coordinates.
/// The exact origin means no pointer has been seen yet.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pointer {
    pub ndc: DVec2,
}

impl Pointer {
    /// From pixel coordinates inside a `width` × `height` surface
    pub fn from_client(x: f64, y: f64, width: f64, height: f64) -> Self {
        if width <= 0.0 || height <= 0.0 {
            return Self::default();
        }
        Self {
            ndc: DVec2::new(x / width * 2.0 - 1.0, -(y / height) * 2.0 + 1.0),
        }
    }

    pub fn is_unset(&self) -> bool {
        self.ndc == DVec2::ZERO
    }
}

/// Text box anchored at a world position
#[derive(Debug, Clone, PartialEq)]
pub struct Tooltip {
    pub title: String,
    pub lines: Vec<String>,
    pub anchor: DVec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InteractionEvent {
    HoverChanged {
        from: Option<NodeId>,
        to: Option<NodeId>,
    },
    Selected(NodeId),
    Cleared,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Hover {
    group: NodeId,
    point: DVec3,
}

pub struct Interaction {
    raycaster: Raycaster,
    style: MapStyle,
    pointer: Pointer,
    pending_click: bool,
    hovered: Option<Hover>,
    selected: Option<(NodeId, Tooltip)>,
    values: HashMap<String, f64>,
}

impl Interaction {
    pub fn new(style: &MapStyle, line_threshold: f64) -> Self {
        Self {
            raycaster: Raycaster::new(line_threshold),
            style: style.clone(),
            pointer: Pointer::default(),
            pending_click: false,
            hovered: None,
            selected: None,
            values: HashMap::new(),
        }
    }

    /// Values shown in tooltips, keyed by province name
    pub fn with_values(mut self, values: impl IntoIterator<Item = (String, f64)>) -> Self {
        self.values.extend(values);
        self
    }

    pub fn set_pointer(&mut self, pointer: Pointer) {
        self.pointer = pointer;
    }

    pub fn pointer(&self) -> Pointer {
        self.pointer
    }

    /// Forget the pointer (it left the map)
    pub fn clear_pointer(&mut self) {
        self.pointer = Pointer::default();
    }

    /// Queue a click, handled on the next [`Interaction::update`]
    pub fn click(&mut self) {
        self.pending_click = true;
    }

    pub fn hovered(&self) -> Option<NodeId> {
        self.hovered.map(|h| h.group)
    }

    /// World point under the pointer on the hovered province
    pub fn hover_point(&self) -> Option<DVec3> {
        self.hovered.map(|h| h.point)
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.selected.as_ref().map(|(group, _)| *group)
    }

    /// Pinned tooltip of the selection, else a transient one for the hover
    pub fn tooltip(&self, scene: &Scene) -> Option<Tooltip> {
        if let Some((_, tooltip)) = &self.selected {
            return Some(tooltip.clone());
        }
        let hover = self.hovered?;
        Some(self.tooltip_for(scene, hover.group, hover.point))
    }

    /// Run one picking pass over `roots`
    pub fn update(
        &mut self,
        scene: &mut Scene,
        camera: &PerspectiveCamera,
        roots: &[NodeId],
    ) -> Vec<InteractionEvent> {
        let mut events = Vec::new();
        let target = if self.pointer.is_unset() {
            None
        } else {
            self.pick(scene, camera, roots)
        };

        let previous = self.hovered.map(|h| h.group);
        let next = target.map(|h| h.group);
        if previous != next {
            if let Some(old) = previous {
                if self.selected() != Some(old) {
                    self.apply_colors(scene, old, false);
                }
            }
            if let Some(new) = next {
                self.apply_colors(scene, new, true);
            }
            debug!(?previous, ?next, "hover changed");
            events.push(InteractionEvent::HoverChanged { from: previous, to: next });
        }
        self.hovered = target;

        if std::mem::take(&mut self.pending_click) {
            if let Some(event) = self.handle_click(scene) {
                events.push(event);
            }
        }
        events
    }

    fn pick(&mut self, scene: &Scene, camera: &PerspectiveCamera, roots: &[NodeId]) -> Option<Hover> {
        self.raycaster.set_from_camera(self.pointer.ndc, camera);
        let hits = self.raycaster.intersect_objects(scene, roots, true);
        let hit = hits
            .iter()
            .find(|hit| scene.get(hit.node).is_some_and(|n| n.name == PROVINCE_MESH))?;
        let group = scene.parent(hit.node)?;
        Some(Hover {
            group,
            point: hit.point,
        })
    }

    fn handle_click(&mut self, scene: &mut Scene) -> Option<InteractionEvent> {
        let previous = self.selected.take().map(|(group, _)| group);
        let hovered = self.hovered;

        if let Some(old) = previous {
            if hovered.map(|h| h.group) != Some(old) {
                self.apply_colors(scene, old, false);
            }
        }

        match hovered {
            Some(hover) if previous == Some(hover.group) => Some(InteractionEvent::Cleared),
            Some(hover) => {
                let tooltip = self.tooltip_for(scene, hover.group, hover.point);
                self.selected = Some((hover.group, tooltip));
                Some(InteractionEvent::Selected(hover.group))
            }
            None => previous.map(|_| InteractionEvent::Cleared),
        }
    }

    /// Swap the group's mesh and line colours between base and active
    fn apply_colors(&self, scene: &mut Scene, group: NodeId, active: bool) {
        let style = &self.style;
        let (plane, side, line) = if active {
            (style.active_plane_color, style.active_side_color, style.active_line_color)
        } else {
            (style.plane_color, style.side_color, style.line_color)
        };

        let children = scene.children(group).to_vec();
        for child in children {
            let Some(node) = scene.get_mut(child) else {
                continue;
            };
            match (&mut node.kind, node.name.as_str()) {
                (NodeKind::Mesh(mesh), PROVINCE_MESH) => {
                    if let Some(m) = mesh.materials.get_mut(0) {
                        m.color = plane;
                    }
                    if let Some(m) = mesh.materials.get_mut(1) {
                        m.color = side;
                    }
                }
                (NodeKind::Line(l), PROVINCE_LINE) => l.material.color = line,
                _ => {}
            }
        }
    }

    fn tooltip_for(&self, scene: &Scene, group: NodeId, anchor: DVec3) -> Tooltip {
        let empty = Map::new();
        let properties = scene
            .get(group)
            .and_then(|n| n.user_data.get(PROPERTIES_KEY))
            .and_then(Value::as_object)
            .unwrap_or(&empty);

        let title = properties
            .get("name")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or("未知区域")
            .to_string();

        let mut lines = Vec::new();
        if let Some(adcode) = properties.get("adcode").and_then(Value::as_i64) {
            lines.push(format!("adcode: {adcode}"));
        }
        if let Some(value) = self.values.get(&title) {
            lines.push(format!("value: {value}"));
        }
        Tooltip {
            title,
            lines,
            anchor,
        }
    }
}
