use crate::geo::ProjectionKind;
use crate::scene::Rgb;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

/// Colours and thickness of the extruded map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapStyle {
    pub plane_color: Rgb,
    pub side_color: Rgb,
    pub line_color: Rgb,
    pub active_plane_color: Rgb,
    pub active_side_color: Rgb,
    pub active_line_color: Rgb,
    /// Extrusion depth of every province
    pub deep: f64,
}

impl Default for MapStyle {
    fn default() -> Self {
        Self {
            plane_color: Rgb(0x2d9bd8),
            side_color: Rgb(0x094869),
            line_color: Rgb(0xbfe5f4),
            active_plane_color: Rgb(0x94c8e3),
            active_side_color: Rgb(0x094869),
            active_line_color: Rgb(0xbfe5f4),
            deep: 8.0,
        }
    }
}

/// Light pillar look
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PillarStyle {
    pub bar_color: Rgb,
    pub gradient_from: Rgb,
    pub gradient_to: Rgb,
    pub halo_color: Rgb,
    pub ring_color: Rgb,
    pub marker_color: Rgb,
    /// Height of the tallest pillar before `height_factor`
    pub base_height: f64,
    pub height_factor: f64,
    pub bar_width: f64,
    pub halo_width: f64,
    /// Gap between the map top and the pillar foot
    pub lift: f64,
    pub bar_opacity: f64,
    pub halo_opacity: f64,
    pub ring_radius: f64,
}

impl Default for PillarStyle {
    fn default() -> Self {
        Self {
            bar_color: Rgb(0x77fbf5),
            gradient_from: Rgb(0xfbdf88),
            gradient_to: Rgb(0xffffff),
            halo_color: Rgb(0xfffef4),
            ring_color: Rgb(0x77fbf5),
            marker_color: Rgb(0xfbdf88),
            base_height: 25.0,
            height_factor: 0.7,
            bar_width: 1.0,
            halo_width: 6.0,
            lift: 0.3,
            bar_opacity: 0.7,
            halo_opacity: 0.4,
            ring_radius: 2.0,
        }
    }
}

impl PillarStyle {
    /// Height of a pillar at the series maximum
    pub fn max_height(&self) -> f64 {
        self.base_height * self.height_factor
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub position: [f64; 3],
    pub target: [f64; 3],
    /// Vertical field of view in degrees
    pub fov: f64,
    pub near: f64,
    pub far: f64,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            position: [50.0, -100.0, 500.0],
            target: [0.0, 0.0, 0.0],
            fov: 45.0,
            near: 0.1,
            far: 5000.0,
        }
    }
}

/// Top-level settings, read from an optional JSON file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub style: MapStyle,
    pub pillars: PillarStyle,
    pub camera: CameraSettings,
    pub projection: ProjectionKind,
    /// Pick distance for boundary lines, in world units
    pub line_pick_threshold: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            style: MapStyle::default(),
            pillars: PillarStyle::default(),
            camera: CameraSettings::default(),
            projection: ProjectionKind::Mercator,
            line_pick_threshold: 1.0,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// Load `path` if given, falling back to defaults on any error
    pub fn load_or_default(path: Option<&Path>) -> Self {
        match path {
            Some(path) => Self::load(path).unwrap_or_else(|e| {
                warn!("Using default config: {e:#}");
                Self::default()
            }),
            None => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: Config = serde_json::from_str(
            r##"{ "style": { "plane_color": "#ff0000", "deep": 4 }, "projection": "equirectangular" }"##,
        )
        .unwrap();
        assert_eq!(config.style.plane_color, Rgb(0xff0000));
        assert_eq!(config.style.deep, 4.0);
        assert_eq!(config.style.side_color, Rgb(0x094869));
        assert_eq!(config.projection, ProjectionKind::Equirectangular);
        assert_eq!(config.pillars, PillarStyle::default());
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = Config::load_or_default(Some(Path::new("/nonexistent/geoworld.json")));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_reference_pillar_height() {
        assert!((PillarStyle::default().max_height() - 17.5).abs() < 1e-9);
    }
}
