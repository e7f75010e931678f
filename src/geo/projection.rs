use glam::DVec2;
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, TAU};

/// Map centre used for the China dataset
pub const DEFAULT_CENTER: (f64, f64) = (104.0, 37.5);

/// d3's default projection scale
pub const DEFAULT_SCALE: f64 = 961.0 / TAU;

/// Mercator refuses latitudes this close to the poles
const MAX_MERCATOR_LAT: f64 = 89.999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProjectionKind {
    #[default]
    Mercator,
    Equirectangular,
}

/// Planar projection in d3 conventions: the centre lands on `translate`
/// and screen y grows southwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub kind: ProjectionKind,
    /// Centre (lon, lat) in degrees
    pub center: (f64, f64),
    pub scale: f64,
    pub translate: (f64, f64),
}

impl Projection {
    pub fn new(kind: ProjectionKind) -> Self {
        Self {
            kind,
            center: DEFAULT_CENTER,
            scale: DEFAULT_SCALE,
            translate: (0.0, 0.0),
        }
    }

    pub fn mercator() -> Self {
        Self::new(ProjectionKind::Mercator)
    }

    pub fn equirectangular() -> Self {
        Self::new(ProjectionKind::Equirectangular)
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_translate(mut self, x: f64, y: f64) -> Self {
        self.translate = (x, y);
        self
    }

    /// Forward raw projection of latitude (radians)
    #[inline]
    fn raw_y(&self, phi: f64) -> f64 {
        match self.kind {
            ProjectionKind::Mercator => (FRAC_PI_4 + phi / 2.0).tan().ln(),
            ProjectionKind::Equirectangular => phi,
        }
    }

    #[inline]
    fn inverse_raw_y(&self, y: f64) -> f64 {
        match self.kind {
            ProjectionKind::Mercator => 2.0 * y.exp().atan() - FRAC_PI_2,
            ProjectionKind::Equirectangular => y,
        }
    }

    /// Project (lon, lat) degrees to screen-style coordinates.
    /// Returns `None` for non-finite input or results.
    pub fn project(&self, lon: f64, lat: f64) -> Option<DVec2> {
        if !lon.is_finite() || !lat.is_finite() {
            return None;
        }
        if self.kind == ProjectionKind::Mercator && lat.abs() > MAX_MERCATOR_LAT {
            return None;
        }

        let lambda = (lon - self.center.0).to_radians();
        let y = self.raw_y(lat.to_radians()) - self.raw_y(self.center.1.to_radians());

        let p = DVec2::new(
            self.translate.0 + self.scale * lambda,
            self.translate.1 - self.scale * y,
        );
        p.is_finite().then_some(p)
    }

    /// Inverse of [`Projection::project`]
    pub fn unproject(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        if self.scale == 0.0 {
            return None;
        }
        let lambda = (x - self.translate.0) / self.scale;
        let raw = self.raw_y(self.center.1.to_radians()) - (y - self.translate.1) / self.scale;

        let lon = self.center.0 + lambda.to_degrees();
        let lat = self.inverse_raw_y(raw).to_degrees();
        (lon.is_finite() && lat.is_finite()).then_some((lon, lat))
    }

    /// Map-plane coordinates (y pointing north) used by the scene
    pub fn to_plane(&self, lon: f64, lat: f64) -> Option<DVec2> {
        self.project(lon, lat).map(|p| DVec2::new(p.x, -p.y))
    }

    /// Inverse of [`Projection::to_plane`]
    pub fn from_plane(&self, p: DVec2) -> Option<(f64, f64)> {
        self.unproject(p.x, -p.y)
    }
}

impl Default for Projection {
    fn default() -> Self {
        Self::mercator()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_maps_to_translate() {
        let proj = Projection::mercator().with_translate(5.0, -3.0);
        let p = proj.project(104.0, 37.5).unwrap();
        assert!((p.x - 5.0).abs() < 1e-9);
        assert!((p.y + 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_north_is_up_on_plane() {
        let proj = Projection::mercator();
        let beijing = proj.to_plane(116.4, 39.9).unwrap();
        let guangzhou = proj.to_plane(113.3, 23.1).unwrap();
        assert!(beijing.y > guangzhou.y);
        assert!(beijing.x > 0.0);
        // Screen y is the mirror of plane y
        assert!(proj.project(116.4, 39.9).unwrap().y < 0.0);
    }

    #[test]
    fn test_unproject_inverts() {
        for proj in [Projection::mercator(), Projection::equirectangular().with_scale(10.0)] {
            let p = proj.project(87.6, 43.8).unwrap();
            let (lon, lat) = proj.unproject(p.x, p.y).unwrap();
            assert!((lon - 87.6).abs() < 1e-9);
            assert!((lat - 43.8).abs() < 1e-9);
        }
    }

    #[test]
    fn test_rejects_bad_input() {
        let proj = Projection::mercator();
        assert!(proj.project(f64::NAN, 30.0).is_none());
        assert!(proj.project(100.0, 90.0).is_none());
        assert!(Projection::equirectangular().project(100.0, 90.0).is_some());
    }

    #[test]
    fn test_equirectangular_is_linear() {
        let proj = Projection::equirectangular().with_scale(1.0);
        let p = proj.project(105.0, 38.5).unwrap();
        assert!((p.x - 1f64.to_radians()).abs() < 1e-12);
        assert!((p.y + 1f64.to_radians()).abs() < 1e-12);
    }
}
