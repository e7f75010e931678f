use glam::{DVec2, DVec3};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// 24-bit RGB colour, written as `0xRRGGBB`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rgb(pub u32);

impl Rgb {
    pub const WHITE: Rgb = Rgb(0xffffff);

    #[inline]
    pub fn r(self) -> u8 {
        (self.0 >> 16) as u8
    }

    #[inline]
    pub fn g(self) -> u8 {
        (self.0 >> 8) as u8
    }

    #[inline]
    pub fn b(self) -> u8 {
        self.0 as u8
    }

    pub fn from_components(r: u8, g: u8, b: u8) -> Self {
        Self(((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    /// Linear blend towards `other`, `t` clamped to [0, 1]
    pub fn lerp(self, other: Rgb, t: f64) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Rgb::from_components(
            mix(self.r(), other.r()),
            mix(self.g(), other.g()),
            mix(self.b(), other.b()),
        )
    }

    /// Parse `#rrggbb`, `0xrrggbb` or bare hex
    pub fn parse(s: &str) -> Option<Rgb> {
        let hex = s
            .trim()
            .trim_start_matches('#')
            .trim_start_matches("0x")
            .trim_start_matches("0X");
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u32::from_str_radix(hex, 16).ok().map(Rgb)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.0)
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(u32),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(n) if n <= 0xffffff => Ok(Rgb(n)),
            Repr::Number(n) => Err(de::Error::custom(format!("colour {n:#x} out of range"))),
            Repr::Text(s) => {
                Rgb::parse(&s).ok_or_else(|| de::Error::custom(format!("invalid colour {s:?}")))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Blending {
    #[default]
    Normal,
    Additive,
}

/// Which faces are considered front-facing when picking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Side {
    #[default]
    Front,
    Back,
    Double,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    fn component(self, v: DVec3) -> f64 {
        match self {
            Axis::X => v.x,
            Axis::Y => v.y,
            Axis::Z => v.z,
        }
    }
}

/// Bright bands across one repeat of a texture
const TEXTURE_BANDS: f64 = 4.0;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Shading {
    #[default]
    Flat,
    /// Vertical colour ramp from `from` at 0 to `to` at `size` along `axis`
    Gradient {
        from: Rgb,
        to: Rgb,
        size: f64,
        axis: Axis,
    },
    /// Named texture sampled with a scrolling offset
    Textured {
        texture: String,
        offset: DVec2,
        repeat: DVec2,
    },
}

impl Shading {
    /// Whether the surface shows at `v`, the [0, 1] position along the
    /// texture's vertical axis. Only textures have gaps.
    pub fn lit_at(&self, v: f64) -> bool {
        match self {
            Shading::Textured { offset, repeat, .. } => {
                ((v * repeat.y + offset.y) * TEXTURE_BANDS).rem_euclid(1.0) < 0.5
            }
            _ => true,
        }
    }
}

/// Blending, depth flags and transparency are carried as scene data for
/// consumers that composite; the wireframe renderer orders by
/// `render_order` and reads only colour, opacity and shading.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub color: Rgb,
    pub opacity: f64,
    pub transparent: bool,
    pub blending: Blending,
    pub side: Side,
    pub depth_test: bool,
    pub depth_write: bool,
    pub shading: Shading,
}

impl Material {
    pub fn basic(color: Rgb) -> Self {
        Self {
            color,
            opacity: 1.0,
            transparent: false,
            blending: Blending::Normal,
            side: Side::Front,
            depth_test: true,
            depth_write: true,
            shading: Shading::Flat,
        }
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self.transparent = true;
        self
    }

    pub fn additive(mut self) -> Self {
        self.blending = Blending::Additive;
        self
    }

    pub fn double_sided(mut self) -> Self {
        self.side = Side::Double;
        self
    }

    pub fn without_depth_test(mut self) -> Self {
        self.depth_test = false;
        self
    }

    pub fn without_depth_write(mut self) -> Self {
        self.depth_write = false;
        self
    }

    pub fn with_shading(mut self, shading: Shading) -> Self {
        self.shading = shading;
        self
    }

    /// Colour seen at a point in the object's local space
    pub fn color_at(&self, local: DVec3) -> Rgb {
        match &self.shading {
            Shading::Gradient { from, to, size, axis } if *size > 0.0 => {
                from.lerp(*to, axis.component(local) / size)
            }
            _ => self.color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texture_bands_follow_offset() {
        let mut shading = Shading::Textured {
            texture: "t".to_string(),
            offset: DVec2::ZERO,
            repeat: DVec2::ONE,
        };
        assert!(shading.lit_at(0.05));
        assert!(!shading.lit_at(0.2));
        if let Shading::Textured { offset, .. } = &mut shading {
            offset.y = 0.125;
        }
        assert!(!shading.lit_at(0.05));
        assert!(shading.lit_at(0.2));
        assert!(Shading::Flat.lit_at(0.2));
    }

    #[test]
    fn test_rgb_parse_and_display() {
        assert_eq!(Rgb::parse("#2d9bd8"), Some(Rgb(0x2d9bd8)));
        assert_eq!(Rgb::parse("0x094869"), Some(Rgb(0x094869)));
        assert_eq!(Rgb::parse("12345"), None);
        assert_eq!(Rgb::parse("+12345"), None);
        assert_eq!(Rgb::parse("#-12345"), None);
        assert_eq!(Rgb(0xbfe5f4).to_string(), "#bfe5f4");
    }

    #[test]
    fn test_rgb_deserialize_number_or_string() {
        let colors: Vec<Rgb> = serde_json::from_str(r##"[2989016, "#094869"]"##).unwrap();
        assert_eq!(colors, vec![Rgb(0x2d9bd8), Rgb(0x094869)]);
        assert!(serde_json::from_str::<Rgb>("16777216").is_err());
    }

    #[test]
    fn test_gradient_ramp() {
        let material = Material::basic(Rgb(0x77fbf5)).with_shading(Shading::Gradient {
            from: Rgb(0x000000),
            to: Rgb(0xffffff),
            size: 10.0,
            axis: Axis::Z,
        });
        assert_eq!(material.color_at(DVec3::ZERO), Rgb(0x000000));
        assert_eq!(material.color_at(DVec3::new(0.0, 0.0, 10.0)), Rgb::WHITE);
        assert_eq!(material.color_at(DVec3::new(0.0, 0.0, 5.0)), Rgb(0x808080));
        assert_eq!(Material::basic(Rgb(0x123456)).color_at(DVec3::ONE), Rgb(0x123456));
    }
}
