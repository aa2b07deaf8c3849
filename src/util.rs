//! Geometry/mass conversions, the speed curve and colors.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Radius of a cell of the given mass: `sqrt(mass / pi)`.
/// Non-positive mass degrades to a unit radius rather than NaN.
#[inline]
pub fn mass_to_radius(mass: f32) -> f32 {
    if mass <= 0.0 {
        return 1.0;
    }
    (mass / std::f32::consts::PI).sqrt()
}

/// Mass of a cell of the given radius: `pi * radius^2`.
#[inline]
pub fn radius_to_mass(radius: f32) -> f32 {
    if radius <= 0.0 {
        return std::f32::consts::PI;
    }
    std::f32::consts::PI * radius * radius
}

/// Movement speed for a cell of the given size. Monotonically decreasing,
/// so larger cells crawl.
#[inline]
pub fn speed_for_size(size: f32, base_speed: f32, speed_factor: f32) -> f32 {
    base_speed / (1.0 + size / speed_factor)
}

/// Random point inside the world, keeping `padding` away from the edges.
pub fn random_position(width: f32, height: f32, padding: f32) -> Vec2 {
    let mut rng = rand::rng();
    Vec2::new(
        padding + rng.random::<f32>() * (width - padding * 2.0),
        padding + rng.random::<f32>() * (height - padding * 2.0),
    )
}

/// Generate a unique entity id with the given prefix, e.g. `cell_k3x9q0ab7f2m`.
pub fn unique_id(prefix: &str) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..12)
        .map(|_| {
            const CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
            CHARS[rng.random_range(0..CHARS.len())] as char
        })
        .collect();
    format!("{prefix}{suffix}")
}

/// An RGB color, serialized as a `#rrggbb` hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Random bright-ish color.
    pub fn random() -> Self {
        let mut rng = rand::rng();
        Self::new(
            rng.random_range(50..=255),
            rng.random_range(50..=255),
            rng.random_range(50..=255),
        )
    }

    /// Lighten (positive percent) or darken (negative percent) the color.
    pub fn shade(self, percent: i32) -> Self {
        let apply = |c: u8| -> u8 {
            let v = c as i32 * (100 + percent) / 100;
            v.clamp(0, 255) as u8
        };
        Self::new(apply(self.r), apply(self.g), apply(self.b))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        let s = s.strip_prefix('#')?;
        if s.len() != 6 {
            return None;
        }
        let r = u8::from_str_radix(&s[0..2], 16).ok()?;
        let g = u8::from_str_radix(&s[2..4], 16).ok()?;
        let b = u8::from_str_radix(&s[4..6], 16).ok()?;
        Some(Self::new(r, g, b))
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::new(128, 128, 128)
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.to_hex()
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Color::from_hex(&s).ok_or_else(|| format!("invalid color string: {s}"))
    }
}
