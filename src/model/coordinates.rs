//! Galactic coordinates.

use serde::Deserialize;

/// A position in light years relative to Sol.
///
/// Decodes from the journal's `StarPos` array, `[x, y, z]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(from = "[f64; 3]")]
pub struct Coordinates {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<[f64; 3]> for Coordinates {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self { x, y, z }
    }
}
