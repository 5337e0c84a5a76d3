// Terrain configuration.
//
// `TerrainScale` holds the two world-space constants that the binary
// terrain stream does NOT carry: the height quantum (`span_measure`) and the
// lateral cell size (`grid_size`). Exporter and importer must agree on both
// or imported heights and cell lookups are silently wrong, so callers should
// load them from the same JSON file rather than hard-coding them.
//
// `TerrainConfig` adds the grid shape for building a fresh geometry.
//
// See also: `geometry.rs` (`TerrainGeometry::from_config`), `stream.rs`
// which takes a `TerrainScale` on import.

use crate::error::{Result, TerrainError};
use serde::{Deserialize, Serialize};

/// World-space scale constants for one terrain.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TerrainScale {
    /// World height of one quantized boundary unit.
    pub span_measure: f32,
    /// World length of one grid cell edge (same along x and y).
    pub grid_size: f32,
}

impl Default for TerrainScale {
    fn default() -> Self {
        Self {
            span_measure: 1.0,
            grid_size: 50.0,
        }
    }
}

impl TerrainScale {
    pub fn new(span_measure: f32, grid_size: f32) -> Self {
        Self {
            span_measure,
            grid_size,
        }
    }

    /// Both constants must be finite and strictly positive.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("span_measure", self.span_measure),
            ("grid_size", self.grid_size),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(TerrainError::InvalidScale(format!(
                    "{name} must be finite and > 0, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Quantize a world height to boundary units: `round(h / span_measure)`
    /// clamped into `u16`.
    pub fn quantize(&self, height: f32) -> u16 {
        let units = (height / self.span_measure).round();
        // `as` saturates for floats; NaN maps to 0.
        units.clamp(0.0, f32::from(u16::MAX)) as u16
    }

    /// World height of a quantized boundary value.
    pub fn dequantize(&self, units: u16) -> f32 {
        f32::from(units) * self.span_measure
    }

    /// Grid index along one lateral axis for a world coordinate. May be
    /// negative or beyond the grid; bounds are the caller's business.
    pub fn grid_index(&self, coord: f32) -> i64 {
        (coord / self.grid_size).floor() as i64
    }
}

/// Shape and scale of a terrain, enough to construct an empty geometry.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TerrainConfig {
    /// Number of cells along x.
    pub length: u32,
    /// Number of cells along y.
    pub width: u32,
    /// Nominal vertical extent. Carried through the stream; no query reads it.
    pub height: u32,
    #[serde(default)]
    pub scale: TerrainScale,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            length: 64,
            width: 64,
            height: 64,
            scale: TerrainScale::default(),
        }
    }
}

impl TerrainConfig {
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scale_is_valid() {
        let scale = TerrainScale::default();
        assert_eq!(scale.span_measure, 1.0);
        assert_eq!(scale.grid_size, 50.0);
        assert!(scale.validate().is_ok());
    }

    #[test]
    fn rejects_degenerate_scale() {
        assert!(TerrainScale::new(0.0, 50.0).validate().is_err());
        assert!(TerrainScale::new(1.0, -2.0).validate().is_err());
        assert!(TerrainScale::new(f32::NAN, 1.0).validate().is_err());
        assert!(TerrainScale::new(1.0, f32::INFINITY).validate().is_err());
    }

    #[test]
    fn quantize_rounds_and_clamps() {
        let scale = TerrainScale::new(2.5, 50.0);
        assert_eq!(scale.quantize(100.0), 40);
        assert_eq!(scale.quantize(101.0), 40);
        assert_eq!(scale.quantize(102.0), 41);
        assert_eq!(scale.quantize(-10.0), 0);
        assert_eq!(scale.quantize(1.0e9), u16::MAX);
        assert_eq!(scale.dequantize(40), 100.0);
    }

    #[test]
    fn grid_index_floors_toward_negative_infinity() {
        let scale = TerrainScale::new(1.0, 50.0);
        assert_eq!(scale.grid_index(0.0), 0);
        assert_eq!(scale.grid_index(49.9), 0);
        assert_eq!(scale.grid_index(50.0), 1);
        assert_eq!(scale.grid_index(-0.1), -1);
    }

    #[test]
    fn config_roundtrips_through_json() {
        let config = TerrainConfig {
            length: 12,
            width: 7,
            height: 3,
            scale: TerrainScale::new(0.5, 25.0),
        };
        let json = config.to_json().unwrap();
        let restored = TerrainConfig::from_json(&json).unwrap();
        assert_eq!(config, restored);
    }

    #[test]
    fn config_scale_defaults_when_missing() {
        let config = TerrainConfig::from_json(r#"{"length": 4, "width": 5, "height": 6}"#).unwrap();
        assert_eq!(config.length, 4);
        assert_eq!(config.width, 5);
        assert_eq!(config.scale, TerrainScale::default());
    }
}
