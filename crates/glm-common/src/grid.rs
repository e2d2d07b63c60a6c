//! Grid variant selection shared between the aggregator and the renderer.

use serde::{Deserialize, Serialize};

/// Which fixed grid events are binned onto before rendering.
///
/// `Abi`: geostationary ABI fixed grid, ~2km cells in projected meters.
/// `Geodetic`: plain lat/lon grid, ~0.018° cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GridVariant {
    Abi,
    Geodetic,
}

impl GridVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            GridVariant::Abi => "abi",
            GridVariant::Geodetic => "geodetic",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "abi" => Some(GridVariant::Abi),
            "geodetic" => Some(GridVariant::Geodetic),
            _ => None,
        }
    }
}
