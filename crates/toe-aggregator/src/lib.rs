//! Total Optical Energy aggregation: events -> a sparse cell-energy grid.
//!
//! Grounded on `glm_processor.py`'s `aggregate_toe_grid` /
//! `_aggregate_to_abi_grid` / `_aggregate_to_geodetic_grid`, reworked from
//! the dense `numpy` array the original builds (5000x5000 zeros up front)
//! into a sparse `HashMap` keyed by cell index — GLM events over a single
//! tile request's neighborhood occupy a tiny fraction of that envelope, and
//! a tile render only ever walks occupied cells anyway.

use std::collections::HashMap;

use glm_common::{Event, FemtoJoules, GridVariant};
use projection::AbiMetersGrid;

/// ABI grid cell size, meters. Geodetic cell size, degrees.
pub const ABI_CELL_SIZE_M: f64 = 2000.0;
pub const GEODETIC_CELL_SIZE_DEG: f64 = 0.018;

pub const MIN_WINDOW_MS: i64 = 60_000;
pub const DEFAULT_WINDOW_MS: i64 = 5 * 60_000;

/// A sparse cell-energy map plus enough information for the renderer to
/// place each occupied cell back on the globe.
#[derive(Debug, Clone)]
pub struct ToeGrid {
    pub variant: GridVariant,
    /// `(gx, gy) -> accumulated energy`.
    pub cells: HashMap<(i64, i64), FemtoJoules>,
    /// Sub-satellite longitude used to build this grid, only meaningful
    /// for [`GridVariant::Abi`].
    pub abi_lon0: f64,
}

impl ToeGrid {
    /// Sum of all cell energies — used to check the energy-preserving
    /// property against the sum over surviving input events.
    pub fn total_energy(&self) -> FemtoJoules {
        self.cells.values().fold(FemtoJoules::ZERO, |acc, v| acc + *v)
    }

    /// Cell center in WGS84 (lon, lat) degrees.
    pub fn cell_center(&self, gx: i64, gy: i64) -> Option<(f64, f64)> {
        match self.variant {
            GridVariant::Abi => {
                let grid = AbiMetersGrid::new(self.abi_lon0);
                let x = (gx as f64 + 0.5) * ABI_CELL_SIZE_M;
                let y = (gy as f64 + 0.5) * ABI_CELL_SIZE_M;
                grid.inverse(x, y)
            }
            GridVariant::Geodetic => {
                let lat = (gy as f64 + 0.5) * GEODETIC_CELL_SIZE_DEG - 90.0;
                let lon = (gx as f64 + 0.5) * GEODETIC_CELL_SIZE_DEG - 180.0;
                Some((lon, lat))
            }
        }
    }
}

/// Resolve the `[start_ms, end_ms]` window for a tile request.
///
/// `window_ms` is clamped to at least [`MIN_WINDOW_MS`]; `end_ms` defaults
/// to `now_ms` when `end_time_ms` is `None`.
pub fn window_bounds(window_ms: i64, end_time_ms: Option<i64>, now_ms: i64) -> (i64, i64) {
    let window_ms = window_ms.max(MIN_WINDOW_MS);
    let end_ms = end_time_ms.unwrap_or(now_ms);
    let start_ms = end_ms - window_ms;
    (start_ms, end_ms)
}

/// Aggregate already-windowed events onto a grid.
///
/// Events are expected to already satisfy the requested time window (the
/// caller typically gets them from `event_store::EventStore::window`);
/// this function only applies QC filtering and spatial binning.
pub fn aggregate(events: &[Event], qc_strict: bool, variant: GridVariant, abi_lon0: f64) -> ToeGrid {
    let mut cells: HashMap<(i64, i64), FemtoJoules> = HashMap::new();
    let abi_grid = matches!(variant, GridVariant::Abi).then(|| AbiMetersGrid::new(abi_lon0));

    for event in events {
        if qc_strict && !event.quality.passes_strict() {
            continue;
        }

        let cell = match variant {
            GridVariant::Abi => abi_grid.as_ref().and_then(|grid| {
                let (x, y) = grid.forward(event.lon, event.lat)?;
                if !x.is_finite() || !y.is_finite() {
                    return None;
                }
                Some((
                    (x / ABI_CELL_SIZE_M).floor() as i64,
                    (y / ABI_CELL_SIZE_M).floor() as i64,
                ))
            }),
            GridVariant::Geodetic => Some((
                ((event.lon + 180.0) / GEODETIC_CELL_SIZE_DEG).floor() as i64,
                ((event.lat + 90.0) / GEODETIC_CELL_SIZE_DEG).floor() as i64,
            )),
        };

        let Some(cell) = cell else { continue };
        *cells.entry(cell).or_insert(FemtoJoules::ZERO) += event.energy;
    }

    ToeGrid {
        variant,
        cells,
        abi_lon0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glm_common::Quality;

    fn event(lat: f64, lon: f64, fj: f64, quality: Quality) -> Event {
        Event::new(lat, lon, FemtoJoules(fj), 0, quality)
    }

    #[test]
    fn window_bounds_enforces_minimum_and_defaults_end_to_now() {
        let (start, end) = window_bounds(0, None, 100_000);
        assert_eq!(end, 100_000);
        assert_eq!(start, 100_000 - MIN_WINDOW_MS);
    }

    #[test]
    fn window_bounds_uses_explicit_end_time() {
        let (start, end) = window_bounds(5 * 60_000, Some(50_000), 100_000);
        assert_eq!(end, 50_000);
        assert_eq!(start, 50_000 - 5 * 60_000);
    }

    #[test]
    fn qc_strict_drops_only_not_ok() {
        let events = vec![
            event(0.0, -75.0, 10.0, Quality::Ok),
            event(0.0, -75.0, 20.0, Quality::NotOk),
            event(0.0, -75.0, 30.0, Quality::Unknown),
        ];
        let grid = aggregate(&events, true, GridVariant::Geodetic, -75.0);
        assert_eq!(grid.total_energy().value(), 40.0);
    }

    #[test]
    fn geodetic_binning_is_energy_preserving() {
        let events = vec![
            event(10.0, 20.0, 5.0, Quality::Unknown),
            event(10.001, 20.001, 7.0, Quality::Unknown),
            event(-40.0, 100.0, 3.0, Quality::Unknown),
        ];
        let grid = aggregate(&events, false, GridVariant::Geodetic, -75.0);
        let total: f64 = events.iter().map(|e| e.energy.value()).sum();
        assert!((grid.total_energy().value() - total).abs() < 1e-9);
    }

    #[test]
    fn abi_binning_drops_off_limb_events() {
        let events = vec![
            event(0.0, -75.0, 10.0, Quality::Unknown),
            event(0.0, 150.0, 10.0, Quality::Unknown),
        ];
        let grid = aggregate(&events, false, GridVariant::Abi, -75.0);
        assert_eq!(grid.total_energy().value(), 10.0);
    }

    #[test]
    fn abi_nadir_event_lands_in_cell_zero() {
        let events = vec![event(0.0, -75.0, 1.0, Quality::Unknown)];
        let grid = aggregate(&events, false, GridVariant::Abi, -75.0);
        assert!(grid.cells.contains_key(&(0, 0)));
    }

    #[test]
    fn cell_center_roundtrips_close_to_bin_location() {
        let events = vec![event(10.0, 20.0, 1.0, Quality::Unknown)];
        let grid = aggregate(&events, false, GridVariant::Geodetic, -75.0);
        let (&(gx, gy), _) = grid.cells.iter().next().unwrap();
        let (lon, lat) = grid.cell_center(gx, gy).unwrap();
        assert!((lon - 20.0).abs() < GEODETIC_CELL_SIZE_DEG);
        assert!((lat - 10.0).abs() < GEODETIC_CELL_SIZE_DEG);
    }
}
