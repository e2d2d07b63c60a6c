//! Core domain types: [`Event`], [`Granule`], [`Quality`].

use crate::units::FemtoJoules;
use serde::{Deserialize, Serialize};

/// Tri-valued quality-OK flag.
///
/// GLM quality flags map `1 -> Ok`, `0 -> NotOk`, anything else (or
/// absent) -> `Unknown`. `qc_strict` filtering drops only `NotOk` events;
/// `Unknown` always passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quality {
    Ok,
    NotOk,
    Unknown,
}

impl Quality {
    pub fn from_flag(flag: Option<i32>) -> Self {
        match flag {
            Some(1) => Quality::Ok,
            Some(0) => Quality::NotOk,
            _ => Quality::Unknown,
        }
    }

    /// Whether this event survives strict QC filtering.
    pub fn passes_strict(self) -> bool {
        !matches!(self, Quality::NotOk)
    }
}

/// A single GLM lightning event record.
///
/// Invariants (enforced at ingest boundaries, never re-checked internally):
/// latitude in `[-90, 90]`, longitude in `[-180, 180]`, energy finite and
/// non-negative, `timestamp_ms <= now` at the moment of ingest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    pub lat: f64,
    pub lon: f64,
    pub energy: FemtoJoules,
    pub timestamp_ms: i64,
    pub quality: Quality,
}

impl Event {
    pub fn new(lat: f64, lon: f64, energy: FemtoJoules, timestamp_ms: i64, quality: Quality) -> Self {
        Self {
            lat,
            lon,
            energy,
            timestamp_ms,
            quality,
        }
    }

    /// Basic boundary validation: coordinates in range, energy finite and
    /// non-negative. Timestamp clamping to "now" happens at the store, not
    /// here, since it needs a clock.
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
            && self.energy.is_finite()
            && self.energy.value() >= 0.0
    }
}

/// Satellite identifier parsed from a granule filename (e.g. "G16", "G18").
pub type SatelliteId = String;

/// One GLM L2 LCFA NetCDF granule: a ~20-second observation interval.
#[derive(Debug, Clone)]
pub struct Granule {
    /// Source path or object key this granule was read from.
    pub source: String,
    pub satellite: SatelliteId,
    pub start_time_ms: i64,
    pub end_time_ms: i64,
    pub creation_time_ms: i64,
    pub events: Vec<Event>,
}

impl Granule {
    /// A granule's unique identity for poller dedup purposes is its source
    /// key.
    pub fn object_key(&self) -> &str {
        &self.source
    }
}

/// Wire representation of an event for `/ingest`.
///
/// Accepts either `energy_j` or `energy_fj` so callers can send whichever
/// unit they have on hand, plus an optional timestamp/quality flag.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventWire {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub energy_j: Option<f64>,
    #[serde(default)]
    pub energy_fj: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub quality_flag: Option<i32>,
}

impl EventWire {
    /// Resolve the energy field, preferring `energy_fj` when both are
    /// present (matches no documented precedence in the source; femtojoules
    /// is the more specific field name so it wins on ambiguity).
    pub fn energy(&self) -> Option<FemtoJoules> {
        if let Some(fj) = self.energy_fj {
            Some(FemtoJoules(fj))
        } else {
            self.energy_j.map(FemtoJoules::from_joules)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_from_flag() {
        assert_eq!(Quality::from_flag(Some(1)), Quality::Ok);
        assert_eq!(Quality::from_flag(Some(0)), Quality::NotOk);
        assert_eq!(Quality::from_flag(Some(7)), Quality::Unknown);
        assert_eq!(Quality::from_flag(None), Quality::Unknown);
    }

    #[test]
    fn strict_filter_drops_only_not_ok() {
        assert!(Quality::Ok.passes_strict());
        assert!(Quality::Unknown.passes_strict());
        assert!(!Quality::NotOk.passes_strict());
    }

    #[test]
    fn event_validity() {
        let good = Event::new(10.0, 20.0, FemtoJoules(5.0), 0, Quality::Unknown);
        assert!(good.is_valid());

        let bad_lat = Event::new(91.0, 20.0, FemtoJoules(5.0), 0, Quality::Unknown);
        assert!(!bad_lat.is_valid());

        let bad_energy = Event::new(10.0, 20.0, FemtoJoules(-1.0), 0, Quality::Unknown);
        assert!(!bad_energy.is_valid());
    }

    #[test]
    fn event_wire_prefers_fj() {
        let wire = EventWire {
            lat: 0.0,
            lon: 0.0,
            energy_j: Some(1e-12),
            energy_fj: Some(5.0),
            timestamp: None,
            quality_flag: None,
        };
        assert_eq!(wire.energy().unwrap().value(), 5.0);
    }

    #[test]
    fn event_wire_falls_back_to_joules() {
        let wire = EventWire {
            lat: 0.0,
            lon: 0.0,
            energy_j: Some(1e-12),
            energy_fj: None,
            timestamp: None,
            quality_flag: None,
        };
        assert!((wire.energy().unwrap().value() - 1000.0).abs() < 1e-9);
    }
}
