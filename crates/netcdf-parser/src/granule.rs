//! GLM L2 LCFA granule reading: NetCDF bytes -> [`Granule`].
//!
//! Grounded on `_extract_events_from_dataset` and `_parse_time_variables`:
//! variable names vary slightly across GLM product versions, so every
//! lookup tries a short alias list before giving up. A file that opens but
//! is missing `lat`/`lon`/`energy` yields zero events and a warning, not an
//! error; a file that fails to open at all is a hard error that the caller
//! (the poller) drops that single granule for.

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Once;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use glm_common::{Event, FemtoJoules, Granule, Quality};
use tracing::warn;

use crate::error::{NetCdfError, NetCdfResult};
use crate::filename::parse_granule_filename;

const LAT_ALIASES: &[&str] = &["event_lat", "event_latitude", "lat"];
const LON_ALIASES: &[&str] = &["event_lon", "event_longitude", "lon"];
const ENERGY_ALIASES: &[&str] = &["event_energy", "event_energy_j", "energy"];
const QC_ALIASES: &[&str] = &["event_quality_flag", "event_quality", "event_data_quality"];

/// Silence HDF5's automatic error printing to stderr; granule reads happen
/// per-request and per-poll-tick, so a noisy library would spam stderr on
/// every malformed file.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 is thread-safe; passing null handlers is the
        // documented way to disable HDF5's stderr diagnostics.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

/// Read a GLM L2 LCFA granule from raw NetCDF bytes.
///
/// `source` is the object key or path the bytes came from; it's used for
/// filename-derived metadata and shows up in log messages and the returned
/// [`Granule::source`].
pub fn read_granule_from_bytes(data: &[u8], source: &str) -> NetCdfResult<Granule> {
    silence_hdf5_errors();

    let filename_meta = parse_granule_filename(source);

    let temp_dir = get_optimal_temp_dir();
    let temp_file = temp_dir.join(generate_temp_filename());
    let mut file = std::fs::File::create(&temp_file)?;
    file.write_all(data)?;
    drop(file);

    let open_result = netcdf::open(&temp_file)
        .map_err(|e| NetCdfError::InvalidFormat(format!("failed to open NetCDF: {e}")));
    let _ = std::fs::remove_file(&temp_file);
    let nc_file = open_result?;

    let events = extract_events(&nc_file, source, &filename_meta);

    Ok(Granule {
        source: source.to_string(),
        satellite: filename_meta.satellite,
        start_time_ms: filename_meta.start_time.timestamp_millis(),
        end_time_ms: filename_meta.end_time.timestamp_millis(),
        creation_time_ms: filename_meta.creation_time.timestamp_millis(),
        events,
    })
}

fn extract_events(
    nc_file: &netcdf::File,
    source: &str,
    filename_meta: &crate::filename::FilenameMeta,
) -> Vec<Event> {
    let Some(lat_var) = find_variable(nc_file, LAT_ALIASES) else {
        warn!(source, "GLM granule missing latitude variable, skipping");
        return Vec::new();
    };
    let Some(lon_var) = find_variable(nc_file, LON_ALIASES) else {
        warn!(source, "GLM granule missing longitude variable, skipping");
        return Vec::new();
    };
    let Some(energy_var) = find_variable(nc_file, ENERGY_ALIASES) else {
        warn!(source, "GLM granule missing energy variable, skipping");
        return Vec::new();
    };
    let qc_var = find_variable(nc_file, QC_ALIASES);

    let lats: Vec<f64> = match lat_var.get_values(..) {
        Ok(v) => v,
        Err(e) => {
            warn!(source, error = %e, "failed to read latitude values");
            return Vec::new();
        }
    };
    let lons: Vec<f64> = match lon_var.get_values(..) {
        Ok(v) => v,
        Err(e) => {
            warn!(source, error = %e, "failed to read longitude values");
            return Vec::new();
        }
    };
    let energies: Vec<f64> = match energy_var.get_values(..) {
        Ok(v) => v,
        Err(e) => {
            warn!(source, error = %e, "failed to read energy values");
            return Vec::new();
        }
    };
    let qc_flags: Option<Vec<i32>> = qc_var.and_then(|v| v.get_values(..).ok());

    let time_info = parse_time_variables(nc_file, filename_meta);

    let n = lats.len().min(lons.len()).min(energies.len());
    let mut events = Vec::with_capacity(n);
    for i in 0..n {
        let lat = lats[i];
        let lon = lons[i];
        let energy_j = energies[i];

        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            continue;
        }
        if !energy_j.is_finite() || energy_j < 0.0 {
            continue;
        }

        let timestamp_ms = time_info.resolve(i).unwrap_or(filename_meta.start_time.timestamp_millis());

        let quality = Quality::from_flag(qc_flags.as_ref().and_then(|q| q.get(i).copied()));

        events.push(Event::new(
            lat,
            lon,
            FemtoJoules::from_joules(energy_j),
            timestamp_ms,
            quality,
        ));
    }
    events
}

/// Per-event timestamp source: either a base time plus a per-event offset
/// array, or a single fallback applied to every event in the granule.
enum TimeInfo {
    BaseAndOffsets { base_ms: i64, offsets: Vec<f64> },
    Fallback(i64),
}

impl TimeInfo {
    fn resolve(&self, i: usize) -> Option<i64> {
        match self {
            TimeInfo::BaseAndOffsets { base_ms, offsets } => {
                offsets.get(i).map(|off| base_ms + *off as i64)
            }
            TimeInfo::Fallback(ms) => Some(*ms),
        }
    }
}

/// Mirrors `_parse_time_variables`: prefer `event_time` with a CF `units`
/// attribute of the form `"<unit>s since <reference>"`, then
/// `event_time_offset` relative to the granule's `time_coverage_start`
/// global attribute, then the filename-derived start time.
fn parse_time_variables(nc_file: &netcdf::File, filename_meta: &crate::filename::FilenameMeta) -> TimeInfo {
    if let Some(var) = nc_file.variable("event_time") {
        let units = get_string_attr(&var, "units").unwrap_or_default().to_lowercase();
        if let Some(since_idx) = units.find("since") {
            let ref_str = units[since_idx + "since".len()..].trim();
            if let Some(base_ms) = parse_cf_reference_time(ref_str) {
                let scale = cf_unit_scale_ms(&units);
                if let Ok(raw) = var.get_values::<f64, _>(..) {
                    let offsets = raw.into_iter().map(|v| v * scale).collect();
                    return TimeInfo::BaseAndOffsets { base_ms, offsets };
                }
            }
        }
    } else if let Some(var) = nc_file.variable("event_time_offset") {
        let base_str = get_string_attr_file(nc_file, "time_coverage_start")
            .or_else(|| get_string_attr_file(nc_file, "time_coverage_start_utc"));
        if let Some(base_str) = base_str {
            if let Some(base_ms) = parse_iso_time(&base_str) {
                let units = get_string_attr(&var, "units").unwrap_or_default().to_lowercase();
                let scale = cf_unit_scale_seconds(&units);
                if let Ok(raw) = var.get_values::<f64, _>(..) {
                    let offsets = raw.into_iter().map(|v| v * scale).collect();
                    return TimeInfo::BaseAndOffsets { base_ms, offsets };
                }
            }
        }
    }

    TimeInfo::Fallback(filename_meta.start_time.timestamp_millis())
}

fn cf_unit_scale_ms(units: &str) -> f64 {
    if units.contains("microsecond") {
        1e-3
    } else if units.contains("millisecond") {
        1.0
    } else if units.contains("second") {
        1000.0
    } else {
        1000.0
    }
}

fn cf_unit_scale_seconds(units: &str) -> f64 {
    if units.contains("microsecond") {
        1e-3
    } else if units.contains("millisecond") {
        1.0
    } else {
        1.0
    }
}

fn parse_cf_reference_time(s: &str) -> Option<i64> {
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%SZ"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&dt).timestamp_millis());
        }
    }
    None
}

fn parse_iso_time(s: &str) -> Option<i64> {
    for fmt in ["%Y-%m-%dT%H:%M:%S%.fZ", "%Y-%m-%dT%H:%M:%SZ"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&dt).timestamp_millis());
        }
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).timestamp_millis())
}

fn find_variable<'f>(nc_file: &'f netcdf::File, aliases: &[&str]) -> Option<netcdf::Variable<'f>> {
    aliases.iter().find_map(|name| nc_file.variable(name))
}

fn get_string_attr(var: &netcdf::Variable, name: &str) -> Option<String> {
    if !var.attributes().any(|a| a.name() == name) {
        return None;
    }
    String::try_from(var.attribute_value(name)?.ok()?).ok()
}

fn get_string_attr_file(nc_file: &netcdf::File, name: &str) -> Option<String> {
    let attr = nc_file.attribute(name)?;
    String::try_from(attr.value().ok()?).ok()
}

fn get_optimal_temp_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        use std::path::Path;
        let shm_path = Path::new("/dev/shm");
        if shm_path.exists() && shm_path.is_dir() {
            let test_path = shm_path.join(format!(".netcdf_test_{}", std::process::id()));
            if std::fs::write(&test_path, b"test").is_ok() {
                let _ = std::fs::remove_file(&test_path);
                return shm_path.to_path_buf();
            }
        }
    }
    std::env::temp_dir()
}

fn generate_temp_filename() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let pid = std::process::id();
    let tid = std::thread::current().id();
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("glm_granule_{}_{:?}_{}.nc", pid, tid, count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cf_scale_defaults_to_milliseconds() {
        assert_eq!(cf_unit_scale_ms("milliseconds since 2000-01-01 00:00:00"), 1.0);
        assert_eq!(cf_unit_scale_ms("seconds since 2000-01-01 00:00:00"), 1000.0);
        assert_eq!(cf_unit_scale_ms("microseconds since 2000-01-01 00:00:00"), 1e-3);
    }

    #[test]
    fn cf_scale_seconds_defaults_to_seconds() {
        assert_eq!(cf_unit_scale_seconds("milliseconds since 2000-01-01 00:00:00"), 1.0);
        assert_eq!(cf_unit_scale_seconds("seconds since 2000-01-01 00:00:00"), 1.0);
        assert_eq!(cf_unit_scale_seconds("microseconds since 2000-01-01 00:00:00"), 1e-3);
    }

    #[test]
    fn iso_time_parses_z_suffix_and_fraction() {
        let ms = parse_iso_time("2023-07-07T12:00:00.123Z").unwrap();
        let ms2 = parse_iso_time("2023-07-07T12:00:00Z").unwrap();
        assert!(ms >= ms2);
    }

    #[test]
    fn cf_reference_time_parses_space_separated_form() {
        let ms = parse_cf_reference_time("2000-01-01 00:00:00").unwrap();
        assert_eq!(ms, 946_684_800_000);
    }

    #[test]
    fn time_info_fallback_applies_to_every_index() {
        let info = TimeInfo::Fallback(1_000);
        assert_eq!(info.resolve(0), Some(1_000));
        assert_eq!(info.resolve(99), Some(1_000));
    }

    #[test]
    fn time_info_base_and_offsets_indexes_correctly() {
        let info = TimeInfo::BaseAndOffsets {
            base_ms: 1_000,
            offsets: vec![0.0, 500.0],
        };
        assert_eq!(info.resolve(0), Some(1_000));
        assert_eq!(info.resolve(1), Some(1_500));
        assert_eq!(info.resolve(2), None);
    }
}
