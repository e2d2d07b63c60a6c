//! GLM L2 LCFA granule filename parsing.
//!
//! Format: `OR_GLM-L2-LCFA_G1x_sYYYYJJJHHMMSS_eYYYYJJJHHMMSS_cYYYYJJJHHMMSS.nc`
//!
//! Parsing never fails outright: a filename that doesn't match the expected
//! shape falls back to `G16` and the current time for all three timestamps,
//! mirroring `parse_granule_filename`'s catch-and-fallback behavior.

use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};

/// Metadata recovered from a granule filename.
#[derive(Debug, Clone, PartialEq)]
pub struct FilenameMeta {
    pub satellite: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub creation_time: DateTime<Utc>,
}

impl FilenameMeta {
    fn fallback() -> Self {
        let now = Utc::now();
        Self {
            satellite: "G16".to_string(),
            start_time: now,
            end_time: now,
            creation_time: now,
        }
    }
}

/// Parse a granule path's basename into satellite id and start/end/creation
/// timestamps. Falls back to `G16` and "now" for all fields on any mismatch.
pub fn parse_granule_filename(path: &str) -> FilenameMeta {
    let base = path.rsplit('/').next().unwrap_or(path);
    let parts: Vec<&str> = base.trim_end_matches(".nc").split('_').collect();
    if parts.len() < 6 {
        return FilenameMeta::fallback();
    }

    let satellite = parts[2].to_string();
    let start_time = parts[3]
        .strip_prefix('s')
        .and_then(parse_timestamp_token);
    let end_time = parts[4].strip_prefix('e').and_then(parse_timestamp_token);
    let creation_time = parts[5].strip_prefix('c').and_then(parse_timestamp_token);

    match (start_time, end_time, creation_time) {
        (Some(start_time), Some(end_time), Some(creation_time)) => FilenameMeta {
            satellite,
            start_time,
            end_time,
            creation_time,
        },
        _ => FilenameMeta::fallback(),
    }
}

/// Parse a single `YYYYJJJHHMMSS[.f]` timestamp token (day-of-year form).
fn parse_timestamp_token(ts: &str) -> Option<DateTime<Utc>> {
    if ts.len() < 13 {
        return None;
    }
    let year: i32 = ts[0..4].parse().ok()?;
    let doy: i64 = ts[4..7].parse().ok()?;
    let hour: u32 = ts[7..9].parse().ok()?;
    let minute: u32 = ts[9..11].parse().ok()?;
    let second: u32 = ts[11..13].parse().ok()?;

    let base = Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single()?;
    base.checked_add_signed(Duration::days(doy - 1))?
        .with_hour(hour)?
        .with_minute(minute)?
        .with_second(second)
}
