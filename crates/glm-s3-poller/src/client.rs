//! Anonymous S3 client for public GLM buckets (`noaa-goes16`, `noaa-goes18`).
//!
//! Uses `.no_credentials()` since these buckets serve unsigned requests,
//! and a paginated `list_objects_v2` loop over per-hour key prefixes
//! rather than a single unbounded listing.

use std::time::Duration;

use chrono::{DateTime, Datelike, Timelike, Utc};
use glm_common::{GlmError, GlmResult};
use tracing::{debug, warn};

/// Default per-request fetch timeout.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Anonymous S3 client for public GOES-R GLM buckets.
pub struct GlmS3Client {
    client: aws_sdk_s3::Client,
}

impl GlmS3Client {
    pub async fn new() -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new("us-east-1"))
            .no_credentials()
            .load()
            .await;
        Self {
            client: aws_sdk_s3::Client::new(&config),
        }
    }

    /// Enumerate keys in `[start, end]`, covering every hour-prefix in the
    /// range, sorted within each prefix by last-modified descending, then
    /// truncated to `max`. A failed listing for one hour is logged and
    /// skipped rather than aborting the whole enumeration.
    pub async fn list(
        &self,
        bucket: &str,
        product_prefix: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        max: usize,
    ) -> Vec<String> {
        let mut keys = Vec::new();
        let mut hour = start
            .with_minute(0)
            .and_then(|t| t.with_second(0))
            .unwrap_or(start);
        let last_hour = end
            .with_minute(0)
            .and_then(|t| t.with_second(0))
            .unwrap_or(end);

        while hour <= last_hour && keys.len() < max {
            let prefix = format!(
                "{product_prefix}/{:04}/{:03}/{:02}/",
                hour.year(),
                hour.ordinal(),
                hour.hour()
            );

            match self.list_prefix(bucket, &prefix, max - keys.len()).await {
                Ok(mut found) => keys.append(&mut found),
                Err(e) => warn!(bucket, prefix, error = %e, "S3 listing failed for hour prefix"),
            }

            hour += chrono::Duration::hours(1);
        }

        keys.truncate(max);
        keys
    }

    /// `list` restricted to the last `count` keys over `hours_back` hours.
    pub async fn latest(
        &self,
        bucket: &str,
        product_prefix: &str,
        count: usize,
        hours_back: i64,
    ) -> Vec<String> {
        let end = Utc::now();
        let start = end - chrono::Duration::hours(hours_back);
        self.list(bucket, product_prefix, start, end, count).await
    }

    async fn list_prefix(
        &self,
        bucket: &str,
        prefix: &str,
        max: usize,
    ) -> GlmResult<Vec<String>> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .max_keys(1000)
            .send()
            .await
            .map_err(|e| GlmError::StorageError(format!("list_objects_v2 failed: {e}")))?;

        let mut objects: Vec<_> = response.contents().to_vec();
        objects.sort_by(|a, b| b.last_modified().cmp(&a.last_modified()));

        let keys = objects
            .into_iter()
            .filter_map(|obj| obj.key().map(str::to_string))
            .filter(|key| validate_key(key))
            .take(max)
            .collect();

        Ok(keys)
    }

    /// Fetch an object's bytes, bounded by [`FETCH_TIMEOUT`].
    pub async fn fetch(&self, bucket: &str, key: &str) -> GlmResult<Vec<u8>> {
        debug!(bucket, key, "fetching GLM granule from S3");
        let request = self.client.get_object().bucket(bucket).key(key).send();

        let response = tokio::time::timeout(FETCH_TIMEOUT, request)
            .await
            .map_err(|_| GlmError::Timeout)?
            .map_err(|e| GlmError::StorageError(format!("get_object failed for {key}: {e}")))?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| GlmError::StorageError(format!("failed reading body for {key}: {e}")))?;

        Ok(bytes.into_bytes().to_vec())
    }
}

/// Direct HTTPS URL for a key, for diagnostics/links rather than fetching.
pub fn direct_https_url(bucket: &str, key: &str) -> String {
    format!("https://{bucket}.s3.amazonaws.com/{key}")
}

/// Validate a key against the LCFA filename convention:
/// `OR_GLM-L2-LCFA_G1x_sYYYYJJJHHMMSS_eYYYYJJJHHMMSS_cYYYYJJJHHMMSS.nc`.
pub fn validate_key(key: &str) -> bool {
    if !key.ends_with(".nc") {
        return false;
    }
    let base = key.rsplit('/').next().unwrap_or(key);
    let parts: Vec<&str> = base.trim_end_matches(".nc").split('_').collect();
    if parts.len() < 6 {
        return false;
    }
    if parts[0] != "OR" || parts[1] != "GLM-L2-LCFA" {
        return false;
    }
    if !parts[2].starts_with('G') || !parts[2][1..].chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    parts[3..6]
        .iter()
        .all(|p| p.len() >= 14 && p[1..].len() == 13 && p[1..].chars().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_well_formed_key() {
        assert!(validate_key(
            "GLM-L2-LCFA/2023/188/12/OR_GLM-L2-LCFA_G16_s20231881200000_e20231881200200_c20231881200226.nc"
        ));
    }

    #[test]
    fn rejects_wrong_extension() {
        assert!(!validate_key("OR_GLM-L2-LCFA_G16_s1_e1_c1.txt"));
    }

    #[test]
    fn rejects_wrong_product_prefix() {
        assert!(!validate_key(
            "OR_ABI-L2-CMIPF_G16_s20231881200000_e20231881200200_c20231881200226.nc"
        ));
    }

    #[test]
    fn rejects_non_numeric_satellite() {
        assert!(!validate_key(
            "OR_GLM-L2-LCFA_GXX_s20231881200000_e20231881200200_c20231881200226.nc"
        ));
    }

    #[test]
    fn rejects_short_timestamp() {
        assert!(!validate_key("OR_GLM-L2-LCFA_G16_s1_e1_c1.nc"));
    }

    #[test]
    fn direct_https_url_matches_template() {
        assert_eq!(
            direct_https_url("noaa-goes16", "GLM-L2-LCFA/2023/188/12/x.nc"),
            "https://noaa-goes16.s3.amazonaws.com/GLM-L2-LCFA/2023/188/12/x.nc"
        );
    }
}
