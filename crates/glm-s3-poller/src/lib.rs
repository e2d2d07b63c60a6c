//! Anonymous enumeration, fetch, and background polling of public GOES-R
//! GLM L2 LCFA buckets.

pub mod client;
pub mod poller;

pub use client::{direct_https_url, validate_key, GlmS3Client, FETCH_TIMEOUT};
pub use poller::{
    poll_once, run_forever, DedupSet, PollOutcome, PollerConfig, DEFAULT_HOURS_BACK,
    DEFAULT_INTERVAL_SECS, DEFAULT_PRODUCT_PREFIX, MIN_INTERVAL_SECS,
};
