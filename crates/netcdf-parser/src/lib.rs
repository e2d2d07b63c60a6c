//! GLM L2 LCFA NetCDF granule reading.
//!
//! This crate reads GOES-R GLM (Geostationary Lightning Mapper) Level-2
//! LCFA (Lightning Cluster-Filter Algorithm) granules: NetCDF-4 files
//! containing one row per lightning event over a ~20 second interval.
//!
//! # Module Structure
//!
//! - [`error`] - Error types and result alias
//! - [`filename`] - Granule filename parsing (satellite id, time range)
//! - [`granule`] - Native netcdf-library reading and event extraction

pub mod error;
pub mod filename;
pub mod granule;

pub use error::{NetCdfError, NetCdfResult};
pub use filename::{parse_granule_filename, FilenameMeta};
pub use granule::{read_granule_from_bytes, silence_hdf5_errors};
