//! Error types for GLM granule parsing.

use thiserror::Error;

/// Result type for granule parsing operations.
pub type NetCdfResult<T> = Result<T, NetCdfError>;

/// Error types for NetCDF parsing.
///
/// Only failures that prevent the file from being opened at all land here.
/// A file that opens fine but is missing the event variables the granule
/// reader expects is not an error condition (see [`crate::granule::read_granule_from_bytes`]);
/// it yields a granule with zero events and a logged warning instead.
#[derive(Error, Debug)]
pub enum NetCdfError {
    /// File I/O error (writing the scratch file, reading the path, etc.)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The file could not be opened as NetCDF/HDF5 at all.
    #[error("Invalid data format: {0}")]
    InvalidFormat(String),
}
