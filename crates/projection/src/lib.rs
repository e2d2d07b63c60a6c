//! Coordinate reference system transformations.
//!
//! Implements map projections from scratch without external dependencies.

pub mod abi_meters;
pub mod geostationary;
pub mod mercator;

pub use abi_meters::AbiMetersGrid;
pub use geostationary::Geostationary;
pub use mercator::{meters_per_pixel, tile_pixel, world_pixel, WorldPixel};
