//! Shared types and error handling for the GLM lightning TOE tile service.
//!
//! Mirrors the role `wms-common` plays for the wider weather-wms workspace:
//! every other crate in this workspace depends on this one for its error
//! type and its core domain types (`Event`, `Granule`, `Quality`).

pub mod error;
pub mod event;
pub mod grid;
pub mod units;

pub use error::{GlmError, GlmResult};
pub use event::{Event, EventWire, Granule, Quality};
pub use grid::GridVariant;
pub use units::FemtoJoules;
