//! Results Module
//!
//! Everything that operates on the detected regions of an image:
//! - Geometry and the geometry-derived region identity
//! - The authoritative per-image store and its mutations
//! - Overlap cleanup and hit testing
//! - CSV/ZIP export

pub mod clean;
pub mod confidence;
pub mod export;
pub mod hit;
pub mod store;
pub mod types;

pub use clean::clean_regions;
pub use export::{to_csv, to_zip, ExportError};
pub use hit::hit;
pub use store::{ResultRepository, ResultStore, StoreError};
pub use types::{BoundingBox, DetectedRegion, Point, RegionIdentity, RegionStatus};
