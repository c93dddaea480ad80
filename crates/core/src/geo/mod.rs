//! Geographic infrastructure: projection, boundary polygons and masking

pub mod boundary;
pub mod formats;
pub mod transform;

pub use boundary::BoundaryStore;
pub use transform::{CoordinateTransform, Hemisphere, UtmZone};
