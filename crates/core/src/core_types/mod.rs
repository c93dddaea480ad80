//! Core types shared across the pipeline

pub mod horizon;
pub mod observation;
pub mod point;
pub mod surface;

pub use horizon::Horizon;
pub use observation::{ForecastTable, SensorObservation, SensorSample, StationId};
pub use point::{Bounds, Epsg, GeoCoord, PlanarPoint};
pub use surface::{InterpolatedSurface, PredictionSnapshot, SurfacePoint};
