//! Live NO2 surface service core
//!
//! Turns per-station pollution forecasts into continuous surfaces over the
//! Tokyo special wards and keeps the latest set available for readers.
//!
//! ## Pipeline
//!
//! - A [`ForecastAdapter`] supplies one table of sensor rows per cycle, with a
//!   value for each horizon `t0` to `t+4`
//! - Sensor locations are projected to UTM ([`CoordinateTransform`]) and
//!   each horizon is interpolated independently with ordinary kriging
//!   ([`SpatialInterpolator`]) over grid nodes strictly inside the boundary
//! - The result is published as one immutable [`PredictionSnapshot`] into the
//!   [`PredictionCache`], replacing the previous one atomically
//! - A [`RefreshScheduler`] runs cycles at startup, hourly and on request,
//!   never more than one at a time
//!
//! [`SurfaceService`] wires everything together from a [`ServiceConfig`].

// Core types and utilities
pub mod core_types;
pub mod error;

// Geometry and numerics
pub mod geo;
pub mod grid;
pub mod kriging;

// Runtime
pub mod config;
pub mod service;

// Re-export core types
pub use core_types::{
    Bounds, Epsg, ForecastTable, GeoCoord, Horizon, InterpolatedSurface, PlanarPoint,
    PredictionSnapshot, SensorObservation, SensorSample, StationId, SurfacePoint,
};
pub use error::{AdapterError, CacheNotReady, ConfigError, CoordError, CycleError, InterpolationError};

pub use config::ServiceConfig;
pub use self::geo::{BoundaryStore, CoordinateTransform, UtmZone};
pub use grid::{GridMask, GridResolution, GridSpec};
pub use kriging::{FitSummary, KrigingConfig, SpatialInterpolator};
pub use service::{
    ForecastAdapter, LiveResponse, PredictionCache, QueryService, RefreshPipeline, RefreshScheduler,
    SurfaceService, TriggerOutcome, TriggerSource,
};
