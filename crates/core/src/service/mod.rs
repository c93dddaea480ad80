//! Refresh and query service
//!
//! - [`adapter`]: forecast sources behind the [`ForecastAdapter`] seam
//! - [`pipeline`]: one refresh cycle, adapter to cache
//! - [`scheduler`]: startup, periodic and manual triggers under single-flight
//! - [`cache`]: the atomically swapped latest snapshot
//! - [`query`]: read side for clients
//! - [`runtime`]: assembly from a [`ServiceConfig`](crate::config::ServiceConfig)

pub mod adapter;
pub mod cache;
pub mod clock;
pub mod export;
pub mod pipeline;
pub mod query;
pub mod runtime;
pub mod scheduler;

pub use adapter::{
    parse_forecast_csv, parse_forecast_table, FileAdapter, ForecastAdapter, StaticAdapter, TableFormat,
};
pub use cache::PredictionCache;
pub use clock::{Clock, SystemClock, TokioClock};
pub use export::SnapshotExporter;
pub use pipeline::{interpolate_all, CycleReport, RefreshPipeline};
pub use query::{LiveResponse, QueryService, RefreshAck, TimestampsResponse};
pub use runtime::SurfaceService;
pub use scheduler::{RefreshScheduler, SchedulerState, SchedulerStatus, TriggerOutcome, TriggerSource};
