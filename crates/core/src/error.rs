//! Error types for the surface pipeline
//!
//! Each stage owns its failure domain:
//! - [`ConfigError`] is fatal and only raised at startup
//! - [`AdapterError`] aborts the current refresh cycle
//! - [`InterpolationError`] drops a single horizon from the new snapshot
//! - [`CacheNotReady`] is a state, not a failure

use std::path::PathBuf;

use thiserror::Error;

use crate::core_types::{Epsg, Horizon};

/// Startup configuration and boundary-source errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configured file does not exist or cannot be read
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file was read but is not valid JSON for the expected shape
    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The boundary document parsed but holds no usable polygon
    #[error("Boundary source {} contains no polygons", path.display())]
    EmptyBoundary { path: PathBuf },

    /// Geometry that cannot be interpreted (bad arc index, short ring, ...)
    #[error("Invalid boundary geometry: {0}")]
    InvalidGeometry(String),

    /// A boundary vertex could not be projected
    #[error("Boundary vertex could not be projected: {0}")]
    Projection(#[from] CoordError),

    /// A configuration value is out of range
    #[error("Invalid configuration: {key} = {value} - {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Coordinate conversion errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    /// Latitude outside [-90, 90] or not finite
    #[error("Invalid latitude: {0}")]
    InvalidLatitude(f64),

    /// Longitude not finite
    #[error("Invalid longitude: {0}")]
    InvalidLongitude(f64),

    /// Planar coordinate not finite
    #[error("Invalid planar coordinate: ({0}, {1})")]
    InvalidPlanar(f64, f64),

    /// UTM zone outside 1..=60
    #[error("Invalid UTM zone: {0}")]
    InvalidZone(u8),

    /// A planar point from a different CRS was passed in
    #[error("Expected {expected} coordinates, got {found}")]
    CrsMismatch { expected: Epsg, found: Epsg },

    /// The projection library rejected a definition or a point
    #[error("Projection failed: {0}")]
    Projection(String),
}

/// Forecast adapter failures. Recoverable: the cycle is aborted and the
/// previous snapshot stays visible.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The upstream source could not be read
    #[error("Forecast source unavailable: {0}")]
    Unavailable(String),

    /// The upstream payload was malformed
    #[error("Malformed forecast table: {0}")]
    Malformed(String),

    /// The upstream call did not finish within the configured timeout
    #[error("Forecast adapter timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The table has no rows at all
    #[error("Forecast table is empty")]
    Empty,
}

/// Failure to fit or evaluate the kriging estimator for one horizon.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InterpolationError {
    /// No sensor carried a finite value for the horizon
    #[error("No samples available for {0}")]
    NoSamples(Horizon),

    /// Fewer than three distinct sample locations
    #[error("{horizon}: {count} distinct sample locations, at least 3 required")]
    InsufficientSamples { horizon: Horizon, count: usize },

    /// Two or more samples share one location
    #[error("{horizon}: samples coincide at ({x:.3}, {y:.3})")]
    CoincidentSamples { horizon: Horizon, x: f64, y: f64 },

    /// Every sample lies on a single line
    #[error("{horizon}: all {count} samples are collinear")]
    CollinearSamples { horizon: Horizon, count: usize },

    /// The kriging matrix could not be factorised
    #[error("{0}: kriging system is singular")]
    SingularSystem(Horizon),

    /// The kriging matrix is too ill-conditioned to trust
    #[error("{horizon}: kriging system is ill-conditioned (condition number {condition:.3e})")]
    IllConditioned { horizon: Horizon, condition: f64 },

    /// Samples, grid or boundary are tagged with a CRS other than the
    /// interpolator's planar CRS
    #[error("{horizon}: expected {expected} input, got {found}")]
    CrsMismatch {
        horizon: Horizon,
        expected: Epsg,
        found: Epsg,
    },
}

impl InterpolationError {
    /// Horizon the failure is scoped to.
    pub fn horizon(&self) -> Horizon {
        match self {
            Self::NoSamples(h) | Self::SingularSystem(h) => *h,
            Self::InsufficientSamples { horizon, .. }
            | Self::CoincidentSamples { horizon, .. }
            | Self::CollinearSamples { horizon, .. }
            | Self::IllConditioned { horizon, .. }
            | Self::CrsMismatch { horizon, .. } => *horizon,
        }
    }
}

/// A refresh cycle that produced no snapshot.
#[derive(Debug, Error)]
pub enum CycleError {
    /// The forecast adapter failed
    #[error("Forecast adapter failed: {0}")]
    Adapter(#[from] AdapterError),

    /// Every horizon failed to interpolate
    #[error("All {} horizons failed to interpolate", .0.len())]
    AllHorizonsFailed(Vec<InterpolationError>),

    /// The blocking interpolation worker panicked or was cancelled
    #[error("Interpolation worker did not complete: {0}")]
    Worker(String),
}

/// Returned by the cache before any cycle has completed successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("No prediction snapshot is available yet")]
pub struct CacheNotReady;

/// Snapshot export errors.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Reading the file failed
    #[error("Failed to load snapshot: {0}")]
    LoadFailed(String),

    /// The file is not a valid snapshot
    #[error("Failed to parse snapshot: {0}")]
    ParseFailed(String),

    /// Serialization failed
    #[error("Failed to serialize snapshot: {0}")]
    SerializeFailed(String),

    /// Writing the file failed
    #[error("Failed to write snapshot: {0}")]
    SaveFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolation_error_horizon() {
        let err = InterpolationError::CoincidentSamples {
            horizon: Horizon::T2,
            x: 1.0,
            y: 2.0,
        };
        assert_eq!(err.horizon(), Horizon::T2);
        assert_eq!(
            InterpolationError::NoSamples(Horizon::T0).horizon(),
            Horizon::T0
        );
    }

    #[test]
    fn test_cycle_error_display() {
        let err = CycleError::AllHorizonsFailed(vec![
            InterpolationError::NoSamples(Horizon::T0),
            InterpolationError::SingularSystem(Horizon::T1),
        ]);
        assert_eq!(err.to_string(), "All 2 horizons failed to interpolate");

        let err = CycleError::from(AdapterError::Empty);
        assert!(err.to_string().contains("Forecast table is empty"));
    }
}
