//! Sensor observations as produced by a forecast adapter

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{GeoCoord, Horizon, PlanarPoint};
use crate::geo::CoordinateTransform;

/// Station identifier. Upstream tables use both numeric and string ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StationId {
    Numeric(i64),
    Named(String),
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{n}"),
            Self::Named(s) => f.write_str(s),
        }
    }
}

impl From<&str> for StationId {
    fn from(s: &str) -> Self {
        Self::Named(s.to_owned())
    }
}

impl From<i64> for StationId {
    fn from(n: i64) -> Self {
        Self::Numeric(n)
    }
}

/// One sensor row: location plus one optional value per horizon.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorObservation {
    pub station_id: StationId,
    pub location: GeoCoord,
    /// Indexed by [`Horizon::index`]
    pub values: [Option<f64>; 5],
}

impl SensorObservation {
    pub fn new(station_id: impl Into<StationId>, location: GeoCoord) -> Self {
        Self {
            station_id: station_id.into(),
            location,
            values: [None; 5],
        }
    }

    /// Set the value for one horizon.
    pub fn with_value(mut self, horizon: Horizon, value: f64) -> Self {
        self.values[horizon.index()] = Some(value);
        self
    }

    /// Set the same value for every horizon.
    pub fn with_all(mut self, value: f64) -> Self {
        self.values = [Some(value); 5];
        self
    }

    /// Finite value for `horizon`, if any.
    #[inline]
    pub fn value(&self, horizon: Horizon) -> Option<f64> {
        self.values[horizon.index()].filter(|v| v.is_finite())
    }
}

/// A sensor value at a planar location, ready for interpolation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSample {
    pub position: PlanarPoint,
    pub value: f64,
}

impl SensorSample {
    pub const fn new(position: PlanarPoint, value: f64) -> Self {
        Self { position, value }
    }
}

/// One refresh cycle's worth of forecast rows. Discarded after the cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForecastTable {
    pub rows: Vec<SensorObservation>,
}

impl ForecastTable {
    pub fn new(rows: Vec<SensorObservation>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Planar samples for one horizon, in table order.
    ///
    /// Rows with a missing or non-finite value are skipped, as are rows whose
    /// location cannot be projected.
    pub fn samples_for(&self, horizon: Horizon, transform: &CoordinateTransform) -> Vec<SensorSample> {
        self.rows
            .iter()
            .filter_map(|row| {
                let value = row.value(horizon)?;
                match transform.to_planar(row.location) {
                    Ok(position) => Some(SensorSample::new(position, value)),
                    Err(e) => {
                        warn!(station = %row.station_id, %horizon, "Skipping sensor: {e}");
                        None
                    }
                }
            })
            .collect()
    }
}
