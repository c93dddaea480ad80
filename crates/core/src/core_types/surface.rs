//! Interpolated surfaces and prediction snapshots

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::Horizon;
use crate::kriging::FitSummary;

/// One emitted grid node: geographic location and estimated value.
///
/// Serialized as a `[lat, lon, value]` triple.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfacePoint {
    pub lat: f64,
    pub lon: f64,
    pub value: f64,
}

impl SurfacePoint {
    pub const fn new(lat: f64, lon: f64, value: f64) -> Self {
        Self { lat, lon, value }
    }

    pub const fn as_triple(&self) -> [f64; 3] {
        [self.lat, self.lon, self.value]
    }
}

impl Serialize for SurfacePoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_triple().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SurfacePoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let [lat, lon, value] = <[f64; 3]>::deserialize(deserializer)?;
        Ok(Self { lat, lon, value })
    }
}

/// Surface for one horizon, restricted to in-boundary nodes with finite
/// estimates, in grid order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpolatedSurface {
    pub horizon: Horizon,
    pub points: Vec<SurfacePoint>,
    pub fit: FitSummary,
}

impl InterpolatedSurface {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// `(min, max)` of emitted values, `None` when empty.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.points.iter().fold(None, |acc, p| match acc {
            None => Some((p.value, p.value)),
            Some((lo, hi)) => Some((lo.min(p.value), hi.max(p.value))),
        })
    }
}

/// Complete set of surfaces produced by one refresh cycle.
///
/// Never mutated after construction; the cache replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionSnapshot {
    pub generated_at: DateTime<Utc>,
    /// Monotonic cycle counter assigned by the pipeline
    pub generation: u64,
    pub surfaces: BTreeMap<Horizon, InterpolatedSurface>,
}

impl PredictionSnapshot {
    pub fn new(
        generated_at: DateTime<Utc>,
        generation: u64,
        surfaces: impl IntoIterator<Item = InterpolatedSurface>,
    ) -> Self {
        Self {
            generated_at,
            generation,
            surfaces: surfaces.into_iter().map(|s| (s.horizon, s)).collect(),
        }
    }

    pub fn surface(&self, horizon: Horizon) -> Option<&InterpolatedSurface> {
        self.surfaces.get(&horizon)
    }

    /// Horizons present, in look-ahead order.
    pub fn horizons(&self) -> Vec<Horizon> {
        self.surfaces.keys().copied().collect()
    }

    /// Horizons absent because their interpolation failed.
    pub fn missing_horizons(&self) -> Vec<Horizon> {
        Horizon::ALL
            .into_iter()
            .filter(|h| !self.surfaces.contains_key(h))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.surfaces.len() == Horizon::ALL.len()
    }

    /// Horizon to `[lat, lon, value]` triples, the shape clients read.
    ///
    /// Keys serialize as `t0`, `t+1`, ... in look-ahead order.
    pub fn to_query_map(&self) -> BTreeMap<Horizon, Vec<[f64; 3]>> {
        self.surfaces
            .iter()
            .map(|(h, s)| (*h, s.points.iter().map(SurfacePoint::as_triple).collect()))
            .collect()
    }
}
