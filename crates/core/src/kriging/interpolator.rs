//! Per-horizon spatial interpolation
//!
//! Each horizon is fitted independently: sample validation, variogram from
//! the horizon's own variance, one factorised kriging system, then evaluation
//! over the in-boundary grid nodes. Nothing in this path is random, so the
//! same inputs always produce bit-identical surfaces.

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::ordinary::{KrigingEstimate, OrdinaryKriging};
use super::variogram::{ExperimentalVariogram, FitSummary, VariogramParams};
use crate::core_types::{Epsg, Horizon, InterpolatedSurface, SensorSample, SurfacePoint};
use crate::error::{ConfigError, InterpolationError};
use crate::geo::{BoundaryStore, CoordinateTransform};
use crate::grid::{GridMask, GridSpec};

/// Relative tolerance for the collinearity test.
const COLLINEAR_TOLERANCE: f64 = 1e-9;

/// Range/nugget replacement for a single horizon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HorizonOverride {
    pub range: Option<f64>,
    pub nugget: Option<f64>,
}

/// Kriging constants. These are tuning constants, never re-estimated from
/// data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KrigingConfig {
    /// Practical range in metres
    pub range: f64,
    pub nugget: f64,
    pub lag_count: usize,
    /// Weight short lags more heavily in the variogram diagnostic
    pub weighted_lags: bool,
    /// Reject systems with a larger 2-norm condition number
    pub max_condition_number: f64,
    /// Per-horizon range/nugget
    pub overrides: BTreeMap<Horizon, HorizonOverride>,
}

impl Default for KrigingConfig {
    fn default() -> Self {
        Self {
            range: 10_000.0,
            nugget: 1.0,
            lag_count: 20,
            weighted_lags: true,
            max_condition_number: 1e12,
            overrides: BTreeMap::new(),
        }
    }
}

impl KrigingConfig {
    /// Override range and/or nugget for one horizon.
    pub fn with_override(mut self, horizon: Horizon, range: Option<f64>, nugget: Option<f64>) -> Self {
        self.overrides.insert(horizon, HorizonOverride { range, nugget });
        self
    }

    /// Effective `(range, nugget)` for a horizon.
    pub fn parameters_for(&self, horizon: Horizon) -> (f64, f64) {
        let o = self.overrides.get(&horizon).copied().unwrap_or_default();
        (o.range.unwrap_or(self.range), o.nugget.unwrap_or(self.nugget))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key, value: f64, reason| ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason,
        };
        if !(self.range.is_finite() && self.range > 0.0) {
            return Err(invalid("kriging.range", self.range, "must be positive"));
        }
        if !(self.nugget.is_finite() && self.nugget >= 0.0) {
            return Err(invalid("kriging.nugget", self.nugget, "must be non-negative"));
        }
        if self.lag_count == 0 {
            return Err(invalid("kriging.lag_count", 0.0, "must be at least 1"));
        }
        if self.max_condition_number.is_nan() || self.max_condition_number < 1.0 {
            return Err(invalid(
                "kriging.max_condition_number",
                self.max_condition_number,
                "must be at least 1",
            ));
        }
        for o in self.overrides.values() {
            if let Some(r) = o.range.filter(|r| !(r.is_finite() && *r > 0.0)) {
                return Err(invalid("kriging.overrides.range", r, "must be positive"));
            }
            if let Some(n) = o.nugget.filter(|n| !(n.is_finite() && *n >= 0.0)) {
                return Err(invalid("kriging.overrides.nugget", n, "must be non-negative"));
            }
        }
        Ok(())
    }
}

/// Planar estimate at one grid node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanarEstimate {
    pub x: f64,
    pub y: f64,
    pub value: f64,
    pub variance: f64,
}

/// Surface in planar coordinates, before conversion to lat/lon.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanarSurface {
    pub horizon: Horizon,
    pub estimates: Vec<PlanarEstimate>,
    pub fit: FitSummary,
}

/// Ordinary-kriging interpolator shared by every horizon.
#[derive(Debug, Clone)]
pub struct SpatialInterpolator {
    config: KrigingConfig,
    transform: CoordinateTransform,
}

impl SpatialInterpolator {
    pub fn new(config: KrigingConfig, transform: CoordinateTransform) -> Self {
        Self { config, transform }
    }

    pub fn config(&self) -> &KrigingConfig {
        &self.config
    }

    pub fn transform(&self) -> &CoordinateTransform {
        &self.transform
    }

    /// Interpolate one horizon over `grid`, masked to `boundary`.
    ///
    /// # Arguments
    ///
    /// * `samples` - Planar samples for this horizon
    /// * `grid` - Evaluation grid
    /// * `boundary` - Emitted nodes are strictly inside this boundary
    /// * `horizon` - Horizon being interpolated
    ///
    /// # Returns
    ///
    /// `(lat, lon, value)` points in grid order, finite values only
    ///
    /// # Errors
    ///
    /// `InterpolationError::CrsMismatch` if `grid` or `boundary` is not in
    /// the transform's planar CRS, plus every error of [`Self::fit`].
    pub fn interpolate(
        &self,
        samples: &[SensorSample],
        grid: &GridSpec,
        boundary: &BoundaryStore,
        horizon: Horizon,
    ) -> Result<InterpolatedSurface, InterpolationError> {
        self.check_crs(boundary.crs(), horizon)?;
        self.check_crs(grid.crs(), horizon)?;
        self.interpolate_masked(samples, &grid.masked_nodes(boundary), horizon)
    }

    /// Interpolate one horizon over a precomputed grid mask.
    pub fn interpolate_masked(
        &self,
        samples: &[SensorSample],
        mask: &GridMask,
        horizon: Horizon,
    ) -> Result<InterpolatedSurface, InterpolationError> {
        self.check_crs(mask.crs(), horizon)?;
        let planar = self.interpolate_planar(samples, mask.nodes(), horizon)?;

        let mut points = Vec::with_capacity(planar.estimates.len());
        for e in &planar.estimates {
            match self.transform.xy_to_geographic(e.x, e.y) {
                Ok(geo) => points.push(SurfacePoint::new(geo.lat, geo.lon, e.value)),
                Err(err) => warn!(%horizon, x = e.x, y = e.y, "Dropping grid node: {err}"),
            }
        }

        Ok(InterpolatedSurface {
            horizon,
            points,
            fit: planar.fit,
        })
    }

    /// Fit and evaluate at the given planar nodes. Nodes whose estimate is
    /// not finite are dropped.
    ///
    /// `nodes` are taken to be in the transform's planar CRS.
    pub fn interpolate_planar(
        &self,
        samples: &[SensorSample],
        nodes: &[[f64; 2]],
        horizon: Horizon,
    ) -> Result<PlanarSurface, InterpolationError> {
        let (kriging, fit) = self.fit(samples, horizon)?;

        let estimates: Vec<PlanarEstimate> = kriging
            .estimate_many(nodes)
            .into_iter()
            .zip(nodes)
            .filter_map(|(estimate, &[x, y])| {
                let KrigingEstimate { value, variance } = estimate?;
                value.is_finite().then_some(PlanarEstimate {
                    x,
                    y,
                    value,
                    variance,
                })
            })
            .collect();

        debug!(
            %horizon,
            samples = fit.samples,
            nodes = nodes.len(),
            emitted = estimates.len(),
            condition = fit.condition_number,
            residual = fit.residual,
            "Interpolated horizon"
        );

        Ok(PlanarSurface {
            horizon,
            estimates,
            fit,
        })
    }

    /// Validate samples and factorise the kriging system for one horizon.
    ///
    /// Every sample must be tagged with the transform's planar CRS.
    pub fn fit(
        &self,
        samples: &[SensorSample],
        horizon: Horizon,
    ) -> Result<(OrdinaryKriging, FitSummary), InterpolationError> {
        let samples: Vec<SensorSample> = samples
            .iter()
            .copied()
            .filter(|s| s.value.is_finite())
            .collect();
        for sample in &samples {
            self.check_crs(sample.position.crs, horizon)?;
        }
        validate_samples(&samples, horizon)?;

        let (range, nugget) = self.config.parameters_for(horizon);
        let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
        let params = VariogramParams::from_values(&values, range, nugget, self.config.lag_count);

        let experimental = ExperimentalVariogram::compute(&samples, params.lag_count);
        let residual = experimental.residual(&params, self.config.weighted_lags);

        let kriging = OrdinaryKriging::fit(&samples, params, self.config.max_condition_number, horizon)?;

        let fit = FitSummary {
            sill: params.sill,
            range,
            nugget,
            samples: samples.len(),
            lags_used: experimental.len(),
            residual,
            condition_number: kriging.condition_number(),
        };
        Ok((kriging, fit))
    }

    fn check_crs(&self, found: Epsg, horizon: Horizon) -> Result<(), InterpolationError> {
        self.transform
            .check_crs(found)
            .map_err(|_| InterpolationError::CrsMismatch {
                horizon,
                expected: self.transform.planar_crs(),
                found,
            })
    }
}

/// Reject sample sets the kriging system cannot represent.
///
/// Order of checks: empty, fewer than three distinct locations, coincident
/// locations, all locations on one line.
pub fn validate_samples(samples: &[SensorSample], horizon: Horizon) -> Result<(), InterpolationError> {
    if samples.is_empty() {
        return Err(InterpolationError::NoSamples(horizon));
    }

    let mut seen = FxHashSet::default();
    let mut coincident = None;
    for s in samples {
        // +0.0 folds -0.0 into 0.0 so both hash alike
        let key = ((s.position.x + 0.0).to_bits(), (s.position.y + 0.0).to_bits());
        if !seen.insert(key) && coincident.is_none() {
            coincident = Some((s.position.x, s.position.y));
        }
    }

    if seen.len() < 3 {
        return Err(InterpolationError::InsufficientSamples {
            horizon,
            count: seen.len(),
        });
    }
    if let Some((x, y)) = coincident {
        return Err(InterpolationError::CoincidentSamples { horizon, x, y });
    }
    if is_collinear(samples) {
        return Err(InterpolationError::CollinearSamples {
            horizon,
            count: samples.len(),
        });
    }
    Ok(())
}

fn is_collinear(samples: &[SensorSample]) -> bool {
    let origin = samples[0].position;
    let far = samples
        .iter()
        .map(|s| s.position)
        .fold(origin, |best, p| {
            if origin.distance_to(&p) > origin.distance_to(&best) {
                p
            } else {
                best
            }
        });

    let dx = far.x - origin.x;
    let dy = far.y - origin.y;
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return true;
    }

    samples.iter().all(|s| {
        let cross = dx * (s.position.y - origin.y) - dy * (s.position.x - origin.x);
        cross.abs() <= COLLINEAR_TOLERANCE * len2
    })
}
