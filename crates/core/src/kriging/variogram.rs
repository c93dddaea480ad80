//! Variogram model and experimental variogram
//!
//! The model is fixed per horizon from the data variance and configured
//! range/nugget. The experimental variogram is only a diagnostic: it is
//! binned and compared against the model but never used to re-fit it.

use serde::{Deserialize, Serialize};

use crate::core_types::SensorSample;

/// Distances at or below this are treated as zero.
pub const ZERO_DISTANCE: f64 = 1e-10;

/// Covariance shape. Only the gaussian model is supported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariogramModel {
    #[default]
    Gaussian,
}

/// Parameters of one horizon's variogram, recomputed every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VariogramParams {
    pub model: VariogramModel,
    /// Total sill, the population variance of the horizon's values
    pub sill: f64,
    /// Practical range in planar units (metres)
    pub range: f64,
    pub nugget: f64,
    pub lag_count: usize,
}

impl VariogramParams {
    /// Gaussian parameters with the sill taken from `values`.
    ///
    /// # Arguments
    ///
    /// * `values` - Sample values of one horizon (must be non-empty)
    /// * `range` - Practical range in metres
    /// * `nugget` - Nugget, the semivariance jump at zero distance
    /// * `lag_count` - Number of lag classes for the experimental variogram
    pub fn from_values(values: &[f64], range: f64, nugget: f64, lag_count: usize) -> Self {
        Self {
            model: VariogramModel::Gaussian,
            sill: population_variance(values),
            range,
            nugget,
            lag_count,
        }
    }

    /// Partial sill: the structured part of the variance.
    #[inline]
    pub fn partial_sill(&self) -> f64 {
        self.sill - self.nugget
    }

    /// Semivariance at distance `h`, with γ(0) = 0.
    #[inline]
    pub fn semivariance(&self, h: f64) -> f64 {
        if h <= ZERO_DISTANCE {
            return 0.0;
        }
        self.model_value(h)
    }

    /// Model curve without the zero-distance special case.
    #[inline]
    fn model_value(&self, h: f64) -> f64 {
        match self.model {
            VariogramModel::Gaussian => {
                let a = self.range * 4.0 / 7.0;
                self.partial_sill() * (1.0 - (-(h * h) / (a * a)).exp()) + self.nugget
            }
        }
    }
}

/// Population variance (divisor `n`). Zero for fewer than two values.
pub fn population_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

/// Binned pairwise semivariances.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExperimentalVariogram {
    /// Mean pair distance per populated lag class
    pub lags: Vec<f64>,
    /// Mean semivariance per populated lag class
    pub semivariances: Vec<f64>,
    /// Pair count per populated lag class
    pub counts: Vec<usize>,
}

impl ExperimentalVariogram {
    /// Bin every sample pair into `lag_count` equal-width classes between the
    /// smallest and largest pair distance. Empty classes are omitted.
    pub fn compute(samples: &[SensorSample], lag_count: usize) -> Self {
        let mut pairs = Vec::with_capacity(samples.len() * samples.len().saturating_sub(1) / 2);
        for (i, a) in samples.iter().enumerate() {
            for b in &samples[i + 1..] {
                let d = a.position.distance_to(&b.position);
                let g = 0.5 * (a.value - b.value).powi(2);
                pairs.push((d, g));
            }
        }
        if pairs.is_empty() || lag_count == 0 {
            return Self::default();
        }

        let d_min = pairs.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
        let d_max = pairs.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
        let width = (d_max - d_min) / lag_count as f64;

        let mut sum_d = vec![0.0; lag_count];
        let mut sum_g = vec![0.0; lag_count];
        let mut counts = vec![0usize; lag_count];
        for &(d, g) in &pairs {
            let class = if width > 0.0 {
                (((d - d_min) / width) as usize).min(lag_count - 1)
            } else {
                0
            };
            sum_d[class] += d;
            sum_g[class] += g;
            counts[class] += 1;
        }

        let mut out = Self::default();
        for k in 0..lag_count {
            if counts[k] > 0 {
                let n = counts[k] as f64;
                out.lags.push(sum_d[k] / n);
                out.semivariances.push(sum_g[k] / n);
                out.counts.push(counts[k]);
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.lags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lags.is_empty()
    }

    /// Root of the summed squared (optionally weighted) residuals between the
    /// model curve and the binned semivariances.
    ///
    /// Weighting is logistic in lag distance and favours short lags.
    pub fn residual(&self, params: &VariogramParams, weighted: bool) -> f64 {
        if self.is_empty() {
            return 0.0;
        }

        let weights = if weighted {
            lag_weights(&self.lags)
        } else {
            vec![1.0; self.lags.len()]
        };

        self.lags
            .iter()
            .zip(&self.semivariances)
            .zip(&weights)
            .map(|((&h, &g), &w)| ((params.model_value(h) - g) * w).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}

/// Logistic weights centred at 70% of the lag span, normalised to sum to 1.
fn lag_weights(lags: &[f64]) -> Vec<f64> {
    let lo = lags.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = lags.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = hi - lo;
    if span <= 0.0 {
        return vec![1.0 / lags.len() as f64; lags.len()];
    }

    let k = 2.1972 / (0.1 * span);
    let x0 = 0.7 * span + lo;
    let raw: Vec<f64> = lags
        .iter()
        .map(|&x| 1.0 / (1.0 + (-k * (x0 - x)).exp()))
        .collect();
    let total: f64 = raw.iter().sum();
    raw.into_iter().map(|w| w / total).collect()
}

/// Per-horizon fit diagnostics carried with each surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FitSummary {
    pub sill: f64,
    pub range: f64,
    pub nugget: f64,
    pub samples: usize,
    /// Populated lag classes of the experimental variogram
    pub lags_used: usize,
    /// Model-vs-experimental residual
    pub residual: f64,
    /// 2-norm condition number of the kriging matrix
    pub condition_number: f64,
}
