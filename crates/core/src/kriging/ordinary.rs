//! Ordinary kriging system
//!
//! For `n` samples the bordered system is
//!
//! ```text
//! | -γ(d_11) ... -γ(d_1n)  1 | | w_1 |   | -γ(d_10) |
//! |   ...          ...    ... | | ... | = |   ...    |
//! | -γ(d_n1) ... -γ(d_nn)  1 | | w_n |   | -γ(d_n0) |
//! |    1     ...    1      0 | |  μ  |   |    1     |
//! ```
//!
//! with γ(0) = 0 on the diagonal. The matrix depends only on the sample
//! locations, so it is factorised once per horizon and every grid node is a
//! single back-substitution.

use nalgebra::{DMatrix, DVector, Dyn, LU};
use rayon::prelude::*;

use super::variogram::{VariogramParams, ZERO_DISTANCE};
use crate::core_types::{Horizon, SensorSample};
use crate::error::InterpolationError;

/// Estimate at one location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KrigingEstimate {
    pub value: f64,
    /// Kriging variance (estimation error variance)
    pub variance: f64,
}

/// Factorised kriging system for one horizon.
#[derive(Debug, Clone)]
pub struct OrdinaryKriging {
    locations: Vec<[f64; 2]>,
    values: Vec<f64>,
    params: VariogramParams,
    lu: LU<f64, Dyn, Dyn>,
    condition_number: f64,
}

impl OrdinaryKriging {
    /// Assemble and factorise the kriging matrix.
    ///
    /// # Arguments
    ///
    /// * `samples` - Validated samples (distinct, non-collinear locations)
    /// * `params` - Variogram for this horizon
    /// * `max_condition` - Largest acceptable 2-norm condition number
    /// * `horizon` - Used to scope errors
    ///
    /// # Errors
    ///
    /// `SingularSystem` if the matrix has a zero singular value or cannot be
    /// factorised, `IllConditioned` if its condition number exceeds
    /// `max_condition`.
    pub fn fit(
        samples: &[SensorSample],
        params: VariogramParams,
        max_condition: f64,
        horizon: Horizon,
    ) -> Result<Self, InterpolationError> {
        let n = samples.len();
        let locations: Vec<[f64; 2]> = samples
            .iter()
            .map(|s| [s.position.x, s.position.y])
            .collect();
        let values: Vec<f64> = samples.iter().map(|s| s.value).collect();

        let mut a = DMatrix::<f64>::zeros(n + 1, n + 1);
        for i in 0..n {
            for j in (i + 1)..n {
                let d = distance(locations[i], locations[j]);
                let g = -params.semivariance(d);
                a[(i, j)] = g;
                a[(j, i)] = g;
            }
            a[(i, n)] = 1.0;
            a[(n, i)] = 1.0;
        }

        let singular = a.singular_values();
        let s_max = singular.max();
        let s_min = singular.min();
        if s_min.is_nan() || s_min <= 0.0 || !s_max.is_finite() {
            return Err(InterpolationError::SingularSystem(horizon));
        }
        let condition_number = s_max / s_min;
        if condition_number > max_condition {
            return Err(InterpolationError::IllConditioned {
                horizon,
                condition: condition_number,
            });
        }

        let lu = a.lu();
        if !lu.is_invertible() {
            return Err(InterpolationError::SingularSystem(horizon));
        }

        Ok(Self {
            locations,
            values,
            params,
            lu,
            condition_number,
        })
    }

    pub fn params(&self) -> &VariogramParams {
        &self.params
    }

    pub fn condition_number(&self) -> f64 {
        self.condition_number
    }

    pub fn sample_count(&self) -> usize {
        self.values.len()
    }

    /// Best linear unbiased estimate at `(x, y)`.
    ///
    /// A location within [`ZERO_DISTANCE`] of a sample reproduces that
    /// sample's value. Returns `None` only if the back-substitution fails.
    pub fn estimate(&self, x: f64, y: f64) -> Option<KrigingEstimate> {
        let n = self.locations.len();
        let mut b = DVector::<f64>::zeros(n + 1);
        for (i, &loc) in self.locations.iter().enumerate() {
            let d = distance(loc, [x, y]);
            b[i] = if d <= ZERO_DISTANCE {
                0.0
            } else {
                -self.params.semivariance(d)
            };
        }
        b[n] = 1.0;

        let w = self.lu.solve(&b)?;
        let value = (0..n).map(|i| w[i] * self.values[i]).sum();
        let variance = w.iter().zip(b.iter()).map(|(wi, bi)| wi * -bi).sum();
        Some(KrigingEstimate { value, variance })
    }

    /// Estimates for many locations, in input order.
    pub fn estimate_many(&self, nodes: &[[f64; 2]]) -> Vec<Option<KrigingEstimate>> {
        nodes
            .par_iter()
            .map(|&[x, y]| self.estimate(x, y))
            .collect()
    }
}

#[inline]
fn distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    (a[0] - b[0]).hypot(a[1] - b[1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::{Epsg, PlanarPoint};

    fn samples(points: &[(f64, f64, f64)]) -> Vec<SensorSample> {
        points
            .iter()
            .map(|&(x, y, v)| SensorSample::new(PlanarPoint::new(x, y, Epsg(32654)), v))
            .collect()
    }

    fn params(values: &[f64], range: f64) -> VariogramParams {
        VariogramParams::from_values(values, range, 1.0, 20)
    }

    #[test]
    fn test_reproduces_samples_exactly() {
        let pts = samples(&[(10.0, 10.0, 5.0), (90.0, 10.0, 15.0), (50.0, 90.0, 10.0)]);
        let ok = OrdinaryKriging::fit(&pts, params(&[5.0, 15.0, 10.0], 100.0), 1e12, Horizon::T0).unwrap();
        for s in &pts {
            let e = ok.estimate(s.position.x, s.position.y).unwrap();
            assert!((e.value - s.value).abs() < 1e-9, "{} vs {}", e.value, s.value);
        }
    }

    #[test]
    fn test_weights_sum_to_one() {
        // A constant field is reproduced everywhere by an unbiased estimator
        let pts = samples(&[
            (0.0, 0.0, 7.0),
            (100.0, 0.0, 7.0),
            (0.0, 100.0, 7.0),
            (80.0, 90.0, 7.0),
        ]);
        let p = VariogramParams {
            sill: 4.0,
            ..params(&[7.0], 150.0)
        };
        let ok = OrdinaryKriging::fit(&pts, p, 1e12, Horizon::T1).unwrap();
        let e = ok.estimate(42.0, 17.0).unwrap();
        assert!((e.value - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_variance_grows_away_from_samples() {
        let pts = samples(&[(0.0, 0.0, 1.0), (100.0, 0.0, 10.0), (50.0, 80.0, 20.0)]);
        let ok = OrdinaryKriging::fit(&pts, params(&[1.0, 10.0, 20.0], 100.0), 1e12, Horizon::T0).unwrap();
        let near = ok.estimate(1.0, 1.0).unwrap();
        let far = ok.estimate(500.0, 500.0).unwrap();
        assert!(near.variance < far.variance);
        assert!(ok.condition_number() >= 1.0);
    }

    #[test]
    fn test_ill_conditioned_rejected() {
        let pts = samples(&[(0.0, 0.0, 1.0), (100.0, 0.0, 2.0), (50.0, 80.0, 3.0)]);
        let err = OrdinaryKriging::fit(&pts, params(&[1.0, 2.0, 3.0], 100.0), 1.0, Horizon::T3).unwrap_err();
        assert!(matches!(
            err,
            InterpolationError::IllConditioned { horizon: Horizon::T3, .. }
        ));
    }

    #[test]
    fn test_estimate_many_preserves_order() {
        let pts = samples(&[(0.0, 0.0, 1.0), (100.0, 0.0, 2.0), (50.0, 80.0, 3.0)]);
        let ok = OrdinaryKriging::fit(&pts, params(&[1.0, 2.0, 3.0], 100.0), 1e12, Horizon::T0).unwrap();
        let nodes = [[0.0, 0.0], [100.0, 0.0], [50.0, 80.0]];
        let values: Vec<f64> = ok
            .estimate_many(&nodes)
            .into_iter()
            .map(|e| e.unwrap().value)
            .collect();
        assert!((values[0] - 1.0).abs() < 1e-9);
        assert!((values[1] - 2.0).abs() < 1e-9);
        assert!((values[2] - 3.0).abs() < 1e-9);
    }
}
