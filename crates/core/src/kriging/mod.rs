//! Ordinary kriging with a gaussian variogram

pub mod interpolator;
pub mod ordinary;
pub mod variogram;

pub use interpolator::{
    validate_samples, HorizonOverride, KrigingConfig, PlanarEstimate, PlanarSurface,
    SpatialInterpolator,
};
pub use ordinary::{KrigingEstimate, OrdinaryKriging};
pub use variogram::{ExperimentalVariogram, FitSummary, VariogramModel, VariogramParams};
