//! Evaluation grid and resolution presets

pub mod spec;

pub use spec::{GridMask, GridResolution, GridSpec};
