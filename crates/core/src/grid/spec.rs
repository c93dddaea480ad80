//! Evaluation grid over the boundary's planar bounding box

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core_types::{Bounds, Epsg};
use crate::error::ConfigError;
use crate::geo::BoundaryStore;

/// Axis-aligned node grid. Both axes are inclusive linspaces, so the
/// outermost nodes sit exactly on the bounding box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    bounds: Bounds,
    nx: usize,
    ny: usize,
    crs: Epsg,
}

impl GridSpec {
    /// Grid of `nx × ny` nodes spanning `bounds`.
    ///
    /// # Arguments
    ///
    /// * `bounds` - Planar bounding box, normally [`BoundaryStore::bounds`]
    /// * `nx`, `ny` - Node counts per axis (at least 2 each)
    /// * `crs` - CRS of the bounding box
    pub fn covering(bounds: Bounds, nx: usize, ny: usize, crs: Epsg) -> Result<Self, ConfigError> {
        if nx < 2 || ny < 2 {
            return Err(ConfigError::Invalid {
                key: "grid.nodes",
                value: format!("{nx}x{ny}"),
                reason: "need at least 2 nodes per axis",
            });
        }
        if bounds.is_empty() || !bounds.width().is_finite() || !bounds.height().is_finite() {
            return Err(ConfigError::Invalid {
                key: "grid.bounds",
                value: format!("{:?}", bounds.as_tuple()),
                reason: "bounding box is empty or unbounded",
            });
        }
        Ok(Self { bounds, nx, ny, crs })
    }

    /// Grid over a boundary store at the given resolution.
    pub fn for_boundary(boundary: &BoundaryStore, resolution: GridResolution) -> Result<Self, ConfigError> {
        let n = resolution.nodes_per_axis();
        Self::covering(boundary.bounds(), n, n, boundary.crs())
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.nx, self.ny)
    }

    pub fn crs(&self) -> Epsg {
        self.crs
    }

    /// Total node count.
    pub fn len(&self) -> usize {
        self.nx * self.ny
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// X coordinates of the grid columns.
    pub fn xs(&self) -> Vec<f64> {
        linspace(self.bounds.min_x, self.bounds.max_x, self.nx)
    }

    /// Y coordinates of the grid rows.
    pub fn ys(&self) -> Vec<f64> {
        linspace(self.bounds.min_y, self.bounds.max_y, self.ny)
    }

    /// Every node, x-major: all `y` for the first `x`, then the next `x`.
    pub fn nodes(&self) -> Vec<[f64; 2]> {
        let ys = self.ys();
        self.xs()
            .into_iter()
            .flat_map(|x| ys.iter().map(move |&y| [x, y]))
            .collect()
    }

    /// Nodes strictly inside the boundary, in grid order.
    ///
    /// The boundary never changes, so callers compute this once and reuse it
    /// every cycle.
    pub fn masked_nodes(&self, boundary: &BoundaryStore) -> GridMask {
        let nodes: Vec<[f64; 2]> = self
            .nodes()
            .into_par_iter()
            .filter(|&[x, y]| boundary.contains_xy(x, y))
            .collect();
        GridMask {
            total: self.len(),
            nodes,
            crs: self.crs,
        }
    }
}

/// In-boundary subset of a grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GridMask {
    total: usize,
    nodes: Vec<[f64; 2]>,
    crs: Epsg,
}

impl GridMask {
    pub fn nodes(&self) -> &[[f64; 2]] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Size of the unmasked grid.
    pub fn total(&self) -> usize {
        self.total
    }

    /// CRS of the node coordinates.
    pub fn crs(&self) -> Epsg {
        self.crs
    }
}

/// `n` evenly spaced values from `start` to `end` inclusive.
fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![start];
    }
    let step = (end - start) / (n - 1) as f64;
    (0..n)
        .map(|i| if i == n - 1 { end } else { start + step * i as f64 })
        .collect()
}

/// Resolution preset for the evaluation grid.
///
/// Kriging cost grows with the node count, so finer grids trade refresh time
/// for smoother maps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridResolution {
    /// 25 × 25 nodes
    Coarse,
    /// 50 × 50 nodes
    #[default]
    Standard,
    /// 100 × 100 nodes
    Fine,
    /// Explicit node count per axis
    Custom(usize),
}

impl GridResolution {
    /// Nodes along each axis.
    #[must_use]
    pub const fn nodes_per_axis(self) -> usize {
        match self {
            Self::Coarse => 25,
            Self::Standard => 50,
            Self::Fine => 100,
            Self::Custom(n) => n,
        }
    }
}
