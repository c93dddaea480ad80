//! One refresh cycle: adapter → interpolator → cache
//!
//! Every stage takes immutable input and returns a value or a typed error.
//! A horizon that fails to interpolate is left out of the snapshot; the cycle
//! only fails when the adapter fails or no horizon survives, and then the
//! cache keeps its previous snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rayon::prelude::*;
use tracing::{debug, error, info, warn};

use super::adapter::ForecastAdapter;
use super::cache::PredictionCache;
use super::clock::{Clock, SystemClock};
use super::export::SnapshotExporter;
use crate::core_types::{ForecastTable, Horizon, InterpolatedSurface, PredictionSnapshot};
use crate::error::{AdapterError, CycleError, InterpolationError};
use crate::grid::GridMask;
use crate::kriging::SpatialInterpolator;

/// Default bound on a single adapter call.
pub const DEFAULT_ADAPTER_TIMEOUT_SECS: u64 = 30;

/// Outcome of a successful cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub generation: u64,
    /// Horizons present in the new snapshot
    pub horizons: Vec<Horizon>,
    /// Horizons left out, with the reason
    pub failures: Vec<InterpolationError>,
    /// Total emitted points across horizons
    pub points: usize,
}

/// Everything one refresh cycle needs, shared across cycles.
pub struct RefreshPipeline {
    adapter: Arc<dyn ForecastAdapter>,
    interpolator: Arc<SpatialInterpolator>,
    mask: Arc<GridMask>,
    cache: Arc<PredictionCache>,
    clock: Arc<dyn Clock>,
    adapter_timeout: Duration,
    exporter: Option<SnapshotExporter>,
    generation: AtomicU64,
}

impl RefreshPipeline {
    /// # Arguments
    ///
    /// * `adapter` - Forecast source
    /// * `interpolator` - Kriging configuration and projection
    /// * `mask` - In-boundary grid nodes, computed once at startup
    /// * `cache` - Cache the pipeline publishes into
    pub fn new(
        adapter: Arc<dyn ForecastAdapter>,
        interpolator: SpatialInterpolator,
        mask: GridMask,
        cache: Arc<PredictionCache>,
    ) -> Self {
        Self {
            adapter,
            interpolator: Arc::new(interpolator),
            mask: Arc::new(mask),
            cache,
            clock: Arc::new(SystemClock),
            adapter_timeout: Duration::from_secs(DEFAULT_ADAPTER_TIMEOUT_SECS),
            exporter: None,
            generation: AtomicU64::new(0),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_adapter_timeout(mut self, timeout: Duration) -> Self {
        self.adapter_timeout = timeout;
        self
    }

    /// Write each new snapshot to disk after it is published.
    pub fn with_exporter(mut self, exporter: SnapshotExporter) -> Self {
        self.exporter = Some(exporter);
        self
    }

    pub fn cache(&self) -> &Arc<PredictionCache> {
        &self.cache
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Run one full cycle and publish the result.
    ///
    /// # Errors
    ///
    /// `CycleError::Adapter` if the table could not be fetched in time,
    /// `CycleError::AllHorizonsFailed` if no horizon interpolated, and
    /// `CycleError::Worker` if the blocking worker did not complete. In every
    /// error case the cache is left untouched.
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let table = self.fetch_table().await?;

        let interpolator = Arc::clone(&self.interpolator);
        let mask = Arc::clone(&self.mask);
        let results = tokio::task::spawn_blocking(move || interpolate_all(&interpolator, &mask, &table))
            .await
            .map_err(|e| CycleError::Worker(e.to_string()))?;

        let mut surfaces = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(surface) => surfaces.push(surface),
                Err(e) => {
                    warn!(horizon = %e.horizon(), "Horizon omitted from snapshot: {e}");
                    failures.push(e);
                }
            }
        }
        if surfaces.is_empty() {
            error!(failures = failures.len(), "Every horizon failed, keeping previous snapshot");
            return Err(CycleError::AllHorizonsFailed(failures));
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = Arc::new(PredictionSnapshot::new(self.clock.now(), generation, surfaces));
        let report = CycleReport {
            generation,
            horizons: snapshot.horizons(),
            failures,
            points: snapshot.surfaces.values().map(InterpolatedSurface::len).sum(),
        };

        self.cache.set(Arc::clone(&snapshot));
        info!(
            generation,
            horizons = report.horizons.len(),
            points = report.points,
            "Published prediction snapshot"
        );

        if let Some(exporter) = self.exporter.clone() {
            export_snapshot(exporter, snapshot).await;
        }

        Ok(report)
    }

    async fn fetch_table(&self) -> Result<ForecastTable, AdapterError> {
        let table = tokio::time::timeout(self.adapter_timeout, self.adapter.fetch())
            .await
            .map_err(|_| AdapterError::Timeout(self.adapter_timeout))??;
        if table.is_empty() {
            return Err(AdapterError::Empty);
        }
        debug!(adapter = self.adapter.name(), rows = table.len(), "Fetched forecast table");
        Ok(table)
    }
}

/// Export failures are logged and never fail the cycle.
async fn export_snapshot(exporter: SnapshotExporter, snapshot: Arc<PredictionSnapshot>) {
    let result = tokio::task::spawn_blocking(move || exporter.save(&snapshot)).await;
    match result {
        Ok(Ok(())) => debug!("Exported snapshot"),
        Ok(Err(e)) => warn!("Snapshot export failed: {e}"),
        Err(e) => warn!("Snapshot export task failed: {e}"),
    }
}

/// Interpolate every horizon independently, results in horizon order.
pub fn interpolate_all(
    interpolator: &SpatialInterpolator,
    mask: &GridMask,
    table: &ForecastTable,
) -> Vec<Result<InterpolatedSurface, InterpolationError>> {
    Horizon::ALL
        .par_iter()
        .map(|&horizon| {
            let samples = table.samples_for(horizon, interpolator.transform());
            interpolator.interpolate_masked(&samples, mask, horizon)
        })
        .collect()
}
