//! Service assembly
//!
//! Wires configuration, boundary, grid mask, interpolator, pipeline,
//! scheduler and query service together. The boundary is loaded and the grid
//! mask computed exactly once here; every cycle reuses them.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::adapter::ForecastAdapter;
use super::cache::PredictionCache;
use super::clock::{Clock, SystemClock};
use super::export::SnapshotExporter;
use super::pipeline::RefreshPipeline;
use super::query::QueryService;
use super::scheduler::RefreshScheduler;
use crate::config::ServiceConfig;
use crate::error::ConfigError;
use crate::geo::{BoundaryStore, CoordinateTransform};
use crate::grid::GridSpec;
use crate::kriging::SpatialInterpolator;

/// A fully assembled, not yet running, surface service.
pub struct SurfaceService {
    boundary: Arc<BoundaryStore>,
    grid: GridSpec,
    cache: Arc<PredictionCache>,
    scheduler: RefreshScheduler,
    query: QueryService,
}

impl SurfaceService {
    /// Validate `config`, load the boundary it names and assemble the service
    /// on the system clock.
    pub fn from_config(config: &ServiceConfig, adapter: Arc<dyn ForecastAdapter>) -> Result<Self, ConfigError> {
        config.validate()?;
        let transform = CoordinateTransform::new(config.utm_zone()?)?;
        let boundary = BoundaryStore::load(&config.paths.boundary, &transform)?;
        Self::assemble(config, boundary, adapter, Arc::new(SystemClock))
    }

    /// Assemble around an already loaded boundary.
    ///
    /// # Arguments
    ///
    /// * `config` - Service configuration, validated here
    /// * `boundary` - City boundary in the configured planar CRS
    /// * `adapter` - Forecast source
    /// * `clock` - Wall-clock source for ticks and snapshot timestamps
    pub fn assemble(
        config: &ServiceConfig,
        boundary: BoundaryStore,
        adapter: Arc<dyn ForecastAdapter>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let transform = CoordinateTransform::new(config.utm_zone()?)?;
        if boundary.crs() != transform.planar_crs() {
            return Err(ConfigError::Invalid {
                key: "projection.zone",
                value: transform.planar_crs().to_string(),
                reason: "boundary was projected into a different CRS",
            });
        }

        let grid = GridSpec::for_boundary(&boundary, config.grid.resolution)?;
        let mask = grid.masked_nodes(&boundary);
        let (nx, ny) = grid.dimensions();
        if mask.is_empty() {
            warn!(nx, ny, "No grid node falls inside the boundary, surfaces will be empty");
        }
        info!(
            nx,
            ny,
            inside = mask.len(),
            total = mask.total(),
            crs = %grid.crs(),
            "Grid mask computed"
        );

        let interpolator = SpatialInterpolator::new(config.kriging.clone(), transform);
        let cache = Arc::new(PredictionCache::new());

        let mut pipeline = RefreshPipeline::new(adapter, interpolator, mask, Arc::clone(&cache))
            .with_clock(clock)
            .with_adapter_timeout(config.schedule.adapter_timeout());
        if let Some(path) = &config.paths.snapshot_export {
            pipeline = pipeline.with_exporter(SnapshotExporter::new(path));
        }

        let scheduler =
            RefreshScheduler::with_settings(pipeline, config.schedule.period(), config.schedule.run_on_start);
        let query = QueryService::new(Arc::clone(&cache), scheduler.clone()).with_offset(config.utc_offset()?);

        Ok(Self {
            boundary: Arc::new(boundary),
            grid,
            cache,
            scheduler,
            query,
        })
    }

    pub fn boundary(&self) -> &Arc<BoundaryStore> {
        &self.boundary
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    pub fn cache(&self) -> &Arc<PredictionCache> {
        &self.cache
    }

    pub fn scheduler(&self) -> &RefreshScheduler {
        &self.scheduler
    }

    /// Handle for readers; cheap to clone.
    pub fn query(&self) -> QueryService {
        self.query.clone()
    }

    /// Start the scheduler loop on the current runtime.
    ///
    /// The returned task finishes after `shutdown` fires and any in-flight
    /// cycle has completed.
    pub fn spawn(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.scheduler.clone().run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::{Epsg, ForecastTable};
    use crate::service::adapter::StaticAdapter;
    use geo::{LineString, Polygon};

    fn square_boundary(crs: Epsg) -> BoundaryStore {
        let ring = LineString::from(vec![(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)]);
        BoundaryStore::from_planar_polygons(Polygon::new(ring, vec![]), crs)
    }

    #[test]
    fn test_assemble_rejects_crs_mismatch() {
        let adapter: Arc<dyn ForecastAdapter> = Arc::new(StaticAdapter::new(ForecastTable::default()));
        let result = SurfaceService::assemble(
            &ServiceConfig::default(),
            square_boundary(Epsg(32653)),
            adapter,
            Arc::new(SystemClock),
        );
        assert!(matches!(result, Err(ConfigError::Invalid { key: "projection.zone", .. })));
    }

    #[test]
    fn test_assemble_builds_grid() {
        let adapter: Arc<dyn ForecastAdapter> = Arc::new(StaticAdapter::new(ForecastTable::default()));
        let service = SurfaceService::assemble(
            &ServiceConfig::default(),
            square_boundary(Epsg(32654)),
            adapter,
            Arc::new(SystemClock),
        )
        .unwrap();
        assert_eq!(service.grid().dimensions(), (50, 50));
        assert!(!service.cache().is_ready());
        assert!(!service.query().live().is_ready());
    }
}
