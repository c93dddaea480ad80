//! Service configuration
//!
//! Loaded once from a JSON file at startup. Every section has defaults, so an
//! empty object `{}` is a valid configuration for the Tokyo deployment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::geo::{Hemisphere, UtmZone};
use crate::grid::GridResolution;
use crate::kriging::KrigingConfig;
use crate::service::adapter::{FileAdapter, TableFormat};
use crate::service::pipeline::DEFAULT_ADAPTER_TIMEOUT_SECS;
use crate::service::query::DEFAULT_UTC_OFFSET_SECS;
use crate::service::scheduler::DEFAULT_PERIOD_SECS;

/// Input and output locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// GeoJSON or TopoJSON city boundary in lon/lat
    pub boundary: PathBuf,
    /// Forecast table written by the model
    pub forecast: PathBuf,
    /// `json` or `csv`; taken from the forecast file extension when unset
    pub forecast_format: Option<TableFormat>,
    /// Where to export each new snapshot, if anywhere
    pub snapshot_export: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            boundary: PathBuf::from("data/tokyo_special_ward_topo.json"),
            forecast: PathBuf::from("data/live_predictions.csv"),
            forecast_format: None,
            snapshot_export: None,
        }
    }
}

impl PathsConfig {
    /// Adapter reading the forecast table in its configured format.
    pub fn forecast_adapter(&self) -> FileAdapter {
        let adapter = FileAdapter::new(self.forecast.clone());
        match self.forecast_format {
            Some(format) => adapter.with_format(format),
            None => adapter,
        }
    }
}

/// Planar CRS for kriging.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    pub zone: u8,
    pub hemisphere: Hemisphere,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        let zone = UtmZone::default();
        Self {
            zone: zone.zone,
            hemisphere: zone.hemisphere,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub resolution: GridResolution,
}

/// Refresh timing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub period_secs: u64,
    pub adapter_timeout_secs: u64,
    pub run_on_start: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            period_secs: DEFAULT_PERIOD_SECS,
            adapter_timeout_secs: DEFAULT_ADAPTER_TIMEOUT_SECS,
            run_on_start: true,
        }
    }
}

impl ScheduleConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }

    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_secs(self.adapter_timeout_secs)
    }
}

/// Query presentation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Offset east of UTC used for horizon timestamps
    pub utc_offset_secs: i32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            utc_offset_secs: DEFAULT_UTC_OFFSET_SECS,
        }
    }
}

/// Complete service configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub paths: PathsConfig,
    pub projection: ProjectionConfig,
    pub grid: GridConfig,
    pub kriging: KrigingConfig,
    pub schedule: ScheduleConfig,
    pub query: QueryConfig,
}

impl ServiceConfig {
    /// Load and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the service cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.utm_zone()?;
        self.utc_offset()?;
        self.kriging.validate()?;

        let nodes = self.grid.resolution.nodes_per_axis();
        if !(2..=1000).contains(&nodes) {
            return Err(ConfigError::Invalid {
                key: "grid.resolution",
                value: nodes.to_string(),
                reason: "nodes per axis must be in 2..=1000",
            });
        }
        if self.schedule.period_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "schedule.period_secs",
                value: "0".to_owned(),
                reason: "must be positive",
            });
        }
        if self.schedule.adapter_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "schedule.adapter_timeout_secs",
                value: "0".to_owned(),
                reason: "must be positive",
            });
        }
        Ok(())
    }

    pub fn utm_zone(&self) -> Result<UtmZone, ConfigError> {
        UtmZone::new(self.projection.zone, self.projection.hemisphere).map_err(ConfigError::from)
    }

    pub fn utc_offset(&self) -> Result<FixedOffset, ConfigError> {
        FixedOffset::east_opt(self.query.utc_offset_secs).ok_or_else(|| ConfigError::Invalid {
            key: "query.utc_offset_secs",
            value: self.query.utc_offset_secs.to_string(),
            reason: "must be within one day",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::Horizon;

    #[test]
    fn test_empty_object_gives_defaults() {
        let config: ServiceConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert!(config.validate().is_ok());
        assert_eq!(config.utm_zone().unwrap().epsg().0, 32654);
        assert_eq!(config.grid.resolution.nodes_per_axis(), 50);
        assert_eq!(config.kriging.range, 10_000.0);
        assert_eq!(config.schedule.period(), Duration::from_secs(3600));
    }

    #[test]
    fn test_partial_sections() {
        let config: ServiceConfig = serde_json::from_str(
            r#"{
                "grid": {"resolution": "fine"},
                "kriging": {"nugget": 0.5, "overrides": {"t+4": {"range": 15000.0}}},
                "schedule": {"period_secs": 600}
            }"#,
        )
        .unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.grid.resolution, GridResolution::Fine);
        assert_eq!(config.kriging.parameters_for(Horizon::T4), (15_000.0, 0.5));
        assert_eq!(config.kriging.lag_count, 20);
        assert_eq!(config.schedule.adapter_timeout_secs, 30);
    }

    #[test]
    fn test_forecast_format_selection() {
        let config = ServiceConfig::default();
        assert_eq!(config.paths.forecast_adapter().format(), TableFormat::Csv);

        let config: ServiceConfig =
            serde_json::from_str(r#"{"paths": {"forecast": "out/forecast.json"}}"#).unwrap();
        assert_eq!(config.paths.forecast_adapter().format(), TableFormat::Json);

        let config: ServiceConfig = serde_json::from_str(
            r#"{"paths": {"forecast": "out/forecast.txt", "forecast_format": "csv"}}"#,
        )
        .unwrap();
        let adapter = config.paths.forecast_adapter();
        assert_eq!(adapter.format(), TableFormat::Csv);
        assert_eq!(adapter.path(), Path::new("out/forecast.txt"));
    }

    #[test]
    fn test_custom_resolution() {
        let config: ServiceConfig =
            serde_json::from_str(r#"{"grid": {"resolution": {"custom": 1}}}"#).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { key: "grid.resolution", .. })
        ));
    }

    #[test]
    fn test_invalid_values() {
        let mut config = ServiceConfig::default();
        config.projection.zone = 61;
        assert!(matches!(config.validate(), Err(ConfigError::Projection(_))));

        let mut config = ServiceConfig::default();
        config.schedule.period_secs = 0;
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.query.utc_offset_secs = 100_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service.json");
        std::fs::write(&path, r#"{"paths": {"boundary": "wards.json"}}"#).unwrap();
        let config = ServiceConfig::load(&path).unwrap();
        assert_eq!(config.paths.boundary, PathBuf::from("wards.json"));

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(ServiceConfig::load(&path), Err(ConfigError::Parse { .. })));
    }
}
