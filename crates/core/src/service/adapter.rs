//! Forecast adapters
//!
//! The forecasting model lives outside this crate. An adapter hands the
//! pipeline one table per cycle: a row per sensor with its location and a
//! value per horizon.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core_types::{ForecastTable, GeoCoord, Horizon, SensorObservation, StationId};
use crate::error::AdapterError;

/// Source of per-sensor, per-horizon forecast values.
#[async_trait]
pub trait ForecastAdapter: Send + Sync {
    /// Produce the table for one refresh cycle.
    async fn fetch(&self) -> Result<ForecastTable, AdapterError>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "forecast"
    }
}

// ============================================================================
// File adapter
// ============================================================================

/// One row of a forecast table file.
///
/// Horizon columns use the forecast model's names (`NO2_t`, `NO2_T+1`, ...)
/// and also accept horizon keys (`t0`, `t+1`, ...). Extra columns such as
/// `sensor_id`, measurement timestamps or a WKT `geometry` are ignored.
/// A null (JSON) or empty cell (CSV) is a missing value.
#[derive(Debug, Deserialize)]
struct ForecastRow {
    station_id: StationId,
    latitude: f64,
    longitude: f64,
    #[serde(rename = "NO2_t", alias = "t0", default)]
    t0: Option<f64>,
    #[serde(rename = "NO2_T+1", alias = "t+1", default)]
    t1: Option<f64>,
    #[serde(rename = "NO2_T+2", alias = "t+2", default)]
    t2: Option<f64>,
    #[serde(rename = "NO2_T+3", alias = "t+3", default)]
    t3: Option<f64>,
    #[serde(rename = "NO2_T+4", alias = "t+4", default)]
    t4: Option<f64>,
}

impl From<ForecastRow> for SensorObservation {
    fn from(row: ForecastRow) -> Self {
        let mut obs = SensorObservation::new(row.station_id, GeoCoord::new(row.latitude, row.longitude));
        for (horizon, value) in Horizon::ALL
            .into_iter()
            .zip([row.t0, row.t1, row.t2, row.t3, row.t4])
        {
            if let Some(v) = value {
                obs = obs.with_value(horizon, v);
            }
        }
        obs
    }
}

/// Decode a forecast table from a JSON array of rows.
pub fn parse_forecast_table(text: &str) -> Result<ForecastTable, AdapterError> {
    let rows: Vec<ForecastRow> =
        serde_json::from_str(text).map_err(|e| AdapterError::Malformed(e.to_string()))?;
    into_table(rows)
}

/// Decode a forecast table from CSV with a header row.
pub fn parse_forecast_csv(text: &str) -> Result<ForecastTable, AdapterError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let rows = reader
        .deserialize::<ForecastRow>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AdapterError::Malformed(e.to_string()))?;
    into_table(rows)
}

fn into_table(rows: Vec<ForecastRow>) -> Result<ForecastTable, AdapterError> {
    if rows.is_empty() {
        return Err(AdapterError::Empty);
    }
    Ok(ForecastTable::new(rows.into_iter().map(Into::into).collect()))
}

/// Encoding of a forecast table file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    #[default]
    Json,
    Csv,
}

impl TableFormat {
    /// `.csv` files are CSV; anything else is read as JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Self::Csv,
            _ => Self::Json,
        }
    }

    pub fn parse(self, text: &str) -> Result<ForecastTable, AdapterError> {
        match self {
            Self::Json => parse_forecast_table(text),
            Self::Csv => parse_forecast_csv(text),
        }
    }
}

/// Reads the forecast table the model writes to disk each cycle.
#[derive(Debug, Clone)]
pub struct FileAdapter {
    path: PathBuf,
    format: TableFormat,
}

impl FileAdapter {
    /// Adapter for `path`, with the format taken from its extension.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = TableFormat::from_path(&path);
        Self { path, format }
    }

    /// Override the format picked from the extension.
    pub fn with_format(mut self, format: TableFormat) -> Self {
        self.format = format;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> TableFormat {
        self.format
    }
}

#[async_trait]
impl ForecastAdapter for FileAdapter {
    async fn fetch(&self) -> Result<ForecastTable, AdapterError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| AdapterError::Unavailable(format!("{}: {e}", self.path.display())))?;
        let table = self.format.parse(&text)?;
        debug!(path = %self.path.display(), format = ?self.format, rows = table.len(), "Read forecast table");
        Ok(table)
    }

    fn name(&self) -> &str {
        match self.format {
            TableFormat::Json => "json-file",
            TableFormat::Csv => "csv-file",
        }
    }
}

// ============================================================================
// In-memory adapter
// ============================================================================

/// Serves a fixed table, optionally after a delay. Used for demos and tests.
#[derive(Debug, Default)]
pub struct StaticAdapter {
    table: RwLock<ForecastTable>,
    delay: Option<Duration>,
    fetches: AtomicUsize,
}

impl StaticAdapter {
    pub fn new(table: ForecastTable) -> Self {
        Self {
            table: RwLock::new(table),
            delay: None,
            fetches: AtomicUsize::new(0),
        }
    }

    /// Sleep this long (on the tokio clock) before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Table served from the next fetch on.
    pub fn replace(&self, table: ForecastTable) {
        *self.table.write() = table;
    }

    /// Number of fetches started so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ForecastAdapter for StaticAdapter {
    async fn fetch(&self) -> Result<ForecastTable, AdapterError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.table.read().clone())
    }

    fn name(&self) -> &str {
        "static"
    }
}
