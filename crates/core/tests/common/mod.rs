//! Shared fixtures for integration tests
#![allow(dead_code)]

use std::sync::Arc;

use surface_core::core_types::{ForecastTable, GeoCoord, Horizon, SensorObservation};
use surface_core::geo::{BoundaryStore, CoordinateTransform, UtmZone};
use surface_core::grid::{GridMask, GridResolution, GridSpec};
use surface_core::kriging::{KrigingConfig, SpatialInterpolator};
use surface_core::service::{ForecastAdapter, PredictionCache, RefreshPipeline};

/// Turn on log output for a test run with `RUST_LOG=debug cargo test`.
#[ctor::ctor]
fn init_tracing() {
    if std::env::var_os("RUST_LOG").is_some() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}

/// A block of central Tokyo, 139.70-139.80 E by 35.65-35.72 N.
pub const WARD_GEOJSON: &str = r#"{
    "type": "FeatureCollection",
    "features": [{
        "type": "Feature",
        "properties": {"ward": "test"},
        "geometry": {
            "type": "Polygon",
            "coordinates": [[
                [139.70, 35.65], [139.80, 35.65], [139.80, 35.72], [139.70, 35.72], [139.70, 35.65]
            ]]
        }
    }]
}"#;

/// Five stations spread over the ward: `(id, lat, lon, value)`.
pub const STATIONS: [(&str, f64, f64, f64); 5] = [
    ("shibuya", 35.660, 139.710, 12.0),
    ("koto", 35.660, 139.790, 25.0),
    ("shinjuku", 35.710, 139.720, 18.0),
    ("taito", 35.700, 139.780, 31.0),
    ("chiyoda", 35.685, 139.750, 20.0),
];

pub fn transform() -> CoordinateTransform {
    CoordinateTransform::new(UtmZone::default()).unwrap()
}

pub fn ward_boundary() -> BoundaryStore {
    BoundaryStore::from_geojson_str(WARD_GEOJSON, &transform()).unwrap()
}

pub fn ward_mask(boundary: &BoundaryStore) -> GridMask {
    GridSpec::for_boundary(boundary, GridResolution::Coarse)
        .unwrap()
        .masked_nodes(boundary)
}

/// Every station carries a value for every horizon, shifted by the horizon
/// offset so surfaces differ.
pub fn station_table() -> ForecastTable {
    ForecastTable::new(
        STATIONS
            .iter()
            .map(|&(id, lat, lon, value)| {
                Horizon::ALL.into_iter().fold(
                    SensorObservation::new(id, GeoCoord::new(lat, lon)),
                    |obs, h| obs.with_value(h, value + f64::from(h.offset_hours())),
                )
            })
            .collect(),
    )
}

pub fn pipeline(adapter: Arc<dyn ForecastAdapter>) -> RefreshPipeline {
    let boundary = ward_boundary();
    let mask = ward_mask(&boundary);
    let interpolator = SpatialInterpolator::new(KrigingConfig::default(), transform());
    RefreshPipeline::new(adapter, interpolator, mask, Arc::new(PredictionCache::new()))
}
