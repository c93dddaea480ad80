//! Boundary, forecast and configuration files on disk
mod common;

use std::path::Path;
use std::sync::Arc;

use approx::assert_abs_diff_eq;
use surface_core::core_types::{Horizon, StationId};
use surface_core::geo::BoundaryStore;
use surface_core::service::{FileAdapter, ForecastAdapter, LiveResponse, SurfaceService, TableFormat, TriggerSource};
use surface_core::{AdapterError, ConfigError, CycleError, ServiceConfig};

const WARD_TOPOJSON: &str = r#"{
    "type": "Topology",
    "transform": {"scale": [0.001, 0.001], "translate": [139.70, 35.65]},
    "arcs": [[[0, 0], [100, 0], [0, 70], [-100, 0], [0, -70]]],
    "objects": {
        "wards": {
            "type": "GeometryCollection",
            "geometries": [{"type": "Polygon", "arcs": [[0]], "properties": {"name": "test"}}]
        }
    }
}"#;

const FORECAST: &str = r#"[
    {"station_id": 101, "sensor_id": "a", "latitude": 35.660, "longitude": 139.710,
     "NO2_t": 12.0, "NO2_T+1": 13.0, "NO2_T+2": 14.0, "NO2_T+3": 15.0, "NO2_T+4": 16.0},
    {"station_id": 102, "sensor_id": "b", "latitude": 35.660, "longitude": 139.790,
     "NO2_t": 25.0, "NO2_T+1": 26.0, "NO2_T+2": 27.0, "NO2_T+3": 28.0, "NO2_T+4": 29.0},
    {"station_id": 103, "sensor_id": "c", "latitude": 35.710, "longitude": 139.720,
     "NO2_t": 18.0, "NO2_T+1": 19.0, "NO2_T+2": 20.0, "NO2_T+3": 21.0, "NO2_T+4": 22.0},
    {"station_id": 104, "sensor_id": "d", "latitude": 35.700, "longitude": 139.780,
     "NO2_t": 31.0, "NO2_T+1": 32.0, "NO2_T+2": 33.0, "NO2_T+3": 34.0, "NO2_T+4": 35.0},
    {"station_id": 105, "sensor_id": "e", "latitude": 35.685, "longitude": 139.750,
     "NO2_t": 20.0, "NO2_T+1": null, "NO2_T+2": 22.0, "NO2_T+3": 23.0, "NO2_T+4": 24.0}
]"#;

/// The model's CSV export: pandas index column, blank cells for missing
/// values and a WKT geometry column.
const FORECAST_CSV: &str = "\
,station_id,sensor_id,latitude,longitude,NO2_t,NO2_T+1,NO2_T+2,NO2_T+3,NO2_T+4,geometry
0,101,a,35.660,139.710,12.0,13.0,14.0,15.0,16.0,POINT (139.71 35.66)
1,102,b,35.660,139.790,25.0,26.0,27.0,28.0,29.0,POINT (139.79 35.66)
2,103,c,35.710,139.720,18.0,19.0,20.0,21.0,22.0,POINT (139.72 35.71)
3,104,d,35.700,139.780,31.0,32.0,33.0,34.0,35.0,POINT (139.78 35.7)
4,105,e,35.685,139.750,20.0,,22.0,23.0,24.0,POINT (139.75 35.685)
";

fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_topojson_matches_geojson() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "wards.topojson", WARD_TOPOJSON);

    let topo = BoundaryStore::load(&path, &common::transform()).unwrap();
    let geo = common::ward_boundary();
    assert_eq!(topo.polygon_count(), 1);
    assert_eq!(topo.crs(), geo.crs());

    let (a, b) = (topo.bounds(), geo.bounds());
    assert_abs_diff_eq!(a.min_x, b.min_x, epsilon = 1e-3);
    assert_abs_diff_eq!(a.min_y, b.min_y, epsilon = 1e-3);
    assert_abs_diff_eq!(a.max_x, b.max_x, epsilon = 1e-3);
    assert_abs_diff_eq!(a.max_y, b.max_y, epsilon = 1e-3);
}

#[test]
fn test_unusable_boundary_files() {
    let dir = tempfile::tempdir().unwrap();
    let transform = common::transform();

    let missing = dir.path().join("nope.json");
    assert!(matches!(
        BoundaryStore::load(&missing, &transform),
        Err(ConfigError::Read { .. })
    ));

    let garbage = write(dir.path(), "garbage.json", "<html>");
    assert!(matches!(
        BoundaryStore::load(&garbage, &transform),
        Err(ConfigError::Parse { .. })
    ));

    let points = write(
        dir.path(),
        "points.json",
        r#"{"type": "Feature", "geometry": {"type": "Point", "coordinates": [139.7, 35.6]}}"#,
    );
    assert!(matches!(
        BoundaryStore::load(&points, &transform),
        Err(ConfigError::EmptyBoundary { .. })
    ));
}

#[tokio::test]
async fn test_service_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let boundary = write(dir.path(), "wards.json", common::WARD_GEOJSON);
    let forecast = write(dir.path(), "live_predictions.json", FORECAST);
    let config_path = write(
        dir.path(),
        "service.json",
        &serde_json::json!({
            "paths": {
                "boundary": boundary,
                "forecast": forecast,
                "snapshot_export": dir.path().join("latest.json"),
            },
            "grid": {"resolution": "coarse"},
            "schedule": {"run_on_start": false},
        })
        .to_string(),
    );

    let config = ServiceConfig::load(&config_path).unwrap();
    let adapter = Arc::new(config.paths.forecast_adapter());
    let service = SurfaceService::from_config(&config, adapter).unwrap();
    assert_eq!(service.grid().dimensions(), (25, 25));

    let query = service.query();
    assert!(!query.live().is_ready());

    let report = service
        .scheduler()
        .run_now(TriggerSource::Manual)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.horizons.len(), 5);

    match query.live() {
        LiveResponse::Ready(map) => {
            let json = serde_json::to_value(&map).unwrap();
            let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
            assert_eq!(keys.len(), 5);
            assert!(json["t+1"].as_array().unwrap().iter().all(|p| p.as_array().unwrap().len() == 3));
        }
        LiveResponse::Processing { .. } => panic!("cycle did not publish"),
    }
    assert_eq!(query.timestamps_now().timestamps.len(), 5);
    assert!(dir.path().join("latest.json").exists());
}

#[tokio::test]
async fn test_missing_forecast_file_aborts_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = Arc::new(FileAdapter::new(dir.path().join("absent.json")));
    let pipeline = common::pipeline(adapter);

    assert!(matches!(
        pipeline.run_cycle().await,
        Err(CycleError::Adapter(AdapterError::Unavailable(_)))
    ));
    assert!(!pipeline.cache().is_ready());
}

#[test]
fn test_missing_boundary_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ServiceConfig::default();
    config.paths.boundary = dir.path().join("wards.json");

    let adapter = Arc::new(FileAdapter::new(dir.path().join("forecast.json")));
    assert!(matches!(
        SurfaceService::from_config(&config, adapter),
        Err(ConfigError::Read { .. })
    ));
}

#[tokio::test]
async fn test_csv_forecast_drives_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "live_predictions.csv", FORECAST_CSV);
    let adapter = FileAdapter::new(&path);
    assert_eq!(adapter.format(), TableFormat::Csv);

    let table = adapter.fetch().await.unwrap();
    assert_eq!(table.len(), 5);
    assert_eq!(table.rows[0].station_id, StationId::Numeric(101));
    assert_eq!(table.rows[4].value(Horizon::T1), None);
    assert_eq!(table.rows[4].value(Horizon::T2), Some(22.0));

    let pipeline = common::pipeline(Arc::new(adapter));
    let report = pipeline.run_cycle().await.unwrap();
    assert_eq!(report.horizons, Horizon::ALL.to_vec());

    let snapshot = pipeline.cache().get().unwrap();
    // The blank cell drops one sample from the T+1 fit only
    assert_eq!(snapshot.surface(Horizon::T1).unwrap().fit.samples, 4);
    assert_eq!(snapshot.surface(Horizon::T2).unwrap().fit.samples, 5);
}

#[tokio::test]
async fn test_configured_format_overrides_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "forecast.txt", FORECAST_CSV);

    let as_json = FileAdapter::new(&path);
    assert!(matches!(as_json.fetch().await, Err(AdapterError::Malformed(_))));

    let mut config = ServiceConfig::default();
    config.paths.forecast = path;
    config.paths.forecast_format = Some(TableFormat::Csv);
    assert_eq!(config.paths.forecast_adapter().fetch().await.unwrap().len(), 5);
}
