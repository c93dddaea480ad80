//! City boundary store
//!
//! Loads a polygon collection once at startup, reprojects every vertex to the
//! planar CRS and answers bounds/containment queries for the rest of the
//! process lifetime. Nothing here mutates after construction.

use std::path::Path;

use geo::{Area, BoundingRect, Contains, Coord, LineString, MultiPolygon, Point, Polygon};
use serde_json::Value;
use tracing::{debug, info};

use super::formats::{decode_polygons, RawPolygon};
use super::transform::CoordinateTransform;
use crate::core_types::{Bounds, Epsg, GeoCoord, PlanarPoint};
use crate::error::ConfigError;

/// Immutable planar boundary polygons with a cached bounding box.
#[derive(Debug, Clone)]
pub struct BoundaryStore {
    polygons: MultiPolygon<f64>,
    bounds: Bounds,
    crs: Epsg,
}

impl BoundaryStore {
    /// Load a GeoJSON or TopoJSON boundary file in lon/lat and reproject it.
    ///
    /// # Arguments
    ///
    /// * `path` - Boundary document on disk
    /// * `transform` - Projection into the planar CRS used for kriging
    ///
    /// # Errors
    ///
    /// `ConfigError::Read` if the file is missing, `ConfigError::Parse` if it
    /// is not JSON, `ConfigError::InvalidGeometry` for undecodable geometry and
    /// `ConfigError::EmptyBoundary` if no usable polygon remains.
    pub fn load(path: impl AsRef<Path>, transform: &CoordinateTransform) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let doc: Value = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let store = Self::from_document(&doc, transform)?;
        if store.is_empty() {
            return Err(ConfigError::EmptyBoundary {
                path: path.to_path_buf(),
            });
        }

        info!(
            path = %path.display(),
            polygons = store.polygon_count(),
            area_km2 = store.area() / 1e6,
            crs = %store.crs,
            "Loaded city boundary"
        );
        Ok(store)
    }

    /// Parse an in-memory boundary document. May return an empty store.
    pub fn from_document(doc: &Value, transform: &CoordinateTransform) -> Result<Self, ConfigError> {
        let raw = decode_polygons(doc).map_err(ConfigError::InvalidGeometry)?;
        let mut polygons = Vec::with_capacity(raw.len());
        for polygon in raw {
            if let Some(projected) = project_polygon(&polygon, transform)? {
                polygons.push(projected);
            } else {
                debug!("Skipping degenerate boundary polygon");
            }
        }
        Ok(Self::from_planar_polygons(MultiPolygon::new(polygons), transform.planar_crs()))
    }

    /// Parse a GeoJSON/TopoJSON string.
    pub fn from_geojson_str(text: &str, transform: &CoordinateTransform) -> Result<Self, ConfigError> {
        let doc: Value = serde_json::from_str(text)
            .map_err(|e| ConfigError::InvalidGeometry(e.to_string()))?;
        Self::from_document(&doc, transform)
    }

    /// Build directly from planar polygons (tests, synthetic domains).
    pub fn from_planar_polygons(polygons: impl Into<MultiPolygon<f64>>, crs: Epsg) -> Self {
        let polygons = polygons.into();
        let bounds = polygons.bounding_rect().map_or(Bounds::EMPTY, |rect| {
            Bounds::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
        });
        Self {
            polygons,
            bounds,
            crs,
        }
    }

    /// `(min_x, min_y, max_x, max_y)` over every polygon.
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn crs(&self) -> Epsg {
        self.crs
    }

    pub fn polygons(&self) -> &MultiPolygon<f64> {
        &self.polygons
    }

    pub fn polygon_count(&self) -> usize {
        self.polygons.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.0.is_empty()
    }

    /// Planar area in square metres, holes excluded.
    pub fn area(&self) -> f64 {
        self.polygons.unsigned_area()
    }

    /// Strict-interior containment. Points tagged with another CRS are never
    /// contained.
    pub fn contains(&self, point: &PlanarPoint) -> bool {
        point.crs == self.crs && self.contains_xy(point.x, point.y)
    }

    /// Containment for raw coordinates already known to be in this CRS.
    ///
    /// Points on an exterior or hole edge are outside.
    pub fn contains_xy(&self, x: f64, y: f64) -> bool {
        self.bounds.contains(x, y) && self.polygons.contains(&Point::new(x, y))
    }
}

fn project_polygon(
    rings: &RawPolygon,
    transform: &CoordinateTransform,
) -> Result<Option<Polygon<f64>>, ConfigError> {
    let mut projected = Vec::with_capacity(rings.len());
    for ring in rings {
        let vertices = ring
            .iter()
            .map(|&[lon, lat]| {
                transform
                    .to_planar(GeoCoord::new(lat, lon))
                    .map(|p| Coord { x: p.x, y: p.y })
            })
            .collect::<Result<Vec<_>, _>>()?;
        projected.push(ring_from_vertices(vertices));
    }

    let mut rings = projected.into_iter();
    let Some(Some(exterior)) = rings.next() else {
        return Ok(None);
    };
    let holes = rings.flatten().collect();
    Ok(Some(Polygon::new(exterior, holes)))
}

/// Closed ring, or `None` with fewer than three distinct vertices.
fn ring_from_vertices(mut vertices: Vec<Coord<f64>>) -> Option<LineString<f64>> {
    if vertices.len() > 1 && vertices.first() == vertices.last() {
        vertices.pop();
    }
    if vertices.len() < 3 {
        return None;
    }
    // Polygon::new closes the ring
    Some(LineString::new(vertices))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::UtmZone;

    fn transform() -> CoordinateTransform {
        CoordinateTransform::new(UtmZone::north(54)).unwrap()
    }

    fn square(min: f64, max: f64) -> LineString<f64> {
        LineString::from(vec![(min, min), (min, max), (max, max), (max, min), (min, min)])
    }

    const WARD: &str = r#"{
        "type": "Feature",
        "properties": {"name": "test ward"},
        "geometry": {
            "type": "Polygon",
            "coordinates": [[
                [139.70, 35.65], [139.80, 35.65], [139.80, 35.72],
                [139.70, 35.72], [139.70, 35.65]
            ]]
        }
    }"#;

    #[test]
    fn test_geojson_ward_contains_center() {
        let t = transform();
        let store = BoundaryStore::from_geojson_str(WARD, &t).unwrap();
        assert_eq!(store.polygon_count(), 1);
        assert_eq!(store.crs(), Epsg(32654));
        // Roughly 9 km by 7.8 km
        assert!(store.area() > 60e6 && store.area() < 80e6);

        let inside = t.to_planar(GeoCoord::new(35.68, 139.75)).unwrap();
        let outside = t.to_planar(GeoCoord::new(35.60, 139.75)).unwrap();
        assert!(store.contains(&inside));
        assert!(!store.contains(&outside));
    }

    #[test]
    fn test_bounds_cover_projected_vertices() {
        let t = transform();
        let store = BoundaryStore::from_geojson_str(WARD, &t).unwrap();
        let b = store.bounds();
        let sw = t.to_planar(GeoCoord::new(35.65, 139.70)).unwrap();
        assert!(b.min_x <= sw.x && sw.x <= b.max_x);
        assert!(b.min_y <= sw.y && sw.y <= b.max_y);
        assert!(b.width() > 8_000.0 && b.width() < 10_000.0);
    }

    #[test]
    fn test_foreign_crs_not_contained() {
        let store = BoundaryStore::from_planar_polygons(Polygon::new(square(0.0, 10.0), vec![]), Epsg(32654));
        assert!(store.contains(&PlanarPoint::new(5.0, 5.0, Epsg(32654))));
        assert!(!store.contains(&PlanarPoint::new(5.0, 5.0, Epsg(32653))));
    }

    #[test]
    fn test_edges_and_holes_excluded() {
        let store = BoundaryStore::from_planar_polygons(
            Polygon::new(square(0.0, 100.0), vec![square(40.0, 60.0)]),
            Epsg(32654),
        );
        assert_eq!(store.bounds(), Bounds::new(0.0, 0.0, 100.0, 100.0));
        assert_eq!(store.area(), 10000.0 - 400.0);

        assert!(store.contains_xy(20.0, 20.0));
        assert!(store.contains_xy(0.001, 99.999));
        // Exterior edge and vertex
        assert!(!store.contains_xy(0.0, 50.0));
        assert!(!store.contains_xy(100.0, 100.0));
        // Hole interior and hole edge
        assert!(!store.contains_xy(50.0, 50.0));
        assert!(!store.contains_xy(40.0, 50.0));
        assert!(!store.contains_xy(150.0, 50.0));
    }

    #[test]
    fn test_concave_polygon() {
        // L shape
        let ring = LineString::from(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 4.0), (4.0, 4.0), (4.0, 10.0), (0.0, 10.0)]);
        let store = BoundaryStore::from_planar_polygons(Polygon::new(ring, vec![]), Epsg(32654));
        assert!(store.contains_xy(2.0, 8.0));
        assert!(store.contains_xy(8.0, 2.0));
        assert!(!store.contains_xy(8.0, 8.0));
    }

    #[test]
    fn test_ring_needs_three_distinct_vertices() {
        let c = |x: f64, y: f64| Coord { x, y };
        assert!(ring_from_vertices(vec![c(0.0, 0.0), c(1.0, 1.0), c(0.0, 0.0)]).is_none());
        let ring = ring_from_vertices(vec![c(0.0, 0.0), c(1.0, 0.0), c(1.0, 1.0), c(0.0, 0.0)]).unwrap();
        assert_eq!(ring.0.len(), 3);
    }

    #[test]
    fn test_degenerate_polygon_skipped() {
        let doc = r#"{"type": "Polygon", "coordinates": [[[139.7, 35.6], [139.8, 35.6], [139.7, 35.6]]]}"#;
        let store = BoundaryStore::from_geojson_str(doc, &transform()).unwrap();
        assert!(store.is_empty());
        assert!(store.bounds().is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let err = BoundaryStore::load("/nonexistent/boundary.json", &transform()).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
