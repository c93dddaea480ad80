//! Geographic <-> UTM conversion
//!
//! Projection math comes from `proj4rs`. Geographic coordinates are WGS84
//! degrees and planar coordinates are UTM metres in one configured zone;
//! `proj4rs` itself works in radians for geographic systems, so the
//! conversion happens at this boundary only.

use std::fmt;
use std::sync::Arc;

use proj4rs::proj::Proj;
use proj4rs::transform::transform;
use serde::{Deserialize, Serialize};

use crate::core_types::{Epsg, GeoCoord, PlanarPoint};
use crate::error::CoordError;

/// PROJ definition of WGS84 longitude/latitude (EPSG:4326)
const WGS84_LONLAT: &str = "+proj=longlat +datum=WGS84 +no_defs";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hemisphere {
    North,
    South,
}

/// A UTM zone and hemisphere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UtmZone {
    pub zone: u8,
    pub hemisphere: Hemisphere,
}

impl UtmZone {
    /// Validated constructor.
    pub fn new(zone: u8, hemisphere: Hemisphere) -> Result<Self, CoordError> {
        if !(1..=60).contains(&zone) {
            return Err(CoordError::InvalidZone(zone));
        }
        Ok(Self { zone, hemisphere })
    }

    /// Northern zone. `zone` must be in 1..=60.
    pub const fn north(zone: u8) -> Self {
        Self {
            zone,
            hemisphere: Hemisphere::North,
        }
    }

    /// Southern zone. `zone` must be in 1..=60.
    pub const fn south(zone: u8) -> Self {
        Self {
            zone,
            hemisphere: Hemisphere::South,
        }
    }

    /// Central meridian in degrees.
    pub fn central_meridian(&self) -> f64 {
        f64::from(self.zone) * 6.0 - 183.0
    }

    /// EPSG code of the WGS84 / UTM CRS (326xx north, 327xx south).
    pub fn epsg(&self) -> Epsg {
        let base = match self.hemisphere {
            Hemisphere::North => 32600,
            Hemisphere::South => 32700,
        };
        Epsg(base + u32::from(self.zone))
    }

    /// PROJ definition of the zone, as published for EPSG:326xx/327xx.
    pub fn proj_string(&self) -> String {
        let south = match self.hemisphere {
            Hemisphere::North => "",
            Hemisphere::South => " +south",
        };
        format!("+proj=utm +zone={}{south} +datum=WGS84 +units=m +no_defs", self.zone)
    }
}

impl Default for UtmZone {
    /// Zone 54N (EPSG:32654), covering Tokyo.
    fn default() -> Self {
        Self::north(54)
    }
}

struct Projections {
    geographic: Proj,
    planar: Proj,
}

/// Bidirectional WGS84 <-> UTM transform for one zone.
///
/// The parsed projections are shared, so clones are cheap and can move
/// across threads.
#[derive(Clone)]
pub struct CoordinateTransform {
    zone: UtmZone,
    projections: Arc<Projections>,
}

impl fmt::Debug for CoordinateTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoordinateTransform")
            .field("zone", &self.zone)
            .field("crs", &self.planar_crs())
            .finish_non_exhaustive()
    }
}

impl CoordinateTransform {
    /// # Errors
    ///
    /// `CoordError::InvalidZone` for a zone outside 1..=60 and
    /// `CoordError::Projection` if a PROJ definition is rejected.
    pub fn new(zone: UtmZone) -> Result<Self, CoordError> {
        let zone = UtmZone::new(zone.zone, zone.hemisphere)?;
        let geographic = parse_proj(WGS84_LONLAT)?;
        let planar = parse_proj(&zone.proj_string())?;
        Ok(Self {
            zone,
            projections: Arc::new(Projections { geographic, planar }),
        })
    }

    pub fn zone(&self) -> UtmZone {
        self.zone
    }

    /// CRS tag carried by every planar point this transform produces.
    pub fn planar_crs(&self) -> Epsg {
        self.zone.epsg()
    }

    /// Project a geographic coordinate to UTM easting/northing.
    pub fn to_planar(&self, coord: GeoCoord) -> Result<PlanarPoint, CoordError> {
        let GeoCoord { lat, lon } = coord;
        if !lat.is_finite() || lat.abs() > 90.0 {
            return Err(CoordError::InvalidLatitude(lat));
        }
        if !lon.is_finite() {
            return Err(CoordError::InvalidLongitude(lon));
        }

        let mut point = (lon.to_radians(), lat.to_radians(), 0.0);
        transform(&self.projections.geographic, &self.projections.planar, &mut point)
            .map_err(|e| CoordError::Projection(format!("({lat}, {lon}) to {}: {e:?}", self.planar_crs())))?;
        if !point.0.is_finite() || !point.1.is_finite() {
            return Err(CoordError::InvalidPlanar(point.0, point.1));
        }
        Ok(PlanarPoint::new(point.0, point.1, self.planar_crs()))
    }

    /// Inverse projection back to latitude/longitude.
    pub fn to_geographic(&self, point: PlanarPoint) -> Result<GeoCoord, CoordError> {
        self.check_crs(point.crs)?;
        self.xy_to_geographic(point.x, point.y)
    }

    /// Inverse projection for a raw easting/northing in this zone.
    pub fn xy_to_geographic(&self, x: f64, y: f64) -> Result<GeoCoord, CoordError> {
        if !x.is_finite() || !y.is_finite() {
            return Err(CoordError::InvalidPlanar(x, y));
        }

        let mut point = (x, y, 0.0);
        transform(&self.projections.planar, &self.projections.geographic, &mut point)
            .map_err(|e| CoordError::Projection(format!("({x}, {y}) from {}: {e:?}", self.planar_crs())))?;
        Ok(GeoCoord::new(point.1.to_degrees(), point.0.to_degrees()))
    }

    /// `Ok` when `crs` is the planar CRS of this transform.
    pub fn check_crs(&self, crs: Epsg) -> Result<(), CoordError> {
        if crs == self.planar_crs() {
            Ok(())
        } else {
            Err(CoordError::CrsMismatch {
                expected: self.planar_crs(),
                found: crs,
            })
        }
    }

    /// Batch forward projection.
    pub fn to_planar_many(&self, coords: &[GeoCoord]) -> Result<Vec<PlanarPoint>, CoordError> {
        coords.iter().map(|&c| self.to_planar(c)).collect()
    }

    /// Batch inverse projection.
    pub fn to_geographic_many(&self, points: &[PlanarPoint]) -> Result<Vec<GeoCoord>, CoordError> {
        points.iter().map(|&p| self.to_geographic(p)).collect()
    }
}

fn parse_proj(definition: &str) -> Result<Proj, CoordError> {
    Proj::from_proj_string(definition).map_err(|e| CoordError::Projection(format!("{definition}: {e:?}")))
}
