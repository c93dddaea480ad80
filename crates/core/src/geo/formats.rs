//! Boundary document decoding
//!
//! Supports GeoJSON (`FeatureCollection`, `Feature`, `GeometryCollection`,
//! `Polygon`, `MultiPolygon`) and TopoJSON topologies with optionally quantized,
//! delta-encoded arcs. Non-areal geometries are ignored.
//!
//! Output is a list of polygons, each a list of rings (exterior first) of
//! `[lon, lat]` vertices.

use serde_json::Value;

/// `[lon, lat]` rings of one polygon, exterior first.
pub type RawPolygon = Vec<Vec<[f64; 2]>>;

/// Decode any supported boundary document.
pub fn decode_polygons(doc: &Value) -> Result<Vec<RawPolygon>, String> {
    match doc.get("type").and_then(Value::as_str) {
        Some("Topology") => decode_topology(doc),
        Some(_) => {
            let mut out = Vec::new();
            collect_geojson(doc, &mut out)?;
            Ok(out)
        }
        None => Err("document has no \"type\" member".to_owned()),
    }
}

// ============================================================================
// GeoJSON
// ============================================================================

fn collect_geojson(node: &Value, out: &mut Vec<RawPolygon>) -> Result<(), String> {
    let kind = node.get("type").and_then(Value::as_str).unwrap_or_default();
    match kind {
        "FeatureCollection" => {
            for feature in array_member(node, "features")? {
                collect_geojson(feature, out)?;
            }
        }
        "Feature" => {
            if let Some(geometry) = node.get("geometry").filter(|g| !g.is_null()) {
                collect_geojson(geometry, out)?;
            }
        }
        "GeometryCollection" => {
            for geometry in array_member(node, "geometries")? {
                collect_geojson(geometry, out)?;
            }
        }
        "Polygon" => out.push(parse_rings(member(node, "coordinates")?)?),
        "MultiPolygon" => {
            for polygon in as_array(member(node, "coordinates")?)? {
                out.push(parse_rings(polygon)?);
            }
        }
        _ => {}
    }
    Ok(())
}

fn parse_rings(value: &Value) -> Result<RawPolygon, String> {
    as_array(value)?
        .iter()
        .map(|ring| as_array(ring)?.iter().map(parse_position).collect())
        .collect()
}

fn parse_position(value: &Value) -> Result<[f64; 2], String> {
    let pos = as_array(value)?;
    match (pos.first().and_then(Value::as_f64), pos.get(1).and_then(Value::as_f64)) {
        (Some(x), Some(y)) => Ok([x, y]),
        _ => Err(format!("invalid position {value}")),
    }
}

// ============================================================================
// TopoJSON
// ============================================================================

/// Quantization transform of a topology.
#[derive(Debug, Clone, Copy)]
struct Quantization {
    scale: [f64; 2],
    translate: [f64; 2],
}

fn decode_topology(doc: &Value) -> Result<Vec<RawPolygon>, String> {
    let quantization = match doc.get("transform") {
        Some(t) => Some(Quantization {
            scale: parse_position(member(t, "scale")?)?,
            translate: parse_position(member(t, "translate")?)?,
        }),
        None => None,
    };

    let arcs = array_member(doc, "arcs")?
        .iter()
        .map(|arc| decode_arc(arc, quantization))
        .collect::<Result<Vec<_>, _>>()?;

    let objects = member(doc, "objects")?
        .as_object()
        .ok_or("\"objects\" is not an object")?;

    let mut out = Vec::new();
    for object in objects.values() {
        collect_topology_object(object, &arcs, &mut out)?;
    }
    Ok(out)
}

/// Absolute coordinates of one arc.
fn decode_arc(arc: &Value, quantization: Option<Quantization>) -> Result<Vec<[f64; 2]>, String> {
    let positions = as_array(arc)?
        .iter()
        .map(parse_position)
        .collect::<Result<Vec<_>, _>>()?;

    let Some(q) = quantization else {
        return Ok(positions);
    };

    let mut x = 0.0;
    let mut y = 0.0;
    Ok(positions
        .into_iter()
        .map(|[dx, dy]| {
            x += dx;
            y += dy;
            [
                x * q.scale[0] + q.translate[0],
                y * q.scale[1] + q.translate[1],
            ]
        })
        .collect())
}

fn collect_topology_object(
    object: &Value,
    arcs: &[Vec<[f64; 2]>],
    out: &mut Vec<RawPolygon>,
) -> Result<(), String> {
    let kind = object.get("type").and_then(Value::as_str).unwrap_or_default();
    match kind {
        "GeometryCollection" => {
            for geometry in array_member(object, "geometries")? {
                collect_topology_object(geometry, arcs, out)?;
            }
        }
        "Polygon" => out.push(stitch_polygon(member(object, "arcs")?, arcs)?),
        "MultiPolygon" => {
            for polygon in as_array(member(object, "arcs")?)? {
                out.push(stitch_polygon(polygon, arcs)?);
            }
        }
        _ => {}
    }
    Ok(())
}

fn stitch_polygon(rings: &Value, arcs: &[Vec<[f64; 2]>]) -> Result<RawPolygon, String> {
    as_array(rings)?
        .iter()
        .map(|ring| stitch_ring(ring, arcs))
        .collect()
}

/// Concatenate arcs into one ring. A negative index `i` refers to arc `!i`
/// traversed backwards; the first vertex of each following arc repeats the
/// last vertex of the previous one and is skipped.
fn stitch_ring(ring: &Value, arcs: &[Vec<[f64; 2]>]) -> Result<Vec<[f64; 2]>, String> {
    let mut vertices: Vec<[f64; 2]> = Vec::new();
    for index in as_array(ring)? {
        let index = index
            .as_i64()
            .ok_or_else(|| format!("arc index {index} is not an integer"))?;
        let (arc_idx, reversed) = if index < 0 {
            ((!index) as usize, true)
        } else {
            (index as usize, false)
        };
        let arc = arcs
            .get(arc_idx)
            .ok_or_else(|| format!("arc index {index} out of range ({} arcs)", arcs.len()))?;

        let skip = usize::from(!vertices.is_empty());
        if reversed {
            vertices.extend(arc.iter().rev().skip(skip));
        } else {
            vertices.extend(arc.iter().skip(skip));
        }
    }
    Ok(vertices)
}

// ============================================================================
// JSON helpers
// ============================================================================

fn member<'a>(node: &'a Value, key: &str) -> Result<&'a Value, String> {
    node.get(key).ok_or_else(|| format!("missing \"{key}\" member"))
}

fn as_array(value: &Value) -> Result<&Vec<Value>, String> {
    value
        .as_array()
        .ok_or_else(|| format!("expected array, found {value}"))
}

fn array_member<'a>(node: &'a Value, key: &str) -> Result<&'a Vec<Value>, String> {
    as_array(member(node, key)?)
}
