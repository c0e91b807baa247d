pub mod sink;
pub mod tokenizer;

use std::io::{Read, Write};

use serde::Serialize;
use serde_json::Number;

use crate::error::ExtractError;
use crate::types::overpass::{OverpassBounds, OverpassCoord};
use sink::NdjsonSink;
use tokenizer::{JsonEvent, Tokenizer};

/// One streamed element, restricted to the fields the probe cares about.
/// Fields absent in the source stay absent in the output.
#[derive(Serialize, Debug, Default, Clone, PartialEq)]
pub struct WayRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<OverpassBounds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Vec<OverpassCoord>>,
}

impl WayRecord {
    fn is_empty(&self) -> bool {
        self.bounds.is_none()
            && self.id.is_none()
            && self.nodes.is_none()
            && self.geometry.is_none()
    }
}

/// Walk a `{ "elements": [ ... ] }` document token by token, appending one
/// record per element to the sink as soon as that element completes. Returns
/// the number of records written. Keys other than `elements` at the top level
/// are skipped, as are unrecognized fields inside an element.
pub fn extract_elements<R: Read, W: Write>(
    reader: R,
    sink: &mut NdjsonSink<W>,
) -> Result<usize, ExtractError> {
    let mut tokenizer = Tokenizer::new(reader);
    match require(&mut tokenizer)? {
        JsonEvent::BeginObject => {}
        other => return Err(unexpected("top-level object", &other)),
    }
    let mut total = 0;
    loop {
        match require(&mut tokenizer)? {
            JsonEvent::Key(key) if key == "elements" => {
                match require(&mut tokenizer)? {
                    JsonEvent::BeginArray => {}
                    other => return Err(unexpected("elements array", &other)),
                }
                loop {
                    match require(&mut tokenizer)? {
                        JsonEvent::BeginObject => total += read_element(&mut tokenizer, sink)?,
                        JsonEvent::EndArray => break,
                        other => {
                            return Err(unexpected("element object or end of array", &other))
                        }
                    }
                }
            }
            JsonEvent::Key(_) => skip_value(&mut tokenizer)?,
            JsonEvent::EndObject => break,
            other => return Err(unexpected("key or end of document", &other)),
        }
    }
    // catches trailing garbage after the document
    tokenizer.next_event()?;
    Ok(total)
}

enum BoundsField {
    MaxLat,
    MinLat,
    MaxLon,
    MinLon,
}

enum PointField {
    Lat,
    Lon,
}

#[derive(Default)]
struct BoundsAcc {
    maxlat: Option<f64>,
    minlat: Option<f64>,
    maxlon: Option<f64>,
    minlon: Option<f64>,
}

impl BoundsAcc {
    fn set(&mut self, field: BoundsField, value: f64) {
        match field {
            BoundsField::MaxLat => self.maxlat = Some(value),
            BoundsField::MinLat => self.minlat = Some(value),
            BoundsField::MaxLon => self.maxlon = Some(value),
            BoundsField::MinLon => self.minlon = Some(value),
        }
    }

    fn finish(self) -> Result<OverpassBounds, ExtractError> {
        match (self.maxlat, self.minlat, self.maxlon, self.minlon) {
            (Some(maxlat), Some(minlat), Some(maxlon), Some(minlon)) => Ok(OverpassBounds {
                maxlat,
                minlat,
                maxlon,
                minlon,
            }),
            _ => Err(ExtractError::Syntax(
                "bounds object missing an extremum".into(),
            )),
        }
    }
}

/// Where the traversal is inside the current element.
enum State {
    Element,
    IdValue,
    BoundsStart,
    InBounds(BoundsAcc),
    BoundsValue(BoundsAcc, BoundsField),
    NodesStart,
    InNodes(Vec<i64>),
    GeometryStart,
    InGeometry(Vec<OverpassCoord>),
    InPoint {
        points: Vec<OverpassCoord>,
        lat: Option<f64>,
        lon: Option<f64>,
    },
    PointValue {
        points: Vec<OverpassCoord>,
        lat: Option<f64>,
        lon: Option<f64>,
        field: PointField,
    },
}

/// Per-element state machine, entered right after the element's `{`. The
/// record is flushed the moment its geometry array closes (geometry is the
/// terminal field in `out geom` element order); an element that never closes
/// a geometry array flushes whatever it captured when the element itself
/// closes. Either way the accumulator is a fresh value per element.
fn read_element<R: Read, W: Write>(
    tokenizer: &mut Tokenizer<R>,
    sink: &mut NdjsonSink<W>,
) -> Result<usize, ExtractError> {
    let mut record = WayRecord::default();
    let mut state = State::Element;
    let mut flushed = 0usize;
    loop {
        let event = require(tokenizer)?;
        state = match (state, event) {
            (State::Element, JsonEvent::Key(key)) => match key.as_str() {
                "id" => State::IdValue,
                "bounds" => State::BoundsStart,
                "nodes" => State::NodesStart,
                "geometry" => State::GeometryStart,
                _ => {
                    skip_value(tokenizer)?;
                    State::Element
                }
            },
            (State::Element, JsonEvent::EndObject) => {
                if flushed == 0 && !record.is_empty() {
                    sink.append(&record)?;
                    flushed += 1;
                }
                return Ok(flushed);
            }
            (State::IdValue, JsonEvent::Num(n)) => {
                record.id = Some(integer(&n)?);
                State::Element
            }
            (State::BoundsStart, JsonEvent::BeginObject) => State::InBounds(BoundsAcc::default()),
            (State::InBounds(acc), JsonEvent::Key(key)) => match key.as_str() {
                "maxlat" => State::BoundsValue(acc, BoundsField::MaxLat),
                "minlat" => State::BoundsValue(acc, BoundsField::MinLat),
                "maxlon" => State::BoundsValue(acc, BoundsField::MaxLon),
                "minlon" => State::BoundsValue(acc, BoundsField::MinLon),
                _ => {
                    skip_value(tokenizer)?;
                    State::InBounds(acc)
                }
            },
            (State::BoundsValue(mut acc, field), JsonEvent::Num(n)) => {
                acc.set(field, float(&n)?);
                State::InBounds(acc)
            }
            (State::InBounds(acc), JsonEvent::EndObject) => {
                record.bounds = Some(acc.finish()?);
                State::Element
            }
            (State::NodesStart, JsonEvent::BeginArray) => State::InNodes(Vec::new()),
            (State::InNodes(mut ids), JsonEvent::Num(n)) => {
                ids.push(integer(&n)?);
                State::InNodes(ids)
            }
            (State::InNodes(ids), JsonEvent::EndArray) => {
                record.nodes = Some(ids);
                State::Element
            }
            (State::GeometryStart, JsonEvent::BeginArray) => State::InGeometry(Vec::new()),
            (State::InGeometry(points), JsonEvent::BeginObject) => State::InPoint {
                points,
                lat: None,
                lon: None,
            },
            (State::InGeometry(points), JsonEvent::EndArray) => {
                record.geometry = Some(points);
                sink.append(&record)?;
                flushed += 1;
                record = WayRecord::default();
                State::Element
            }
            (State::InPoint { points, lat, lon }, JsonEvent::Key(key)) => match key.as_str() {
                "lat" => State::PointValue {
                    points,
                    lat,
                    lon,
                    field: PointField::Lat,
                },
                "lon" => State::PointValue {
                    points,
                    lat,
                    lon,
                    field: PointField::Lon,
                },
                _ => {
                    skip_value(tokenizer)?;
                    State::InPoint { points, lat, lon }
                }
            },
            (
                State::PointValue {
                    points,
                    mut lat,
                    mut lon,
                    field,
                },
                JsonEvent::Num(n),
            ) => {
                match field {
                    PointField::Lat => lat = Some(float(&n)?),
                    PointField::Lon => lon = Some(float(&n)?),
                }
                State::InPoint { points, lat, lon }
            }
            (State::InPoint { mut points, lat, lon }, JsonEvent::EndObject) => {
                let (Some(lat), Some(lon)) = (lat, lon) else {
                    return Err(ExtractError::Syntax(
                        "geometry point missing lat or lon".into(),
                    ));
                };
                points.push(OverpassCoord { lat, lon });
                State::InGeometry(points)
            }
            (_, event) => return Err(unexpected("element field value", &event)),
        };
    }
}

/// Consume one complete value, whatever it is.
fn skip_value<R: Read>(tokenizer: &mut Tokenizer<R>) -> Result<(), ExtractError> {
    let mut depth = 0usize;
    loop {
        match require(tokenizer)? {
            JsonEvent::BeginObject | JsonEvent::BeginArray => depth += 1,
            JsonEvent::EndObject | JsonEvent::EndArray => {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            JsonEvent::Key(_) => {}
            _ => {
                if depth == 0 {
                    return Ok(());
                }
            }
        }
    }
}

fn require<R: Read>(tokenizer: &mut Tokenizer<R>) -> Result<JsonEvent, ExtractError> {
    tokenizer
        .next_event()?
        .ok_or_else(|| ExtractError::Syntax("unexpected end of input".into()))
}

fn unexpected(expected: &'static str, found: &JsonEvent) -> ExtractError {
    ExtractError::UnexpectedToken {
        expected,
        found: format!("{found:?}"),
    }
}

fn integer(n: &Number) -> Result<i64, ExtractError> {
    n.as_i64()
        .ok_or_else(|| ExtractError::Syntax(format!("expected an integer, got `{n}`")))
}

fn float(n: &Number) -> Result<f64, ExtractError> {
    n.as_f64()
        .ok_or_else(|| ExtractError::Syntax(format!("expected a float, got `{n}`")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn run(doc: &str) -> Result<(usize, Vec<serde_json::Value>), ExtractError> {
        let mut sink = NdjsonSink::new(Vec::new());
        let count = extract_elements(Cursor::new(doc), &mut sink)?;
        let lines = parse_lines(&sink.into_inner());
        Ok((count, lines))
    }

    fn parse_lines(bytes: &[u8]) -> Vec<serde_json::Value> {
        std::str::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    const HEADER: &str = r#""version": 0.6, "generator": "Overpass API",
        "osm3s": {"timestamp_osm_base": "2024-05-01T00:00:00Z", "copyright": "ODbL"}"#;

    #[test]
    fn reconstructs_full_way_element() {
        let doc = format!(
            r#"{{{HEADER}, "elements": [{{
                "type": "way", "id": 42,
                "bounds": {{"minlat": 0.0, "minlon": -1.0, "maxlat": 1.0, "maxlon": 2.0}},
                "nodes": [11, 22, 33],
                "geometry": [{{"lat": 1.0, "lon": 2.0}}, {{"lat": 3.0, "lon": 4.0}}],
                "tags": {{"highway": "secondary"}}
            }}]}}"#
        );
        let (count, lines) = run(&doc).unwrap();
        assert_eq!(count, 1);
        assert_eq!(lines.len(), 1);
        let record = lines[0].as_object().unwrap();
        assert_eq!(record["id"], 42);
        assert_eq!(record["nodes"], serde_json::json!([11, 22, 33]));
        assert_eq!(
            record["geometry"],
            serde_json::json!([{"lat": 1.0, "lon": 2.0}, {"lat": 3.0, "lon": 4.0}])
        );
        // bounds round-trip: exactly the four extrema, exactly those values
        assert_eq!(
            record["bounds"],
            serde_json::json!({"maxlat": 1.0, "minlat": 0.0, "maxlon": 2.0, "minlon": -1.0})
        );
        assert_eq!(record.len(), 4);
    }

    #[test]
    fn geometry_only_way_has_no_bounds_or_nodes_keys() {
        let doc = r#"{"elements": [{
            "type": "way", "id": 7,
            "geometry": [{"lat": 1.0, "lon": 2.0}, {"lat": 3.0, "lon": 4.0}]
        }]}"#;
        let (count, lines) = run(doc).unwrap();
        assert_eq!(count, 1);
        let record = lines[0].as_object().unwrap();
        let mut keys: Vec<_> = record.keys().collect();
        keys.sort();
        assert_eq!(keys, ["geometry", "id"]);
    }

    #[test]
    fn node_element_flushes_on_object_end() {
        let doc = r#"{"elements": [{
            "type": "node", "id": 5, "lat": 33.5, "lon": -117.15,
            "tags": {"amenity": "cafe", "name": "Café"}
        }]}"#;
        let (count, lines) = run(doc).unwrap();
        assert_eq!(count, 1);
        assert_eq!(lines[0], serde_json::json!({"id": 5}));
    }

    #[test]
    fn one_record_per_element() {
        let doc = r#"{"elements": [
            {"type": "way", "id": 1, "geometry": [{"lat": 1.0, "lon": 1.0}]},
            {"type": "node", "id": 2, "lat": 0.0, "lon": 0.0, "tags": {"name": "x"}},
            {"type": "way", "id": 3, "nodes": [9], "geometry": [{"lat": 2.0, "lon": 2.0}]}
        ]}"#;
        let (count, lines) = run(doc).unwrap();
        assert_eq!(count, 3);
        let ids: Vec<_> = lines.iter().map(|line| line["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, [1, 2, 3]);
    }

    #[test]
    fn skips_unknown_fields_without_disturbing_the_record() {
        let doc = r#"{"elements": [{
            "type": "way", "id": 8,
            "center": {"lat": 0.5, "lon": 0.5},
            "members": [{"role": "outer", "ref": 1}],
            "flag": true,
            "geometry": [{"lat": 1.0, "lon": 2.0, "ele": 120.5}]
        }]}"#;
        let (count, lines) = run(doc).unwrap();
        assert_eq!(count, 1);
        assert_eq!(
            lines[0],
            serde_json::json!({"id": 8, "geometry": [{"lat": 1.0, "lon": 2.0}]})
        );
    }

    #[test]
    fn empty_elements_array_writes_nothing() {
        let (count, lines) = run(r#"{"elements": []}"#).unwrap();
        assert_eq!(count, 0);
        assert!(lines.is_empty());
    }

    #[test]
    fn truncated_stream_leaves_valid_prefix() {
        let doc = r#"{"elements": [
            {"type": "way", "id": 1, "geometry": [{"lat": 1.0, "lon": 1.0}]},
            {"type": "way", "id": 2, "geometry": [{"lat": 2.0"#;
        let mut sink = NdjsonSink::new(Vec::new());
        let result = extract_elements(Cursor::new(doc), &mut sink);
        assert!(result.is_err());
        assert_eq!(sink.records(), 1);
        // every line already written is still a complete object
        let lines = parse_lines(&sink.into_inner());
        assert_eq!(lines, vec![serde_json::json!({"id": 1, "geometry": [{"lat": 1.0, "lon": 1.0}]})]);
    }

    #[test]
    fn rejects_non_integer_id() {
        let doc = r#"{"elements": [{"id": 1.5}]}"#;
        assert!(matches!(run(doc), Err(ExtractError::Syntax(_))));
    }

    #[test]
    fn rejects_schema_drift_inside_known_field() {
        // nodes holding strings instead of ids
        let doc = r#"{"elements": [{"id": 1, "nodes": ["a"]}]}"#;
        assert!(matches!(
            run(doc),
            Err(ExtractError::UnexpectedToken { .. })
        ));
    }
}
