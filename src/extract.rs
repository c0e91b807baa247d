use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::ExtractError;
use crate::types::overpass::OverpassResponse;

/// Display-name candidates, in fallback order.
const NAME_TAGS: [&str; 4] = ["name", "short_name", "operator", "amenity"];

/// Serializes as `["name", [lat, lon]]`.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NamedNode(pub String, pub (f64, f64));

/// Reduce every node in the response to `id -> (name, (lat, lon))`. A node
/// with none of the candidate tags fails the whole run; last write wins if an
/// id repeats. The BTreeMap keeps key order deterministic across reruns.
pub fn named_nodes(response: &OverpassResponse) -> Result<BTreeMap<i64, NamedNode>, ExtractError> {
    let mut nodes = BTreeMap::new();
    for element in &response.elements {
        if element.element_type != "node" {
            continue;
        }
        let (Some(lat), Some(lon)) = (element.lat, element.lon) else {
            return Err(ExtractError::UnexpectedToken {
                expected: "lat/lon on node",
                found: format!("node {}", element.id),
            });
        };
        let name = NAME_TAGS
            .iter()
            .find_map(|tag| element.tags.get(*tag))
            .ok_or(ExtractError::MissingTag { id: element.id })?;
        nodes.insert(element.id, NamedNode(name.clone(), (lat, lon)));
    }
    Ok(nodes)
}

/// Write `value` as indented JSON, going through a temp file and a rename so
/// a crashed run never leaves a torn file behind.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), ExtractError> {
    let tmp = path.with_extension("tmp");
    let mut writer = BufWriter::new(File::create(&tmp)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
