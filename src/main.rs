mod clients;
mod error;
mod extract;
mod query;
mod stream;
mod types;

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use color_eyre::eyre::Result;
use tracing::info;

use clients::{post_query, DEFAULT_OVERPASS_URL, HTTP, OVERPASS_URL};
use query::{BoundingBox, Query};
use stream::sink::NdjsonSink;
use types::overpass::OverpassResponse;

const NODES_FILE: &str = "nodes.json";
const WAYS_FILE: &str = "ways.ndjson";

// Temecula
const BBOX: BoundingBox = BoundingBox {
    south: 33.48,
    west: -117.18,
    north: 33.52,
    east: -117.12,
};
const TIMEOUT_SECS: u32 = 90;

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt::init();

    OVERPASS_URL
        .set(
            std::env::var("OVERPASS_PROBE_URL")
                .unwrap_or_else(|_| DEFAULT_OVERPASS_URL.to_string()),
        )
        .unwrap();
    HTTP.set(reqwest::blocking::Client::new()).unwrap();

    if std::env::args().any(|arg| arg == "--stream") {
        stream_ways()
    } else {
        fetch_nodes()
    }
}

/// Whole-document pipeline: materialize the response, reduce every node to
/// `id -> (name, (lat, lon))`, write one indented JSON object.
fn fetch_nodes() -> Result<()> {
    let query = Query::new(BBOX, TIMEOUT_SECS, &["node[amenity]", "way[highway=primary]"])?;
    info!("Query: {}", query.as_str());
    let response: OverpassResponse = post_query(query.as_str())?.json()?;
    let nodes = extract::named_nodes(&response)?;
    extract::write_json_file(Path::new(NODES_FILE), &nodes)?;
    info!("Wrote {} nodes to {}", nodes.len(), NODES_FILE);
    Ok(())
}

/// Streaming pipeline: consume the response body incrementally, appending one
/// NDJSON record per element as it completes.
fn stream_ways() -> Result<()> {
    let query = Query::new(BBOX, TIMEOUT_SECS, &["node[amenity]", "way[highway=secondary]"])?;
    info!("Query: {}", query.as_str());
    let response = post_query(query.as_str())?;
    let mut sink = NdjsonSink::new(BufWriter::new(File::create(WAYS_FILE)?));
    stream::extract_elements(BufReader::new(response), &mut sink)?;
    info!("Wrote {} records to {}", sink.records(), WAYS_FILE);
    Ok(())
}
