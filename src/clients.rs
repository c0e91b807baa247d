use std::sync::OnceLock;
use std::time::Duration;

use color_eyre::eyre::{eyre, Result};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use tracing::warn;

pub const DEFAULT_OVERPASS_URL: &str = "https://overpass.private.coffee/api/interpreter";

pub static HTTP: OnceLock<Client> = OnceLock::new();
pub static OVERPASS_URL: OnceLock<String> = OnceLock::new();

pub fn get_http_client() -> Result<&'static Client> {
    HTTP.get().ok_or(eyre!("Failed to get http client"))
}

pub fn get_overpass_url() -> Result<&'static String> {
    OVERPASS_URL.get().ok_or(eyre!("Failed to get overpass url"))
}

/// POST the query as a `data` form field, asking for an identity-encoded body
/// so the response can be consumed incrementally. Waits out a single rate
/// limit before giving up.
pub fn post_query(query: &str) -> Result<Response> {
    let client = get_http_client()?;
    let url = get_overpass_url()?;
    let mut response = send(client, url, query)?;
    if response.status() == StatusCode::TOO_MANY_REQUESTS {
        warn!("Rate limited, waiting 5 seconds");
        std::thread::sleep(Duration::from_secs(5));
        response = send(client, url, query)?;
    }
    Ok(response.error_for_status()?)
}

fn send(client: &Client, url: &str, query: &str) -> Result<Response> {
    Ok(client
        .post(url)
        .header(reqwest::header::ACCEPT_ENCODING, "identity")
        .form(&[("data", query)])
        .send()?)
}
