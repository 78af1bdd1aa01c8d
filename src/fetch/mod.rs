//! Feed transport: an [`HttpClient`] seam plus byte loading from URLs or files.

pub mod auth;
mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Context, Result, bail};
use tracing::debug;

/// Maximum accepted feed size (50 MiB).
pub const MAX_FEED_BYTES: usize = 50 * 1024 * 1024;

pub async fn fetch_bytes<C: HttpClient + ?Sized>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(
        reqwest::Method::GET,
        url.parse().with_context(|| format!("invalid feed url '{url}'"))?,
    );

    let mut resp = client.execute(req).await?;
    if !resp.status().is_success() {
        bail!("feed returned HTTP {}", resp.status());
    }

    if let Some(len) = resp.content_length() {
        if len > MAX_FEED_BYTES as u64 {
            bail!("feed too large: {len} bytes (max {MAX_FEED_BYTES} bytes)");
        }
    }

    // Content-Length may be absent or wrong; count while reading.
    let mut body = Vec::new();
    while let Some(chunk) = resp.chunk().await? {
        if body.len() + chunk.len() > MAX_FEED_BYTES {
            bail!("feed too large: over {MAX_FEED_BYTES} bytes");
        }
        body.extend_from_slice(&chunk);
    }

    Ok(body)
}

/// Loads feed data from a local file path or fetches it over HTTP.
pub async fn load_bytes<C: HttpClient + ?Sized>(client: &C, location: &str) -> Result<Vec<u8>> {
    if location.starts_with("http://") || location.starts_with("https://") {
        fetch_bytes(client, location).await
    } else {
        debug!(path = location, "Reading feed from file");
        tokio::fs::read(location)
            .await
            .with_context(|| format!("failed to read feed file '{location}'"))
    }
}
