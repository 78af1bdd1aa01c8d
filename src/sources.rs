//! Fan-out over independent feed sources.
//!
//! Every source is fetched and decoded concurrently; each yields exactly one
//! [`SourceOutcome`]. A failing source never affects the others.

use futures::future::join_all;
use serde::Serialize;
use std::time::Instant;
use tracing::{Instrument, debug, error, info, warn};

use crate::config::FeedSource;
use crate::fetch::{HttpClient, load_bytes};
use crate::gtfs_rt::FeedMessage;
use crate::parser::parse_feed;

/// Settled result of fetching one source.
#[derive(Debug, Clone)]
pub struct SourceOutcome {
    pub source_id: String,
    pub result: Result<FeedMessage, String>,
}

impl SourceOutcome {
    pub fn ok(source_id: impl Into<String>, feed: FeedMessage) -> Self {
        Self {
            source_id: source_id.into(),
            result: Ok(feed),
        }
    }

    pub fn failed(source_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            result: Err(reason.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    pub id: String,
    pub reason: String,
}

/// Success count and failure reasons across all sources of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    pub ok: usize,
    pub failed: Vec<SourceFailure>,
}

impl SourceSummary {
    pub fn from_outcomes(outcomes: &[SourceOutcome]) -> Self {
        let mut summary = SourceSummary::default();
        for outcome in outcomes {
            match &outcome.result {
                Ok(_) => summary.ok += 1,
                Err(reason) => summary.failed.push(SourceFailure {
                    id: outcome.source_id.clone(),
                    reason: reason.clone(),
                }),
            }
        }
        summary
    }
}

async fn fetch_source<C: HttpClient + ?Sized>(client: &C, source: &FeedSource) -> SourceOutcome {
    let fetch_start = Instant::now();

    let bytes = match load_bytes(client, &source.url).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(error = %e, "Feed fetch failed");
            return SourceOutcome::failed(&source.id, format!("fetch_error: {e:#}"));
        }
    };

    let elapsed = fetch_start.elapsed();
    if elapsed.as_secs() > 15 {
        warn!(elapsed_secs = elapsed.as_secs(), "Feed fetch was slow");
    }
    debug!(bytes = bytes.len(), "Feed bytes received, parsing");

    match parse_feed(&bytes) {
        Ok(feed) => {
            info!(entity_count = feed.entity.len(), "Feed parsed successfully");
            SourceOutcome::ok(&source.id, feed)
        }
        Err(e) => {
            error!(error = %e, "Feed parse failed");
            SourceOutcome::failed(&source.id, format!("parse_error: {e}"))
        }
    }
}

/// Fetches and decodes every source concurrently.
///
/// Outcomes come back in the order of `sources`, one per source.
#[tracing::instrument(skip_all, fields(source_count = sources.len()))]
pub async fn fetch_sources<C: HttpClient + ?Sized>(
    client: &C,
    sources: &[&FeedSource],
) -> Vec<SourceOutcome> {
    let tasks = sources.iter().map(|source| {
        let span = tracing::info_span!("process_feed", feed_id = %source.id);
        fetch_source(client, source).instrument(span)
    });

    let outcomes = join_all(tasks).await;

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    if failed > 0 {
        warn!(failed, total = outcomes.len(), "Some feed sources failed");
    }
    outcomes
}
