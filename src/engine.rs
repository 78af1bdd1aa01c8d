//! Entry point of one arrivals run.
//!
//! A run resolves the requested stations, feeds every decoded stop-time
//! update of every successful source through time resolution and
//! aggregation, and shapes the response. All state is created per run.

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::arrivals::aggregate::{AggregationPolicy, ArrivalAggregator};
use crate::arrivals::speech::{self, SpeechPolicy};
use crate::arrivals::time::{MinutesRounding, TimePolicy, TimeResolver};
use crate::arrivals::types::Status;
use crate::output::{ArrivalsResponse, Meta, NamedEntries, SpeechMeta};
use crate::parser::extract_events;
use crate::request::ArrivalsRequest;
use crate::sources::{SourceOutcome, SourceSummary};
use crate::station_index::{MatchMode, Resolution, StationIndex};
use crate::stats::RunDiagnostics;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("no stop ids could be resolved (unknown stations: {})", .unknown_stations.join(", "))]
    Unresolved { unknown_stations: Vec<String> },
}

/// Deployment-level policy switches, fixed for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EnginePolicy {
    pub rounding: MinutesRounding,
    pub delay_epoch_fallback: bool,
    pub match_mode: MatchMode,
    pub approaching_counts_toward_cap: bool,
    pub collapse_repeated_routes: bool,
}

impl Default for EnginePolicy {
    fn default() -> Self {
        Self {
            rounding: MinutesRounding::Floor,
            delay_epoch_fallback: true,
            match_mode: MatchMode::Exact,
            approaching_counts_toward_cap: true,
            collapse_repeated_routes: true,
        }
    }
}

impl EnginePolicy {
    pub fn time_policy(&self) -> TimePolicy {
        TimePolicy {
            rounding: self.rounding,
            delay_epoch_fallback: self.delay_epoch_fallback,
            ..TimePolicy::default()
        }
    }
}

pub struct Engine<'a> {
    index: &'a StationIndex,
    policy: EnginePolicy,
}

impl<'a> Engine<'a> {
    pub fn new(index: &'a StationIndex, policy: EnginePolicy) -> Self {
        Self { index, policy }
    }

    /// Resolves station names and raw stop ids.
    ///
    /// Fails only when nothing at all resolved; unknown names alongside known
    /// ones are carried in the resolution.
    pub fn resolve(&self, request: &ArrivalsRequest) -> Result<Resolution, EngineError> {
        let resolution = self
            .index
            .resolve_request(&request.stations, &request.stop_ids);

        if resolution.targets.is_empty() {
            warn!(unknown = ?resolution.unknown_stations, "Request resolved to no stop ids");
            return Err(EngineError::Unresolved {
                unknown_stations: resolution.unknown_stations,
            });
        }

        debug!(
            stations = resolution.stations.len(),
            base_ids = resolution.targets.len(),
            unknown = resolution.unknown_stations.len(),
            "Request resolved"
        );
        Ok(resolution)
    }

    /// Aggregates settled source outcomes for an already resolved request.
    #[tracing::instrument(skip_all, fields(stations = resolution.stations.len(), sources = outcomes.len(), now = now))]
    pub fn aggregate(
        &self,
        request: &ArrivalsRequest,
        resolution: &Resolution,
        outcomes: &[SourceOutcome],
        now: i64,
    ) -> ArrivalsResponse {
        let resolver = TimeResolver::new(self.policy.time_policy(), now);
        let aggregation = AggregationPolicy {
            max_per_route: request.max_per_route,
            window_seconds: request.window_seconds,
            routes: request.routes.clone(),
            // Speech mode answers only in the speech direction, which may
            // differ from the structured one.
            direction: request.speech.map_or(request.direction, |s| s.direction),
            match_mode: self.policy.match_mode,
            approaching_counts_toward_cap: self.policy.approaching_counts_toward_cap,
        };

        let mut diagnostics = RunDiagnostics::default();
        let mut aggregator =
            ArrivalAggregator::new(&resolution.stations, &resolution.targets, &aggregation, now);

        for outcome in outcomes {
            let feed = match &outcome.result {
                Ok(feed) => feed,
                Err(reason) => {
                    debug!(source = %outcome.source_id, reason = %reason, "Skipping failed source");
                    continue;
                }
            };

            for event in extract_events(feed, &mut diagnostics) {
                let Some(arrival) = resolver.resolve(&event) else {
                    diagnostics.incomplete += 1;
                    continue;
                };

                if arrival.status == Status::Approaching {
                    diagnostics.approaching += 1;
                }
                if arrival.used_fallback_time {
                    diagnostics.fallback_time += 1;
                }

                diagnostics.record_offer(aggregator.offer(arrival));
            }
        }

        let (view, trimmed) = aggregator.finish();
        diagnostics.trimmed_by_cap = trimmed;

        info!(
            matched = diagnostics.matched,
            approaching = diagnostics.approaching,
            fallback_time = diagnostics.fallback_time,
            "Arrivals aggregated"
        );

        let meta = Meta {
            now,
            stations: resolution.stations.iter().map(|s| s.name.clone()).collect(),
            unknown_stations: resolution.unknown_stations.clone(),
            stop_ids: resolution.base_ids(),
            routes: request.sorted_routes(),
            direction: request.direction.as_str(),
            max_per_route: request.max_per_route,
            window_seconds: request.window_seconds,
            speech: request.speech.map(|s| SpeechMeta {
                limit: s.limit,
                direction: s.direction.as_str(),
            }),
            sources: SourceSummary::from_outcomes(outcomes),
        };
        let diagnostics = request.diagnostics.then_some(diagnostics);

        match request.speech {
            Some(speech_request) => {
                let policy = SpeechPolicy {
                    limit: speech_request.limit,
                    direction: speech_request.direction,
                    collapse_repeated_routes: self.policy.collapse_repeated_routes,
                };
                let speech = speech::render(&view, &policy);
                ArrivalsResponse::Speech {
                    meta,
                    speech: speech.text,
                    stations_speech: NamedEntries(speech.stations),
                    diagnostics,
                }
            }
            None => ArrivalsResponse::Stations {
                meta,
                stations: view,
                diagnostics,
            },
        }
    }

    /// Resolves and aggregates in one call.
    pub fn run(
        &self,
        request: &ArrivalsRequest,
        outcomes: &[SourceOutcome],
        now: i64,
    ) -> Result<ArrivalsResponse, EngineError> {
        let resolution = self.resolve(request)?;
        Ok(self.aggregate(request, &resolution, outcomes, now))
    }
}
