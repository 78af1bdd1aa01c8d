//! Request parameters and their validation.

use serde::Deserialize;
use std::collections::HashSet;

use crate::arrivals::aggregate::{DEFAULT_MAX_PER_ROUTE, MAX_PER_ROUTE_LIMIT};
use crate::arrivals::speech::DEFAULT_SPEECH_LIMIT;
use crate::arrivals::types::{DirectionFilter, route_key};

pub const MAX_SPEECH_LIMIT: i64 = 10;
pub const MAX_WINDOW_SECONDS: i64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("invalid {param} '{value}': expected N, S or both")]
    InvalidDirection { param: &'static str, value: String },
}

/// Raw parameters as an adapter receives them (query string, CLI flags).
/// List parameters are comma-separated.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestParams {
    pub station: Option<String>,
    pub stop_id: Option<String>,
    pub max_per_route: Option<i64>,
    pub window_seconds: Option<i64>,
    pub routes: Option<String>,
    pub direction: Option<String>,
    #[serde(default)]
    pub speech: bool,
    pub speech_limit: Option<i64>,
    pub speech_direction: Option<String>,
    #[serde(default)]
    pub diagnostics: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeechRequest {
    pub limit: usize,
    pub direction: DirectionFilter,
}

/// Validated request with every default and clamp applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrivalsRequest {
    pub stations: Vec<String>,
    pub stop_ids: Vec<String>,
    pub max_per_route: usize,
    pub window_seconds: i64,
    pub routes: Option<HashSet<String>>,
    pub direction: DirectionFilter,
    pub speech: Option<SpeechRequest>,
    pub diagnostics: bool,
}

impl Default for ArrivalsRequest {
    fn default() -> Self {
        Self {
            stations: Vec::new(),
            stop_ids: Vec::new(),
            max_per_route: DEFAULT_MAX_PER_ROUTE,
            window_seconds: 0,
            routes: None,
            direction: DirectionFilter::Both,
            speech: None,
            diagnostics: false,
        }
    }
}

/// Splits a comma-separated list, trimming items and dropping empty and
/// repeated ones. Order of first appearance is kept.
pub fn split_list(value: &str) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for item in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !items.iter().any(|existing| existing == item) {
            items.push(item.to_string());
        }
    }
    items
}

fn parse_direction(param: &'static str, value: Option<&str>) -> Result<Option<DirectionFilter>, RequestError> {
    match value {
        None => Ok(None),
        Some(v) => DirectionFilter::parse(v)
            .map(Some)
            .ok_or_else(|| RequestError::InvalidDirection {
                param,
                value: v.to_string(),
            }),
    }
}

impl ArrivalsRequest {
    pub fn from_params(params: &RequestParams) -> Result<Self, RequestError> {
        let direction = parse_direction("direction", params.direction.as_deref())?
            .unwrap_or_default();

        let speech = if params.speech {
            let speech_direction =
                parse_direction("speech_direction", params.speech_direction.as_deref())?
                    .unwrap_or(direction);
            let limit = params
                .speech_limit
                .unwrap_or(DEFAULT_SPEECH_LIMIT as i64)
                .clamp(1, MAX_SPEECH_LIMIT) as usize;
            Some(SpeechRequest {
                limit,
                direction: speech_direction,
            })
        } else {
            None
        };

        let routes = params
            .routes
            .as_deref()
            .map(|r| {
                split_list(r)
                    .into_iter()
                    .map(|route| route_key(&route))
                    .collect::<HashSet<_>>()
            })
            .filter(|r| !r.is_empty());

        Ok(Self {
            stations: params.station.as_deref().map(split_list).unwrap_or_default(),
            stop_ids: params.stop_id.as_deref().map(split_list).unwrap_or_default(),
            max_per_route: params
                .max_per_route
                .unwrap_or(DEFAULT_MAX_PER_ROUTE as i64)
                .clamp(1, MAX_PER_ROUTE_LIMIT as i64) as usize,
            window_seconds: params
                .window_seconds
                .unwrap_or(0)
                .clamp(0, MAX_WINDOW_SECONDS),
            routes,
            direction,
            speech,
            diagnostics: params.diagnostics,
        })
    }

    /// Requested routes, sorted, for echoing back in response metadata.
    pub fn sorted_routes(&self) -> Option<Vec<String>> {
        self.routes.as_ref().map(|routes| {
            let mut routes: Vec<String> = routes.iter().cloned().collect();
            routes.sort();
            routes
        })
    }
}
