//! Short spoken summaries of aggregated arrivals.
//!
//! One sentence per station, e.g.
//! `"High St: northbound A in 3 minutes; in 9 minutes. southbound none."`

use super::aggregate::{StationArrivals, StationView};
use super::types::{DirectionFilter, ResolvedArrival};
use crate::stop_id::Direction;

pub const DEFAULT_SPEECH_LIMIT: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeechPolicy {
    /// Arrivals spoken per direction, independent of the per-route cap.
    pub limit: usize,
    pub direction: DirectionFilter,
    /// Drop the route name when it repeats the previous item's route.
    pub collapse_repeated_routes: bool,
}

impl Default for SpeechPolicy {
    fn default() -> Self {
        Self {
            limit: DEFAULT_SPEECH_LIMIT,
            direction: DirectionFilter::Both,
            collapse_repeated_routes: true,
        }
    }
}

/// Rendered speech for a whole view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Speech {
    /// Every station sentence, in request order, joined by spaces.
    pub text: String,
    pub stations: Vec<(String, String)>,
}

/// Minute phrase without the route: "now", "in 1 minute", "in 7 minutes",
/// or "approaching" when no time is known.
pub fn minutes_phrase(minutes: Option<i64>) -> String {
    match minutes {
        None => "approaching".to_string(),
        Some(m) if m <= 0 => "now".to_string(),
        Some(1) => "in 1 minute".to_string(),
        Some(m) => format!("in {m} minutes"),
    }
}

/// Picks the next `limit` arrivals of one direction across all routes.
fn direction_head(
    station: &StationArrivals,
    direction: Direction,
    limit: usize,
) -> Vec<&ResolvedArrival> {
    let mut arrivals: Vec<&ResolvedArrival> = station
        .arrivals()
        .filter(|a| a.direction == Some(direction))
        .collect();
    arrivals.sort_by_key(|a| a.sort_key());
    arrivals.truncate(limit);
    arrivals
}

fn direction_clause(station: &StationArrivals, direction: Direction, policy: &SpeechPolicy) -> String {
    let head = direction_head(station, direction, policy.limit);
    if head.is_empty() {
        return format!("{} none", direction.bound());
    }

    let mut items = Vec::with_capacity(head.len());
    let mut previous_route: Option<&str> = None;
    for arrival in head {
        let phrase = minutes_phrase(arrival.minutes_until);
        if policy.collapse_repeated_routes && previous_route == Some(arrival.route.as_str()) {
            items.push(phrase);
        } else {
            items.push(format!("{} {}", arrival.route, phrase));
        }
        previous_route = Some(arrival.route.as_str());
    }

    format!("{} {}", direction.bound(), items.join("; "))
}

/// Sentence for one station covering every direction the policy asks for.
pub fn station_sentence(station: &StationArrivals, policy: &SpeechPolicy) -> String {
    let clauses: Vec<String> = policy
        .direction
        .directions()
        .into_iter()
        .map(|direction| direction_clause(station, direction, policy))
        .collect();

    format!("{}: {}.", station.name, clauses.join(". "))
}

pub fn render(view: &StationView, policy: &SpeechPolicy) -> Speech {
    let stations: Vec<(String, String)> = view
        .iter()
        .map(|station| (station.name.clone(), station_sentence(station, policy)))
        .collect();

    let text = stations
        .iter()
        .map(|(_, sentence)| sentence.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    Speech { text, stations }
}
