//! Data types shared by the arrival pipeline.

use serde::Serialize;

use crate::stop_id::Direction;

/// Time fields of one arrival or departure event, as found in the feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventTime {
    /// Absolute time in seconds since the Unix epoch.
    pub time: Option<i64>,
    /// Nominally a delay in seconds; some producers put an absolute time here.
    pub delay: Option<i32>,
}

/// One (trip, stop) pair from a decoded trip update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEvent {
    pub trip_id: Option<String>,
    pub route: Option<String>,
    pub stop_id: Option<String>,
    pub arrival: Option<EventTime>,
    pub departure: Option<EventTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Scheduled,
    /// The train is coming but no arrival time could be resolved.
    Approaching,
}

/// A single arrival after time resolution. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedArrival {
    pub stop_id: String,
    pub route: String,
    pub direction: Option<Direction>,
    pub arrival_epoch: Option<i64>,
    pub minutes_until: Option<i64>,
    pub status: Status,
    pub used_fallback_time: bool,
    pub delay_seconds: Option<i64>,
}

impl ResolvedArrival {
    /// Ordering key: arrival epoch, with unknown times after every known one.
    pub fn sort_key(&self) -> i64 {
        self.arrival_epoch.unwrap_or(i64::MAX)
    }
}

/// Comparison form of a route id: trimmed and uppercased, so `"a"` in a
/// request or config matches route `"A"` in a feed.
pub fn route_key(route: &str) -> String {
    route.trim().to_ascii_uppercase()
}

/// Which directions a request asks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DirectionFilter {
    #[default]
    Both,
    Only(Direction),
}

impl DirectionFilter {
    /// Parses `N`, `S` or `both` (case-insensitive). Empty input means both.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "" | "BOTH" | "NS" | "ALL" => Some(DirectionFilter::Both),
            "N" | "NORTH" | "NORTHBOUND" => Some(DirectionFilter::Only(Direction::North)),
            "S" | "SOUTH" | "SOUTHBOUND" => Some(DirectionFilter::Only(Direction::South)),
            _ => None,
        }
    }

    pub fn matches(self, direction: Option<Direction>) -> bool {
        match self {
            DirectionFilter::Both => true,
            DirectionFilter::Only(wanted) => direction == Some(wanted),
        }
    }

    /// Directions covered, northbound first.
    pub fn directions(self) -> Vec<Direction> {
        match self {
            DirectionFilter::Both => vec![Direction::North, Direction::South],
            DirectionFilter::Only(direction) => vec![direction],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DirectionFilter::Both => "both",
            DirectionFilter::Only(direction) => direction.as_str(),
        }
    }
}
