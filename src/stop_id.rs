//! Stop identifier helpers.
//!
//! A directional stop id is a base stop id followed by an optional `N`/`S`
//! direction suffix, e.g. `A40N` is the northbound platform of base `A40`.

use serde::Serialize;

/// Travel direction derived from a stop id suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Direction {
    #[serde(rename = "N")]
    North,
    #[serde(rename = "S")]
    South,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::North => "N",
            Direction::South => "S",
        }
    }

    /// Word used when the direction is spoken.
    pub fn bound(self) -> &'static str {
        match self {
            Direction::North => "northbound",
            Direction::South => "southbound",
        }
    }
}

/// Returns the direction encoded in the trailing character of `stop_id`.
pub fn direction(stop_id: &str) -> Option<Direction> {
    match stop_id.as_bytes().last() {
        Some(b'N') => Some(Direction::North),
        Some(b'S') => Some(Direction::South),
        _ => None,
    }
}

/// Strips the direction suffix, if any.
///
/// A lone `N` or `S` is kept as-is so the base id is never empty.
pub fn base(stop_id: &str) -> &str {
    if stop_id.len() > 1 && direction(stop_id).is_some() {
        &stop_id[..stop_id.len() - 1]
    } else {
        stop_id
    }
}
