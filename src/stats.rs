use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::arrivals::aggregate::Offer;
use crate::arrivals::time::EPOCH_GUESS_THRESHOLD;
use crate::gtfs_rt::FeedMessage;
use crate::gtfs_rt::trip_update::stop_time_update::ScheduleRelationship;

/// Maximum number of distinct raw stop ids kept in [`RunDiagnostics`].
pub const STOP_ID_SAMPLE_SIZE: usize = 20;

/// Shape survey of one decoded feed: which time fields its stop-time updates
/// actually carry. One row per fetch, appended to CSV to track drift.
#[derive(Debug, Default, Serialize)]
pub struct FeedStats {
    pub timestamp: DateTime<Utc>,
    pub feed_id: Option<String>,
    pub total_entities: usize,
    pub deleted_entities: usize,
    pub trip_updates: usize,
    pub with_route_id: usize,

    // stop-time update fields
    pub stop_time_updates: usize,
    pub with_stop_id: usize,
    pub with_arrival_time: usize,
    pub with_departure_time: usize,
    pub with_arrival_delay: usize,
    pub with_departure_delay: usize,
    pub epoch_like_delays: usize,
    pub without_time: usize,
    pub skipped_stops: usize,

    // error tracking
    pub error_type: Option<String>,
    pub error_message: Option<String>,
}

impl FeedStats {
    pub fn from_feed(feed: &FeedMessage) -> Self {
        let mut s = FeedStats {
            timestamp: Utc::now(),
            total_entities: feed.entity.len(),
            ..Default::default()
        };

        for e in &feed.entity {
            if e.is_deleted == Some(true) {
                s.deleted_entities += 1;
            }

            let Some(tu) = &e.trip_update else {
                continue;
            };
            s.trip_updates += 1;

            if tu.trip.route_id.is_some() {
                s.with_route_id += 1;
            }

            for stu in &tu.stop_time_update {
                s.stop_time_updates += 1;

                if stu.stop_id.is_some() {
                    s.with_stop_id += 1;
                }

                if stu.schedule_relationship == Some(ScheduleRelationship::Skipped as i32) {
                    s.skipped_stops += 1;
                }

                let mut has_time = false;

                if let Some(arrival) = &stu.arrival {
                    if arrival.time.is_some_and(|t| t != 0) {
                        s.with_arrival_time += 1;
                        has_time = true;
                    }
                    if let Some(delay) = arrival.delay {
                        s.with_arrival_delay += 1;
                        if i64::from(delay) > EPOCH_GUESS_THRESHOLD {
                            s.epoch_like_delays += 1;
                        }
                    }
                }

                if let Some(departure) = &stu.departure {
                    if departure.time.is_some_and(|t| t != 0) {
                        s.with_departure_time += 1;
                        has_time = true;
                    }
                    if let Some(delay) = departure.delay {
                        s.with_departure_delay += 1;
                        if i64::from(delay) > EPOCH_GUESS_THRESHOLD {
                            s.epoch_like_delays += 1;
                        }
                    }
                }

                if !has_time {
                    s.without_time += 1;
                }
            }
        }

        s
    }

    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    /// Share of stop-time updates carrying an absolute time.
    pub fn timed_pct(&self) -> f64 {
        Self::pct(
            self.stop_time_updates - self.without_time,
            self.stop_time_updates,
        )
    }

    /// Create an error record with timestamp and error information
    pub fn from_error(error_type: &str, error_message: &str) -> Self {
        FeedStats {
            timestamp: Utc::now(),
            error_type: Some(error_type.to_string()),
            error_message: Some(error_message.to_string()),
            ..Default::default()
        }
    }

    pub fn with_feed_id(mut self, feed_id: &str) -> Self {
        self.feed_id = Some(feed_id.to_string());
        self
    }
}

/// Opt-in counters for one arrivals run.
///
/// Collected on every run but only serialized when requested; they never
/// influence the arrivals themselves.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RunDiagnostics {
    pub entities: usize,
    pub trip_updates: usize,
    pub stop_time_updates: usize,
    pub approaching: usize,
    pub fallback_time: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub dropped_by_route: usize,
    pub dropped_by_direction: usize,
    pub dropped_by_window: usize,
    /// Stop-time updates missing a stop id or route.
    pub incomplete: usize,
    pub skipped: usize,
    pub trimmed_by_cap: usize,
    pub sample_stop_ids: Vec<String>,
}

impl RunDiagnostics {
    pub fn observe_stop_id(&mut self, stop_id: &str) {
        if self.sample_stop_ids.len() < STOP_ID_SAMPLE_SIZE
            && !self.sample_stop_ids.iter().any(|s| s == stop_id)
        {
            self.sample_stop_ids.push(stop_id.to_string());
        }
    }

    pub fn record_offer(&mut self, offer: Offer) {
        match offer {
            Offer::Accepted => self.matched += 1,
            Offer::Unmatched => self.unmatched += 1,
            Offer::RouteFiltered => self.dropped_by_route += 1,
            Offer::DirectionFiltered => self.dropped_by_direction += 1,
            Offer::OutsideWindow => self.dropped_by_window += 1,
        }
    }
}
