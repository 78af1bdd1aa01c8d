//! Arrival time resolution.
//!
//! Precedence, first match wins:
//! 1. absolute arrival time, then absolute departure time (zero counts as absent);
//! 2. a delay value above [`EPOCH_GUESS_THRESHOLD`], read as an absolute time;
//! 3. nothing usable: the arrival is [`Status::Approaching`].

use serde::Deserialize;

use super::types::{EventTime, RawEvent, ResolvedArrival, Status};
use crate::stop_id;

/// 2005-01-01T00:00:00Z. Real delays never come near this many seconds.
pub const EPOCH_GUESS_THRESHOLD: i64 = 1_104_537_600;

/// Rounding applied to minutes-until values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MinutesRounding {
    #[default]
    Floor,
    Round,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimePolicy {
    /// Delay values strictly greater than this are treated as epochs.
    pub epoch_threshold: i64,
    /// Whether a delay may be reinterpreted as an epoch at all.
    pub delay_epoch_fallback: bool,
    pub rounding: MinutesRounding,
}

impl Default for TimePolicy {
    fn default() -> Self {
        Self {
            epoch_threshold: EPOCH_GUESS_THRESHOLD,
            delay_epoch_fallback: true,
            rounding: MinutesRounding::Floor,
        }
    }
}

/// Where a resolved epoch came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSource {
    Absolute(i64),
    DelayFallback(i64),
    /// No usable time; carries the raw delay, if any.
    Unknown { delay: Option<i64> },
}

/// Resolves arrival times relative to a fixed `now` for one run.
#[derive(Debug, Clone, Copy)]
pub struct TimeResolver {
    policy: TimePolicy,
    now: i64,
}

impl TimeResolver {
    pub fn new(policy: TimePolicy, now: i64) -> Self {
        Self { policy, now }
    }

    pub fn now(&self) -> i64 {
        self.now
    }

    /// Picks the single best arrival epoch for an event.
    pub fn time_source(&self, event: &RawEvent) -> TimeSource {
        let events = [event.arrival.as_ref(), event.departure.as_ref()];

        for ev in events.iter().flatten() {
            if let Some(time) = ev.time {
                if time != 0 {
                    return TimeSource::Absolute(time);
                }
            }
        }

        if self.policy.delay_epoch_fallback {
            for ev in events.iter().flatten() {
                if let Some(delay) = ev.delay {
                    if i64::from(delay) > self.policy.epoch_threshold {
                        return TimeSource::DelayFallback(i64::from(delay));
                    }
                }
            }
        }

        TimeSource::Unknown {
            delay: first_delay(&events),
        }
    }

    /// Whole minutes from now until `epoch`, never negative.
    pub fn minutes_until(&self, epoch: i64) -> i64 {
        let seconds = epoch.saturating_sub(self.now);
        let minutes = match self.policy.rounding {
            MinutesRounding::Floor => seconds.div_euclid(60),
            MinutesRounding::Round => (seconds as f64 / 60.0).round() as i64,
        };
        minutes.max(0)
    }

    /// Builds a [`ResolvedArrival`], or `None` when the event has no stop id
    /// or no route to group it under.
    pub fn resolve(&self, event: &RawEvent) -> Option<ResolvedArrival> {
        let stop_id = event.stop_id.as_deref().filter(|s| !s.is_empty())?;
        let route = event.route.as_deref().filter(|r| !r.is_empty())?;

        let (arrival_epoch, used_fallback_time, delay_seconds) = match self.time_source(event) {
            TimeSource::Absolute(epoch) => (Some(epoch), false, self.plain_delay(event)),
            TimeSource::DelayFallback(epoch) => (Some(epoch), true, None),
            TimeSource::Unknown { delay } => (None, false, delay),
        };

        Some(ResolvedArrival {
            stop_id: stop_id.to_string(),
            route: route.to_string(),
            direction: stop_id::direction(stop_id),
            arrival_epoch,
            minutes_until: arrival_epoch.map(|epoch| self.minutes_until(epoch)),
            status: if arrival_epoch.is_some() {
                Status::Scheduled
            } else {
                Status::Approaching
            },
            used_fallback_time,
            delay_seconds,
        })
    }

    /// First delay that reads as an actual delay rather than an epoch.
    fn plain_delay(&self, event: &RawEvent) -> Option<i64> {
        [event.arrival.as_ref(), event.departure.as_ref()]
            .iter()
            .flatten()
            .filter_map(|ev| ev.delay.map(i64::from))
            .find(|delay| *delay <= self.policy.epoch_threshold)
    }
}

fn first_delay(events: &[Option<&EventTime>]) -> Option<i64> {
    events
        .iter()
        .flatten()
        .find_map(|ev| ev.delay.map(i64::from))
}
