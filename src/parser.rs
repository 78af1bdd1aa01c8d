//! Protobuf parser for GTFS Realtime feeds and extraction of stop-time events.

use anyhow::Result;
use prost::Message;

use crate::arrivals::types::{EventTime, RawEvent};
use crate::gtfs_rt::FeedMessage;
use crate::gtfs_rt::trip_update::StopTimeEvent;
use crate::gtfs_rt::trip_update::stop_time_update::ScheduleRelationship;
use crate::stats::RunDiagnostics;

/// Decodes a protobuf-encoded GTFS-RT [`FeedMessage`] from raw bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not valid protobuf for a `FeedMessage`.
pub fn parse_feed(bytes: &[u8]) -> Result<FeedMessage> {
    Ok(FeedMessage::decode(bytes)?)
}

fn event_time(ev: &StopTimeEvent) -> EventTime {
    EventTime {
        time: ev.time,
        delay: ev.delay,
    }
}

/// Flattens every trip update of `feed` into one [`RawEvent`] per stop.
///
/// Deleted entities and skipped stops produce no events. Entity, trip update,
/// stop-time update and skip counts are added to `diagnostics`.
pub fn extract_events(feed: &FeedMessage, diagnostics: &mut RunDiagnostics) -> Vec<RawEvent> {
    let mut events = Vec::new();
    diagnostics.entities += feed.entity.len();

    for entity in &feed.entity {
        if entity.is_deleted == Some(true) {
            continue;
        }
        let Some(trip_update) = &entity.trip_update else {
            continue;
        };
        diagnostics.trip_updates += 1;

        for stu in &trip_update.stop_time_update {
            diagnostics.stop_time_updates += 1;

            if stu.schedule_relationship == Some(ScheduleRelationship::Skipped as i32) {
                diagnostics.skipped += 1;
                continue;
            }

            if let Some(stop_id) = &stu.stop_id {
                diagnostics.observe_stop_id(stop_id);
            }

            events.push(RawEvent {
                trip_id: trip_update.trip.trip_id.clone(),
                route: trip_update.trip.route_id.clone(),
                stop_id: stu.stop_id.clone(),
                arrival: stu.arrival.as_ref().map(event_time),
                departure: stu.departure.as_ref().map(event_time),
            });
        }
    }

    events
}
