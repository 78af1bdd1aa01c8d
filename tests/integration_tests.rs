use prost::Message;
use std::path::Path;
use subway_arrivals::arrivals::types::{DirectionFilter, Status};
use subway_arrivals::config::FeedSource;
use subway_arrivals::engine::{Engine, EngineError, EnginePolicy};
use subway_arrivals::fetch::BasicClient;
use subway_arrivals::gtfs_rt::trip_update::{StopTimeEvent, StopTimeUpdate};
use subway_arrivals::gtfs_rt::{FeedEntity, FeedHeader, FeedMessage, TripDescriptor, TripUpdate};
use subway_arrivals::output::write_json;
use subway_arrivals::parser::parse_feed;
use subway_arrivals::request::{ArrivalsRequest, RequestParams, SpeechRequest};
use subway_arrivals::sources::{SourceOutcome, fetch_sources};
use subway_arrivals::station_index::StationIndex;
use subway_arrivals::stats::FeedStats;
use subway_arrivals::stop_id::Direction;

const NOW: i64 = 1_700_000_000;

const STATIONS: &str = r#"{
    "High St": ["A40"],
    "Clark St": ["231"],
    "Flushing Av": ["G31"]
}"#;

fn trip(route: &str, updates: Vec<StopTimeUpdate>) -> FeedEntity {
    FeedEntity {
        id: format!("{route}-trip"),
        trip_update: Some(TripUpdate {
            trip: TripDescriptor {
                trip_id: Some(format!("{route}-trip")),
                route_id: Some(route.to_string()),
                ..Default::default()
            },
            stop_time_update: updates,
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn at(stop_id: &str, arrival: StopTimeEvent) -> StopTimeUpdate {
    StopTimeUpdate {
        stop_id: Some(stop_id.to_string()),
        arrival: Some(arrival),
        ..Default::default()
    }
}

fn timed(time: i64) -> StopTimeEvent {
    StopTimeEvent {
        time: Some(time),
        ..Default::default()
    }
}

fn feed(entities: Vec<FeedEntity>) -> FeedMessage {
    FeedMessage {
        header: FeedHeader {
            gtfs_realtime_version: "2.0".to_string(),
            timestamp: Some(NOW as u64),
            ..Default::default()
        },
        entity: entities,
    }
}

/// The three sample shards as they would arrive over the wire.
fn wire_shards() -> Vec<(&'static str, Vec<u8>)> {
    let ace = feed(vec![trip(
        "A",
        vec![
            at("A40N", timed(NOW + 300)),
            at("A40S", timed(NOW - 60)),
        ],
    )]);
    let irt = feed(vec![trip(
        "2",
        vec![at(
            "231S",
            StopTimeEvent {
                delay: Some(1_700_000_600),
                ..Default::default()
            },
        )],
    )]);
    let g = feed(vec![trip("G", vec![at("G31N", StopTimeEvent::default())])]);

    vec![
        ("ace", ace.encode_to_vec()),
        ("irt", irt.encode_to_vec()),
        ("g", g.encode_to_vec()),
    ]
}

fn decoded_outcomes() -> Vec<SourceOutcome> {
    wire_shards()
        .into_iter()
        .map(|(id, bytes)| SourceOutcome::ok(id, parse_feed(&bytes).unwrap()))
        .collect()
}

fn index() -> StationIndex {
    StationIndex::from_json(STATIONS).unwrap()
}

fn request(stations: &str) -> ArrivalsRequest {
    ArrivalsRequest::from_params(&RequestParams {
        station: Some(stations.to_string()),
        ..Default::default()
    })
    .unwrap()
}

#[test]
fn test_absolute_time_arrival() {
    let index = index();
    let engine = Engine::new(&index, EnginePolicy::default());

    let response = engine
        .run(&request("High St"), &decoded_outcomes(), NOW)
        .unwrap();
    let high_st = response.stations().unwrap().get("High St").unwrap();
    let a = &high_st.routes["A"];

    // A40S is a minute in the past and falls outside the zero window.
    assert_eq!(a.len(), 1);
    assert_eq!(a[0].stop_id, "A40N");
    assert_eq!(a[0].minutes_until, Some(5));
    assert_eq!(a[0].status, Status::Scheduled);
    assert_eq!(a[0].direction, Some(Direction::North));
    assert!(!a[0].used_fallback_time);
}

#[test]
fn test_window_keeps_recent_departures() {
    let index = index();
    let engine = Engine::new(&index, EnginePolicy::default());
    let req = ArrivalsRequest {
        window_seconds: 120,
        ..request("High St")
    };

    let response = engine.run(&req, &decoded_outcomes(), NOW).unwrap();
    let a = &response.stations().unwrap().get("High St").unwrap().routes["A"];
    assert_eq!(a.len(), 2);
    assert_eq!(a[0].stop_id, "A40S");
    assert_eq!(a[0].minutes_until, Some(0));
}

#[test]
fn test_delay_field_holding_epoch() {
    let index = index();
    let engine = Engine::new(&index, EnginePolicy::default());

    let response = engine
        .run(&request("Clark St"), &decoded_outcomes(), NOW)
        .unwrap();
    let two = &response.stations().unwrap().get("Clark St").unwrap().routes["2"];

    assert_eq!(two.len(), 1);
    assert!(two[0].used_fallback_time);
    assert_eq!(two[0].arrival_epoch, Some(1_700_000_600));
    assert_eq!(two[0].minutes_until, Some(10));
    assert_eq!(two[0].delay_seconds, None);
}

#[test]
fn test_untimed_arrival_is_approaching() {
    let index = index();
    let engine = Engine::new(&index, EnginePolicy::default());

    let response = engine
        .run(&request("Flushing Av"), &decoded_outcomes(), NOW)
        .unwrap();
    let g = &response.stations().unwrap().get("Flushing Av").unwrap().routes["G"];

    assert_eq!(g.len(), 1);
    assert_eq!(g[0].status, Status::Approaching);
    assert_eq!(g[0].arrival_epoch, None);
    assert_eq!(g[0].minutes_until, None);
}

#[test]
fn test_partial_resolution() {
    let index = index();
    let engine = Engine::new(&index, EnginePolicy::default());

    let response = engine
        .run(&request("Clark St,Bogus Station"), &decoded_outcomes(), NOW)
        .unwrap();
    let meta = response.meta();
    assert_eq!(meta.stations, vec!["Clark St"]);
    assert_eq!(meta.unknown_stations, vec!["Bogus Station"]);
    assert_eq!(meta.stop_ids, vec!["231"]);
    assert_eq!(meta.sources.ok, 3);
    assert!(response.stations().unwrap().get("Clark St").is_some());
}

#[test]
fn test_nothing_resolved() {
    let index = index();
    let engine = Engine::new(&index, EnginePolicy::default());

    let err = engine
        .run(&request("Bogus Station"), &decoded_outcomes(), NOW)
        .unwrap_err();
    assert!(matches!(err, EngineError::Unresolved { .. }));
}

#[test]
fn test_speech_with_no_arrivals_in_direction() {
    let index = index();
    let engine = Engine::new(&index, EnginePolicy::default());
    let req = ArrivalsRequest {
        speech: Some(SpeechRequest {
            limit: 2,
            direction: DirectionFilter::Only(Direction::North),
        }),
        ..request("Clark St,High St")
    };

    let response = engine.run(&req, &decoded_outcomes(), NOW).unwrap();
    assert_eq!(
        response.speech(),
        Some("Clark St: northbound none. High St: northbound A in 5 minutes.")
    );
}

#[test]
fn test_speech_direction_independent_of_structured_direction() {
    let index = StationIndex::from_json(r#"{"High St": ["A40"]}"#).unwrap();
    let engine = Engine::new(&index, EnginePolicy::default());
    let southbound = feed(vec![trip("A", vec![at("A40S", timed(NOW + 300))])]);
    let outcomes = vec![SourceOutcome::ok("ace", southbound)];

    let req = ArrivalsRequest::from_params(&RequestParams {
        station: Some("High St".to_string()),
        direction: Some("N".to_string()),
        speech: true,
        speech_direction: Some("S".to_string()),
        ..Default::default()
    })
    .unwrap();

    let response = engine.run(&req, &outcomes, NOW).unwrap();
    assert_eq!(response.speech(), Some("High St: southbound A in 5 minutes."));
    assert_eq!(response.meta().direction, "N");
}

#[test]
fn test_route_filter_ignores_case() {
    let index = index();
    let engine = Engine::new(&index, EnginePolicy::default());
    let req = ArrivalsRequest::from_params(&RequestParams {
        station: Some("High St".to_string()),
        routes: Some("a".to_string()),
        ..Default::default()
    })
    .unwrap();

    let response = engine.run(&req, &decoded_outcomes(), NOW).unwrap();
    assert_eq!(response.meta().routes, Some(vec!["A".to_string()]));
    assert_eq!(response.stations().unwrap().get("High St").unwrap().routes["A"].len(), 1);
}

#[test]
fn test_json_response_shape() {
    let index = index();
    let engine = Engine::new(&index, EnginePolicy::default());
    let req = ArrivalsRequest {
        diagnostics: true,
        ..request("High St,Flushing Av")
    };

    let response = engine.run(&req, &decoded_outcomes(), NOW).unwrap();
    let mut buf = Vec::new();
    write_json(&mut buf, &response).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&buf).unwrap();

    assert_eq!(json["meta"]["now"], NOW);
    assert_eq!(json["meta"]["direction"], "both");
    let high_st = &json["stations"]["High St"]["A"][0];
    assert_eq!(high_st["direction"], "N");
    assert_eq!(high_st["status"], "scheduled");
    assert_eq!(json["stations"]["Flushing Av"]["G"][0]["status"], "approaching");

    let diagnostics = &json["diagnostics"];
    assert_eq!(diagnostics["entities"], 3);
    assert_eq!(diagnostics["stop_time_updates"], 4);
    assert_eq!(diagnostics["approaching"], 1);
    assert_eq!(diagnostics["fallback_time"], 1);
    assert_eq!(diagnostics["dropped_by_window"], 1);
}

#[tokio::test]
async fn test_fetch_from_files_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let mut sources = Vec::new();
    for (id, bytes) in wire_shards() {
        let path = dir.path().join(format!("{id}.pb"));
        std::fs::write(&path, bytes).unwrap();
        sources.push(source(id, &path));
    }
    sources.push(source("missing", &dir.path().join("missing.pb")));
    let refs: Vec<&FeedSource> = sources.iter().collect();

    let client = BasicClient::new().unwrap();
    let outcomes = fetch_sources(&client, &refs).await;

    let index = index();
    let engine = Engine::new(&index, EnginePolicy::default());
    let response = engine.run(&request("High St"), &outcomes, NOW).unwrap();

    let meta = response.meta();
    assert_eq!(meta.sources.ok, 3);
    assert_eq!(meta.sources.failed.len(), 1);
    assert_eq!(meta.sources.failed[0].id, "missing");
    assert_eq!(
        response.stations().unwrap().get("High St").unwrap().routes["A"][0].minutes_until,
        Some(5)
    );
}

#[test]
fn test_feed_survey() {
    let (_, bytes) = wire_shards().remove(1);
    let stats = FeedStats::from_feed(&parse_feed(&bytes).unwrap());

    assert_eq!(stats.total_entities, 1);
    assert_eq!(stats.stop_time_updates, 1);
    assert_eq!(stats.epoch_like_delays, 1);
    assert_eq!(stats.without_time, 1);
}

fn source(id: &str, path: &Path) -> FeedSource {
    FeedSource {
        id: id.to_string(),
        url: path.display().to_string(),
        routes: vec![],
    }
}
