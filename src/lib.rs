pub mod arrivals;
pub mod config;
pub mod engine;
pub mod fetch;
pub mod output;
pub mod parser;
pub mod request;
pub mod sources;
pub mod station_index;
pub mod stats;
pub mod stop_id;

pub mod gtfs_rt {
    include!(concat!(env!("OUT_DIR"), "/transit_realtime.rs"));
}
