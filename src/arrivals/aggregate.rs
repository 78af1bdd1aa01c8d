use serde::Serialize;
use serde::ser::SerializeMap;
use std::collections::{BTreeMap, HashSet};

use super::types::{DirectionFilter, ResolvedArrival, route_key};
use crate::station_index::{MatchMode, ResolvedStation, StopTargets};

pub const DEFAULT_MAX_PER_ROUTE: usize = 5;
pub const MAX_PER_ROUTE_LIMIT: usize = 10;

/// Filtering and trimming rules for one aggregation run.
#[derive(Debug, Clone)]
pub struct AggregationPolicy {
    pub max_per_route: usize,
    /// Seconds of lookback; `0` keeps only arrivals at or after now.
    pub window_seconds: i64,
    /// Routes to keep. `None` keeps every route.
    pub routes: Option<HashSet<String>>,
    pub direction: DirectionFilter,
    pub match_mode: MatchMode,
    /// When false, approaching entries are kept beyond the per-route cap.
    pub approaching_counts_toward_cap: bool,
}

impl Default for AggregationPolicy {
    fn default() -> Self {
        Self {
            max_per_route: DEFAULT_MAX_PER_ROUTE,
            window_seconds: 0,
            routes: None,
            direction: DirectionFilter::Both,
            match_mode: MatchMode::Exact,
            approaching_counts_toward_cap: true,
        }
    }
}

/// What happened to an arrival offered to the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Accepted,
    RouteFiltered,
    DirectionFiltered,
    /// The stop id does not belong to any requested station.
    Unmatched,
    OutsideWindow,
}

/// Arrivals for one station, grouped by route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StationArrivals {
    pub name: String,
    pub routes: BTreeMap<String, Vec<ResolvedArrival>>,
}

impl StationArrivals {
    /// Every arrival of the station, across routes.
    pub fn arrivals(&self) -> impl Iterator<Item = &ResolvedArrival> {
        self.routes.values().flatten()
    }
}

/// Station → route → arrivals, with stations in request order.
///
/// Serializes as a JSON object keyed by station name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StationView {
    stations: Vec<StationArrivals>,
}

impl StationView {
    pub fn get(&self, name: &str) -> Option<&StationArrivals> {
        self.stations.iter().find(|s| s.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StationArrivals> {
        self.stations.iter()
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

impl Serialize for StationView {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.stations.len()))?;
        for station in &self.stations {
            map.serialize_entry(&station.name, &station.routes)?;
        }
        map.end()
    }
}

/// Groups resolved arrivals by requested station and route.
///
/// One aggregator lives for one run; arrivals from every source are offered
/// to it sequentially and [`ArrivalAggregator::finish`] sorts and trims.
pub struct ArrivalAggregator<'a> {
    targets: &'a StopTargets,
    policy: &'a AggregationPolicy,
    now: i64,
    stations: Vec<StationArrivals>,
}

impl<'a> ArrivalAggregator<'a> {
    pub fn new(
        stations: &[ResolvedStation],
        targets: &'a StopTargets,
        policy: &'a AggregationPolicy,
        now: i64,
    ) -> Self {
        Self {
            targets,
            policy,
            now,
            stations: stations
                .iter()
                .map(|s| StationArrivals {
                    name: s.name.clone(),
                    routes: BTreeMap::new(),
                })
                .collect(),
        }
    }

    pub fn offer(&mut self, arrival: ResolvedArrival) -> Offer {
        if let Some(routes) = &self.policy.routes {
            if !routes.contains(&route_key(&arrival.route)) {
                return Offer::RouteFiltered;
            }
        }

        if !self.policy.direction.matches(arrival.direction) {
            return Offer::DirectionFiltered;
        }

        let Some(pos) = self
            .targets
            .station_for(&arrival.stop_id, self.policy.match_mode)
        else {
            return Offer::Unmatched;
        };
        let Some(station) = self.stations.get_mut(pos) else {
            return Offer::Unmatched;
        };

        // Approaching entries have no epoch and always pass the window.
        if let Some(epoch) = arrival.arrival_epoch {
            if epoch < self.now - self.policy.window_seconds {
                return Offer::OutsideWindow;
            }
        }

        station
            .routes
            .entry(arrival.route.clone())
            .or_default()
            .push(arrival);
        Offer::Accepted
    }

    /// Sorts every route list and trims it to the per-route cap.
    ///
    /// Returns the view and the number of arrivals dropped by the cap.
    pub fn finish(self) -> (StationView, usize) {
        let cap = self.policy.max_per_route;
        let mut trimmed = 0;
        let mut stations = self.stations;

        for station in &mut stations {
            for list in station.routes.values_mut() {
                let before = list.len();
                trim_route(list, cap, self.policy.approaching_counts_toward_cap);
                trimmed += before - list.len();
            }
        }

        (StationView { stations }, trimmed)
    }
}

/// Sorts by epoch (unknown last, ties in arrival order) and applies the cap.
fn trim_route(list: &mut Vec<ResolvedArrival>, cap: usize, approaching_counts: bool) {
    list.sort_by_key(ResolvedArrival::sort_key);

    if approaching_counts {
        list.truncate(cap);
        return;
    }

    let timed = list.iter().filter(|a| a.arrival_epoch.is_some()).count();
    if timed > cap {
        list.drain(cap..timed);
    }
}
