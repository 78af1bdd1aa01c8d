//! Station name → base stop id lookup.
//!
//! The index is precomputed offline and loaded once per process. It is never
//! mutated after loading; requests resolve against a shared reference.
//!
//! The file is a JSON object keyed by station name:
//! ```json
//! {
//!   "Clark St": ["231"],
//!   "times sq": { "name": "Times Sq-42 St", "stop_ids": ["127", "725", "902", "R16"] }
//! }
//! ```

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, warn};

use crate::stop_id;

/// Errors raised while loading the station index file.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("failed to read station index {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed station index {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IndexEntry {
    Ids(Vec<String>),
    Named { name: String, stop_ids: Vec<String> },
}

/// One station of the index: its display name and base stop ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationEntry {
    pub name: String,
    pub base_ids: Vec<String>,
}

/// Normalizes a station name for comparison.
///
/// Lowercases, collapses whitespace, and folds the word "street" into "st".
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let word = word.to_lowercase();
            if word == "street" { "st".to_string() } else { word }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Default)]
pub struct StationIndex {
    by_name: HashMap<String, StationEntry>,
    names_by_base: HashMap<String, String>,
}

impl StationIndex {
    /// Loads the index from a JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| IndexError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content).map_err(|source| IndexError::Json {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        let raw: HashMap<String, IndexEntry> = serde_json::from_str(content)?;
        // Sorted so conflicting display names resolve the same way on every load.
        let mut raw: Vec<_> = raw.into_iter().collect();
        raw.sort_by(|a, b| a.0.cmp(&b.0));

        let mut index = StationIndex::default();
        for (key, entry) in raw {
            match entry {
                IndexEntry::Ids(ids) => index.insert(&[key.as_str()], &key, &ids),
                IndexEntry::Named { name, stop_ids } => {
                    index.insert(&[key.as_str(), name.as_str()], &name, &stop_ids)
                }
            }
        }
        debug!(stations = index.len(), base_ids = index.names_by_base.len(), "Station index loaded");
        Ok(index)
    }

    /// Builds an index from `(display name, stop ids)` pairs.
    pub fn from_entries<I, N, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (N, Vec<S>)>,
        N: Into<String>,
        S: AsRef<str>,
    {
        let mut index = StationIndex::default();
        for (name, ids) in entries {
            let name = name.into();
            index.insert(&[name.as_str()], &name, &ids);
        }
        index
    }

    /// Registers `ids` under every lookup key in `keys`.
    ///
    /// Stop ids are reduced to their base form. Keys that normalize to an
    /// existing entry are merged into it; a base id keeps the first display
    /// name it was seen with.
    fn insert<S: AsRef<str>>(&mut self, keys: &[&str], station_name: &str, ids: &[S]) {
        let station_name = station_name.trim();
        let mut base_ids: Vec<String> = Vec::new();
        for id in ids {
            let base = stop_id::base(id.as_ref().trim());
            if !base.is_empty() && !base_ids.iter().any(|b| b == base) {
                base_ids.push(base.to_string());
            }
        }

        for key in keys {
            let key = normalize_name(key);
            if key.is_empty() {
                continue;
            }
            let entry = self.by_name.entry(key).or_insert_with(|| StationEntry {
                name: station_name.to_string(),
                base_ids: Vec::new(),
            });
            for base in &base_ids {
                if !entry.base_ids.contains(base) {
                    entry.base_ids.push(base.clone());
                }
            }
        }

        for base in base_ids {
            match self.names_by_base.get(&base) {
                Some(existing) if existing != station_name => {
                    warn!(base_id = %base, existing = %existing, ignored = station_name, "Base id mapped to two stations");
                }
                Some(_) => {}
                None => {
                    self.names_by_base.insert(base, station_name.to_string());
                }
            }
        }
    }

    /// Looks up a station by name (case, whitespace and "Street"/"St" insensitive).
    pub fn resolve(&self, name: &str) -> Option<&StationEntry> {
        self.by_name.get(&normalize_name(name))
    }

    /// Canonical display name of the station owning `base_id`.
    pub fn display_name(&self, base_id: &str) -> Option<&str> {
        self.names_by_base.get(base_id).map(String::as_str)
    }

    /// Number of distinct stations; aliases of one station count once.
    pub fn len(&self) -> usize {
        self.by_name
            .values()
            .map(|entry| entry.name.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Resolves the requested station names and raw stop ids into one set of
    /// stop targets.
    ///
    /// Names that are not in the index are reported in
    /// [`Resolution::unknown_stations`] instead of failing the request.
    pub fn resolve_request(&self, names: &[String], stop_ids: &[String]) -> Resolution {
        let mut resolution = Resolution::default();

        for name in names {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            match self.resolve(name) {
                Some(entry) => {
                    for base in &entry.base_ids {
                        resolution.add_target(&entry.name, base);
                    }
                    resolution.ensure_station(&entry.name);
                }
                None => {
                    debug!(station = name, "Unknown station");
                    if !resolution.unknown_stations.iter().any(|u| u == name) {
                        resolution.unknown_stations.push(name.to_string());
                    }
                }
            }
        }

        for raw in stop_ids {
            let base = stop_id::base(raw.trim());
            if base.is_empty() {
                continue;
            }
            let name = self.display_name(base).unwrap_or(base).to_string();
            resolution.add_target(&name, base);
        }

        resolution
    }
}

/// How a feed stop id is compared against requested base ids.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// The stop id minus its direction suffix equals the base id.
    #[default]
    Exact,
    /// The base id is a prefix of the stop id minus its direction suffix.
    Prefix,
}

/// A station requested by the caller, with the base ids it resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStation {
    pub name: String,
    pub base_ids: Vec<String>,
}

/// Requested base ids keyed for constant-time matching of feed stop ids.
#[derive(Debug, Default)]
pub struct StopTargets {
    station_by_base: HashMap<String, usize>,
}

impl StopTargets {
    pub fn is_empty(&self) -> bool {
        self.station_by_base.is_empty()
    }

    pub fn len(&self) -> usize {
        self.station_by_base.len()
    }

    /// Returns the position of the station a feed stop id belongs to.
    pub fn station_for(&self, raw_stop_id: &str, mode: MatchMode) -> Option<usize> {
        let stripped = stop_id::base(raw_stop_id);
        match mode {
            MatchMode::Exact => self.station_by_base.get(stripped).copied(),
            MatchMode::Prefix => (1..=stripped.len())
                .rev()
                .filter(|&end| stripped.is_char_boundary(end))
                .find_map(|end| self.station_by_base.get(&stripped[..end]).copied()),
        }
    }
}

/// Outcome of resolving one request's station names and stop ids.
#[derive(Debug, Default)]
pub struct Resolution {
    /// Stations in the order they were first requested.
    pub stations: Vec<ResolvedStation>,
    pub unknown_stations: Vec<String>,
    pub targets: StopTargets,
}

impl Resolution {
    fn ensure_station(&mut self, name: &str) -> usize {
        match self.stations.iter().position(|s| s.name == name) {
            Some(pos) => pos,
            None => {
                self.stations.push(ResolvedStation {
                    name: name.to_string(),
                    base_ids: Vec::new(),
                });
                self.stations.len() - 1
            }
        }
    }

    fn add_target(&mut self, name: &str, base: &str) {
        if self.targets.station_by_base.contains_key(base) {
            return;
        }
        let pos = self.ensure_station(name);
        self.stations[pos].base_ids.push(base.to_string());
        self.targets
            .station_by_base
            .insert(base.to_string(), pos);
    }

    /// All resolved base ids, sorted.
    pub fn base_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.targets.station_by_base.keys().cloned().collect();
        ids.sort();
        ids
    }
}
