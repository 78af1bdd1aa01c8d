//! Response shapes and persistence of feed statistics.
//!
//! Supports JSON output of arrivals responses and CSV append of per-feed
//! shape surveys.

use anyhow::Result;
use serde::Serialize;
use serde::ser::SerializeMap;
use tracing::{debug, info};

use crate::arrivals::aggregate::StationView;
use crate::sources::SourceSummary;
use crate::stats::{FeedStats, RunDiagnostics};
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Name → value pairs serialized as a JSON object in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamedEntries(pub Vec<(String, String)>);

impl NamedEntries {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

impl Serialize for NamedEntries {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpeechMeta {
    pub limit: usize,
    pub direction: &'static str,
}

/// Filters applied and how the request resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Meta {
    pub now: i64,
    pub stations: Vec<String>,
    pub unknown_stations: Vec<String>,
    pub stop_ids: Vec<String>,
    pub routes: Option<Vec<String>>,
    pub direction: &'static str,
    pub max_per_route: usize,
    pub window_seconds: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech: Option<SpeechMeta>,
    pub sources: SourceSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ArrivalsResponse {
    Stations {
        meta: Meta,
        stations: StationView,
        #[serde(skip_serializing_if = "Option::is_none")]
        diagnostics: Option<RunDiagnostics>,
    },
    Speech {
        meta: Meta,
        speech: String,
        stations_speech: NamedEntries,
        #[serde(skip_serializing_if = "Option::is_none")]
        diagnostics: Option<RunDiagnostics>,
    },
}

impl ArrivalsResponse {
    pub fn meta(&self) -> &Meta {
        match self {
            ArrivalsResponse::Stations { meta, .. } | ArrivalsResponse::Speech { meta, .. } => meta,
        }
    }

    pub fn stations(&self) -> Option<&StationView> {
        match self {
            ArrivalsResponse::Stations { stations, .. } => Some(stations),
            ArrivalsResponse::Speech { .. } => None,
        }
    }

    pub fn speech(&self) -> Option<&str> {
        match self {
            ArrivalsResponse::Speech { speech, .. } => Some(speech),
            ArrivalsResponse::Stations { .. } => None,
        }
    }

    pub fn diagnostics(&self) -> Option<&RunDiagnostics> {
        match self {
            ArrivalsResponse::Stations { diagnostics, .. }
            | ArrivalsResponse::Speech { diagnostics, .. } => diagnostics.as_ref(),
        }
    }
}

/// Writes a response as pretty-printed JSON followed by a newline.
pub fn write_json<W: Write>(mut writer: W, response: &ArrivalsResponse) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, response)?;
    writeln!(writer)?;
    Ok(())
}

/// Logs feed statistics as pretty-printed JSON.
pub fn print_json(stats: &FeedStats) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(stats)?);
    Ok(())
}

/// Appends a [`FeedStats`] record as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &str, feed_stats: &FeedStats) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    writer.serialize(feed_stats)?;
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::FeedStats;
    use std::fs;

    fn temp_path(dir: &tempfile::TempDir, name: &str) -> String {
        dir.path().join(name).display().to_string()
    }

    fn meta() -> Meta {
        Meta {
            now: 1_700_000_000,
            stations: vec!["High St".to_string()],
            unknown_stations: vec![],
            stop_ids: vec!["A40".to_string()],
            routes: None,
            direction: "both",
            max_per_route: 5,
            window_seconds: 0,
            speech: None,
            sources: SourceSummary::default(),
        }
    }

    #[test]
    fn test_print_json_does_not_panic() {
        let stats = FeedStats::default();
        print_json(&stats).unwrap();
    }

    #[test]
    fn test_named_entries_keep_order() {
        let entries = NamedEntries(vec![
            ("Zed".to_string(), "z".to_string()),
            ("Alpha".to_string(), "a".to_string()),
        ]);
        assert_eq!(serde_json::to_string(&entries).unwrap(), r#"{"Zed":"z","Alpha":"a"}"#);
        assert_eq!(entries.get("Alpha"), Some("a"));
    }

    #[test]
    fn test_speech_response_shape() {
        let response = ArrivalsResponse::Speech {
            meta: meta(),
            speech: "High St: northbound none.".to_string(),
            stations_speech: NamedEntries(vec![(
                "High St".to_string(),
                "High St: northbound none.".to_string(),
            )]),
            diagnostics: None,
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["speech"], "High St: northbound none.");
        assert_eq!(json["stations_speech"]["High St"], "High St: northbound none.");
        assert!(json.get("diagnostics").is_none());
        assert!(json["meta"].get("speech").is_none());
    }

    #[test]
    fn test_write_json_ends_with_newline() {
        let response = ArrivalsResponse::Stations {
            meta: meta(),
            stations: StationView::default(),
            diagnostics: Some(RunDiagnostics::default()),
        };
        let mut buf = Vec::new();
        write_json(&mut buf, &response).unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(text.ends_with("}\n"));
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["diagnostics"]["entities"], 0);
        assert_eq!(json["stations"], serde_json::json!({}));
    }

    #[test]
    fn test_append_record_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "diagnostics.csv");

        let stats = FeedStats::default();
        append_record(&path, &stats).unwrap();
        append_record(&path, &stats).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        // Header line should appear exactly once
        let header_count = content.lines().filter(|l| l.contains("timestamp")).count();
        assert_eq!(header_count, 1);
        // 1 header + 2 data rows
        assert_eq!(content.lines().count(), 3);
    }
}
