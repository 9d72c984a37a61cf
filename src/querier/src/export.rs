//! JSON export/import for log streams and alert events.
//!
//! Round-trip safe: exporting a collection and re-parsing it yields an
//! equal-value collection with order preserved. Both a single JSON document
//! and newline-delimited JSON are supported.

use common::model::alert::AlertEvent;
use common::model::log::LogEntry;

use crate::error::QuerierError;

pub fn logs_to_json(entries: &[LogEntry]) -> Result<String, QuerierError> {
    Ok(serde_json::to_string_pretty(entries)?)
}

pub fn logs_from_json(payload: &str) -> Result<Vec<LogEntry>, QuerierError> {
    Ok(serde_json::from_str(payload)?)
}

pub fn logs_to_ndjson(entries: &[LogEntry]) -> Result<String, QuerierError> {
    let mut lines = Vec::with_capacity(entries.len());
    for entry in entries {
        lines.push(serde_json::to_string(entry)?);
    }
    Ok(lines.join("\n"))
}

pub fn logs_from_ndjson(payload: &str) -> Result<Vec<LogEntry>, QuerierError> {
    payload
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| Ok(serde_json::from_str(line)?))
        .collect()
}

pub fn events_to_json(events: &[AlertEvent]) -> Result<String, QuerierError> {
    Ok(serde_json::to_string_pretty(events)?)
}

pub fn events_from_json(payload: &str) -> Result<Vec<AlertEvent>, QuerierError> {
    Ok(serde_json::from_str(payload)?)
}
