//! Log search: level/service/trace filters, free-text and regex matching,
//! plus the per-result-set statistics the dashboard renders next to the
//! stream.

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use common::model::TimeWindow;
use common::model::log::{LogEntry, LogLevel};

use super::{Pagination, SortOrder};
use crate::error::QuerierError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogQuery {
    pub window: Option<TimeWindow>,
    pub service: Option<String>,
    /// Levels to include; empty means all levels
    pub levels: Vec<LogLevel>,
    /// Exact trace correlation filter
    pub trace_id: Option<String>,
    /// Case-insensitive substring match on the message
    pub contains: Option<String>,
    /// Regex match on the message; invalid patterns are an InvalidQuery
    pub regex: Option<String>,
    pub sort_order: SortOrder,
    pub pagination: Pagination,
}

/// Breakdown of the filtered (pre-pagination) match set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogStatistics {
    pub total: usize,
    pub by_level: HashMap<LogLevel, usize>,
    pub by_service: HashMap<String, usize>,
    /// ERROR and FATAL entries / total
    pub error_fraction: f64,
}

pub(crate) struct CompiledLogQuery<'a> {
    query: &'a LogQuery,
    regex: Option<Regex>,
    contains_lower: Option<String>,
}

impl<'a> CompiledLogQuery<'a> {
    pub(crate) fn compile(query: &'a LogQuery) -> Result<Self, QuerierError> {
        if let Some(window) = &query.window {
            if window.is_empty() {
                return Err(QuerierError::InvalidQuery(
                    "time range start must precede end".to_string(),
                ));
            }
        }
        let regex = match &query.regex {
            Some(pattern) => Some(Regex::new(pattern).map_err(|e| {
                QuerierError::InvalidQuery(format!("bad regex pattern: {e}"))
            })?),
            None => None,
        };
        Ok(Self {
            query,
            regex,
            contains_lower: query.contains.as_ref().map(|s| s.to_lowercase()),
        })
    }

    fn matches(&self, entry: &LogEntry) -> bool {
        if let Some(window) = &self.query.window {
            if !window.contains(entry.timestamp) {
                return false;
            }
        }
        if let Some(service) = &self.query.service {
            if &entry.service != service {
                return false;
            }
        }
        if !self.query.levels.is_empty() && !self.query.levels.contains(&entry.level) {
            return false;
        }
        if let Some(trace_id) = &self.query.trace_id {
            if entry.trace_id.as_deref() != Some(trace_id.as_str()) {
                return false;
            }
        }
        if let Some(needle) = &self.contains_lower {
            if !entry.message.to_lowercase().contains(needle) {
                return false;
            }
        }
        if let Some(regex) = &self.regex {
            if !regex.is_match(&entry.message) {
                return false;
            }
        }
        true
    }
}

/// Filter and sort the stream; the caller paginates.
pub(crate) fn filter_logs(
    entries: &[LogEntry],
    query: &LogQuery,
) -> Result<Vec<LogEntry>, QuerierError> {
    let compiled = CompiledLogQuery::compile(query)?;
    let mut matches: Vec<LogEntry> = entries
        .iter()
        .filter(|e| compiled.matches(e))
        .cloned()
        .collect();

    match query.sort_order {
        SortOrder::Ascending => matches.sort_by_key(|e| e.timestamp),
        SortOrder::Descending => {
            matches.sort_by_key(|e| std::cmp::Reverse(e.timestamp))
        }
    }
    Ok(matches)
}

pub(crate) fn log_statistics(entries: &[LogEntry]) -> LogStatistics {
    let mut by_level: HashMap<LogLevel, usize> = HashMap::new();
    let mut by_service: HashMap<String, usize> = HashMap::new();
    let mut errors = 0usize;

    for entry in entries {
        *by_level.entry(entry.level).or_default() += 1;
        *by_service.entry(entry.service.clone()).or_default() += 1;
        if entry.level >= LogLevel::Error {
            errors += 1;
        }
    }

    let error_fraction = if entries.is_empty() {
        0.0
    } else {
        errors as f64 / entries.len() as f64
    };

    LogStatistics {
        total: entries.len(),
        by_level,
        by_service,
        error_fraction,
    }
}
