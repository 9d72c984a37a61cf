//! Trace search: field filters, sorting and pagination over a cached batch.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use common::model::TimeWindow;
use common::model::span::SpanStatus;
use common::model::trace::Trace;

use super::{Pagination, SortOrder};
use crate::error::QuerierError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceSortField {
    #[default]
    StartTime,
    Duration,
    SpanCount,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceQuery {
    /// Restrict to traces starting inside this window
    pub window: Option<TimeWindow>,
    /// Any span owned by this service
    pub service: Option<String>,
    /// Any span with this operation name
    pub operation: Option<String>,
    pub status: Option<SpanStatus>,
    pub min_duration_ms: Option<f64>,
    pub max_duration_ms: Option<f64>,
    /// Tag equality; all pairs must match on at least one span
    pub tags: HashMap<String, String>,
    pub has_error: Option<bool>,
    pub sort_by: TraceSortField,
    pub sort_order: SortOrder,
    pub pagination: Pagination,
}

impl TraceQuery {
    pub fn validate(&self) -> Result<(), QuerierError> {
        if let (Some(min), Some(max)) = (self.min_duration_ms, self.max_duration_ms) {
            if min > max {
                return Err(QuerierError::InvalidQuery(format!(
                    "min_duration_ms ({min}) exceeds max_duration_ms ({max})"
                )));
            }
        }
        if let Some(window) = &self.window {
            if window.is_empty() {
                return Err(QuerierError::InvalidQuery(
                    "time range start must precede end".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn matches(&self, trace: &Trace) -> bool {
        if let Some(window) = &self.window {
            if !window.contains(trace.start_time) {
                return false;
            }
        }
        if let Some(service) = &self.service {
            if !trace.services.iter().any(|s| s == service) {
                return false;
            }
        }
        if let Some(operation) = &self.operation {
            if !trace.spans.iter().any(|s| &s.operation_name == operation) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if trace.status != status {
                return false;
            }
        }
        if !trace.matches_duration(self.min_duration_ms, self.max_duration_ms) {
            return false;
        }
        for (key, value) in &self.tags {
            let found = trace
                .spans
                .iter()
                .any(|s| s.tags.get(key).is_some_and(|v| v == value));
            if !found {
                return false;
            }
        }
        if let Some(has_error) = self.has_error {
            if trace.has_error() != has_error {
                return false;
            }
        }
        true
    }
}

/// Filter and sort the batch; the caller paginates the result.
pub(crate) fn filter_traces(traces: &[Trace], query: &TraceQuery) -> Vec<Trace> {
    let mut matches: Vec<Trace> = traces
        .iter()
        .filter(|t| query.matches(t))
        .cloned()
        .collect();

    matches.sort_by(|a, b| {
        let ordering = match query.sort_by {
            TraceSortField::StartTime => a.start_time.cmp(&b.start_time),
            TraceSortField::Duration => a
                .total_duration_ms
                .partial_cmp(&b.total_duration_ms)
                .unwrap_or(std::cmp::Ordering::Equal),
            TraceSortField::SpanCount => a.span_count.cmp(&b.span_count),
        };
        match query.sort_order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    });
    matches
}
