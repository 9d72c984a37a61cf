use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::span::{Span, SpanStatus};

/// One end-to-end request represented as a tree of spans.
///
/// Created once by the trace generator and immutable thereafter; only the
/// querier's cache may discard it on TTL expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub trace_id: String,
    pub root_span_id: String,
    pub root_service: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub total_duration_ms: f64,
    pub span_count: usize,
    pub error_count: usize,
    /// ERROR if any span errored, TIMEOUT if the root exceeded the
    /// configured ceiling, SUCCESS otherwise.
    pub status: SpanStatus,
    /// Distinct service names touched, sorted
    pub services: Vec<String>,
    pub spans: Vec<Span>,
}

impl Trace {
    pub fn root_span(&self) -> Option<&Span> {
        self.spans.iter().find(|s| s.span_id == self.root_span_id)
    }

    pub fn span(&self, span_id: &str) -> Option<&Span> {
        self.spans.iter().find(|s| s.span_id == span_id)
    }

    /// Index spans by ID for repeated parent lookups.
    pub fn span_index(&self) -> HashMap<&str, &Span> {
        self.spans
            .iter()
            .map(|s| (s.span_id.as_str(), s))
            .collect()
    }

    /// Direct children of the given span, ordered by start time.
    pub fn children_of(&self, span_id: &str) -> Vec<&Span> {
        let mut children: Vec<&Span> = self
            .spans
            .iter()
            .filter(|s| s.parent_span_id.as_deref() == Some(span_id))
            .collect();
        children.sort_by_key(|s| s.start_time);
        children
    }

    pub fn has_error(&self) -> bool {
        self.error_count > 0
    }

    /// Trace duration bucket used for duration filters.
    pub fn matches_duration(&self, min_ms: Option<f64>, max_ms: Option<f64>) -> bool {
        if let Some(min) = min_ms {
            if self.total_duration_ms < min {
                return false;
            }
        }
        if let Some(max) = max_ms {
            if self.total_duration_ms > max {
                return false;
            }
        }
        true
    }
}
