use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Terminal status of a span or of a whole trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SpanStatus {
    Success,
    Error,
    Timeout,
}

impl SpanStatus {
    pub fn from_str(s: &str) -> Self {
        match s {
            "ERROR" | "Error" => SpanStatus::Error,
            "TIMEOUT" | "Timeout" => SpanStatus::Timeout,
            _ => SpanStatus::Success,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpanStatus::Success => "SUCCESS",
            SpanStatus::Error => "ERROR",
            SpanStatus::Timeout => "TIMEOUT",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, SpanStatus::Error)
    }
}

impl std::fmt::Display for SpanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timestamped annotation attached to a span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanEvent {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// One unit of work within a trace, owned by one service.
///
/// Invariant: `parent.start_time <= start_time` and
/// `end_time <= parent.end_time` for every non-root span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    /// 16-hex-char span ID, unique within the trace
    pub span_id: String,
    /// 32-hex-char trace ID
    pub trace_id: String,
    /// Parent span ID; `None` only for the root span
    pub parent_span_id: Option<String>,
    /// Service that produced this span
    pub service: String,
    /// Operation name (e.g. `GET /api/orders`)
    pub operation_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// `end_time - start_time` in milliseconds
    pub duration_ms: f64,
    pub status: SpanStatus,
    pub tags: HashMap<String, String>,
    /// Events recorded while the span was open
    pub logs: Vec<SpanEvent>,
}

impl Span {
    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }

    /// Whether this span's interval is nested inside the other's.
    pub fn nested_in(&self, parent: &Span) -> bool {
        parent.start_time <= self.start_time && self.end_time <= parent.end_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn span(offset_ms: i64, duration_ms: i64) -> Span {
        let start = Utc::now() + Duration::milliseconds(offset_ms);
        Span {
            span_id: "a1b2c3d4e5f60718".to_string(),
            trace_id: "0".repeat(32),
            parent_span_id: None,
            service: "api-gateway".to_string(),
            operation_name: "GET /health".to_string(),
            start_time: start,
            end_time: start + Duration::milliseconds(duration_ms),
            duration_ms: duration_ms as f64,
            status: SpanStatus::Success,
            tags: HashMap::new(),
            logs: Vec::new(),
        }
    }

    #[test]
    fn test_status_round_trip() {
        for status in [SpanStatus::Success, SpanStatus::Error, SpanStatus::Timeout] {
            assert_eq!(SpanStatus::from_str(status.as_str()), status);
        }
    }

    #[test]
    fn test_nested_in() {
        let parent = span(0, 100);
        let mut child = span(10, 50);
        child.parent_span_id = Some(parent.span_id.clone());
        assert!(child.nested_in(&parent));
        assert!(!parent.nested_in(&child));
    }
}
