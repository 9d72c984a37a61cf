//! Poisson log-stream synthesis with trace correlation.
//!
//! Time is partitioned into 1-minute buckets; the entry count per bucket is
//! a Poisson draw whose mean follows the configured rate, scaled up during
//! peak hours. Levels come from weighted discrete sampling, messages from
//! level-appropriate templates, and WARN-and-above entries may carry trace
//! context so the dashboard can drill from a log line into a trace.

use chrono::Timelike;
use serde::{Deserialize, Serialize};

use common::config::LevelWeights;
use common::model::TimeWindow;
use common::model::log::{LogEntry, LogLevel};
use common::model::trace::Trace;
use common::sampling::Sampler;

use crate::templates;
use crate::{Result, require};

/// Peak traffic hours (UTC), matching the daily pattern the metric models
/// simulate.
const PEAK_HOURS: std::ops::Range<u32> = 9..18;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogStreamConfig {
    pub window: TimeWindow,
    pub services: Vec<String>,
    /// Mean of the Poisson arrival process per 1-minute bucket
    pub average_logs_per_minute: f64,
    /// Applied to the mean during [`PEAK_HOURS`]
    pub peak_hour_multiplier: f64,
    pub level_weights: LevelWeights,
    /// Probability that a WARN/ERROR/FATAL entry references a trace
    pub trace_correlation_probability: f64,
}

impl LogStreamConfig {
    pub fn validate(&self) -> Result<()> {
        require(!self.services.is_empty(), "log services cannot be empty")?;
        require(
            self.average_logs_per_minute >= 0.0,
            "average_logs_per_minute cannot be negative",
        )?;
        require(
            self.peak_hour_multiplier > 0.0,
            "peak_hour_multiplier must be positive",
        )?;
        require(
            (0.0..=1.0).contains(&self.trace_correlation_probability),
            "trace_correlation_probability must be within [0, 1]",
        )?;
        let weights = self.level_weights.as_slice();
        require(
            weights.iter().all(|w| *w >= 0.0),
            "level weights cannot be negative",
        )?;
        require(
            weights.iter().sum::<f64>() > 0.0,
            "level weights cannot all be zero",
        )
    }
}

pub struct LogStreamGenerator {
    sampler: Sampler,
}

impl LogStreamGenerator {
    pub fn new(sampler: Sampler) -> Self {
        Self { sampler }
    }

    /// Synthesize a log stream over the configured window, ascending by
    /// timestamp. Pass the trace batch in scope to enable trace → log
    /// correlation; an empty slice disables it.
    ///
    /// An empty or inverted window yields an empty stream.
    pub fn generate_logs(
        &mut self,
        config: &LogStreamConfig,
        traces: &[Trace],
    ) -> Result<Vec<LogEntry>> {
        config.validate()?;

        let mut entries = Vec::new();
        if config.window.is_empty() {
            return Ok(entries);
        }

        let weights = config.level_weights.as_slice();
        let mut bucket_start = config.window.start;
        while bucket_start < config.window.end {
            let bucket_end =
                (bucket_start + chrono::Duration::minutes(1)).min(config.window.end);
            let bucket_ms = (bucket_end - bucket_start).num_milliseconds();

            let mut mean = config.average_logs_per_minute * bucket_ms as f64 / 60_000.0;
            if PEAK_HOURS.contains(&bucket_start.hour()) {
                mean *= config.peak_hour_multiplier;
            }

            let count = self.sampler.poisson(mean);
            for _ in 0..count {
                let offset = self.sampler.range_u64(0, bucket_ms.max(1) as u64);
                let timestamp = bucket_start + chrono::Duration::milliseconds(offset as i64);

                let level = self
                    .sampler
                    .weighted(&weights)
                    .map(|idx| LogLevel::all()[idx])
                    .unwrap_or(LogLevel::Info);
                let service = self
                    .sampler
                    .pick(&config.services)
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string());

                let rendered = templates::render(&mut self.sampler, level);

                let (trace_id, span_id) = if level.is_problem()
                    && self.sampler.chance(config.trace_correlation_probability)
                {
                    correlate(&mut self.sampler, traces, timestamp)
                } else {
                    (None, None)
                };

                let stack_trace = if level >= LogLevel::Error {
                    Some(templates::render_stack_trace(
                        &mut self.sampler,
                        &service,
                        &rendered.message,
                    ))
                } else {
                    None
                };

                entries.push(LogEntry {
                    id: self.sampler.uuid().to_string(),
                    timestamp,
                    level,
                    service,
                    message: rendered.message,
                    trace_id,
                    span_id,
                    fields: rendered.fields,
                    stack_trace,
                });
            }

            bucket_start = bucket_end;
        }

        entries.sort_by_key(|e| e.timestamp);
        log::debug!("generated {} log entries", entries.len());
        Ok(entries)
    }
}

/// Pick a trace whose interval contains the log timestamp, and within it a
/// span open at that instant (falling back to the root). Returns `(None,
/// None)` when no trace covers the timestamp, keeping the correlation
/// invariant: a tagged entry always falls inside its trace's window.
fn correlate(
    sampler: &mut Sampler,
    traces: &[Trace],
    timestamp: chrono::DateTime<chrono::Utc>,
) -> (Option<String>, Option<String>) {
    let candidates: Vec<&Trace> = traces
        .iter()
        .filter(|t| t.start_time <= timestamp && timestamp <= t.end_time)
        .collect();
    let Some(trace) = sampler.pick(&candidates) else {
        return (None, None);
    };

    let open_spans: Vec<&str> = trace
        .spans
        .iter()
        .filter(|s| s.start_time <= timestamp && timestamp <= s.end_time)
        .map(|s| s.span_id.as_str())
        .collect();
    let span_id = sampler
        .pick(&open_spans)
        .map(|s| s.to_string())
        .unwrap_or_else(|| trace.root_span_id.clone());

    (Some(trace.trace_id.clone()), Some(span_id))
}
