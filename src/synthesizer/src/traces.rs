//! Recursive span-tree synthesis and trace analysis.
//!
//! A trace is built depth-first: the root span gets a duration budget, and
//! every child carves its interval out of the remaining budget of its
//! parent, which is what guarantees the defining structural invariant —
//! `parent.start_time <= child.start_time` and
//! `child.end_time <= parent.end_time` for every span.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::model::TimeWindow;
use common::model::span::{Span, SpanEvent, SpanStatus};
use common::model::trace::Trace;
use common::sampling::Sampler;

use crate::{Result, require};

/// Independent child-spawn attempts per span.
const BRANCH_TRIES: u32 = 3;
/// Branches stop when the remaining parent budget drops below this.
const MIN_CHILD_BUDGET_MS: f64 = 2.0;

const ROOT_OPERATIONS: &[&str] = &[
    "GET /api/orders",
    "POST /api/orders",
    "GET /api/users/{id}",
    "POST /api/checkout",
    "GET /api/products",
    "POST /api/auth/login",
    "GET /api/recommendations",
];

const CHILD_OPERATIONS: &[&str] = &[
    "SELECT orders",
    "SELECT users",
    "UPDATE inventory",
    "INSERT payment",
    "cache.get",
    "cache.set",
    "queue.publish",
    "rpc.call",
    "validate.token",
    "http.request",
];

/// Parameters for one batch of synthetic traces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceConfig {
    pub services: Vec<String>,
    /// Soft depth target; the duration budget may cut a branch short
    pub min_depth: u32,
    pub max_depth: u32,
    /// Independent per-span error probability
    pub error_rate: f64,
    pub duration_min_ms: f64,
    pub duration_max_ms: f64,
    /// Per-try probability of spawning a child span
    pub branch_probability: f64,
    /// Root durations above this ceiling mark the trace TIMEOUT
    pub timeout_ms: f64,
    /// Trace start times are sampled uniformly within this window
    pub window: TimeWindow,
}

impl TraceConfig {
    pub fn validate(&self) -> Result<()> {
        require(!self.services.is_empty(), "trace services cannot be empty")?;
        require(
            self.min_depth <= self.max_depth,
            format!(
                "min_depth ({}) exceeds max_depth ({})",
                self.min_depth, self.max_depth
            ),
        )?;
        require(self.max_depth >= 1, "max_depth must be at least 1")?;
        require(
            self.duration_min_ms > 0.0 && self.duration_min_ms <= self.duration_max_ms,
            format!(
                "duration bounds [{}, {}] are not a valid positive range",
                self.duration_min_ms, self.duration_max_ms
            ),
        )?;
        require(
            (0.0..=1.0).contains(&self.error_rate),
            "error_rate must be within [0, 1]",
        )?;
        require(
            (0.0..=1.0).contains(&self.branch_probability),
            "branch_probability must be within [0, 1]",
        )?;
        require(self.timeout_ms > 0.0, "timeout_ms must be positive")
    }
}

/// Sweep-line concurrency profile of one trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcurrencyStats {
    /// Most spans open at any instant
    pub max_concurrent: usize,
    /// Time-weighted average open spans over the trace duration
    pub avg_concurrent: f64,
    /// `1 - sum(span durations) / total duration`, clamped to [0, 1]
    pub parallelism_ratio: f64,
}

/// Generation state threaded through the recursion: the sampler, the span
/// arena and the running error count. No hidden shared state.
struct TraceContext<'a> {
    config: &'a TraceConfig,
    sampler: &'a mut Sampler,
    trace_id: String,
    spans: Vec<Span>,
    error_count: usize,
}

pub struct TraceTreeGenerator {
    sampler: Sampler,
}

impl TraceTreeGenerator {
    pub fn new(sampler: Sampler) -> Self {
        Self { sampler }
    }

    /// Build one trace. Always succeeds for a valid config; a single root
    /// span is a valid degenerate result.
    pub fn generate_trace(&mut self, config: &TraceConfig) -> Result<Trace> {
        config.validate()?;

        let root_duration_ms = self
            .sampler
            .range_f64(config.duration_min_ms, config.duration_max_ms);
        let start = sample_start(&mut self.sampler, config, root_duration_ms);

        let mut ctx = TraceContext {
            config,
            sampler: &mut self.sampler,
            trace_id: String::new(),
            spans: Vec::new(),
            error_count: 0,
        };
        ctx.trace_id = ctx.sampler.trace_id();

        let root_span_id = build_span(&mut ctx, None, start, root_duration_ms, 0);

        let mut spans = ctx.spans;
        spans.sort_by_key(|s| s.start_time);

        let root = spans
            .iter()
            .find(|s| s.span_id == root_span_id)
            .expect("root span was just generated");
        let root_service = root.service.clone();
        let (start_time, end_time) = (root.start_time, root.end_time);
        let total_duration_ms = root.duration_ms;

        let status = if total_duration_ms > config.timeout_ms {
            SpanStatus::Timeout
        } else if ctx.error_count > 0 {
            SpanStatus::Error
        } else {
            SpanStatus::Success
        };

        let mut services: Vec<String> = spans.iter().map(|s| s.service.clone()).collect();
        services.sort();
        services.dedup();

        Ok(Trace {
            trace_id: ctx.trace_id,
            root_span_id,
            root_service,
            start_time,
            end_time,
            total_duration_ms,
            span_count: spans.len(),
            error_count: ctx.error_count,
            status,
            services,
            spans,
        })
    }

    /// Build `n` traces, newest first.
    pub fn generate_traces(&mut self, config: &TraceConfig, n: usize) -> Result<Vec<Trace>> {
        config.validate()?;
        let mut traces = Vec::with_capacity(n);
        for _ in 0..n {
            traces.push(self.generate_trace(config)?);
        }
        traces.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        log::debug!(
            "generated {} traces ({} spans total)",
            traces.len(),
            traces.iter().map(|t| t.span_count).sum::<usize>()
        );
        Ok(traces)
    }
}

fn sample_start(
    sampler: &mut Sampler,
    config: &TraceConfig,
    duration_ms: f64,
) -> DateTime<Utc> {
    let window = config.window;
    if window.is_empty() {
        return window.start;
    }
    // Keep the whole trace inside the window when it fits.
    let span_ms = duration_ms.ceil() as i64;
    let slack_ms = (window.duration_ms() - span_ms).max(0);
    let offset = sampler.range_u64(0, slack_ms.max(1) as u64);
    window.start + chrono::Duration::milliseconds(offset as i64)
}

fn millis(ms: f64) -> chrono::Duration {
    chrono::Duration::microseconds((ms * 1_000.0).round() as i64)
}

fn span_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_microseconds().unwrap_or(0) as f64 / 1_000.0
}

fn build_span(
    ctx: &mut TraceContext<'_>,
    parent_span_id: Option<String>,
    start: DateTime<Utc>,
    duration_ms: f64,
    depth: u32,
) -> String {
    let span_id = ctx.sampler.span_id();
    let end = start + millis(duration_ms);
    let duration_ms = span_ms(start, end);

    let is_root = parent_span_id.is_none();
    let service = ctx
        .sampler
        .pick(&ctx.config.services)
        .cloned()
        .unwrap_or_else(|| "unknown".to_string());
    let operations = if is_root { ROOT_OPERATIONS } else { CHILD_OPERATIONS };
    let operation_name = ctx
        .sampler
        .pick(operations)
        .copied()
        .unwrap_or("unknown")
        .to_string();

    let is_error = ctx.sampler.chance(ctx.config.error_rate);
    let status = if is_error {
        ctx.error_count += 1;
        SpanStatus::Error
    } else {
        SpanStatus::Success
    };

    let mut tags = std::collections::HashMap::new();
    tags.insert(
        "span.kind".to_string(),
        if is_root { "server" } else { "internal" }.to_string(),
    );
    if let Some(method) = operation_name.split_whitespace().next() {
        if matches!(method, "GET" | "POST" | "PUT" | "DELETE") {
            tags.insert("http.method".to_string(), method.to_string());
        }
    }
    if is_error {
        tags.insert("error".to_string(), "true".to_string());
    }

    let logs = if is_error {
        vec![SpanEvent {
            timestamp: end,
            message: format!("{operation_name} failed on {service}"),
        }]
    } else {
        Vec::new()
    };

    ctx.spans.push(Span {
        span_id: span_id.clone(),
        trace_id: ctx.trace_id.clone(),
        parent_span_id,
        service,
        operation_name,
        start_time: start,
        end_time: end,
        duration_ms,
        status,
        tags,
        logs,
    });

    if depth + 1 >= ctx.config.max_depth {
        return span_id;
    }

    let mut child_count: u32 = 0;
    for _ in 0..BRANCH_TRIES {
        if ctx.sampler.chance(ctx.config.branch_probability) {
            child_count += 1;
        }
    }
    // min_depth is a soft target: keep one branch alive while the budget
    // allows it.
    if child_count == 0 && depth + 1 < ctx.config.min_depth {
        child_count = 1;
    }

    for _ in 0..child_count {
        let offset_ms = ctx.sampler.range_f64(0.0, duration_ms * 0.6);
        let budget_ms = duration_ms - offset_ms;
        if budget_ms < MIN_CHILD_BUDGET_MS {
            continue;
        }
        let child_start = start + millis(offset_ms);
        let child_duration = ctx.sampler.range_f64(budget_ms * 0.2, budget_ms * 0.9);
        build_span(ctx, Some(span_id.clone()), child_start, child_duration, depth + 1);
    }

    span_id
}

/// Nearest-rank percentile with an empty guard. `pct` in [0, 1].
pub(crate) fn percentile(values: &[f64], pct: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let idx = ((sorted.len() - 1) as f64 * pct.clamp(0.0, 1.0)).round() as usize;
    sorted[idx]
}

/// Portion of a span's duration not overlapped by siblings that started at
/// or before it.
fn exclusive_contribution(span: &Span, siblings: &[&Span]) -> f64 {
    let mut overlap_ms = 0.0;
    for other in siblings {
        if other.span_id == span.span_id || other.start_time > span.start_time {
            continue;
        }
        let overlap_start = span.start_time.max(other.start_time);
        let overlap_end = span.end_time.min(other.end_time);
        if overlap_end > overlap_start {
            overlap_ms += span_ms(overlap_start, overlap_end);
        }
    }
    (span.duration_ms - overlap_ms).max(0.0)
}

/// Walk from the root, at each node descending into the child that
/// contributes the largest exclusive share of its parent's duration.
/// Returns the root-first span chain.
pub fn find_critical_path(trace: &Trace) -> Vec<Span> {
    let mut path = Vec::new();
    let Some(root) = trace.root_span() else {
        return path;
    };
    path.push(root.clone());
    let mut current_id = root.span_id.clone();

    loop {
        let children = trace.children_of(&current_id);
        if children.is_empty() {
            break;
        }
        let next = children
            .iter()
            .max_by(|a, b| {
                exclusive_contribution(a, &children)
                    .partial_cmp(&exclusive_contribution(b, &children))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .copied();
        match next {
            Some(child) => {
                path.push(child.clone());
                current_id = child.span_id.clone();
            }
            None => break,
        }
    }
    path
}

/// Spans at or above the duration threshold, slowest first. The default
/// threshold is the 90th percentile of span durations within the trace.
pub fn find_slow_spans(trace: &Trace, threshold_ms: Option<f64>) -> Vec<Span> {
    let durations: Vec<f64> = trace.spans.iter().map(|s| s.duration_ms).collect();
    let threshold = threshold_ms.unwrap_or_else(|| percentile(&durations, 0.9));
    let mut slow: Vec<Span> = trace
        .spans
        .iter()
        .filter(|s| s.duration_ms >= threshold)
        .cloned()
        .collect();
    slow.sort_by(|a, b| {
        b.duration_ms
            .partial_cmp(&a.duration_ms)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    slow
}

/// Sweep-line over span intervals.
pub fn analyze_concurrency(trace: &Trace) -> ConcurrencyStats {
    if trace.spans.is_empty() || trace.total_duration_ms <= 0.0 {
        return ConcurrencyStats {
            max_concurrent: 0,
            avg_concurrent: 0.0,
            parallelism_ratio: 0.0,
        };
    }

    let mut events: Vec<(DateTime<Utc>, i32)> = Vec::with_capacity(trace.spans.len() * 2);
    for span in &trace.spans {
        events.push((span.start_time, 1));
        events.push((span.end_time, -1));
    }
    // Ends sort before starts at equal timestamps so adjacent spans do not
    // count as concurrent.
    events.sort_by_key(|(t, delta)| (*t, *delta));

    let mut open: i32 = 0;
    let mut max_open: i32 = 0;
    for (_, delta) in events {
        open += delta;
        max_open = max_open.max(open);
    }

    let busy_ms: f64 = trace.spans.iter().map(|s| s.duration_ms).sum();
    let avg_concurrent = busy_ms / trace.total_duration_ms;
    let parallelism_ratio = (1.0 - busy_ms / trace.total_duration_ms).clamp(0.0, 1.0);

    ConcurrencyStats {
        max_concurrent: max_open.max(0) as usize,
        avg_concurrent,
        parallelism_ratio,
    }
}
