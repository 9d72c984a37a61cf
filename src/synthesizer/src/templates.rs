//! Message templates for the log stream generator.
//!
//! Each level has its own template pool; placeholders are substituted with
//! generated values which are also recorded as structured fields on the
//! entry.

use std::collections::HashMap;

use serde_json::{Value, json};

use common::model::log::LogLevel;
use common::sampling::Sampler;

const TRACE_TEMPLATES: &[&str] = &[
    "Entering handler for {path}",
    "Acquired connection from pool in {duration_ms}ms",
    "Deserialized request body ({count} bytes)",
];

const DEBUG_TEMPLATES: &[&str] = &[
    "Cache lookup for {cache_key} took {duration_ms}ms",
    "Opening connection to {host}",
    "Query plan computed in {duration_ms}ms",
    "Session {session_id} refreshed",
    "Publishing {count} events to {queue}",
];

const INFO_TEMPLATES: &[&str] = &[
    "{method} {path} completed with {status} in {duration_ms}ms",
    "User {user_id} logged in",
    "Order {order_id} created for user {user_id}",
    "Processed {count} messages from {queue}",
    "Session {session_id} started",
    "Health check passed in {duration_ms}ms",
];

const WARN_TEMPLATES: &[&str] = &[
    "Slow query took {duration_ms}ms",
    "Retrying request to {host} (attempt {attempt})",
    "Connection pool at {percent}% capacity",
    "{method} {path} responded {status} in {duration_ms}ms",
    "Queue {queue} backlog above {count} messages",
];

const ERROR_TEMPLATES: &[&str] = &[
    "{method} {path} failed with {status}",
    "Database connection refused by {host}",
    "Payment declined for order {order_id}",
    "Timeout after {duration_ms}ms calling {host}",
    "Failed to publish to {queue}: broker unavailable",
];

const FATAL_TEMPLATES: &[&str] = &[
    "Out of memory after allocating {count}MB",
    "Unrecoverable error: datastore unreachable at {host}",
    "Panic in request handler for {path}",
];

const PATHS: &[&str] = &[
    "/api/orders",
    "/api/orders/{id}",
    "/api/users/{id}",
    "/api/checkout",
    "/api/products",
    "/api/auth/login",
    "/health",
];

const METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE"];
const OK_STATUSES: &[i64] = &[200, 201, 202, 204];
const PROBLEM_STATUSES: &[i64] = &[400, 401, 403, 404, 408, 429, 500, 502, 503, 504];
const HOSTS: &[&str] = &[
    "db-01.internal",
    "db-02.internal",
    "cache-01.internal",
    "queue-01.internal",
    "search-01.internal",
];
const QUEUES: &[&str] = &["orders", "payments", "notifications", "emails", "audit"];

const EXCEPTIONS: &[&str] = &[
    "ConnectionReset",
    "DeadlineExceeded",
    "QueryFailed",
    "SerializationError",
    "ResourceExhausted",
];

const FRAME_MODULES: &[&str] = &[
    "handlers::request",
    "repository::query",
    "client::http",
    "middleware::auth",
    "codec::json",
    "pool::checkout",
    "runtime::task",
];

pub(crate) struct RenderedMessage {
    pub message: String,
    pub fields: HashMap<String, Value>,
}

pub(crate) fn templates_for(level: LogLevel) -> &'static [&'static str] {
    match level {
        LogLevel::Trace => TRACE_TEMPLATES,
        LogLevel::Debug => DEBUG_TEMPLATES,
        LogLevel::Info => INFO_TEMPLATES,
        LogLevel::Warn => WARN_TEMPLATES,
        LogLevel::Error => ERROR_TEMPLATES,
        LogLevel::Fatal => FATAL_TEMPLATES,
    }
}

/// Pick a level-appropriate template and substitute its placeholders.
pub(crate) fn render(sampler: &mut Sampler, level: LogLevel) -> RenderedMessage {
    let template = sampler
        .pick(templates_for(level))
        .copied()
        .unwrap_or("event");
    let mut message = template.to_string();
    let mut fields = HashMap::new();

    let substitutions: &[(&str, fn(&mut Sampler, LogLevel) -> Value)] = &[
        ("{user_id}", |s, _| json!(format!("user-{}", s.range_u64(1_000, 100_000)))),
        ("{order_id}", |s, _| json!(format!("ord-{:06}", s.range_u64(1, 1_000_000)))),
        ("{session_id}", |s, _| json!(format!("sess-{}", s.span_id()))),
        ("{cache_key}", |s, _| {
            json!(format!("user:{}:profile", s.range_u64(1_000, 100_000)))
        }),
        ("{method}", |s, _| json!(s.pick(METHODS).copied().unwrap_or("GET"))),
        ("{path}", |s, _| {
            let path = s.pick(PATHS).copied().unwrap_or("/health");
            json!(path.replace("{id}", &s.range_u64(1, 10_000).to_string()))
        }),
        ("{status}", |s, level| {
            let pool = if level.is_problem() { PROBLEM_STATUSES } else { OK_STATUSES };
            json!(s.pick(pool).copied().unwrap_or(200))
        }),
        ("{duration_ms}", |s, level| {
            if level.is_problem() {
                json!(s.range_u64(500, 30_000))
            } else {
                json!(s.range_u64(1, 800))
            }
        }),
        ("{percent}", |s, _| json!(s.range_u64(50, 100))),
        ("{attempt}", |s, _| json!(s.range_u64(1, 6))),
        ("{count}", |s, _| json!(s.range_u64(1, 500))),
        ("{host}", |s, _| json!(s.pick(HOSTS).copied().unwrap_or("db-01.internal"))),
        ("{queue}", |s, _| json!(s.pick(QUEUES).copied().unwrap_or("orders"))),
    ];

    for (placeholder, generate) in substitutions {
        if !message.contains(placeholder) {
            continue;
        }
        let value = generate(sampler, level);
        let rendered = match &value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        message = message.replace(placeholder, &rendered);
        let key = placeholder.trim_matches(|c| c == '{' || c == '}').to_string();
        fields.insert(key, value);
    }

    RenderedMessage { message, fields }
}

/// Multi-line synthetic stack trace for ERROR/FATAL entries.
pub(crate) fn render_stack_trace(sampler: &mut Sampler, service: &str, message: &str) -> String {
    let exception = sampler.pick(EXCEPTIONS).copied().unwrap_or("Error");
    let crate_name = service.replace('-', "_");
    let frame_count = sampler.range_usize(3, 7);

    let mut lines = vec![format!("{exception}: {message}")];
    for _ in 0..frame_count {
        let module = sampler.pick(FRAME_MODULES).copied().unwrap_or("handlers::request");
        let file = module.split("::").last().unwrap_or("mod");
        let line = sampler.range_u64(10, 500);
        lines.push(format!("    at {crate_name}::{module} ({file}.rs:{line})"));
    }
    lines.push(format!(
        "    at {crate_name}::main (main.rs:{})",
        sampler.range_u64(10, 60)
    ));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_all_placeholders() {
        let mut sampler = Sampler::seeded(31);
        for level in LogLevel::all() {
            for _ in 0..50 {
                let rendered = render(&mut sampler, *level);
                assert!(
                    !rendered.message.contains('{'),
                    "unsubstituted placeholder in: {}",
                    rendered.message
                );
            }
        }
    }

    #[test]
    fn test_rendered_fields_match_message() {
        let mut sampler = Sampler::seeded(32);
        let rendered = render(&mut sampler, LogLevel::Info);
        for key in rendered.fields.keys() {
            assert!(!rendered.message.contains(&format!("{{{key}}}")));
        }
    }

    #[test]
    fn test_stack_trace_is_multiline() {
        let mut sampler = Sampler::seeded(33);
        let stack = render_stack_trace(&mut sampler, "payment-service", "boom");
        let lines: Vec<&str> = stack.lines().collect();
        assert!(lines.len() >= 4);
        assert!(lines[0].contains("boom"));
        assert!(lines[1].contains("payment_service::"));
    }
}
