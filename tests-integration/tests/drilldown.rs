//! The dashboard's drill-down workflow, end to end against one backend:
//! metric → trace → log → alert.

use std::time::Duration;

use common::config::Configuration;
use common::model::log::LogLevel;
use querier::{
    AlertQuery, LogQuery, MetricQuery, Pagination, TraceQuery, VirtualBackend, export,
};
use synthesizer::traces::{analyze_concurrency, find_critical_path, find_slow_spans};

fn backend() -> VirtualBackend {
    let mut config = Configuration::default();
    config.seed = Some(777);
    config.traces.count = 100;
    config.logs.average_logs_per_minute = 4.0;
    config.logs.trace_correlation_probability = 0.9;
    config.alerts.event_density_per_day = 24.0;
    config.cache.window = Duration::from_secs(4 * 3600);
    VirtualBackend::new(config)
}

#[tokio::test]
async fn metric_to_trace_to_log_drilldown() {
    let backend = backend();
    let window = backend.default_window();

    // 1. The dashboard charts a latency series for one service.
    let series = backend
        .fetch_metrics(MetricQuery {
            window,
            service: Some("api-gateway".to_string()),
            metric_names: vec!["request_latency".to_string()],
            step: None,
            max_points: Some(100),
        })
        .await
        .unwrap();
    assert_eq!(series.len(), 1);
    assert!(!series[0].is_empty());

    // 2. The user drills into traces for that service in the same window.
    let traces = backend
        .search_traces(TraceQuery {
            window: Some(window),
            service: Some("api-gateway".to_string()),
            pagination: Pagination {
                page: 1,
                page_size: 50,
            },
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(traces.total > 0);

    // 3. Trace detail: critical path, slow spans, concurrency profile.
    let trace = backend
        .get_trace_by_id(&traces.items[0].trace_id)
        .await
        .unwrap()
        .expect("trace from search resolves by id");
    let path = find_critical_path(&trace);
    assert_eq!(path[0].span_id, trace.root_span_id);
    let slow = find_slow_spans(&trace, None);
    assert!(slow.iter().all(|s| trace.span(&s.span_id).is_some()));
    let stats = analyze_concurrency(&trace);
    assert!(stats.max_concurrent >= 1);

    // 4. From the trace, the user opens its correlated logs.
    let logs = backend
        .search_logs(LogQuery {
            trace_id: Some(trace.trace_id.clone()),
            ..Default::default()
        })
        .await
        .unwrap();
    for entry in &logs.logs {
        assert_eq!(entry.trace_id.as_deref(), Some(trace.trace_id.as_str()));
        assert!(entry.timestamp >= trace.start_time);
        assert!(entry.timestamp <= trace.end_time);
    }
}

#[tokio::test]
async fn log_to_alert_drilldown() {
    let backend = backend();

    // Errors in the stream...
    let errors = backend
        .search_logs(LogQuery {
            levels: vec![LogLevel::Error, LogLevel::Fatal],
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(errors.statistics.error_fraction > 0.99);

    // ...and the alerting view for the same fleet.
    let alerts = backend
        .search_alerts(AlertQuery {
            pagination: Pagination {
                page: 1,
                page_size: 200,
            },
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(alerts.total > 0);

    let stats = backend.alert_statistics().await.unwrap();
    assert_eq!(stats.total, alerts.total);
    assert_eq!(stats.active + stats.resolved, stats.total);

    // Storm detection over the full event set is a pure function of what
    // the search returned.
    let all_events = alerts.items.clone();
    let storm = synthesizer::alerts::detect_alert_storm(&all_events, 2, 4 * 3_600_000);
    assert!(storm || all_events.len() < 2);
}

#[tokio::test]
async fn export_round_trip_preserves_query_results() {
    let backend = backend();

    let logs = backend
        .search_logs(LogQuery {
            pagination: Pagination {
                page: 1,
                page_size: 200,
            },
            ..Default::default()
        })
        .await
        .unwrap();
    let payload = export::logs_to_json(&logs.logs).unwrap();
    let parsed = export::logs_from_json(&payload).unwrap();
    assert_eq!(logs.logs, parsed);

    let alerts = backend
        .search_alerts(AlertQuery::default())
        .await
        .unwrap();
    let payload = export::events_to_json(&alerts.items).unwrap();
    let parsed = export::events_from_json(&payload).unwrap();
    assert_eq!(alerts.items, parsed);
}

#[tokio::test]
async fn whole_snapshot_is_deterministic_under_a_seed() {
    let first = backend();
    let second = backend();

    let traces_a = first.search_traces(TraceQuery::default()).await.unwrap();
    let traces_b = second.search_traces(TraceQuery::default()).await.unwrap();
    assert_eq!(
        traces_a.items.iter().map(|t| &t.trace_id).collect::<Vec<_>>(),
        traces_b.items.iter().map(|t| &t.trace_id).collect::<Vec<_>>()
    );

    let rules_a = first.alert_rules().await.unwrap();
    let rules_b = second.alert_rules().await.unwrap();
    assert_eq!(
        rules_a.iter().map(|r| &r.id).collect::<Vec<_>>(),
        rules_b.iter().map(|r| &r.id).collect::<Vec<_>>()
    );
}
