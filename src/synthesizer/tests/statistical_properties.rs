//! Statistical tolerance tests over large generated batches.
//!
//! The generators are approximate by design; these tests assert the loose
//! tolerance bands the engine promises, not exact targets.

use std::time::Duration;

use common::config::LevelWeights;
use common::model::TimeWindow;
use common::model::log::LogLevel;
use common::sampling::Sampler;
use synthesizer::logs::{LogStreamConfig, LogStreamGenerator};
use synthesizer::metrics::{MetricSeriesGenerator, default_models};
use synthesizer::traces::{TraceConfig, TraceTreeGenerator};

fn fleet() -> Vec<String> {
    vec![
        "api-gateway".to_string(),
        "auth-service".to_string(),
        "order-service".to_string(),
        "payment-service".to_string(),
        "inventory-service".to_string(),
    ]
}

#[test]
fn error_trace_fraction_tracks_configured_rate() {
    // Single-span traces so the trace-level error fraction mirrors the
    // per-span rate directly.
    let config = TraceConfig {
        services: fleet(),
        min_depth: 1,
        max_depth: 1,
        error_rate: 0.1,
        duration_min_ms: 10.0,
        duration_max_ms: 500.0,
        branch_probability: 0.0,
        timeout_ms: 30_000.0,
        window: TimeWindow::last_hours(1),
    };
    let mut generator = TraceTreeGenerator::new(Sampler::seeded(71));
    let traces = generator.generate_traces(&config, 300).unwrap();

    let errored = traces.iter().filter(|t| t.has_error()).count() as f64;
    let fraction = errored / traces.len() as f64;
    assert!(
        (0.05..=0.15).contains(&fraction),
        "realized error fraction {fraction} outside 50% tolerance of 0.1"
    );
}

#[test]
fn deep_config_produces_multi_span_trees() {
    let config = TraceConfig {
        services: fleet(),
        min_depth: 3,
        max_depth: 10,
        error_rate: 0.05,
        duration_min_ms: 10.0,
        duration_max_ms: 500.0,
        branch_probability: 0.7,
        timeout_ms: 30_000.0,
        window: TimeWindow::last_hours(1),
    };
    let mut generator = TraceTreeGenerator::new(Sampler::seeded(72));
    let traces = generator.generate_traces(&config, 100).unwrap();

    let avg_spans: f64 =
        traces.iter().map(|t| t.span_count as f64).sum::<f64>() / traces.len() as f64;
    assert!(avg_spans > 2.0, "average span count was only {avg_spans}");

    for trace in &traces {
        assert!(trace.span_count >= 1);
        let index = trace.span_index();
        for span in &trace.spans {
            if let Some(parent_id) = &span.parent_span_id {
                assert!(index.contains_key(parent_id.as_str()));
            }
        }
    }
}

#[test]
fn hour_of_default_logs_is_mostly_info() {
    let config = LogStreamConfig {
        window: TimeWindow::last_hours(1),
        services: fleet(),
        average_logs_per_minute: 100.0,
        peak_hour_multiplier: 1.0,
        level_weights: LevelWeights::default(),
        trace_correlation_probability: 0.6,
    };
    let mut generator = LogStreamGenerator::new(Sampler::seeded(73));
    let logs = generator.generate_logs(&config, &[]).unwrap();

    assert!(logs.len() > 1_000, "only {} entries generated", logs.len());
    let info = logs.iter().filter(|e| e.level == LogLevel::Info).count() as f64;
    assert!(info / logs.len() as f64 > 0.3);
}

#[test]
fn poisson_volume_tracks_the_configured_rate() {
    let config = LogStreamConfig {
        window: TimeWindow::last_hours(2),
        services: fleet(),
        average_logs_per_minute: 60.0,
        peak_hour_multiplier: 1.0,
        level_weights: LevelWeights::default(),
        trace_correlation_probability: 0.0,
    };
    let mut generator = LogStreamGenerator::new(Sampler::seeded(74));
    let logs = generator.generate_logs(&config, &[]).unwrap();

    let expected = 60.0 * 120.0;
    let realized = logs.len() as f64;
    assert!(
        realized > expected * 0.8 && realized < expected * 1.2,
        "realized volume {realized} drifted from expected {expected}"
    );
}

#[test]
fn every_default_metric_model_respects_its_bounds() {
    let mut generator = MetricSeriesGenerator::new(Sampler::seeded(75));
    let window = TimeWindow::last_hours(24);
    for model in default_models() {
        for service in fleet() {
            let series = generator
                .generate(&model, &service, window, Duration::from_secs(60))
                .unwrap();
            assert!(!series.is_empty());
            for point in &series.data_points {
                assert!(
                    point.value >= model.min_value && point.value <= model.max_value,
                    "{} on {service}: {} escaped [{}, {}]",
                    model.name,
                    point.value,
                    model.min_value,
                    model.max_value
                );
            }
        }
    }
}
