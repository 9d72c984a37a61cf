//! Parametric metric time-series synthesis.
//!
//! A [`MetricModel`] fixes the statistical shape of one series: a base
//! value, sinusoidal seasonality, gaussian noise and occasional
//! multiplicative spikes, clamped to hard bounds. By construction the
//! long-run average stays within ~20% of the base value.

use std::f64::consts::TAU;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use common::model::TimeWindow;
use common::model::metric::{MetricPoint, TimeSeries};
use common::sampling::Sampler;

use crate::{Result, require};

/// Spikes multiply the current sample by a factor drawn from this range.
const SPIKE_FACTOR_MIN: f64 = 1.5;
const SPIKE_FACTOR_MAX: f64 = 3.0;

/// Statistical model for one synthetic metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricModel {
    /// Metric name (e.g. `cpu_usage`)
    pub name: String,
    pub unit: String,
    pub base_value: f64,
    /// Peak deviation of the seasonal component
    pub amplitude: f64,
    /// Seasonal period in milliseconds
    pub period_ms: f64,
    pub noise_std_dev: f64,
    /// Per-point probability of a multiplicative spike
    pub spike_probability: f64,
    pub min_value: f64,
    pub max_value: f64,
}

impl MetricModel {
    pub fn validate(&self) -> Result<()> {
        require(
            self.min_value <= self.max_value,
            format!(
                "metric {}: min_value ({}) exceeds max_value ({})",
                self.name, self.min_value, self.max_value
            ),
        )?;
        require(
            self.period_ms > 0.0,
            format!("metric {}: period_ms must be positive", self.name),
        )?;
        require(
            (0.0..=1.0).contains(&self.spike_probability),
            format!("metric {}: spike_probability must be within [0, 1]", self.name),
        )?;
        require(
            self.noise_std_dev >= 0.0,
            format!("metric {}: noise_std_dev cannot be negative", self.name),
        )
    }
}

/// Built-in models for the metric names dashboards ask for. One series per
/// (model, service) pair.
pub fn default_models() -> Vec<MetricModel> {
    vec![
        MetricModel {
            name: "cpu_usage".to_string(),
            unit: "percent".to_string(),
            base_value: 45.0,
            amplitude: 15.0,
            period_ms: 3_600_000.0,
            noise_std_dev: 4.0,
            spike_probability: 0.02,
            min_value: 0.0,
            max_value: 100.0,
        },
        MetricModel {
            name: "memory_usage".to_string(),
            unit: "percent".to_string(),
            base_value: 62.0,
            amplitude: 8.0,
            period_ms: 7_200_000.0,
            noise_std_dev: 2.5,
            spike_probability: 0.01,
            min_value: 0.0,
            max_value: 100.0,
        },
        MetricModel {
            name: "request_latency".to_string(),
            unit: "ms".to_string(),
            base_value: 120.0,
            amplitude: 40.0,
            period_ms: 1_800_000.0,
            noise_std_dev: 15.0,
            spike_probability: 0.03,
            min_value: 1.0,
            max_value: 5_000.0,
        },
        MetricModel {
            name: "throughput".to_string(),
            unit: "rps".to_string(),
            base_value: 350.0,
            amplitude: 120.0,
            period_ms: 3_600_000.0,
            noise_std_dev: 30.0,
            spike_probability: 0.02,
            min_value: 0.0,
            max_value: 2_000.0,
        },
        MetricModel {
            name: "error_rate".to_string(),
            unit: "percent".to_string(),
            base_value: 1.2,
            amplitude: 0.6,
            period_ms: 5_400_000.0,
            noise_std_dev: 0.3,
            spike_probability: 0.015,
            min_value: 0.0,
            max_value: 100.0,
        },
    ]
}

pub struct MetricSeriesGenerator {
    sampler: Sampler,
}

impl MetricSeriesGenerator {
    pub fn new(sampler: Sampler) -> Self {
        Self { sampler }
    }

    /// Synthesize one series over `window`, sampled every `step`.
    ///
    /// An empty window yields an empty series; malformed model parameters
    /// fail fast.
    pub fn generate(
        &mut self,
        model: &MetricModel,
        service_id: &str,
        window: TimeWindow,
        step: Duration,
    ) -> Result<TimeSeries> {
        model.validate()?;
        require(!step.is_zero(), "metric step must be positive")?;

        let step_ms = step.as_millis() as i64;
        let mut data_points = Vec::new();

        if !window.is_empty() {
            let total_ms = window.duration_ms();
            let mut offset_ms: i64 = 0;
            while offset_ms <= total_ms {
                let timestamp = window.start + chrono::Duration::milliseconds(offset_ms);
                let phase = TAU * (offset_ms as f64) / model.period_ms;
                let mut value = model.base_value
                    + model.amplitude * phase.sin()
                    + self.sampler.gaussian(model.noise_std_dev);
                if self.sampler.chance(model.spike_probability) {
                    value *= self.sampler.range_f64(SPIKE_FACTOR_MIN, SPIKE_FACTOR_MAX);
                }
                let value = value.clamp(model.min_value, model.max_value);
                data_points.push(MetricPoint::new(timestamp, value));
                offset_ms += step_ms;
            }
        }

        Ok(TimeSeries {
            metric_id: format!("{service_id}:{}", model.name),
            metric_name: model.name.clone(),
            unit: model.unit.clone(),
            service_id: service_id.to_string(),
            data_points,
            last_update: Utc::now(),
        })
    }
}

/// Deterministic downsampling for chart rendering: bucket the series into at
/// most `max_points` buckets of equal index width and replace each bucket
/// with its `{avg, min, max}` at the bucket's first timestamp.
pub fn aggregate_time_series(points: &[MetricPoint], max_points: usize) -> Vec<MetricPoint> {
    if max_points == 0 || points.len() <= max_points {
        return points.to_vec();
    }

    let bucket_width = points.len().div_ceil(max_points);
    points
        .chunks(bucket_width)
        .map(|bucket| {
            let sum: f64 = bucket.iter().map(|p| p.value).sum();
            let min = bucket.iter().map(|p| p.value).fold(f64::INFINITY, f64::min);
            let max = bucket
                .iter()
                .map(|p| p.value)
                .fold(f64::NEG_INFINITY, f64::max);
            MetricPoint {
                timestamp: bucket[0].timestamp,
                value: sum / bucket.len() as f64,
                min: Some(min),
                max: Some(max),
            }
        })
        .collect()
}
