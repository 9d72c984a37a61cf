use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One sample of a time series. Immutable once generated.
///
/// `min`/`max` are populated by downsampling, where a point stands in for a
/// whole bucket of raw samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl MetricPoint {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            timestamp,
            value,
            min: None,
            max: None,
        }
    }
}

/// A metric time series for one service.
///
/// Invariant: `data_points` is non-decreasing in timestamp and every value
/// lies within the generating model's `[min_value, max_value]` bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub metric_id: String,
    /// Metric name (e.g. `cpu_usage`)
    pub metric_name: String,
    /// Unit of measurement (e.g. `percent`, `ms`)
    pub unit: String,
    pub service_id: String,
    pub data_points: Vec<MetricPoint>,
    pub last_update: DateTime<Utc>,
}

impl TimeSeries {
    pub fn is_empty(&self) -> bool {
        self.data_points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data_points.len()
    }

    /// Mean of all point values; `None` for an empty series.
    pub fn average(&self) -> Option<f64> {
        if self.data_points.is_empty() {
            return None;
        }
        let sum: f64 = self.data_points.iter().map(|p| p.value).sum();
        Some(sum / self.data_points.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_series_average() {
        let series = TimeSeries {
            metric_id: "m-1".to_string(),
            metric_name: "cpu_usage".to_string(),
            unit: "percent".to_string(),
            service_id: "api-gateway".to_string(),
            data_points: Vec::new(),
            last_update: Utc::now(),
        };
        assert!(series.average().is_none());
    }

    #[test]
    fn test_average() {
        let now = Utc::now();
        let series = TimeSeries {
            metric_id: "m-1".to_string(),
            metric_name: "cpu_usage".to_string(),
            unit: "percent".to_string(),
            service_id: "api-gateway".to_string(),
            data_points: vec![
                MetricPoint::new(now, 10.0),
                MetricPoint::new(now, 20.0),
                MetricPoint::new(now, 30.0),
            ],
            last_update: now,
        };
        assert_eq!(series.average(), Some(20.0));
    }
}
