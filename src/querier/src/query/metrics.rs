//! Metric fetches: series selection plus window slicing and chart-friendly
//! downsampling.

use serde::{Deserialize, Serialize};

use common::model::TimeWindow;
use common::model::metric::TimeSeries;
use synthesizer::metrics::aggregate_time_series;

use crate::error::QuerierError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricQuery {
    pub window: TimeWindow,
    pub service: Option<String>,
    /// Metric names to include; empty means all known metrics
    pub metric_names: Vec<String>,
    /// Desired sample interval; series cached at a finer step are
    /// downsampled to match
    #[serde(default, with = "humantime_serde::option")]
    pub step: Option<std::time::Duration>,
    /// Downsample each series to at most this many points
    pub max_points: Option<usize>,
}

impl MetricQuery {
    pub fn validate(&self) -> Result<(), QuerierError> {
        if self.window.is_empty() {
            return Err(QuerierError::InvalidQuery(
                "time range start must precede end".to_string(),
            ));
        }
        if let Some(step) = self.step {
            if step.is_zero() {
                return Err(QuerierError::InvalidQuery(
                    "step must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Point budget implied by the requested step over the window.
    fn step_budget(&self) -> Option<usize> {
        let step = self.step?;
        let step_ms = step.as_millis() as i64;
        if step_ms <= 0 {
            return None;
        }
        Some((self.window.duration_ms() / step_ms).max(1) as usize)
    }
}

/// Select the cached series matching the query, slice their points to the
/// requested window and downsample when asked to.
pub(crate) fn select_series(cached: &[TimeSeries], query: &MetricQuery) -> Vec<TimeSeries> {
    cached
        .iter()
        .filter(|series| {
            query
                .service
                .as_ref()
                .is_none_or(|service| &series.service_id == service)
        })
        .filter(|series| {
            query.metric_names.is_empty() || query.metric_names.contains(&series.metric_name)
        })
        .map(|series| {
            let mut points: Vec<_> = series
                .data_points
                .iter()
                .filter(|p| query.window.contains(p.timestamp))
                .copied()
                .collect();
            if let Some(budget) = query.step_budget() {
                points = aggregate_time_series(&points, budget);
            }
            if let Some(max_points) = query.max_points {
                points = aggregate_time_series(&points, max_points);
            }
            TimeSeries {
                data_points: points,
                ..series.clone()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::model::metric::MetricPoint;

    fn series(service: &str, name: &str, points: usize) -> TimeSeries {
        let now = Utc::now();
        TimeSeries {
            metric_id: format!("{service}:{name}"),
            metric_name: name.to_string(),
            unit: "percent".to_string(),
            service_id: service.to_string(),
            data_points: (0..points)
                .map(|i| {
                    MetricPoint::new(
                        now - chrono::Duration::minutes(points as i64 - i as i64),
                        i as f64,
                    )
                })
                .collect(),
            last_update: now,
        }
    }

    fn cached() -> Vec<TimeSeries> {
        vec![
            series("api-gateway", "cpu_usage", 120),
            series("api-gateway", "memory_usage", 120),
            series("order-service", "cpu_usage", 120),
        ]
    }

    #[test]
    fn test_service_and_name_selection() {
        let query = MetricQuery {
            window: TimeWindow::last_hours(3),
            service: Some("api-gateway".to_string()),
            metric_names: vec!["cpu_usage".to_string()],
            step: None,
            max_points: None,
        };
        let selected = select_series(&cached(), &query);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].service_id, "api-gateway");
        assert_eq!(selected[0].metric_name, "cpu_usage");
    }

    #[test]
    fn test_window_slicing_drops_outside_points() {
        let query = MetricQuery {
            window: TimeWindow::last_hours(1),
            service: None,
            metric_names: Vec::new(),
            step: None,
            max_points: None,
        };
        let selected = select_series(&cached(), &query);
        assert_eq!(selected.len(), 3);
        for series in &selected {
            assert!(series.len() < 120);
            for point in &series.data_points {
                assert!(query.window.contains(point.timestamp));
            }
        }
    }

    #[test]
    fn test_downsampling_applies_per_series() {
        let query = MetricQuery {
            window: TimeWindow::last_hours(3),
            service: None,
            metric_names: Vec::new(),
            step: None,
            max_points: Some(10),
        };
        let selected = select_series(&cached(), &query);
        for series in &selected {
            assert!(series.len() <= 10);
        }
    }

    #[test]
    fn test_step_implies_a_point_budget() {
        let query = MetricQuery {
            window: TimeWindow::last_hours(2),
            service: None,
            metric_names: Vec::new(),
            step: Some(std::time::Duration::from_secs(600)),
            max_points: None,
        };
        let selected = select_series(&cached(), &query);
        for series in &selected {
            // 2h at a 10-minute step is at most 12 points
            assert!(series.len() <= 12, "series kept {} points", series.len());
        }
    }

    #[test]
    fn test_inverted_window_is_invalid() {
        let now = Utc::now();
        let query = MetricQuery {
            window: TimeWindow::new(now, now - chrono::Duration::hours(1)),
            service: None,
            metric_names: Vec::new(),
            step: None,
            max_points: None,
        };
        assert!(query.validate().is_err());
    }
}
