//! Alert rule and event synthesis plus event analytics.
//!
//! Rules come from a fixed catalog bound to the configured service fleet;
//! events are sampled per rule at a configurable daily density, with
//! exponentially distributed lifetimes and Bernoulli acknowledgement.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use common::model::TimeWindow;
use common::model::alert::{AlertCondition, AlertEvent, AlertRule, AlertSeverity};
use common::sampling::Sampler;

use crate::{Result, require};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertConfig {
    pub window: TimeWindow,
    pub services: Vec<String>,
    /// Expected events per day per enabled rule
    pub event_density_per_day: f64,
    pub avg_duration_minutes: f64,
    /// Probability that an event is still active (unresolved)
    pub unresolved_probability: f64,
    pub acknowledge_probability: f64,
}

impl AlertConfig {
    pub fn validate(&self) -> Result<()> {
        require(!self.services.is_empty(), "alert services cannot be empty")?;
        require(
            self.event_density_per_day >= 0.0,
            "event_density_per_day cannot be negative",
        )?;
        require(
            self.avg_duration_minutes > 0.0,
            "avg_duration_minutes must be positive",
        )?;
        require(
            (0.0..=1.0).contains(&self.unresolved_probability),
            "unresolved_probability must be within [0, 1]",
        )?;
        require(
            (0.0..=1.0).contains(&self.acknowledge_probability),
            "acknowledge_probability must be within [0, 1]",
        )
    }
}

/// Aggregate view over a batch of events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertStatistics {
    pub total: usize,
    /// Events without a resolution timestamp
    pub active: usize,
    pub acknowledged: usize,
    pub resolved: usize,
    pub by_severity: HashMap<AlertSeverity, usize>,
    pub by_service: HashMap<String, usize>,
}

/// Events close together in time that share a service or a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertCluster {
    pub events: Vec<AlertEvent>,
    pub services: Vec<String>,
    pub rule_ids: Vec<String>,
}

/// Catalog of rule shapes instantiated against the configured fleet.
struct RuleTemplate {
    name: &'static str,
    metric: &'static str,
    condition: AlertCondition,
    threshold: f64,
    duration_secs: u64,
    severity: AlertSeverity,
    /// Whether the rule is scoped to a single service
    scoped: bool,
}

const RULE_TEMPLATES: &[RuleTemplate] = &[
    RuleTemplate {
        name: "High CPU usage",
        metric: "cpu_usage",
        condition: AlertCondition::GreaterThan,
        threshold: 90.0,
        duration_secs: 300,
        severity: AlertSeverity::Critical,
        scoped: true,
    },
    RuleTemplate {
        name: "Elevated CPU usage",
        metric: "cpu_usage",
        condition: AlertCondition::GreaterThan,
        threshold: 75.0,
        duration_secs: 600,
        severity: AlertSeverity::Warning,
        scoped: true,
    },
    RuleTemplate {
        name: "Memory pressure",
        metric: "memory_usage",
        condition: AlertCondition::GreaterOrEqual,
        threshold: 85.0,
        duration_secs: 300,
        severity: AlertSeverity::Warning,
        scoped: true,
    },
    RuleTemplate {
        name: "Slow requests",
        metric: "request_latency",
        condition: AlertCondition::GreaterThan,
        threshold: 1_000.0,
        duration_secs: 120,
        severity: AlertSeverity::Warning,
        scoped: true,
    },
    RuleTemplate {
        name: "Error rate spike",
        metric: "error_rate",
        condition: AlertCondition::GreaterThan,
        threshold: 5.0,
        duration_secs: 60,
        severity: AlertSeverity::Critical,
        scoped: true,
    },
    RuleTemplate {
        name: "Throughput floor",
        metric: "throughput",
        condition: AlertCondition::LessThan,
        threshold: 10.0,
        duration_secs: 300,
        severity: AlertSeverity::Info,
        scoped: false,
    },
];

pub struct AlertEventGenerator {
    sampler: Sampler,
}

impl AlertEventGenerator {
    pub fn new(sampler: Sampler) -> Self {
        Self { sampler }
    }

    /// Instantiate the rule catalog against the configured services.
    pub fn generate_alert_rules(&mut self, config: &AlertConfig) -> Result<Vec<AlertRule>> {
        config.validate()?;
        let mut rules = Vec::with_capacity(RULE_TEMPLATES.len());
        for template in RULE_TEMPLATES {
            let service = if template.scoped {
                self.sampler.pick(&config.services).cloned()
            } else {
                None
            };
            rules.push(AlertRule {
                id: format!("rule-{}", self.sampler.uuid().simple()),
                name: template.name.to_string(),
                metric: template.metric.to_string(),
                condition: template.condition,
                threshold: template.threshold,
                duration: Duration::from_secs(template.duration_secs),
                severity: template.severity,
                service,
                enabled: true,
            });
        }
        Ok(rules)
    }

    /// Sample event occurrences for the given rules over the configured
    /// window, newest first.
    pub fn generate_alert_events(
        &mut self,
        config: &AlertConfig,
        rules: &[AlertRule],
    ) -> Result<Vec<AlertEvent>> {
        config.validate()?;

        let mut events = Vec::new();
        if config.window.is_empty() {
            return Ok(events);
        }

        let window_days =
            config.window.duration_ms() as f64 / (24.0 * 3_600_000.0);
        let now = Utc::now();

        for rule in rules.iter().filter(|r| r.enabled) {
            let expected = config.event_density_per_day * window_days;
            let count = self.sampler.poisson(expected);
            for _ in 0..count {
                let offset = self
                    .sampler
                    .range_u64(0, config.window.duration_ms().max(1) as u64);
                let triggered_at =
                    config.window.start + chrono::Duration::milliseconds(offset as i64);

                let service = rule
                    .service
                    .clone()
                    .or_else(|| self.sampler.pick(&config.services).cloned())
                    .unwrap_or_else(|| "unknown".to_string());

                let resolved_at = if self.sampler.chance(config.unresolved_probability) {
                    None
                } else {
                    let minutes = self.sampler.exponential(config.avg_duration_minutes);
                    let lifetime_ms = (minutes * 60_000.0).max(1.0) as i64;
                    Some(triggered_at + chrono::Duration::milliseconds(lifetime_ms))
                };

                let acknowledged = self.sampler.chance(config.acknowledge_probability);
                let (acknowledged_by, acknowledged_at) = if acknowledged {
                    let ack_deadline = resolved_at.unwrap_or(now).max(triggered_at);
                    let span_ms = (ack_deadline - triggered_at).num_milliseconds().max(1);
                    let ack_offset = self.sampler.range_u64(0, span_ms as u64);
                    (
                        Some(format!("oncall-{}", self.sampler.range_u64(1, 9))),
                        Some(triggered_at + chrono::Duration::milliseconds(ack_offset as i64)),
                    )
                } else {
                    (None, None)
                };

                events.push(AlertEvent {
                    id: format!("evt-{}", self.sampler.uuid().simple()),
                    rule_id: rule.id.clone(),
                    severity: rule.severity,
                    service: service.clone(),
                    message: format!(
                        "{}: {} {} {} on {}",
                        rule.name,
                        rule.metric,
                        rule.condition.as_str(),
                        rule.threshold,
                        service
                    ),
                    triggered_at,
                    resolved_at,
                    acknowledged,
                    acknowledged_by,
                    acknowledged_at,
                });
            }
        }

        events.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
        Ok(events)
    }
}

/// Totals and breakdowns over a batch of events.
pub fn calculate_alert_statistics(events: &[AlertEvent]) -> AlertStatistics {
    let mut by_severity: HashMap<AlertSeverity, usize> = HashMap::new();
    let mut by_service: HashMap<String, usize> = HashMap::new();
    let mut active = 0;
    let mut acknowledged = 0;

    for event in events {
        *by_severity.entry(event.severity).or_default() += 1;
        *by_service.entry(event.service.clone()).or_default() += 1;
        if event.is_active() {
            active += 1;
        }
        if event.acknowledged {
            acknowledged += 1;
        }
    }

    AlertStatistics {
        total: events.len(),
        active,
        acknowledged,
        resolved: events.len() - active,
        by_severity,
        by_service,
    }
}

/// Sliding-window storm detection: true when any window of `window_ms`
/// contains at least `count_threshold` events.
pub fn detect_alert_storm(events: &[AlertEvent], count_threshold: usize, window_ms: i64) -> bool {
    if count_threshold == 0 {
        return !events.is_empty();
    }
    let mut times: Vec<i64> = events.iter().map(|e| e.triggered_at.timestamp_millis()).collect();
    times.sort_unstable();

    let mut left = 0;
    for right in 0..times.len() {
        while times[right] - times[left] > window_ms {
            left += 1;
        }
        if right - left + 1 >= count_threshold {
            return true;
        }
    }
    false
}

/// Group events whose trigger times fall within `window_ms` of the cluster
/// and that share a service or a rule. Only clusters of two or more events
/// are reported.
pub fn correlate_alerts(events: &[AlertEvent], window_ms: i64) -> Vec<AlertCluster> {
    let mut sorted: Vec<&AlertEvent> = events.iter().collect();
    sorted.sort_by_key(|e| e.triggered_at);

    let mut groups: Vec<Vec<&AlertEvent>> = Vec::new();
    for event in sorted {
        let joined = groups.iter_mut().any(|group| {
            let last = group.last().expect("groups are never empty");
            let close = (event.triggered_at - last.triggered_at).num_milliseconds() <= window_ms;
            let related = group
                .iter()
                .any(|g| g.service == event.service || g.rule_id == event.rule_id);
            if close && related {
                group.push(event);
                true
            } else {
                false
            }
        });
        if !joined {
            groups.push(vec![event]);
        }
    }

    groups
        .into_iter()
        .filter(|g| g.len() >= 2)
        .map(|group| {
            let mut services: Vec<String> =
                group.iter().map(|e| e.service.clone()).collect();
            services.sort();
            services.dedup();
            let mut rule_ids: Vec<String> =
                group.iter().map(|e| e.rule_id.clone()).collect();
            rule_ids.sort();
            rule_ids.dedup();
            AlertCluster {
                events: group.into_iter().cloned().collect(),
                services,
                rule_ids,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AlertConfig {
        AlertConfig {
            window: TimeWindow::last_hours(24),
            services: vec![
                "api-gateway".to_string(),
                "order-service".to_string(),
                "payment-service".to_string(),
            ],
            event_density_per_day: 6.0,
            avg_duration_minutes: 30.0,
            unresolved_probability: 0.15,
            acknowledge_probability: 0.5,
        }
    }

    #[test]
    fn test_rules_cover_catalog() {
        let mut generator = AlertEventGenerator::new(Sampler::seeded(51));
        let rules = generator.generate_alert_rules(&config()).unwrap();
        assert_eq!(rules.len(), RULE_TEMPLATES.len());
        assert!(rules.iter().all(|r| r.enabled));
        assert!(rules.iter().any(|r| r.service.is_none()));
        assert!(rules.iter().any(|r| r.service.is_some()));
    }

    #[test]
    fn test_event_invariants() {
        let mut generator = AlertEventGenerator::new(Sampler::seeded(52));
        let cfg = config();
        let rules = generator.generate_alert_rules(&cfg).unwrap();
        let events = generator.generate_alert_events(&cfg, &rules).unwrap();
        assert!(!events.is_empty());
        for event in &events {
            if let Some(resolved_at) = event.resolved_at {
                assert!(resolved_at > event.triggered_at);
            }
            if !event.acknowledged {
                assert!(event.acknowledged_by.is_none());
                assert!(event.acknowledged_at.is_none());
            } else {
                assert!(event.acknowledged_at.unwrap() >= event.triggered_at);
            }
            assert!(event.triggered_at >= cfg.window.start);
        }
        // newest first
        for pair in events.windows(2) {
            assert!(pair[0].triggered_at >= pair[1].triggered_at);
        }
    }

    #[test]
    fn test_statistics_totals_add_up() {
        let mut generator = AlertEventGenerator::new(Sampler::seeded(53));
        let cfg = config();
        let rules = generator.generate_alert_rules(&cfg).unwrap();
        let events = generator.generate_alert_events(&cfg, &rules).unwrap();
        let stats = calculate_alert_statistics(&events);
        assert_eq!(stats.total, events.len());
        assert_eq!(stats.active + stats.resolved, stats.total);
        assert_eq!(stats.by_severity.values().sum::<usize>(), stats.total);
        assert_eq!(stats.by_service.values().sum::<usize>(), stats.total);
    }

    #[test]
    fn test_storm_detection() {
        let mut generator = AlertEventGenerator::new(Sampler::seeded(54));
        let cfg = config();
        let rules = generator.generate_alert_rules(&cfg).unwrap();
        let mut events = generator.generate_alert_events(&cfg, &rules).unwrap();
        // the whole day within one giant window is trivially a storm
        assert!(detect_alert_storm(&events, events.len(), 25 * 3_600_000));
        // squeeze five events into one minute
        let t = Utc::now();
        for (i, event) in events.iter_mut().take(5).enumerate() {
            event.triggered_at = t + chrono::Duration::seconds(i as i64);
        }
        assert!(detect_alert_storm(&events, 5, 60_000));
        assert!(!detect_alert_storm(&events[..2], 3, 1));
    }

    #[test]
    fn test_correlation_clusters_share_service_or_rule() {
        let mut generator = AlertEventGenerator::new(Sampler::seeded(55));
        let cfg = config();
        let rules = generator.generate_alert_rules(&cfg).unwrap();
        let events = generator.generate_alert_events(&cfg, &rules).unwrap();
        let clusters = correlate_alerts(&events, 3_600_000);
        for cluster in &clusters {
            assert!(cluster.events.len() >= 2);
            assert!(!cluster.services.is_empty());
            // every member shares a service or rule with another member
            for event in &cluster.events {
                assert!(cluster.events.iter().any(|other| {
                    other.id != event.id
                        && (other.service == event.service || other.rule_id == event.rule_id)
                }));
            }
        }
    }

    #[test]
    fn test_empty_window_yields_no_events() {
        let mut generator = AlertEventGenerator::new(Sampler::seeded(56));
        let mut cfg = config();
        let now = Utc::now();
        cfg.window = TimeWindow::new(now, now);
        let rules = generator.generate_alert_rules(&cfg).unwrap();
        let events = generator.generate_alert_events(&cfg, &rules).unwrap();
        assert!(events.is_empty());
    }
}
