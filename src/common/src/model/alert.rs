use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "info",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison applied between the observed metric value and the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertCondition {
    #[serde(rename = "gt")]
    GreaterThan,
    #[serde(rename = "gte")]
    GreaterOrEqual,
    #[serde(rename = "lt")]
    LessThan,
    #[serde(rename = "lte")]
    LessOrEqual,
    #[serde(rename = "eq")]
    Equal,
}

impl AlertCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertCondition::GreaterThan => "gt",
            AlertCondition::GreaterOrEqual => "gte",
            AlertCondition::LessThan => "lt",
            AlertCondition::LessOrEqual => "lte",
            AlertCondition::Equal => "eq",
        }
    }
}

/// Definition of an alerting rule over one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: String,
    pub name: String,
    /// Metric the rule evaluates (e.g. `cpu_usage`)
    pub metric: String,
    pub condition: AlertCondition,
    pub threshold: f64,
    /// How long the condition must hold before firing
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    pub severity: AlertSeverity,
    /// Scope the rule to one service; `None` means all services
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    pub enabled: bool,
}

/// One firing of an alert rule.
///
/// The only entity in the system with post-creation state transitions:
/// [`AlertEvent::acknowledge`] and [`AlertEvent::resolve`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub id: String,
    pub rule_id: String,
    pub severity: AlertSeverity,
    pub service: String,
    pub message: String,
    pub triggered_at: DateTime<Utc>,
    /// `None` while the alert is still active; always `> triggered_at`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    pub acknowledged: bool,
    /// `None` whenever `acknowledged` is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged_at: Option<DateTime<Utc>>,
}

impl AlertEvent {
    pub fn is_active(&self) -> bool {
        self.resolved_at.is_none()
    }

    /// Mark the event acknowledged by the given user. Returns false if it
    /// was already acknowledged.
    pub fn acknowledge(&mut self, user: &str, at: DateTime<Utc>) -> bool {
        if self.acknowledged {
            return false;
        }
        self.acknowledged = true;
        self.acknowledged_by = Some(user.to_string());
        self.acknowledged_at = Some(at.max(self.triggered_at));
        true
    }

    /// Resolve the event. Returns false if already resolved. The resolution
    /// timestamp is clamped to stay after `triggered_at`.
    pub fn resolve(&mut self, at: DateTime<Utc>) -> bool {
        if self.resolved_at.is_some() {
            return false;
        }
        let at = if at <= self.triggered_at {
            self.triggered_at + chrono::Duration::milliseconds(1)
        } else {
            at
        };
        self.resolved_at = Some(at);
        true
    }
}
