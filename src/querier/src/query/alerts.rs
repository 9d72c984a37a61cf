//! Alert event filters.

use serde::{Deserialize, Serialize};

use common::model::TimeWindow;
use common::model::alert::{AlertEvent, AlertSeverity};

use super::{Pagination, SortOrder};
use crate::error::QuerierError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertQuery {
    pub window: Option<TimeWindow>,
    pub service: Option<String>,
    pub severity: Option<AlertSeverity>,
    /// Only unresolved events
    pub active_only: bool,
    pub acknowledged: Option<bool>,
    pub sort_order: SortOrder,
    pub pagination: Pagination,
}

impl AlertQuery {
    pub fn validate(&self) -> Result<(), QuerierError> {
        if let Some(window) = &self.window {
            if window.is_empty() {
                return Err(QuerierError::InvalidQuery(
                    "time range start must precede end".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn matches(&self, event: &AlertEvent) -> bool {
        if let Some(window) = &self.window {
            if !window.contains(event.triggered_at) {
                return false;
            }
        }
        if let Some(service) = &self.service {
            if &event.service != service {
                return false;
            }
        }
        if let Some(severity) = self.severity {
            if event.severity != severity {
                return false;
            }
        }
        if self.active_only && !event.is_active() {
            return false;
        }
        if let Some(acknowledged) = self.acknowledged {
            if event.acknowledged != acknowledged {
                return false;
            }
        }
        true
    }
}

pub(crate) fn filter_events(events: &[AlertEvent], query: &AlertQuery) -> Vec<AlertEvent> {
    let mut matches: Vec<AlertEvent> = events
        .iter()
        .filter(|e| query.matches(e))
        .cloned()
        .collect();
    match query.sort_order {
        SortOrder::Ascending => matches.sort_by_key(|e| e.triggered_at),
        SortOrder::Descending => matches.sort_by_key(|e| std::cmp::Reverse(e.triggered_at)),
    }
    matches
}
