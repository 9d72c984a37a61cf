use serde::{Deserialize, Serialize};

/// Aggregated health bucket for a service node, derived from its error ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceHealth {
    Healthy,
    Degraded,
    Unhealthy,
}

impl ServiceHealth {
    /// Bucketing used by the topology builder: <1% healthy, <5% degraded.
    pub fn from_error_ratio(ratio: f64) -> Self {
        if ratio < 0.01 {
            ServiceHealth::Healthy
        } else if ratio < 0.05 {
            ServiceHealth::Degraded
        } else {
            ServiceHealth::Unhealthy
        }
    }
}

/// One service in the dependency graph with stats aggregated from the
/// traces in scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceNode {
    pub name: String,
    /// Spans owned by this service across the trace set
    pub span_count: usize,
    pub avg_duration_ms: f64,
    /// Errored spans / total spans for this service
    pub error_ratio: f64,
    pub health: ServiceHealth,
}

/// Directed call edge between two services, weighted by call count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEdge {
    pub source: String,
    pub target: String,
    pub call_count: u64,
}

/// Service dependency graph derived from a batch of traces.
///
/// Recomputed per query from the traces in scope; never persisted or
/// incrementally updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceTopology {
    pub nodes: Vec<ServiceNode>,
    pub edges: Vec<ServiceEdge>,
}

impl ServiceTopology {
    pub fn node(&self, name: &str) -> Option<&ServiceNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn edge(&self, source: &str, target: &str) -> Option<&ServiceEdge> {
        self.edges
            .iter()
            .find(|e| e.source == source && e.target == target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_buckets() {
        assert_eq!(ServiceHealth::from_error_ratio(0.0), ServiceHealth::Healthy);
        assert_eq!(
            ServiceHealth::from_error_ratio(0.02),
            ServiceHealth::Degraded
        );
        assert_eq!(
            ServiceHealth::from_error_ratio(0.2),
            ServiceHealth::Unhealthy
        );
    }
}
