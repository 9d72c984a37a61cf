//! Service dependency graph derivation.
//!
//! A pure re-derivation over a batch of traces: cross-service parent→child
//! span pairs become weighted directed edges, and per-service span stats
//! become node annotations. Nothing here is cached or incrementally
//! updated; the querier recomputes the graph for the traces in scope.

use std::collections::HashMap;

use common::model::topology::{ServiceEdge, ServiceHealth, ServiceNode, ServiceTopology};
use common::model::trace::Trace;

#[derive(Default)]
struct NodeStats {
    span_count: usize,
    total_duration_ms: f64,
    error_count: usize,
}

/// Derive the dependency graph for a batch of traces.
pub fn build_service_dependency_graph(traces: &[Trace]) -> ServiceTopology {
    let mut stats: HashMap<String, NodeStats> = HashMap::new();
    let mut edge_weights: HashMap<(String, String), u64> = HashMap::new();

    for trace in traces {
        let index = trace.span_index();
        for span in &trace.spans {
            let entry = stats.entry(span.service.clone()).or_default();
            entry.span_count += 1;
            entry.total_duration_ms += span.duration_ms;
            if span.status.is_error() {
                entry.error_count += 1;
            }

            let Some(parent_id) = &span.parent_span_id else {
                continue;
            };
            let Some(parent) = index.get(parent_id.as_str()) else {
                continue;
            };
            if parent.service != span.service {
                *edge_weights
                    .entry((parent.service.clone(), span.service.clone()))
                    .or_default() += 1;
            }
        }
    }

    let mut nodes: Vec<ServiceNode> = stats
        .into_iter()
        .map(|(name, s)| {
            let avg_duration_ms = if s.span_count > 0 {
                s.total_duration_ms / s.span_count as f64
            } else {
                0.0
            };
            let error_ratio = if s.span_count > 0 {
                s.error_count as f64 / s.span_count as f64
            } else {
                0.0
            };
            ServiceNode {
                name,
                span_count: s.span_count,
                avg_duration_ms,
                error_ratio,
                health: ServiceHealth::from_error_ratio(error_ratio),
            }
        })
        .collect();
    nodes.sort_by(|a, b| a.name.cmp(&b.name));

    let mut edges: Vec<ServiceEdge> = edge_weights
        .into_iter()
        .map(|((source, target), call_count)| ServiceEdge {
            source,
            target,
            call_count,
        })
        .collect();
    edges.sort_by(|a, b| (&a.source, &a.target).cmp(&(&b.source, &b.target)));

    ServiceTopology { nodes, edges }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traces::{TraceConfig, TraceTreeGenerator};
    use common::model::TimeWindow;
    use common::sampling::Sampler;

    fn traces() -> Vec<Trace> {
        let mut generator = TraceTreeGenerator::new(Sampler::seeded(61));
        generator
            .generate_traces(
                &TraceConfig {
                    services: vec![
                        "api-gateway".to_string(),
                        "order-service".to_string(),
                        "payment-service".to_string(),
                    ],
                    min_depth: 2,
                    max_depth: 6,
                    error_rate: 0.1,
                    duration_min_ms: 10.0,
                    duration_max_ms: 500.0,
                    branch_probability: 0.7,
                    timeout_ms: 30_000.0,
                    window: TimeWindow::last_hours(1),
                },
                50,
            )
            .unwrap()
    }

    #[test]
    fn test_nodes_cover_all_seen_services() {
        let traces = traces();
        let topology = build_service_dependency_graph(&traces);
        for trace in &traces {
            for service in &trace.services {
                assert!(topology.node(service).is_some(), "missing node {service}");
            }
        }
    }

    #[test]
    fn test_edges_are_cross_service_only() {
        let topology = build_service_dependency_graph(&traces());
        assert!(!topology.edges.is_empty());
        for edge in &topology.edges {
            assert_ne!(edge.source, edge.target);
            assert!(edge.call_count > 0);
        }
    }

    #[test]
    fn test_edge_weights_count_every_call() {
        let traces = traces();
        let topology = build_service_dependency_graph(&traces);
        let total_edges: u64 = topology.edges.iter().map(|e| e.call_count).sum();
        let mut expected = 0u64;
        for trace in &traces {
            let index = trace.span_index();
            for span in &trace.spans {
                if let Some(parent_id) = &span.parent_span_id {
                    if let Some(parent) = index.get(parent_id.as_str()) {
                        if parent.service != span.service {
                            expected += 1;
                        }
                    }
                }
            }
        }
        assert_eq!(total_edges, expected);
    }

    #[test]
    fn test_node_stats_are_aggregated() {
        let traces = traces();
        let topology = build_service_dependency_graph(&traces);
        let total_spans: usize = traces.iter().map(|t| t.span_count).sum();
        let node_spans: usize = topology.nodes.iter().map(|n| n.span_count).sum();
        assert_eq!(total_spans, node_spans);
        for node in &topology.nodes {
            assert!(node.avg_duration_ms > 0.0);
            assert!((0.0..=1.0).contains(&node.error_ratio));
        }
    }

    #[test]
    fn test_empty_batch_yields_empty_graph() {
        let topology = build_service_dependency_graph(&[]);
        assert!(topology.nodes.is_empty());
        assert!(topology.edges.is_empty());
    }
}
