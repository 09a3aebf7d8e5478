use crate::core_types::{Graph, GraphError};
use crate::{ID, ROUNDING_TOLERANCE};

use itertools::Itertools;
use log::{debug, warn};
use ordered_float::OrderedFloat;
use serde::Serialize;
use std::collections::BTreeSet;

/// A node whose outgoing split percentages fail to add up to one
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundingViolation {
    pub node: ID,
    pub split_sum: f64,
}

/// Lays the attack volume down on a modified graph: one hop-shortest path
/// per sink carries that sink's budget, every traversed node accumulates
/// the volume passing through it, and each node's outgoing used edges are
/// assigned the fraction of its traffic they forward.
pub fn assign_splits(
    graph: &mut Graph,
    source: ID,
    victim: ID,
    allies: &[ID],
    capacities: &[f64],
    attack_volume: f64,
) -> Result<Vec<RoundingViolation>, GraphError> {
    for node in graph.nodes.iter_mut() {
        node.received_attack_volume = 0.0;
    }
    for edge in graph.edges_mut() {
        edge.split_percentage = 0.0;
        edge.used = false;
    }
    if let Some(node) = graph.get_node_mut(&source) {
        node.received_attack_volume = attack_volume;
    }

    // the victim scrubs whatever the allies have no capacity for
    let residual = attack_volume - capacities.iter().sum::<f64>();
    let mut budgets: Vec<(ID, f64)> = allies
        .iter()
        .copied()
        .zip(capacities.iter().copied())
        .collect();
    budgets.push((victim, residual));

    for (sink, budget) in &budgets {
        let path = graph.shortest_path_by_hops(&source, sink)?;
        debug!("Sink {} takes {} over {:?}.", sink, budget, path);
        for (u, v) in path.iter().tuple_windows() {
            if let Some(edge) = graph.get_edge_mut(u, v) {
                edge.used = true;
            }
            if let Some(node) = graph.get_node_mut(v) {
                node.received_attack_volume += budget;
            }
        }
    }

    for node in graph.get_node_ids() {
        let used_out: Vec<(ID, f64)> = graph
            .out_edges(&node)
            .iter()
            .filter(|e| e.used)
            .map(|e| {
                let received = graph
                    .get_node(&e.destination)
                    .map_or(0.0, |n| n.received_attack_volume);
                (e.destination, received)
            })
            .collect();
        if used_out.is_empty() {
            continue;
        }
        let relayed = graph
            .get_node(&node)
            .map_or(0.0, |n| n.received_attack_volume);
        if relayed == 0.0 {
            // colliding paths can drain a node dry; its splits stay at zero
            // and the verification below reports it
            warn!("Node {} lies on a used path but relays nothing.", node);
            continue;
        }
        let mut ordered = used_out;
        ordered.sort_by_key(|(next, received)| (OrderedFloat(*received), *next));
        let mut remaining = relayed;
        for (next, received) in ordered {
            if let Some(edge) = graph.get_edge_mut(&node, &next) {
                edge.split_percentage = (received / relayed).min(remaining / relayed);
            }
            remaining -= received;
        }
    }

    let sinks: BTreeSet<ID> = allies.iter().copied().chain([victim]).collect();
    Ok(verify_splits(graph, &sinks))
}

/// Every non-sink node with used outgoing edges must split its traffic
/// completely; anything off by more than the rounding tolerance is reported
pub fn verify_splits(graph: &Graph, sinks: &BTreeSet<ID>) -> Vec<RoundingViolation> {
    let mut violations = Vec::default();
    for node in graph.get_node_ids() {
        if sinks.contains(&node) {
            continue;
        }
        let used: Vec<f64> = graph
            .out_edges(&node)
            .iter()
            .filter(|e| e.used)
            .map(|e| e.split_percentage)
            .collect();
        if used.is_empty() {
            continue;
        }
        let split_sum: f64 = used.iter().sum();
        if (split_sum - 1.0).abs() > ROUNDING_TOLERANCE {
            warn!("Outgoing splits of node {} sum to {}.", node, split_sum);
            violations.push(RoundingViolation { node, split_sum });
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::path::Path;

    fn load(path: &str) -> Graph {
        Graph::from_topology(&topology_parser::from_json_file(Path::new(path)).unwrap()).unwrap()
    }

    #[test]
    fn fork_splits_match_the_budgets() {
        let mut graph = load("../test_data/fork.json");
        let warnings = assign_splits(&mut graph, 3, 0, &[2], &[4.0], 10.0).unwrap();
        assert!(warnings.is_empty());
        assert_abs_diff_eq!(
            graph.get_edge(&3, &1).unwrap().split_percentage,
            0.6,
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(
            graph.get_edge(&3, &2).unwrap().split_percentage,
            0.4,
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(
            graph.get_edge(&1, &0).unwrap().split_percentage,
            1.0,
            epsilon = 1e-9
        );
        assert!(!graph.get_edge(&2, &0).unwrap().used);
        assert_eq!(graph.get_node(&2).unwrap().received_attack_volume, 4.0);
        assert_eq!(graph.get_node(&0).unwrap().received_attack_volume, 6.0);
    }

    #[test]
    fn diamond_splits_match_the_budgets() {
        let mut graph = load("../test_data/diamond.json");
        let warnings = assign_splits(&mut graph, 5, 0, &[4], &[3.0], 10.0).unwrap();
        assert!(warnings.is_empty());
        assert_abs_diff_eq!(
            graph.get_edge(&5, &3).unwrap().split_percentage,
            0.7,
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(
            graph.get_edge(&5, &4).unwrap().split_percentage,
            0.3,
            epsilon = 1e-9
        );
    }

    #[test]
    fn sink_on_the_way_forwards_the_overflow() {
        let mut graph = load("../test_data/diamond.json");
        // both allies sit on the hop-shortest victim path's side
        let warnings = assign_splits(&mut graph, 5, 0, &[3, 4], &[5.0, 5.0], 11.0).unwrap();
        assert!(warnings.is_empty());
        // ally 3 receives its capacity plus the victim's residual
        assert_eq!(graph.get_node(&3).unwrap().received_attack_volume, 6.0);
        assert_eq!(graph.get_node(&4).unwrap().received_attack_volume, 5.0);
        assert_abs_diff_eq!(
            graph.get_edge(&5, &3).unwrap().split_percentage,
            6.0 / 11.0,
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(
            graph.get_edge(&5, &4).unwrap().split_percentage,
            5.0 / 11.0,
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(
            graph.get_edge(&3, &1).unwrap().split_percentage,
            1.0 / 6.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn split_sums_hold_at_every_forwarding_node() {
        let mut graph = load("../test_data/mesh.json");
        let warnings = assign_splits(&mut graph, 9, 0, &[5], &[2.0], 10.0).unwrap();
        assert!(warnings.is_empty());
        let sinks = BTreeSet::from([0, 5]);
        for node in graph.get_node_ids() {
            if sinks.contains(&node) {
                continue;
            }
            let used: Vec<f64> = graph
                .out_edges(&node)
                .iter()
                .filter(|e| e.used)
                .map(|e| e.split_percentage)
                .collect();
            if !used.is_empty() {
                assert_abs_diff_eq!(used.iter().sum::<f64>(), 1.0, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn a_drained_node_is_reported() {
        let mut graph = load("../test_data/fork.json");
        assign_splits(&mut graph, 3, 0, &[2], &[4.0], 10.0).unwrap();
        // force the flagged situation: a used path node without volume
        graph.get_node_mut(&1).unwrap().received_attack_volume = 0.0;
        graph.get_edge_mut(&1, &0).unwrap().split_percentage = 0.0;
        let sinks = BTreeSet::from([0, 2]);
        let violations = verify_splits(&graph, &sinks);
        assert_eq!(
            violations,
            vec![RoundingViolation {
                node: 1,
                split_sum: 0.0
            }]
        );
    }
}
