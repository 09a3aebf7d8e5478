use crate::core_types::{Edge, Graph, GraphError};
use crate::{CostParams, ID};

use itertools::Itertools;
use log::trace;

/// Builds the weighted search graph the centralized solvers run on: travel
/// along the existing attack flows is free, every other original edge costs
/// a step, every edge gains a reversed synthetic twin, and edges entering a
/// sink are priced so that sinks stay terminals.
pub(crate) fn build_augmented_graph(
    graph: &Graph,
    victim: ID,
    source: ID,
    allies: &[ID],
    params: &CostParams,
) -> Result<Graph, GraphError> {
    let mut augmented = graph.clone();
    for edge in augmented.edges_mut() {
        edge.on_attack_path = false;
        edge.used = false;
        edge.weight = params.step_cost;
    }
    for flow in graph.simple_paths(&source, &victim) {
        for (u, v) in flow.iter().tuple_windows() {
            if let Some(edge) = augmented.get_edge_mut(u, v) {
                edge.weight = 0.0;
                edge.on_attack_path = true;
            }
        }
    }
    for (u, v) in augmented.sorted_edge_endpoints() {
        augmented.insert_edge(Edge::synthetic(
            v,
            u,
            params.change_cost + params.step_cost,
        ))?;
    }
    let mut sinks: Vec<ID> = allies.to_vec();
    sinks.push(victim);
    for edge in augmented.edges_mut() {
        if sinks.contains(&edge.destination) {
            edge.weight = params.unwanted_change_cost;
        }
    }
    trace!(
        "Augmented graph holds {} edges for {} original ones.",
        augmented.edge_count(),
        graph.edge_count()
    );
    Ok(augmented)
}
