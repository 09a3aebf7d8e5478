use crate::core_types::Graph;
use crate::{CostParams, ID};

use itertools::Itertools;
use serde::Serialize;
use std::collections::BTreeSet;

/// Price of turning the input graph into the modified one
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditCost {
    /// Reversals, each of which edits two routing tables
    pub reversal_cost: f64,
    /// Edges the diversion added to the attack flows
    pub path_cost: f64,
}

impl EditCost {
    pub fn total(&self) -> f64 {
        self.reversal_cost + self.path_cost
    }
}

/// Compares the modified graph against the input it was derived from
pub fn edit_cost(
    original: &Graph,
    modified: &Graph,
    source: ID,
    victim: ID,
    allies: &[ID],
    params: &CostParams,
) -> EditCost {
    let reversals = original
        .sorted_edges()
        .iter()
        .filter(|e| !modified.has_edge(&e.source, &e.destination))
        .count();
    let reversal_cost = 2.0 * params.router_entry_cost * reversals as f64;

    let mut sinks: Vec<ID> = allies.to_vec();
    sinks.push(victim);
    sinks.sort_unstable();
    let edges_before = attack_flow_edges(original, source, &sinks).len() as i64;
    let edges_after = attack_flow_edges(modified, source, &sinks).len() as i64;
    let path_cost = params.step_cost * (edges_after - edges_before) as f64;

    EditCost {
        reversal_cost,
        path_cost,
    }
}

/// Union of the edges on all simple paths from the source to any sink
fn attack_flow_edges(graph: &Graph, source: ID, sinks: &[ID]) -> BTreeSet<(ID, ID)> {
    let mut edges = BTreeSet::default();
    for sink in sinks {
        for flow in graph.simple_paths(&source, sink) {
            for (u, v) in flow.iter().tuple_windows() {
                edges.insert((*u, *v));
            }
        }
    }
    edges
}
