use crate::core_types::{EdgeOrigin, Graph, GraphError};
use crate::ID;

use itertools::Itertools;

pub mod augmented;
pub mod complete;
pub mod decentralized;
pub mod greedy;

/// A modified graph together with the weight the search paid for it
#[derive(Clone, Debug)]
pub struct Diverted {
    pub graph: Graph,
    pub diversion_cost: f64,
}

#[derive(Debug)]
pub enum DivertError {
    UnreachableAlly(ID),
    Timeout { partial: Option<Diverted> },
    Graph(GraphError),
}

impl From<GraphError> for DivertError {
    fn from(e: GraphError) -> Self {
        Self::Graph(e)
    }
}

/// Walks a chosen source-to-ally path in the augmented graph: sums up the
/// traversed weights, zeroes them so later allies travel the stretch for
/// free, removes the opposite orientation and marks synthetic edges used.
pub(crate) fn apply_diversion_path(graph: &mut Graph, path: &[ID]) -> Result<f64, GraphError> {
    let mut cost = 0.0;
    for (u, v) in path.iter().tuple_windows() {
        {
            let edge = graph
                .get_edge_mut(u, v)
                .ok_or(GraphError::MissingEdge(*u, *v))?;
            cost += edge.weight;
            edge.weight = 0.0;
            if edge.origin == EdgeOrigin::Synthetic {
                edge.used = true;
            }
        }
        if graph.has_edge(v, u) {
            graph.remove_edge(v, u)?;
        }
    }
    Ok(cost)
}

/// Synthetic edges no path ever traversed have no business in the result
pub(crate) fn drop_unused_synthetic_edges(graph: &mut Graph) {
    graph.retain_edges(|e| e.origin == EdgeOrigin::Original || e.used);
}
