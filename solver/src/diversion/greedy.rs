use super::augmented::build_augmented_graph;
use super::{apply_diversion_path, drop_unused_synthetic_edges, Diverted, DivertError};
use crate::core_types::Graph;
use crate::{CostParams, EdgeWeight, ID};

use log::debug;
use ordered_float::OrderedFloat;
use std::time::Instant;

/// Attaches one ally per round, always the one that is currently cheapest
/// to reach. Paths already paid for are free for later allies, so shared
/// stretches are reused. Ties fall to the smaller ally id.
pub(crate) fn divert(
    graph: &Graph,
    victim: ID,
    source: ID,
    allies: &[ID],
    params: &CostParams,
    deadline: Option<Instant>,
) -> Result<Diverted, DivertError> {
    let mut working = build_augmented_graph(graph, victim, source, allies, params)?;
    let mut unattached: Vec<ID> = allies.to_vec();
    unattached.sort_unstable();
    let mut diversion_cost = 0.0;
    while !unattached.is_empty() {
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return Err(DivertError::Timeout { partial: None });
            }
        }
        let mut cheapest: Option<(EdgeWeight, ID, Vec<ID>)> = None;
        for ally in &unattached {
            let (path, weight) = working
                .shortest_path_by_weight(&source, ally)
                .map_err(|_| DivertError::UnreachableAlly(*ally))?;
            let weight = OrderedFloat(weight);
            let improves = cheapest
                .as_ref()
                .map_or(true, |(best_weight, _, _)| weight < *best_weight);
            if improves {
                cheapest = Some((weight, *ally, path));
            }
        }
        if let Some((weight, ally, path)) = cheapest {
            debug!("Attaching ally {} at distance {}.", ally, weight);
            diversion_cost += apply_diversion_path(&mut working, &path)?;
            unattached.retain(|a| *a != ally);
        }
    }
    drop_unused_synthetic_edges(&mut working);
    Ok(Diverted {
        graph: working,
        diversion_cost,
    })
}
