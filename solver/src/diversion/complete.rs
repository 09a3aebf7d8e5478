use super::augmented::build_augmented_graph;
use super::{apply_diversion_path, drop_unused_synthetic_edges, greedy, Diverted, DivertError};
use crate::core_types::Graph;
use crate::{CostParams, ID};

use itertools::Itertools;
use log::{debug, warn};
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Tries every ally ordering and keeps the cheapest modification. Each
/// ordering owns its augmented graph, so the sweep parallelizes; the
/// reduction is by (cost, ordering index) which pins the winner to the
/// lexicographically smallest ordering no matter how many workers ran.
pub(crate) fn divert(
    graph: &Graph,
    victim: ID,
    source: ID,
    allies: &[ID],
    params: &CostParams,
    deadline: Option<Instant>,
) -> Result<Diverted, DivertError> {
    if allies.len() > 8 {
        warn!(
            "Enumerating all orderings of {} allies; the greedy mode is advisable at this size.",
            allies.len()
        );
    }
    // The greedy pass is cheap and bounds the sweep from above; it also
    // guarantees a complete fallback result if the deadline cuts us short.
    let incumbent = greedy::divert(graph, victim, source, allies, params, None).ok();
    let mut ordered: Vec<ID> = allies.to_vec();
    ordered.sort_unstable();
    let orderings: Vec<Vec<ID>> = ordered
        .iter()
        .copied()
        .permutations(ordered.len())
        .collect();
    debug!("Sweeping {} ally orderings.", orderings.len());
    let expired = AtomicBool::new(false);
    let outcomes: Vec<Result<(usize, Diverted), DivertError>> = orderings
        .par_iter()
        .enumerate()
        .map(|(index, ordering)| {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    expired.store(true, Ordering::Relaxed);
                    return Err(DivertError::Timeout { partial: None });
                }
            }
            divert_ordering(graph, victim, source, ordering, params)
                .map(|diverted| (index, diverted))
        })
        .collect();

    let mut best: Option<(usize, Diverted)> = None;
    let mut first_failure: Option<DivertError> = None;
    for outcome in outcomes {
        match outcome {
            Ok((index, diverted)) => {
                let replace = match &best {
                    None => true,
                    Some((best_index, best_diverted)) => {
                        (OrderedFloat(diverted.diversion_cost), index)
                            < (OrderedFloat(best_diverted.diversion_cost), *best_index)
                    }
                };
                if replace {
                    best = Some((index, diverted));
                }
            }
            Err(DivertError::Timeout { .. }) => {}
            Err(failure) => {
                if first_failure.is_none() {
                    first_failure = Some(failure);
                }
            }
        }
    }
    let best = best.map(|(_, diverted)| diverted);

    if expired.load(Ordering::Relaxed) {
        let partial = match (best, incumbent) {
            (Some(swept), Some(warmup)) => {
                if swept.diversion_cost <= warmup.diversion_cost {
                    Some(swept)
                } else {
                    Some(warmup)
                }
            }
            (Some(swept), None) => Some(swept),
            (None, warmup) => warmup,
        };
        return Err(DivertError::Timeout { partial });
    }
    match best {
        Some(diverted) => {
            debug!("Cheapest ordering diverts for {}.", diverted.diversion_cost);
            Ok(diverted)
        }
        None => Err(first_failure.unwrap_or(DivertError::UnreachableAlly(ordered[0]))),
    }
}

/// Connects the allies in the given order, cheapest path first each time
fn divert_ordering(
    graph: &Graph,
    victim: ID,
    source: ID,
    ordering: &[ID],
    params: &CostParams,
) -> Result<Diverted, DivertError> {
    let mut working = build_augmented_graph(graph, victim, source, ordering, params)?;
    let mut diversion_cost = 0.0;
    for ally in ordering {
        let (path, _) = working
            .shortest_path_by_weight(&source, ally)
            .map_err(|_| DivertError::UnreachableAlly(*ally))?;
        diversion_cost += apply_diversion_path(&mut working, &path)?;
    }
    drop_unused_synthetic_edges(&mut working);
    Ok(Diverted {
        graph: working,
        diversion_cost,
    })
}
