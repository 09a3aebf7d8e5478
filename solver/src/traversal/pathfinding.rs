use crate::{EdgeWeight, ID};

use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Dijkstra over (weight, path) labels. Keeping whole paths in the labels
/// pins the result to the lexicographically smallest of all minimum-weight
/// simple paths, independent of hash iteration order.
pub(crate) fn cheapest_path<S>(from: ID, to: ID, mut successors: S) -> Option<(Vec<ID>, f64)>
where
    S: FnMut(ID) -> Vec<(ID, f64)>,
{
    let mut best: HashMap<ID, (EdgeWeight, Vec<ID>)> = HashMap::new();
    let mut heap: BinaryHeap<Reverse<(EdgeWeight, Vec<ID>)>> = BinaryHeap::new();
    best.insert(from, (OrderedFloat(0.0), vec![from]));
    heap.push(Reverse((OrderedFloat(0.0), vec![from])));
    while let Some(Reverse((weight, path))) = heap.pop() {
        let node = match path.last() {
            Some(node) => *node,
            None => continue,
        };
        if let Some((best_weight, best_path)) = best.get(&node) {
            // a better label has been recorded since this one was queued
            if *best_weight < weight || (*best_weight == weight && *best_path < path) {
                continue;
            }
        }
        if node == to {
            return Some((path, weight.into_inner()));
        }
        for (next, edge_weight) in successors(node) {
            if path.contains(&next) {
                continue;
            }
            let next_weight = weight + OrderedFloat(edge_weight);
            let mut next_path = path.clone();
            next_path.push(next);
            let improves = match best.get(&next) {
                None => true,
                Some((known_weight, known_path)) => {
                    next_weight < *known_weight
                        || (next_weight == *known_weight && next_path < *known_path)
                }
            };
            if improves {
                best.insert(next, (next_weight, next_path.clone()));
                heap.push(Reverse((next_weight, next_path)));
            }
        }
    }
    None
}
