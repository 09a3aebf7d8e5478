use super::DivertError;
use crate::core_types::{EdgeOrigin, Graph};
use crate::ID;

use itertools::Itertools;
use log::{debug, trace, warn};
use pathfinding::prelude::dijkstra_all;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::time::Instant;

/// Volume an edge carries toward one particular sink
type DestVolumes = HashMap<(ID, ID), BTreeMap<ID, f64>>;

/// Approximates the centralized result with the knowledge an AS actually
/// has: the hop length of an undirected route to each ally. Starting from
/// the nodes already carrying attack traffic, the closest (node, ally)
/// pair attaches the ally by reversing the edges along that route; volumes
/// are then pushed back up toward the source and turned into splits.
pub(crate) fn divert(
    graph: &Graph,
    victim: ID,
    source: ID,
    allies: &[ID],
    capacities: &[f64],
    attack_volume: f64,
    deadline: Option<Instant>,
) -> Result<Graph, DivertError> {
    let mut working = graph.clone();
    let sinks: BTreeSet<ID> = allies.iter().copied().chain([victim]).collect();
    let capacity_of: BTreeMap<ID, f64> = allies
        .iter()
        .copied()
        .zip(capacities.iter().copied())
        .collect();
    let distances = ally_distances(&working, allies, &sinks);

    // the initial attack flow seeds the region reachable by the source
    let attack_path = working.shortest_path_by_hops(&source, &victim)?;
    let mut reachable: BTreeSet<ID> = attack_path.iter().copied().collect();
    for (u, v) in attack_path.iter().tuple_windows() {
        if let Some(edge) = working.get_edge_mut(u, v) {
            edge.on_attack_path = true;
        }
    }

    let mut volumes: DestVolumes = HashMap::new();
    let mut unattached: BTreeSet<ID> = allies.iter().copied().collect();
    while let Some(first_unattached) = unattached.iter().next().copied() {
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return Err(DivertError::Timeout { partial: None });
            }
        }
        let mut pick: Option<(usize, ID, ID)> = None;
        for node in reachable.iter().filter(|n| !sinks.contains(n)) {
            if let Some(node_distances) = distances.get(node) {
                for (ally, hops) in node_distances {
                    if !unattached.contains(ally) {
                        continue;
                    }
                    let improves = pick.as_ref().map_or(true, |(best, _, _)| hops < best);
                    if improves {
                        pick = Some((*hops, *node, *ally));
                    }
                }
            }
        }
        let (hops, from, ally) = match pick {
            Some(pick) => pick,
            None => return Err(DivertError::UnreachableAlly(first_unattached)),
        };
        debug!("Attaching ally {} {} hops away from node {}.", ally, hops, from);
        let path = working
            .undirected_shortest_path(&from, &ally)
            .ok_or(DivertError::UnreachableAlly(ally))?;
        let capacity = *capacity_of.get(&ally).unwrap_or(&0.0);
        for (u, v) in path.iter().tuple_windows() {
            if working.has_edge(v, u) {
                working.remove_edge(v, u)?;
                working.add_edge(*u, *v)?;
                if let Some(edge) = working.get_edge_mut(u, v) {
                    edge.origin = EdgeOrigin::Synthetic;
                }
            }
            if let Some(edge) = working.get_edge_mut(u, v) {
                edge.on_attack_path = true;
            }
            volumes.entry((*u, *v)).or_default().insert(ally, capacity);
            reachable.insert(*v);
        }
        propagate_volume(&working, &mut volumes, from, capacity, source, ally);
        unattached.remove(&ally);
    }

    // the victim carries whatever the allies cannot scrub
    let residual = attack_volume - capacities.iter().sum::<f64>();
    propagate_volume(&working, &mut volumes, victim, residual, source, victim);
    settle(&mut working, &volumes, source, attack_volume);
    Ok(working)
}

/// Hop distances from every non-sink node to every ally, ignoring edge
/// directions. This is the information an AS reads off the path lengths
/// its routing table already announces.
fn ally_distances(
    graph: &Graph,
    allies: &[ID],
    sinks: &BTreeSet<ID>,
) -> HashMap<ID, BTreeMap<ID, usize>> {
    let mut distances: HashMap<ID, BTreeMap<ID, usize>> = HashMap::new();
    for ally in allies {
        let reached = dijkstra_all(ally, |n: &ID| {
            graph
                .undirected_neighbors(n)
                .into_iter()
                .map(|m| (m, 1usize))
                .collect::<Vec<_>>()
        });
        for node in graph.get_node_ids() {
            if sinks.contains(&node) {
                continue;
            }
            if let Some((_, hops)) = reached.get(&node) {
                distances.entry(node).or_default().insert(*ally, *hops);
            }
        }
    }
    distances
}

/// Walks upstream from the node that started carrying traffic toward a
/// destination and records, per edge, how much of that traffic it relays.
/// A node's outflow is split equally over the incoming edges whose origin
/// the source can feed and whose use would not close a cycle.
fn propagate_volume(
    graph: &Graph,
    volumes: &mut DestVolumes,
    start: ID,
    carry: f64,
    source: ID,
    destination: ID,
) {
    let mut fed_by_source = graph.descendants(&source);
    fed_by_source.insert(source);
    let mut queue = VecDeque::from([start]);
    let mut visited: BTreeSet<ID> = BTreeSet::new();
    while let Some(current) = queue.pop_front() {
        if !visited.insert(current) {
            continue;
        }
        let outgoing: f64 = if current == start {
            carry
        } else {
            graph
                .out_edges(&current)
                .iter()
                .map(|e| {
                    volumes
                        .get(&(current, e.destination))
                        .and_then(|per_destination| per_destination.get(&destination))
                        .copied()
                        .unwrap_or(0.0)
                })
                .sum()
        };
        if outgoing == 0.0 {
            continue;
        }
        let downstream: BTreeSet<ID> = graph.descendants(&current);
        let feeders: Vec<ID> = graph
            .in_neighbors(&current)
            .into_iter()
            .filter(|u| fed_by_source.contains(u) && !downstream.contains(u))
            .collect();
        if feeders.is_empty() {
            if current != source {
                trace!(
                    "No upstream edge feeds node {}; {} toward {} stops here.",
                    current,
                    outgoing,
                    destination
                );
            }
            continue;
        }
        let share = outgoing / feeders.len() as f64;
        for feeder in feeders {
            volumes
                .entry((feeder, current))
                .or_default()
                .insert(destination, share);
            queue.push_back(feeder);
        }
    }
}

/// Folds the per-destination volumes into absolute edge volumes, received
/// volumes per node and split fractions per outgoing edge
fn settle(graph: &mut Graph, volumes: &DestVolumes, source: ID, attack_volume: f64) {
    let mut edge_volume: BTreeMap<(ID, ID), f64> = BTreeMap::new();
    for ((u, v), per_destination) in volumes {
        let total: f64 = per_destination.values().sum();
        if total > 0.0 {
            edge_volume.insert((*u, *v), total);
        }
    }
    for node in graph.get_node_ids() {
        let incoming: f64 = if node == source {
            attack_volume
        } else {
            graph
                .in_neighbors(&node)
                .iter()
                .map(|u| edge_volume.get(&(*u, node)).copied().unwrap_or(0.0))
                .sum()
        };
        if let Some(entry) = graph.get_node_mut(&node) {
            entry.received_attack_volume = incoming;
        }
        let outgoing: Vec<(ID, f64)> = graph
            .out_edges(&node)
            .iter()
            .filter_map(|e| {
                edge_volume
                    .get(&(node, e.destination))
                    .map(|volume| (e.destination, *volume))
            })
            .collect();
        if outgoing.is_empty() {
            continue;
        }
        if incoming <= 0.0 {
            warn!(
                "Node {} forwards attack traffic but receives none; its splits stay at zero.",
                node
            );
            continue;
        }
        for (next, volume) in outgoing {
            if let Some(edge) = graph.get_edge_mut(&node, &next) {
                edge.used = true;
                edge.split_percentage = volume / incoming;
            }
        }
    }
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
    fn fork_splits_toward_ally_and_victim() {
        let graph = load("../test_data/fork.json");
        let actual = divert(&graph, 0, 3, &[2], &[4.0], 10.0, None).unwrap();
        // no reversal was necessary
        assert_eq!(actual.sorted_edges().len(), graph.sorted_edges().len());
        assert_eq!(actual.synthetic_edge_count(), 0);
        // the victim's residual flows equally over both its in-edges, so the
        // branch through the ally carries its capacity plus half of that
        assert_abs_diff_eq!(
            actual.get_edge(&3, &2).unwrap().split_percentage,
            0.7,
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(
            actual.get_edge(&3, &1).unwrap().split_percentage,
            0.3,
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(
            actual.get_node(&2).unwrap().received_attack_volume,
            7.0,
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(
            actual.get_node(&0).unwrap().received_attack_volume,
            6.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn diamond_routes_capacity_through_the_ally() {
        let graph = load("../test_data/diamond.json");
        let actual = divert(&graph, 0, 5, &[4], &[3.0], 10.0, None).unwrap();
        assert_eq!(actual.synthetic_edge_count(), 0);
        assert_abs_diff_eq!(
            actual.get_edge(&5, &4).unwrap().split_percentage,
            0.65,
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(
            actual.get_edge(&5, &3).unwrap().split_percentage,
            0.35,
            epsilon = 1e-9
        );
        // the ally absorbs its capacity and forwards the rest
        let ally = actual.get_node(&4).unwrap();
        let forwarded: f64 = actual
            .out_edges(&4)
            .iter()
            .map(|e| e.split_percentage * ally.received_attack_volume)
            .sum();
        assert_abs_diff_eq!(ally.received_attack_volume - forwarded, 3.0, epsilon = 1e-9);
    }

    #[test]
    fn side_branch_attachment_reverses_the_edge() {
        let graph = load("../test_data/deep_branch.json");
        let actual = divert(&graph, 0, 5, &[2], &[2.0], 10.0, None).unwrap();
        assert!(actual.has_edge(&0, &2));
        assert!(!actual.has_edge(&2, &0));
        assert_eq!(actual.synthetic_edge_count(), 1);
        // the victim forwards the ally capacity and keeps the rest
        assert_abs_diff_eq!(
            actual.get_edge(&0, &2).unwrap().split_percentage,
            0.2,
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(
            actual.get_node(&2).unwrap().received_attack_volume,
            2.0,
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(
            actual.get_node(&0).unwrap().received_attack_volume,
            10.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn every_node_still_reaches_a_sink() {
        let graph = load("../test_data/mesh.json");
        let actual = divert(&graph, 0, 9, &[5, 6], &[2.0, 3.0], 10.0, None).unwrap();
        let sinks = BTreeSet::from([0, 5, 6]);
        for node in actual.get_node_ids() {
            if sinks.contains(&node) {
                continue;
            }
            let descendants = actual.descendants(&node);
            assert!(
                descendants.iter().any(|d| sinks.contains(d)),
                "node {} lost every sink",
                node
            );
        }
    }

    #[test]
    fn splits_conserve_traffic_at_forwarding_nodes() {
        let graph = load("../test_data/mesh.json");
        let actual = divert(&graph, 0, 9, &[5, 6], &[2.0, 3.0], 10.0, None).unwrap();
        let sinks = BTreeSet::from([0, 5, 6]);
        for node in actual.get_node_ids() {
            if sinks.contains(&node) {
                continue;
            }
            let used: Vec<f64> = actual
                .out_edges(&node)
                .iter()
                .filter(|e| e.used)
                .map(|e| e.split_percentage)
                .collect();
            if used.is_empty() {
                continue;
            }
            assert_abs_diff_eq!(used.iter().sum::<f64>(), 1.0, epsilon = 1e-6);
        }
    }
}
