use crate::core_types::error::GraphError;
use crate::traversal::pathfinding::cheapest_path;
use crate::ID;

use log::debug;
use pathfinding::directed::bfs::bfs_reach;
use pathfinding::directed::topological_sort::topological_sort;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

pub use topology_parser::NodeKind;

/// Part an AS plays in the diversion
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    #[default]
    Standard,
    Source,
    Victim,
    Ally,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Node {
    pub id: ID,
    pub kind: NodeKind,
    pub role: NodeRole,
    /// Attack traffic arriving at this AS once the splits are laid down
    pub received_attack_volume: f64,
}

impl Node {
    pub fn new(id: ID, kind: NodeKind) -> Self {
        Self {
            id,
            kind,
            role: NodeRole::Standard,
            received_attack_volume: 0.0,
        }
    }
}

/// Whether an edge belongs to the input topology or is the reversed twin
/// synthesized while searching for a diversion
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EdgeOrigin {
    Original,
    Synthetic,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Edge {
    pub source: ID,
    pub destination: ID,
    pub weight: f64,
    pub on_attack_path: bool,
    /// True once a computed path traversed this edge
    pub used: bool,
    pub split_percentage: f64,
    pub origin: EdgeOrigin,
}

impl Edge {
    pub fn new(source: ID, destination: ID) -> Self {
        Self {
            source,
            destination,
            weight: 0.0,
            on_attack_path: false,
            used: false,
            split_percentage: 0.0,
            origin: EdgeOrigin::Original,
        }
    }

    pub(crate) fn synthetic(source: ID, destination: ID, weight: f64) -> Self {
        Self {
            source,
            destination,
            weight,
            on_attack_path: false,
            used: false,
            split_percentage: 0.0,
            origin: EdgeOrigin::Synthetic,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Graph {
    pub(crate) nodes: Vec<Node>,
    #[serde(rename = "adjacency")]
    pub(crate) edges: HashMap<ID, Vec<Edge>>,
}

impl Graph {
    pub fn new(nodes: Vec<Node>) -> Self {
        let edges = nodes.iter().map(|n| (n.id, Vec::default())).collect();
        Self { nodes, edges }
    }

    /// Transform a parsed topology into a working graph, rejecting cyclic input
    pub fn from_topology(topology: &topology_parser::Graph) -> Result<Graph, GraphError> {
        let mut nodes: Vec<Node> = topology
            .nodes
            .iter()
            .map(|n| Node::new(n.id, n.kind))
            .collect();
        nodes.sort_by_key(|n| n.id);
        let mut graph = Graph::new(nodes);
        for adjacency in topology.edges.values() {
            for edge in adjacency {
                graph.add_edge(edge.source, edge.destination)?;
            }
        }
        let node_ids = graph.get_node_ids();
        topological_sort(&node_ids, |n| graph.sorted_out_neighbors(n))
            .map_err(|_| GraphError::Cyclic)?;
        debug!(
            "Topology with {} nodes and {} edges is acyclic.",
            graph.node_count(),
            graph.edge_count()
        );
        Ok(graph)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(|adj| adj.len()).sum()
    }

    /// Sorted for reproducibility because the adjacency is a HashMap
    pub fn get_node_ids(&self) -> Vec<ID> {
        let mut ids: Vec<ID> = self.nodes.iter().map(|n| n.id).collect();
        ids.sort_unstable();
        ids
    }

    pub fn contains_node(&self, node: &ID) -> bool {
        self.nodes.iter().any(|n| n.id == *node)
    }

    pub fn get_node(&self, node: &ID) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == *node)
    }

    pub(crate) fn get_node_mut(&mut self, node: &ID) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == *node)
    }

    pub(crate) fn set_role(&mut self, node: &ID, role: NodeRole) -> Result<(), GraphError> {
        match self.get_node_mut(node) {
            Some(n) => {
                n.role = role;
                Ok(())
            }
            None => Err(GraphError::UnknownNode(*node)),
        }
    }

    pub fn add_edge(&mut self, from: ID, to: ID) -> Result<(), GraphError> {
        self.insert_edge(Edge::new(from, to))
    }

    pub(crate) fn insert_edge(&mut self, edge: Edge) -> Result<(), GraphError> {
        if edge.source == edge.destination {
            return Err(GraphError::SelfLoop(edge.source));
        }
        if !self.contains_node(&edge.source) {
            return Err(GraphError::UnknownNode(edge.source));
        }
        if !self.contains_node(&edge.destination) {
            return Err(GraphError::UnknownNode(edge.destination));
        }
        if self.has_edge(&edge.source, &edge.destination) {
            return Err(GraphError::DuplicateEdge(edge.source, edge.destination));
        }
        self.edges.entry(edge.source).or_default().push(edge);
        Ok(())
    }

    pub fn remove_edge(&mut self, from: &ID, to: &ID) -> Result<(), GraphError> {
        let adjacent = self
            .edges
            .get_mut(from)
            .ok_or(GraphError::MissingEdge(*from, *to))?;
        let len_before = adjacent.len();
        adjacent.retain(|e| e.destination != *to);
        if adjacent.len() == len_before {
            return Err(GraphError::MissingEdge(*from, *to));
        }
        Ok(())
    }

    pub fn has_edge(&self, from: &ID, to: &ID) -> bool {
        self.get_edge(from, to).is_some()
    }

    pub fn get_edge(&self, from: &ID, to: &ID) -> Option<&Edge> {
        self.edges
            .get(from)
            .and_then(|adj| adj.iter().find(|e| e.destination == *to))
    }

    pub(crate) fn get_edge_mut(&mut self, from: &ID, to: &ID) -> Option<&mut Edge> {
        self.edges
            .get_mut(from)
            .and_then(|adj| adj.iter_mut().find(|e| e.destination == *to))
    }

    pub fn out_edges(&self, node: &ID) -> Vec<Edge> {
        match self.edges.get(node) {
            Some(adjacent) => adjacent.clone(),
            None => Vec::default(),
        }
    }

    pub fn in_edges(&self, node: &ID) -> Vec<Edge> {
        let mut incoming: Vec<Edge> = self
            .edges
            .values()
            .flatten()
            .filter(|e| e.destination == *node)
            .cloned()
            .collect();
        incoming.sort_by_key(|e| e.source);
        incoming
    }

    pub(crate) fn sorted_out_neighbors(&self, node: &ID) -> Vec<ID> {
        let mut neighbors: Vec<ID> = self
            .out_edges(node)
            .iter()
            .map(|e| e.destination)
            .collect();
        neighbors.sort_unstable();
        neighbors
    }

    pub(crate) fn in_neighbors(&self, node: &ID) -> Vec<ID> {
        self.in_edges(node).iter().map(|e| e.source).collect()
    }

    /// Neighbors regardless of edge direction
    pub(crate) fn undirected_neighbors(&self, node: &ID) -> Vec<ID> {
        let mut neighbors: BTreeSet<ID> = self.sorted_out_neighbors(node).into_iter().collect();
        neighbors.extend(self.in_neighbors(node));
        neighbors.into_iter().collect()
    }

    pub(crate) fn edges_mut(&mut self) -> impl Iterator<Item = &mut Edge> {
        self.edges.values_mut().flatten()
    }

    pub(crate) fn retain_edges<F>(&mut self, keep: F)
    where
        F: Fn(&Edge) -> bool,
    {
        for adjacent in self.edges.values_mut() {
            adjacent.retain(|e| keep(e));
        }
    }

    /// All edges ordered by (source, destination)
    pub fn sorted_edges(&self) -> Vec<Edge> {
        let mut all: Vec<Edge> = self.edges.values().flatten().cloned().collect();
        all.sort_by_key(|e| (e.source, e.destination));
        all
    }

    pub(crate) fn sorted_edge_endpoints(&self) -> Vec<(ID, ID)> {
        self.sorted_edges()
            .iter()
            .map(|e| (e.source, e.destination))
            .collect()
    }

    /// Edge set with the orientation stripped off
    pub fn unordered_edge_pairs(&self) -> BTreeSet<(ID, ID)> {
        self.sorted_edge_endpoints()
            .iter()
            .map(|(u, v)| (*u.min(v), *u.max(v)))
            .collect()
    }

    pub fn synthetic_edge_count(&self) -> usize {
        self.edges
            .values()
            .flatten()
            .filter(|e| e.origin == EdgeOrigin::Synthetic)
            .count()
    }

    /// All nodes reachable from the given node, excluding the node itself
    pub fn descendants(&self, node: &ID) -> BTreeSet<ID> {
        bfs_reach(*node, |n| self.sorted_out_neighbors(n))
            .skip(1)
            .collect()
    }

    pub fn ancestors(&self, node: &ID) -> BTreeSet<ID> {
        bfs_reach(*node, |n| self.in_neighbors(n)).skip(1).collect()
    }

    /// Lazily enumerates all simple paths between two nodes in a fixed order
    pub fn simple_paths(&self, from: &ID, to: &ID) -> SimplePaths<'_> {
        SimplePaths::new(self, *from, *to)
    }

    /// Minimum-weight simple path; the lexicographically smallest one wins
    /// when several have equal total weight
    pub fn shortest_path_by_weight(
        &self,
        from: &ID,
        to: &ID,
    ) -> Result<(Vec<ID>, f64), GraphError> {
        for node in [from, to] {
            if !self.contains_node(node) {
                return Err(GraphError::UnknownNode(*node));
            }
        }
        cheapest_path(*from, *to, |n| {
            self.out_edges(&n)
                .iter()
                .map(|e| (e.destination, e.weight))
                .collect()
        })
        .ok_or(GraphError::NoPath(*from, *to))
    }

    /// Hop-count shortest simple path, ties broken lexicographically
    pub fn shortest_path_by_hops(&self, from: &ID, to: &ID) -> Result<Vec<ID>, GraphError> {
        for node in [from, to] {
            if !self.contains_node(node) {
                return Err(GraphError::UnknownNode(*node));
            }
        }
        cheapest_path(*from, *to, |n| {
            self.sorted_out_neighbors(&n)
                .into_iter()
                .map(|m| (m, 1.0))
                .collect()
        })
        .map(|(path, _)| path)
        .ok_or(GraphError::NoPath(*from, *to))
    }

    /// Hop-count shortest path ignoring edge directions
    pub(crate) fn undirected_shortest_path(&self, from: &ID, to: &ID) -> Option<Vec<ID>> {
        cheapest_path(*from, *to, |n| {
            self.undirected_neighbors(&n)
                .into_iter()
                .map(|m| (m, 1.0))
                .collect()
        })
        .map(|(path, _)| path)
    }
}

pub struct SimplePaths<'a> {
    graph: &'a Graph,
    to: ID,
    path: Vec<ID>,
    stack: Vec<(Vec<ID>, usize)>,
}

impl<'a> SimplePaths<'a> {
    fn new(graph: &'a Graph, from: ID, to: ID) -> Self {
        let (path, stack) = if graph.contains_node(&from) && from != to {
            (vec![from], vec![(graph.sorted_out_neighbors(&from), 0)])
        } else {
            (Vec::default(), Vec::default())
        };
        Self {
            graph,
            to,
            path,
            stack,
        }
    }
}

impl Iterator for SimplePaths<'_> {
    type Item = Vec<ID>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((successors, cursor)) = self.stack.last_mut() {
            if *cursor >= successors.len() {
                self.stack.pop();
                self.path.pop();
                continue;
            }
            let candidate = successors[*cursor];
            *cursor += 1;
            if candidate == self.to {
                let mut found = self.path.clone();
                found.push(candidate);
                return Some(found);
            }
            if self.path.contains(&candidate) {
                continue;
            }
            let next_successors = self.graph.sorted_out_neighbors(&candidate);
            self.path.push(candidate);
            self.stack.push((next_successors, 0));
        }
        None
    }
}
