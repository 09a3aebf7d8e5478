use log::warn;
use serde::Deserialize;
use std::collections::HashMap;

use crate::*;

#[derive(Deserialize, Debug, Default)]
pub struct RawGraph {
    pub(crate) nodes: Vec<RawNode>,
    #[serde(alias = "adjacency")]
    pub(crate) edges: Vec<Vec<RawEdge>>,
}

#[derive(Deserialize, Debug, Clone, Default, Eq, PartialEq)]
pub struct RawNode {
    pub(crate) id: Option<ID>,
    pub(crate) kind: Option<NodeKind>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct RawEdge {
    pub(crate) source: Option<ID>,
    pub(crate) destination: Option<ID>,
}

impl Node {
    fn from_raw(raw_node: &RawNode) -> Option<Node> {
        raw_node.id.map(|id| Node {
            id,
            kind: raw_node.kind.unwrap_or_default(),
        })
    }
}

impl Edge {
    fn from_raw(raw_edge: &RawEdge) -> Option<Edge> {
        match (raw_edge.source, raw_edge.destination) {
            (Some(source), Some(destination)) => Some(Edge {
                source,
                destination,
            }),
            _ => None,
        }
    }
}

impl Graph {
    pub(crate) fn from_raw(raw_graph: RawGraph) -> Graph {
        // discard nodes without an id
        let nodes: Vec<Node> = raw_graph
            .nodes
            .iter()
            .filter_map(Node::from_raw)
            .collect();
        let mut edges: HashMap<ID, Vec<Edge>> = HashMap::with_capacity(nodes.len());
        for node in &nodes {
            edges.insert(node.id, Vec::default());
        }
        for adjacency in &raw_graph.edges {
            for raw_edge in adjacency {
                let edge = match Edge::from_raw(raw_edge) {
                    Some(edge) => edge,
                    None => continue,
                };
                if !nodes.iter().any(|n| n.id == edge.source)
                    || !nodes.iter().any(|n| n.id == edge.destination)
                {
                    warn!(
                        "Discarding edge ({}, {}) with unknown endpoint.",
                        edge.source, edge.destination
                    );
                    continue;
                }
                if edge.source == edge.destination {
                    warn!("Discarding self-loop at node {}.", edge.source);
                    continue;
                }
                let adjacent = edges.entry(edge.source).or_default();
                if adjacent.contains(&edge) {
                    warn!(
                        "Discarding duplicate edge ({}, {}).",
                        edge.source, edge.destination
                    );
                    continue;
                }
                adjacent.push(edge);
            }
        }
        Graph { nodes, edges }
    }
}
