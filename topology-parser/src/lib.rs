use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

mod helpers;
use helpers::*;

pub type ID = u32;

/// Classification assigned by the topology generator
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    #[serde(alias = "T")]
    Transit,
    #[serde(alias = "M")]
    Mid,
    #[default]
    #[serde(alias = "C")]
    Customer,
    #[serde(alias = "CP")]
    ContentProvider,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Node {
    pub id: ID,
    #[serde(default)]
    pub kind: NodeKind,
}

/// A directed edge encoding the forwarding direction chosen for traffic
/// destined to the victim AS
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Edge {
    pub source: ID,
    pub destination: ID,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    #[serde(rename = "adjacency")]
    pub edges: HashMap<ID, Vec<Edge>>,
}

pub fn from_json_str(json_str: &str) -> Result<Graph, serde_json::Error> {
    let raw_graph: RawGraph = serde_json::from_str(json_str)?;
    Ok(Graph::from_raw(raw_graph))
}

pub fn from_json_file(path: &Path) -> Result<Graph, serde_json::Error> {
    let json_str = fs::read_to_string(path).expect("Error reading file");
    from_json_str(&json_str)
}

impl Graph {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(|adj| adj.len()).sum()
    }

    pub fn contains_node(&self, node: &ID) -> bool {
        self.nodes.iter().any(|n| n.id == *node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json_str() -> String {
        let json_str = r##"{
            "nodes": [
                {"id": 0, "kind": "customer"},
                {"id": 1, "kind": "transit"},
                {"id": 2, "kind": "CP"},
                {"id": 3, "kind": "mid"}
            ],
            "adjacency": [
                [{"source": 1, "destination": 0}],
                [{"source": 2, "destination": 0}],
                [
                    {"source": 3, "destination": 1},
                    {"source": 3, "destination": 2}
                ]
            ]
        }"##;
        json_str.to_string()
    }

    #[test]
    fn parse_works() {
        let graph = from_json_str(&json_str()).unwrap();
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 4);
        assert!(graph.contains_node(&3));
        assert!(!graph.contains_node(&4));
    }

    #[test]
    fn kind_aliases_are_accepted() {
        let graph = from_json_str(&json_str()).unwrap();
        let kinds: Vec<NodeKind> = graph.nodes.iter().map(|n| n.kind).collect();
        let expected = vec![
            NodeKind::Customer,
            NodeKind::Transit,
            NodeKind::ContentProvider,
            NodeKind::Mid,
        ];
        assert_eq!(kinds, expected);
    }

    #[test]
    fn edges_with_unknown_endpoints_are_discarded() {
        let json_str = r##"{
            "nodes": [{"id": 0}, {"id": 1}],
            "adjacency": [
                [{"source": 1, "destination": 0}],
                [{"source": 7, "destination": 0}],
                [{"source": 1, "destination": 9}]
            ]
        }"##;
        let graph = from_json_str(json_str).unwrap();
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn self_loops_and_duplicates_are_discarded() {
        let json_str = r##"{
            "nodes": [{"id": 0}, {"id": 1}],
            "adjacency": [
                [
                    {"source": 1, "destination": 0},
                    {"source": 1, "destination": 0},
                    {"source": 1, "destination": 1}
                ]
            ]
        }"##;
        let graph = from_json_str(json_str).unwrap();
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn read_from_file() {
        let json_file = Path::new("../test_data/fork.json");
        let graph = from_json_file(json_file).unwrap();
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 4);
    }
}
