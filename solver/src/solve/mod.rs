use crate::core_types::{Graph, GraphError, NodeKind, NodeRole};
use crate::diversion::{complete, decentralized, greedy, DivertError};
use crate::splitting::{self, RoundingViolation};
use crate::stats;
use crate::{CostParams, SolveMode, ID};

use log::{info, warn};
use serde::Serialize;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub enum SolveError {
    /// A precondition on the inputs does not hold; fatal for the run
    InvalidInput(String),
    /// No ordering of reversals connects the source to this ally
    UnreachableAlly(ID),
    NoPath { from: ID, to: ID },
    /// The deadline expired; carries the best complete solution found so far
    Timeout { partial: Option<Box<SolveResult>> },
    Graph(GraphError),
}

impl fmt::Display for SolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(reason) => write!(f, "invalid input: {}", reason),
            Self::UnreachableAlly(ally) => {
                write!(f, "ally {} is unreachable from the source", ally)
            }
            Self::NoPath { from, to } => write!(f, "no path from {} to {}", from, to),
            Self::Timeout { partial } => write!(
                f,
                "deadline expired ({} partial result)",
                if partial.is_some() { "with" } else { "without" }
            ),
            Self::Graph(e) => write!(f, "graph operation failed: {}", e),
        }
    }
}

impl Error for SolveError {}

impl From<GraphError> for SolveError {
    fn from(e: GraphError) -> Self {
        match e {
            GraphError::NoPath(from, to) => Self::NoPath { from, to },
            other => Self::Graph(other),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct SolveResult {
    pub modified_graph: Graph,
    pub mode: SolveMode,
    pub cost: f64,
    pub source: ID,
    pub victim: ID,
    pub allies: Vec<ID>,
    pub capacities: Vec<f64>,
    pub seed: u64,
    /// Non-fatal findings of the split verification
    pub warnings: Vec<RoundingViolation>,
}

/// Dispatches a diversion request to the requested solver and normalizes
/// the outcome. The input graph is never touched; every solver runs on its
/// own copy and the result owns the modified graph.
pub struct Solver {
    graph: Graph,
    source: ID,
    victim: ID,
    allies: Vec<ID>,
    capacities: Vec<f64>,
    attack_volume: f64,
    mode: SolveMode,
    params: CostParams,
    deadline: Option<Duration>,
    seed: u64,
}

impl Solver {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        graph: Graph,
        source: ID,
        victim: ID,
        allies: Vec<ID>,
        capacities: Vec<f64>,
        attack_volume: f64,
        mode: SolveMode,
        seed: u64,
    ) -> Self {
        Self {
            graph,
            source,
            victim,
            allies,
            capacities,
            attack_volume,
            mode,
            params: CostParams::default(),
            deadline: None,
            seed,
        }
    }

    pub fn with_params(mut self, params: CostParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn solve(&self) -> Result<SolveResult, SolveError> {
        self.validate()?;
        info!(
            "Running {:?} diversion of {} toward {} allies on {} nodes and {} edges.",
            self.mode,
            self.attack_volume,
            self.allies.len(),
            self.graph.node_count(),
            self.graph.edge_count()
        );
        let mut working = self.graph.clone();
        working.set_role(&self.source, NodeRole::Source)?;
        working.set_role(&self.victim, NodeRole::Victim)?;
        for ally in &self.allies {
            working.set_role(ally, NodeRole::Ally)?;
        }
        let deadline = self.deadline.map(|d| Instant::now() + d);
        let outcome = match self.mode {
            SolveMode::CentralComplete => complete::divert(
                &working,
                self.victim,
                self.source,
                &self.allies,
                &self.params,
                deadline,
            )
            .map(|diverted| diverted.graph),
            SolveMode::CentralGreedy => greedy::divert(
                &working,
                self.victim,
                self.source,
                &self.allies,
                &self.params,
                deadline,
            )
            .map(|diverted| diverted.graph),
            SolveMode::Decentralized => decentralized::divert(
                &working,
                self.victim,
                self.source,
                &self.allies,
                &self.capacities,
                self.attack_volume,
                deadline,
            ),
        };
        match outcome {
            Ok(modified) => self.finish(modified),
            Err(DivertError::Timeout { partial }) => {
                let partial = match partial {
                    Some(diverted) => Some(Box::new(self.finish(diverted.graph)?)),
                    None => None,
                };
                Err(SolveError::Timeout { partial })
            }
            Err(DivertError::UnreachableAlly(ally)) => Err(SolveError::UnreachableAlly(ally)),
            Err(DivertError::Graph(e)) => Err(SolveError::from(e)),
        }
    }

    /// Splits, edit cost and the normalized result record
    fn finish(&self, mut modified: Graph) -> Result<SolveResult, SolveError> {
        let warnings = match self.mode {
            SolveMode::Decentralized => {
                let sinks: BTreeSet<ID> = self
                    .allies
                    .iter()
                    .copied()
                    .chain([self.victim])
                    .collect();
                splitting::verify_splits(&modified, &sinks)
            }
            _ => splitting::assign_splits(
                &mut modified,
                self.source,
                self.victim,
                &self.allies,
                &self.capacities,
                self.attack_volume,
            )?,
        };
        let cost = stats::edit_cost(
            &self.graph,
            &modified,
            self.source,
            self.victim,
            &self.allies,
            &self.params,
        );
        info!(
            "Diversion done: {} reversals, edit cost {}.",
            modified.synthetic_edge_count(),
            cost.total()
        );
        Ok(SolveResult {
            modified_graph: modified,
            mode: self.mode,
            cost: cost.total(),
            source: self.source,
            victim: self.victim,
            allies: self.allies.clone(),
            capacities: self.capacities.clone(),
            seed: self.seed,
            warnings,
        })
    }

    fn validate(&self) -> Result<(), SolveError> {
        let mut distinct: BTreeSet<ID> = BTreeSet::default();
        for node in [self.source, self.victim].iter().chain(&self.allies) {
            if !self.graph.contains_node(node) {
                return Err(SolveError::InvalidInput(format!(
                    "node {} is not in the topology",
                    node
                )));
            }
            if !distinct.insert(*node) {
                return Err(SolveError::InvalidInput(format!(
                    "source, victim and allies must be distinct (node {} repeats)",
                    node
                )));
            }
        }
        if self.allies.is_empty() {
            return Err(SolveError::InvalidInput(
                "at least one ally is required".to_string(),
            ));
        }
        if self.allies.len() != self.capacities.len() {
            return Err(SolveError::InvalidInput(format!(
                "{} allies but {} capacities",
                self.allies.len(),
                self.capacities.len()
            )));
        }
        if self.capacities.iter().any(|c| *c <= 0.0) {
            return Err(SolveError::InvalidInput(
                "every scrubbing capacity must be positive".to_string(),
            ));
        }
        let total_capacity: f64 = self.capacities.iter().sum();
        if self.attack_volume <= total_capacity {
            return Err(SolveError::InvalidInput(format!(
                "attack volume {} must exceed the total scrubbing capacity {}",
                self.attack_volume, total_capacity
            )));
        }
        // sink orientation: traffic from anywhere must drain into the victim
        let upstream = self.graph.ancestors(&self.victim);
        for node in self.graph.get_node_ids() {
            if node != self.victim && !upstream.contains(&node) {
                return Err(SolveError::InvalidInput(format!(
                    "node {} cannot reach the victim",
                    node
                )));
            }
        }
        for node in [self.source, self.victim].iter().chain(&self.allies) {
            if let Some(entry) = self.graph.get_node(node) {
                if matches!(entry.kind, NodeKind::Transit | NodeKind::Mid) {
                    warn!(
                        "Node {} plays a special role but is of kind {:?}.",
                        node, entry.kind
                    );
                }
            }
        }
        Ok(())
    }
}
