mod core_types;

pub mod diversion;
pub mod io;
pub mod solve;
pub mod splitting;
pub mod stats;
pub(crate) mod traversal;

pub use core_types::*;
pub use solve::{SolveError, SolveResult, Solver};

use serde::{Deserialize, Serialize};

/// Autonomous system identifier
pub type ID = u32;
pub(crate) type EdgeWeight = ordered_float::OrderedFloat<f64>;

/// Per-node outgoing splits may deviate from 1 by at most this much
pub const ROUNDING_TOLERANCE: f64 = 1e-6;

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SolveMode {
    CentralComplete,
    CentralGreedy,
    Decentralized,
}

/// Costs steering the diversion searches and the final edit accounting
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
pub struct CostParams {
    /// Cost for attack traffic to travel one step in the graph
    pub step_cost: f64,
    /// Cost for reversing an edge
    pub change_cost: f64,
    /// Cost attached to edges that should stay untouched
    pub unwanted_change_cost: f64,
    /// Cost of editing a single router's forwarding entry
    pub router_entry_cost: f64,
}

impl Default for CostParams {
    fn default() -> Self {
        Self {
            step_cost: 1.0,
            change_cost: 5.0,
            unwanted_change_cost: 50.0,
            router_entry_cost: 3.0,
        }
    }
}
