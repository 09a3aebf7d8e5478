use crate::splitting::RoundingViolation;
use crate::{SolveMode, ID};

use serde::Serialize;

pub mod output;
pub use output::*;

#[derive(Debug, Serialize)]
pub struct Output(Vec<Report>);

/// Flat summary of one solver run in preparation for output
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub mode: SolveMode,
    pub seed: u64,
    pub cost: f64,
    /// Number of edges whose direction the diversion flipped
    pub reversals: usize,
    pub source: ID,
    pub victim: ID,
    pub allies: Vec<ID>,
    pub capacities: Vec<f64>,
    pub sink_volumes: Vec<SinkVolume>,
    pub warnings: Vec<RoundingViolation>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SinkVolume {
    pub sink: ID,
    pub received: f64,
}
