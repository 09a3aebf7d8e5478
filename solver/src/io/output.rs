use super::{Output, Report, SinkVolume};
use crate::solve::SolveResult;

use log::{error, info};
use std::{
    error::Error,
    fs::{self, File},
    path::PathBuf,
};

impl Report {
    pub fn from_result(result: &SolveResult) -> Self {
        let graph = &result.modified_graph;
        let mut sink_volumes: Vec<SinkVolume> = result
            .allies
            .iter()
            .chain([&result.victim])
            .map(|sink| SinkVolume {
                sink: *sink,
                received: graph
                    .get_node(sink)
                    .map_or(0.0, |n| n.received_attack_volume),
            })
            .collect();
        sink_volumes.sort_by_key(|v| v.sink);
        Self {
            mode: result.mode,
            seed: result.seed,
            cost: result.cost,
            reversals: graph.synthetic_edge_count(),
            source: result.source,
            victim: result.victim,
            allies: result.allies.clone(),
            capacities: result.capacities.clone(),
            sink_volumes,
            warnings: result.warnings.clone(),
        }
    }
}

impl Output {
    pub fn write(
        reports: Vec<Report>,
        output_path: PathBuf,
        seed: u64,
    ) -> Result<(), Box<dyn Error>> {
        if Self::create_dir(&output_path).is_ok() {
            info!("Writing solver reports to {:#?}/.", output_path);
            let output = Output(reports);
            output.to_json_file(output_path, seed)?;
        } else {
            error!("Directory creation failed.");
        }
        Ok(())
    }

    fn to_json_file(&self, output_path: PathBuf, seed: u64) -> Result<(), Box<dyn Error>> {
        let mut file_output_path = output_path;
        file_output_path.push(format!("run{}.json", seed));
        let file = File::create(file_output_path.clone())?;
        serde_json::to_writer_pretty(file, self)?;
        info!("Solver output written to {}.", file_output_path.display());
        Ok(())
    }

    fn create_dir(path: &PathBuf) -> Result<(), std::io::Error> {
        fs::create_dir_all(path)
    }
}
