use crate::error::OutputError;
use crate::run::ScenarioRunResult;
use crate::scenario::Point;
use crate::solver::SegmentOutcome;
use std::path::{Path, PathBuf};

pub fn paths_file(dir: &Path, start_index: usize) -> PathBuf {
    dir.join(format!("waypoint_paths_{}.txt", start_index))
}

pub fn result_file(dir: &Path, start_index: usize) -> PathBuf {
    dir.join(format!("waypoint_results_{}.json", start_index))
}

/// `Agent <a>: (x,y)->(x,y)->...`, one line per agent.
pub fn format_paths(paths: &[Vec<Point>]) -> String {
    let mut out = String::new();
    for (agent, path) in paths.iter().enumerate() {
        out.push_str(&format!("Agent {}: ", agent));
        out.push_str(
            &path
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join("->"),
        );
        out.push('\n');
    }
    out
}

fn write(path: &Path, contents: &str) -> Result<(), OutputError> {
    std::fs::write(path, contents).map_err(|source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes the stitched paths and the full run result into `dir`, creating
/// it if needed. Returns the two files written.
pub fn write_run_result(
    dir: &Path,
    start_index: usize,
    result: &ScenarioRunResult,
) -> Result<(PathBuf, PathBuf), OutputError> {
    std::fs::create_dir_all(dir).map_err(|source| OutputError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let paths = paths_file(dir, start_index);
    write(&paths, &format_paths(&result.assembled_paths))?;

    let json = result_file(dir, start_index);
    write(&json, &serde_json::to_string_pretty(result)?)?;

    Ok((paths, json))
}

/// Short human-readable report of a run, one segment per line.
pub fn summary(result: &ScenarioRunResult) -> String {
    let mut s = String::new();
    for outcome in result.segment_outcomes.iter() {
        s.push_str(&match outcome {
            SegmentOutcome::Solved { index, cost, .. } => format!(
                "Segment {:>3}: solved  cost {}\n",
                index,
                cost.map(|c| c.to_string()).unwrap_or_else(|| "--".to_string())
            ),
            SegmentOutcome::Failed { index, reason, detail } => {
                format!("Segment {:>3}: {}  {}\n", index, reason, detail)
            }
        });
    }
    let skipped = result.num_segments - result.segment_outcomes.len();
    if skipped > 0 {
        s.push_str(&format!("({} segments not attempted)\n", skipped));
    }
    s.push_str(&format!(
        "Agents: {}  Segments: {}  Total cost: {}  Path length: {}",
        result.num_agents,
        result.num_segments,
        result.total_cost,
        result.assembled_paths.first().map(|p| p.len()).unwrap_or(0)
    ));
    s
}
