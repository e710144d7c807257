use crate::scenario::{Point, WaypointScenarioEntry};
use crate::segment::Segment;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// The map every segment of a scenario run is solved on. Name and size come
/// from the first selected agent.
#[derive(Debug, Clone, PartialEq)]
pub struct MapRef {
    pub path: PathBuf,
    pub name: String,
    pub width: u32,
    pub height: u32,
}

impl MapRef {
    pub fn from_entry(path: PathBuf, entry: &WaypointScenarioEntry) -> Self {
        MapRef {
            path,
            name: entry.map_name.clone(),
            width: entry.width,
            height: entry.height,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SolveParams {
    /// Upper bound on solution cost relative to the optimum.
    pub suboptimality: f64,
    /// Time limit for one segment.
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    Infeasible,
    Timeout,
    MalformedOutput,
    ExecutionError,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureReason::Infeasible => "infeasible",
            FailureReason::Timeout => "timeout",
            FailureReason::MalformedOutput => "malformed output",
            FailureReason::ExecutionError => "execution error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SegmentOutcome {
    Solved {
        index: usize,
        /// `None` when the solver did not report a usable cost.
        cost: Option<f64>,
        /// One path per agent, in agent order.
        paths: Vec<Vec<Point>>,
        status_line: String,
    },
    Failed {
        index: usize,
        reason: FailureReason,
        detail: String,
    },
}

impl SegmentOutcome {
    pub fn failed(index: usize, reason: FailureReason, detail: impl Into<String>) -> Self {
        SegmentOutcome::Failed {
            index,
            reason,
            detail: detail.into(),
        }
    }

    pub fn index(&self) -> usize {
        match self {
            SegmentOutcome::Solved { index, .. } | SegmentOutcome::Failed { index, .. } => *index,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SegmentOutcome::Solved { .. })
    }
}

/// Solves one joint segment. Implementations report every failure through
/// the returned outcome and must be shareable between worker threads.
pub trait SegmentSolver: Sync {
    fn solve(&self, map: &MapRef, segment: &Segment, params: &SolveParams) -> SegmentOutcome;
}

impl<S: SegmentSolver + ?Sized> SegmentSolver for &S {
    fn solve(&self, map: &MapRef, segment: &Segment, params: &SolveParams) -> SegmentOutcome {
        (**self).solve(map, segment, params)
    }
}
