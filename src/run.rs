use crate::error::RunError;
use crate::scenario::{Point, WaypointScenarioEntry};
use crate::segment::{decompose, select_agents, Segment};
use crate::solver::{FailureReason, MapRef, SegmentOutcome, SegmentSolver, SolveParams};
use crate::stitch::PathStitcher;
use log::*;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentFailure {
    pub index: usize,
    pub reason: FailureReason,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioRunResult {
    /// Only when this is true are `assembled_paths` complete routes.
    pub success: bool,
    pub total_cost: f64,
    pub num_segments: usize,
    pub num_agents: usize,
    pub failure: Option<SegmentFailure>,
    pub agents: Vec<WaypointScenarioEntry>,
    pub segments: Vec<Segment>,
    /// Outcomes up to and including the first failure, in index order.
    pub segment_outcomes: Vec<SegmentOutcome>,
    pub assembled_paths: Vec<Vec<Point>>,
    pub elapsed_secs: f64,
}

/// Drives a scenario run: decomposes the selected agents into segments,
/// solves them and stitches the results.
///
/// With `jobs <= 1` segments are solved one after another and the run stops
/// at the first failure. With more jobs segments are solved concurrently;
/// results are still reduced in index order, so the reported failure is the
/// lowest failing index and nothing past it is stitched.
pub struct Orchestrator<S> {
    solver: S,
    map_file: PathBuf,
    params: SolveParams,
    jobs: usize,
}

impl<S: SegmentSolver> Orchestrator<S> {
    pub fn new(solver: S, map_file: PathBuf, params: SolveParams) -> Self {
        Orchestrator {
            solver,
            map_file,
            params,
            jobs: 1,
        }
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn run(
        &self,
        entries: &[WaypointScenarioEntry],
        start_index: usize,
        num_agents: usize,
    ) -> Result<ScenarioRunResult, RunError> {
        let started = Instant::now();
        let agents = select_agents(entries, start_index, num_agents)?.to_vec();
        let segments = decompose(entries, start_index, num_agents)?;
        let map = MapRef::from_entry(self.map_file.clone(), &agents[0]);

        info!(
            "Running {} agents from index {} on {} in {} segments",
            num_agents,
            start_index,
            map.name,
            segments.len()
        );
        for (a, agent) in agents.iter().enumerate() {
            debug!(
                "  Agent {}: {} via {:?} to {}",
                a, agent.start, agent.waypoints, agent.goal
            );
        }

        let outcomes = if self.jobs <= 1 || segments.len() <= 1 {
            self.solve_sequential(&map, &segments)
        } else {
            self.solve_parallel(&map, &segments)
        };

        let mut stitcher = PathStitcher::new(num_agents);
        let mut segment_outcomes = Vec::new();
        let mut failure = None;
        for (segment, outcome) in segments.iter().zip(outcomes) {
            let outcome = match outcome {
                Some(outcome) => outcome,
                None => break,
            };
            debug_assert_eq!(outcome.index(), segment.index);
            match &outcome {
                SegmentOutcome::Solved { cost, paths, .. } => {
                    stitcher.extend(segment, paths, *cost);
                }
                SegmentOutcome::Failed {
                    index,
                    reason,
                    detail,
                } => {
                    failure = Some(SegmentFailure {
                        index: *index,
                        reason: *reason,
                        detail: detail.clone(),
                    });
                }
            }
            segment_outcomes.push(outcome);
            if failure.is_some() {
                break;
            }
        }

        let success = failure.is_none() && stitcher.segments_stitched() == segments.len();
        if let Some(f) = &failure {
            warn!("Segment {} failed ({}): {}", f.index, f.reason, f.detail);
        } else {
            info!(
                "All {} segments solved, total cost {}",
                segments.len(),
                stitcher.total_cost()
            );
        }
        debug!(
            "Assembled path lengths: {:?}",
            stitcher.paths().iter().map(Vec::len).collect::<Vec<_>>()
        );
        let (assembled_paths, total_cost) = stitcher.into_parts();

        Ok(ScenarioRunResult {
            success,
            total_cost,
            num_segments: segments.len(),
            num_agents,
            failure,
            agents,
            segments,
            segment_outcomes,
            assembled_paths,
            elapsed_secs: started.elapsed().as_secs_f64(),
        })
    }

    fn solve_one(&self, map: &MapRef, segment: &Segment) -> SegmentOutcome {
        let outcome = self.solver.solve(map, segment, &self.params);
        match &outcome {
            SegmentOutcome::Solved { cost, .. } => {
                info!("Segment {}: solved, cost {:?}", segment.index, cost)
            }
            SegmentOutcome::Failed { reason, .. } => {
                info!("Segment {}: {}", segment.index, reason)
            }
        }
        outcome
    }

    /// Stops at the first failure; later slots stay `None`.
    fn solve_sequential(&self, map: &MapRef, segments: &[Segment]) -> Vec<Option<SegmentOutcome>> {
        let mut outcomes = vec![None; segments.len()];
        for (slot, segment) in outcomes.iter_mut().zip(segments) {
            for (a, (from, to)) in segment.pairs.iter().enumerate() {
                if segment.is_stationary(a) {
                    trace!("  Segment {} agent {}: {} (stationary)", segment.index, a, from);
                } else {
                    trace!("  Segment {} agent {}: {} -> {}", segment.index, a, from, to);
                }
            }
            let outcome = self.solve_one(map, segment);
            let failed = !outcome.is_success();
            *slot = Some(outcome);
            if failed {
                break;
            }
        }
        outcomes
    }

    /// Workers take segments in index order. Once a failure at index `f` is
    /// known, segments past `f` are skipped; those below `f` have already
    /// been handed out and still run to completion.
    fn solve_parallel(&self, map: &MapRef, segments: &[Segment]) -> Vec<Option<SegmentOutcome>> {
        let next = AtomicUsize::new(0);
        let first_failure = AtomicUsize::new(usize::MAX);
        let (tx, rx) = crossbeam::channel::unbounded();
        let workers = self.jobs.min(segments.len());
        debug!("Solving {} segments on {} workers", segments.len(), workers);

        crossbeam::thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let (next, first_failure) = (&next, &first_failure);
                scope.spawn(move |_| loop {
                    let idx = next.fetch_add(1, Ordering::SeqCst);
                    if idx >= segments.len() || idx > first_failure.load(Ordering::SeqCst) {
                        break;
                    }
                    let outcome = self.solve_one(map, &segments[idx]);
                    if !outcome.is_success() {
                        first_failure.fetch_min(idx, Ordering::SeqCst);
                    }
                    if tx.send((idx, outcome)).is_err() {
                        break;
                    }
                });
            }
        })
        .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
        drop(tx);

        let mut outcomes = vec![None; segments.len()];
        for (idx, outcome) in rx.try_iter() {
            outcomes[idx] = Some(outcome);
        }
        outcomes
    }
}
