use crate::scenario::Point;
use crate::segment::Segment;
use crate::solver::{FailureReason, MapRef, SegmentOutcome, SegmentSolver, SolveParams};
use log::*;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

const SUCCESS_MARKER: &str = "Succeed";
const TIMEOUT_MARKER: &str = "Timeout";
/// Position of the solution cost in the comma-separated status line.
const COST_FIELD: usize = 4;
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Runs the EECBS command line solver once per segment.
///
/// Every call works in its own temporary directory holding the joint
/// instance, the solver's stats and path records, and its captured output.
/// The directory is removed when the call returns.
#[derive(Debug, Clone)]
pub struct EecbsSolver {
    pub executable: PathBuf,
    /// Extra wall-clock time given to the process beyond the solver's own
    /// time limit before it is killed.
    pub kill_grace: Duration,
    /// Parent of the per-call directories. The system temp dir if unset.
    pub work_dir: Option<PathBuf>,
}

impl EecbsSolver {
    pub fn new(executable: PathBuf, kill_grace: Duration) -> Self {
        EecbsSolver {
            executable,
            kill_grace,
            work_dir: None,
        }
    }

    pub fn with_work_dir(mut self, work_dir: Option<PathBuf>) -> Self {
        self.work_dir = work_dir;
        self
    }

    fn try_solve(
        &self,
        map: &MapRef,
        segment: &Segment,
        params: &SolveParams,
    ) -> std::io::Result<SegmentOutcome> {
        let prefix = format!("segment-{}-", segment.index);
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        let dir = match &self.work_dir {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        };
        let instance = dir.path().join("instance.scen");
        let stats = dir.path().join("stats.csv");
        let paths = dir.path().join("paths.txt");
        let stdout = dir.path().join("stdout.txt");
        let stderr = dir.path().join("stderr.txt");

        write_instance(&instance, map, segment)?;

        let mut cmd = Command::new(&self.executable);
        cmd.arg("-m")
            .arg(&map.path)
            .arg("-a")
            .arg(&instance)
            .arg("-k")
            .arg(segment.num_agents().to_string())
            .arg("-t")
            .arg(params.timeout.as_secs_f64().to_string())
            .arg("--suboptimality")
            .arg(params.suboptimality.to_string())
            .arg("-o")
            .arg(&stats)
            .arg("--outputPaths")
            .arg(&paths)
            .stdin(Stdio::null())
            .stdout(File::create(&stdout)?)
            .stderr(File::create(&stderr)?);
        debug!("Segment {}: running {:?}", segment.index, cmd);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return Ok(SegmentOutcome::failed(
                    segment.index,
                    FailureReason::ExecutionError,
                    format!("could not start {}: {}", self.executable.display(), e),
                ))
            }
        };

        let limit = params
            .timeout
            .checked_add(self.kill_grace)
            .unwrap_or(Duration::MAX);
        let status = match wait_with_deadline(&mut child, limit)? {
            Some(status) => status,
            None => {
                // The child may have exited since the last poll.
                let _ = child.kill();
                let _ = child.wait();
                return Ok(SegmentOutcome::failed(
                    segment.index,
                    FailureReason::Timeout,
                    format!("solver still running after {:.1}s", limit.as_secs_f64()),
                ));
            }
        };

        if !status.success() {
            let stderr = std::fs::read_to_string(&stderr).unwrap_or_default();
            return Ok(SegmentOutcome::failed(
                segment.index,
                FailureReason::ExecutionError,
                format!("{}: {}", describe_exit(status), last_line(&stderr).unwrap_or("")),
            ));
        }

        let stdout = std::fs::read(&stdout)?;
        Ok(collect_outcome(segment, &stdout, &paths))
    }
}

impl SegmentSolver for EecbsSolver {
    fn solve(&self, map: &MapRef, segment: &Segment, params: &SolveParams) -> SegmentOutcome {
        let _p = hprof::enter("eecbs");
        self.try_solve(map, segment, params).unwrap_or_else(|e| {
            SegmentOutcome::failed(
                segment.index,
                FailureReason::ExecutionError,
                format!("i/o error around solver call: {}", e),
            )
        })
    }
}

/// Writes the segment as a scenario with one line per agent, in agent order.
pub fn write_instance(path: &Path, map: &MapRef, segment: &Segment) -> std::io::Result<()> {
    let mut f = std::io::BufWriter::new(File::create(path)?);
    writeln!(f, "version 1")?;
    for (bucket, (from, to)) in segment.pairs.iter().enumerate() {
        writeln!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t0",
            bucket, map.name, map.width, map.height, from.x, from.y, to.x, to.y
        )?;
    }
    f.flush()
}

/// Polls the child until it exits or `limit` has passed. `None` means the
/// child is still running. A limit too far out to represent waits forever.
pub fn wait_with_deadline(child: &mut Child, limit: Duration) -> std::io::Result<Option<ExitStatus>> {
    let deadline = match Instant::now().checked_add(limit) {
        Some(deadline) => deadline,
        None => return child.wait().map(Some),
    };
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        std::thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

fn describe_exit(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("solver exited with code {}", code),
        None => "solver terminated by signal".to_string(),
    }
}

fn last_line(text: &str) -> Option<&str> {
    text.lines().rev().map(str::trim).find(|l| !l.is_empty())
}

/// Turns the output of a process that exited normally into an outcome.
pub fn collect_outcome(segment: &Segment, stdout: &[u8], paths_file: &Path) -> SegmentOutcome {
    let stdout = match std::str::from_utf8(stdout) {
        Ok(stdout) => stdout,
        Err(e) => {
            return SegmentOutcome::failed(
                segment.index,
                FailureReason::MalformedOutput,
                format!("solver output is not UTF-8: {}", e),
            )
        }
    };
    let status_line = match last_line(stdout) {
        Some(line) => line,
        None => {
            return SegmentOutcome::failed(
                segment.index,
                FailureReason::MalformedOutput,
                "solver printed no status line",
            )
        }
    };

    let cost = match classify_status_line(status_line) {
        Ok(cost) => cost,
        Err(reason) => return SegmentOutcome::failed(segment.index, reason, status_line),
    };
    if cost.is_none() {
        warn!(
            "Segment {}: no cost in status line {:?}, counting it as 0",
            segment.index, status_line
        );
    }

    let record = match std::fs::read_to_string(paths_file) {
        Ok(record) => record,
        Err(e) => {
            return SegmentOutcome::failed(
                segment.index,
                FailureReason::MalformedOutput,
                format!("could not read path record {}: {}", paths_file.display(), e),
            )
        }
    };
    let paths = match parse_paths_record(&record, segment.num_agents()) {
        Ok(paths) => paths,
        Err(e) => return SegmentOutcome::failed(segment.index, FailureReason::MalformedOutput, e),
    };
    for (agent, path) in paths.iter().enumerate() {
        if path.is_empty() {
            warn!("Segment {}: no path recorded for agent {}", segment.index, agent);
        }
    }
    if let Err(e) = check_endpoints(segment, &paths) {
        return SegmentOutcome::failed(segment.index, FailureReason::MalformedOutput, e);
    }

    SegmentOutcome::Solved {
        index: segment.index,
        cost,
        paths,
        status_line: status_line.to_string(),
    }
}

/// Every recorded path must run from its agent's `from` to its `to`.
fn check_endpoints(segment: &Segment, paths: &[Vec<Point>]) -> Result<(), String> {
    for (agent, (path, &(from, to))) in paths.iter().zip(&segment.pairs).enumerate() {
        match (path.first(), path.last()) {
            (Some(&first), _) if first != from => {
                return Err(format!(
                    "agent {} path starts at {}, expected {}",
                    agent, first, from
                ))
            }
            (_, Some(&last)) if last != to => {
                return Err(format!("agent {} path ends at {}, expected {}", agent, last, to))
            }
            _ => {}
        }
    }
    Ok(())
}

/// Classifies the solver's final status line, e.g.
/// `WDG+R+C+T+BP with AStar : Succeed,6,2.1e-05,0,7,6,6,6,`.
/// Returns the cost on success; a missing or unparsable cost is `None`.
pub fn classify_status_line(line: &str) -> Result<Option<f64>, FailureReason> {
    if line.contains(SUCCESS_MARKER) {
        Ok(line
            .split(',')
            .nth(COST_FIELD)
            .and_then(|c| c.trim().parse::<f64>().ok()))
    } else if line.contains(TIMEOUT_MARKER) {
        Err(FailureReason::Timeout)
    } else {
        Err(FailureReason::Infeasible)
    }
}

/// Parses `Agent <id>: (row,col)->(row,col)->...` lines into one path per
/// agent. EECBS writes each location as `(row,col)`, while scenario files
/// give `x` (column) before `y` (row), so every pair is swapped here.
/// Agents without a record get an empty path.
pub fn parse_paths_record(record: &str, num_agents: usize) -> Result<Vec<Vec<Point>>, String> {
    let mut paths = vec![Vec::new(); num_agents];
    for line in record.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let rest = match line.strip_prefix("Agent ") {
            Some(rest) => rest,
            None => {
                trace!("Ignoring path record line {:?}", line);
                continue;
            }
        };
        let (id, steps) = rest
            .split_once(':')
            .ok_or_else(|| format!("missing ':' in path record line {:?}", line))?;
        let id: usize = id
            .trim()
            .parse()
            .map_err(|_| format!("bad agent id in path record line {:?}", line))?;
        if id >= num_agents {
            warn!("Path record names agent {} but only {} were requested", id, num_agents);
            continue;
        }
        paths[id] = steps
            .split("->")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(parse_coord)
            .collect::<Result<Vec<_>, _>>()?;
    }
    Ok(paths)
}

fn parse_coord(s: &str) -> Result<Point, String> {
    let inner = s
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| format!("bad coordinate {:?}", s))?;
    let (row, col) = inner
        .split_once(',')
        .ok_or_else(|| format!("bad coordinate {:?}", s))?;
    match (row.trim().parse(), col.trim().parse()) {
        (Ok(row), Ok(col)) => Ok(Point::new(col, row)),
        _ => Err(format!("bad coordinate {:?}", s)),
    }
}
