use log::*;

mod eecbs;
mod error;
mod output;
mod run;
mod scenario;
mod segment;
mod solver;
mod stitch;

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "waypointmapf",
    about = "Multi-agent pathfinding through ordered waypoints, one EECBS call per segment."
)]
struct Opt {
    /// Grid map file passed to the solver
    #[structopt(name = "MAP", parse(from_os_str))]
    map_file: PathBuf,

    /// Scenario file with waypoints
    #[structopt(name = "SCENARIO", parse(from_os_str))]
    scenario_file: PathBuf,

    /// Index of the first scenario entry to use as agent 0
    #[structopt(short = "s", long = "scenario", default_value = "0")]
    start_index: usize,

    /// Number of agents, taken consecutively from the start index
    #[structopt(short = "k", long = "agents", default_value = "1")]
    agents: NonZeroUsize,

    /// Time limit per segment, in seconds
    #[structopt(short, long, default_value = "60")]
    timeout: f64,

    /// Suboptimality bound passed to the solver
    #[structopt(long, default_value = "1.2")]
    suboptimality: f64,

    /// Write the stitched paths and the JSON result into this directory
    #[structopt(short, long, parse(from_os_str))]
    output: Option<PathBuf>,

    /// Path to the EECBS executable
    #[structopt(long, default_value = "./eecbs", parse(from_os_str))]
    eecbs: PathBuf,

    /// Seconds the solver process may run past its time limit before it is killed
    #[structopt(long, default_value = "10")]
    kill_grace: f64,

    /// Directory for the solver's per-segment scratch files. Defaults to the
    /// system temp dir.
    #[structopt(long, parse(from_os_str))]
    work_dir: Option<PathBuf>,

    /// Number of segments to solve concurrently. 1 solves them in order and
    /// stops at the first failure.
    #[structopt(short, long, default_value = "1")]
    jobs: usize,

    /// Activate debug mode
    #[structopt(short, long)]
    verbose: bool,
}

fn seconds(name: &str, value: f64) -> Result<Duration, String> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| format!("{} must be a non-negative number of seconds, got {}", name, value))
}

fn execute(opt: &Opt) -> Result<bool, Box<dyn std::error::Error>> {
    let params = solver::SolveParams {
        suboptimality: opt.suboptimality,
        timeout: seconds("timeout", opt.timeout)?,
    };
    let solver = eecbs::EecbsSolver::new(opt.eecbs.clone(), seconds("kill-grace", opt.kill_grace)?)
        .with_work_dir(opt.work_dir.clone());
    if !opt.eecbs.exists() {
        warn!("EECBS executable {} not found, every segment will fail", opt.eecbs.display());
    }

    let parsed = {
        let _h = hprof::enter("load scenario");
        scenario::load_scenario(&opt.scenario_file)?
    };
    if !parsed.rejected.is_empty() {
        warn!("{} scenario lines were skipped", parsed.rejected.len());
    }

    let result = {
        let _h = hprof::enter("solve");
        run::Orchestrator::new(solver, opt.map_file.clone(), params)
            .with_jobs(opt.jobs)
            .run(&parsed.entries, opt.start_index, opt.agents.get())?
    };

    info!("Summary:\n{}", output::summary(&result));
    if let Some(dir) = &opt.output {
        let _h = hprof::enter("write output");
        let (paths, json) = output::write_run_result(dir, opt.start_index, &result)?;
        info!("Wrote paths to {}", paths.display());
        info!("Wrote result to {}", json.display());
    }

    if result.success {
        info!(
            "Scenario completed: total cost {}, {} segments",
            result.total_cost, result.num_segments
        );
    } else if let Some(failure) = &result.failure {
        error!(
            "Scenario failed at segment {}: {} ({})",
            failure.index, failure.reason, failure.detail
        );
    }
    Ok(result.success)
}

fn main() {
    let _h1 = hprof::enter("init");

    let opt = Opt::from_args();
    let level = if opt.verbose {
        if cfg!(debug_assertions) {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    } else {
        LevelFilter::Warn
    };
    if let Err(e) = simple_logger::SimpleLogger::new().with_level(level).init() {
        eprintln!("could not initialize logging: {}", e);
    }
    info!("{:#?}", opt);
    drop(_h1);

    let outcome = execute(&opt);

    hprof::end_frame();
    if opt.verbose {
        hprof::profiler().print_timing();
    }

    match outcome {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    }
}
