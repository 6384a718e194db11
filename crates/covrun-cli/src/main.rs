//! covrun CLI
//!
//! Builds a workspace's test binaries, runs each under kcov and opens the
//! merged report.

use clap::{Arg, ArgAction, ArgMatches, Command};
use covrun_config::Config;
use covrun_plan::{CovrunError, FailurePolicy, Plan};
use covrun_runner::{CommandRunner, DryRunner, RunReport, Runner, SystemRunner};
use std::path::{Path, PathBuf};
use std::process;

fn cli() -> Command {
    Command::new("covrun")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Collect kcov coverage for a Rust workspace's test binaries")
        .arg(
            Arg::new("project-dir")
                .short('C')
                .long("project-dir")
                .value_name("DIR")
                .help("Project root; commands run here and relative paths resolve here")
                .value_parser(clap::value_parser!(PathBuf))
                .default_value("."),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file (default: covrun.toml in the project root)")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Print the commands instead of running them")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-open")
                .long("no-open")
                .help("Do not open the report when done")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("best-effort")
                .long("best-effort")
                .help("Ignore failed coverage runs when choosing the exit status")
                .action(ArgAction::SetTrue)
                .conflicts_with("strict"),
        )
        .arg(
            Arg::new("strict")
                .long("strict")
                .help("Exit with status 3 if any coverage run failed")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("print-config")
                .long("print-config")
                .help("Print the effective configuration as TOML and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("More log output; repeat for more")
                .action(ArgAction::Count),
        )
}

fn main() {
    let matches = cli().get_matches();
    init_logging(matches.get_count("verbose"));

    match run(&matches) {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("{e}");
            process::exit(error_exit_code(&e));
        }
    }
}

/// `RUST_LOG` wins; otherwise warnings only, raised by each `-v`
fn init_logging(verbosity: u8) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(filter)
        .init();
}

fn error_exit_code(error: &anyhow::Error) -> i32 {
    error
        .downcast_ref::<CovrunError>()
        .map_or(1, CovrunError::exit_code)
}

fn run(matches: &ArgMatches) -> Result<i32, anyhow::Error> {
    let requested = matches
        .get_one::<PathBuf>("project-dir")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("."));
    // Commands run inside the project, so plan paths must be absolute
    let project_dir =
        std::fs::canonicalize(&requested).map_err(|e| CovrunError::io(&requested, e))?;
    let config = Config::load(
        matches.get_one::<PathBuf>("config").map(PathBuf::as_path),
        &project_dir,
    )?;

    if matches.get_flag("print-config") {
        print!("{}", config.to_toml()?);
        return Ok(0);
    }

    let mut plan = config.into_plan(&project_dir)?;
    apply_overrides(&mut plan, matches);

    if matches.get_flag("dry-run") {
        execute(&plan, DryRunner::new(std::io::stdout()))
    } else {
        execute(&plan, SystemRunner::new(&project_dir))
    }
}

fn apply_overrides(plan: &mut Plan, matches: &ArgMatches) {
    if matches.get_flag("no-open") {
        plan.report.open = false;
    }
    if matches.get_flag("best-effort") {
        plan.failure_policy = FailurePolicy::BestEffort;
    } else if matches.get_flag("strict") {
        plan.failure_policy = FailurePolicy::Strict;
    }
}

fn execute<R: CommandRunner>(plan: &Plan, commands: R) -> Result<i32, anyhow::Error> {
    let report = Runner::new(plan, commands).run()?;
    summarize(&report, &plan.output_dir);
    Ok(report.exit_code())
}

fn summarize(report: &RunReport, output_dir: &Path) {
    let failures = report.failure_summary();
    for line in &failures {
        tracing::warn!("{line}");
    }

    if !failures.is_empty() && report.policy == FailurePolicy::Strict {
        eprintln!(
            "covrun: ERR_COVERAGE_FAILED: {} of {} coverage groups failed",
            failures.len(),
            report.groups.len()
        );
    } else {
        tracing::info!("coverage written to {}", output_dir.display());
    }
}
