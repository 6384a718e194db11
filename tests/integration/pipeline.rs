//! Integration tests for config + runner
//! Drives full runs through a recording command runner

#![cfg(unix)]

use covrun::config::Config;
use covrun::plan::{CovrunError, Invocation, Plan};
use covrun::runner::{
    CommandRunner, GroupOutcome, ReportOutcome, RunReport, Runner, ToolLocator,
};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tempfile::TempDir;

/// Pretends to be cargo and kcov, recording every call
#[derive(Default)]
struct FakeTools {
    calls: Vec<Invocation>,
    build_status: i32,
    /// Binaries the fake build leaves behind
    produces: Vec<&'static str>,
    root: std::path::PathBuf,
}

impl CommandRunner for FakeTools {
    fn run(&mut self, invocation: &Invocation) -> Result<i32, CovrunError> {
        self.calls.push(invocation.clone());
        match invocation.program.as_str() {
            "cargo" => {
                if self.build_status != 0 {
                    return Ok(self.build_status);
                }
                let deps = self.root.join("target/debug/deps");
                fs::create_dir_all(&deps).unwrap();
                for name in &self.produces {
                    executable(&deps.join(name));
                }
                Ok(0)
            }
            "kcov" => {
                let out = &invocation.args[invocation.args.len() - 2];
                fs::write(Path::new(out).join("index.html"), "<html></html>").unwrap();
                Ok(0)
            }
            _ => Ok(0),
        }
    }
}

fn executable(path: &Path) {
    fs::write(path, "").unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

struct Workspace {
    dir: TempDir,
    plan: Plan,
}

impl Workspace {
    fn new(config: &str) -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("tools")).unwrap();
        executable(&dir.path().join("tools/kcov"));

        let config = Config::from_toml_str(config, Path::new("covrun.toml")).unwrap();
        let plan = config.into_plan(dir.path()).unwrap();
        Self { dir, plan }
    }

    fn tools(&self, produces: Vec<&'static str>) -> FakeTools {
        FakeTools {
            produces,
            root: self.dir.path().to_path_buf(),
            ..FakeTools::default()
        }
    }

    fn run(&self, tools: FakeTools) -> (Result<RunReport, CovrunError>, FakeTools) {
        let locator =
            ToolLocator::with_search_path(self.dir.path().join("tools").into_os_string());
        let mut runner = Runner::new(&self.plan, tools).with_locator(locator);
        let result = runner.run();
        (result, runner.into_commands())
    }
}

const TWO_GROUPS: &str = r#"
[build]
packages = ["alpha", "beta"]

[coverage]
exclude = ["vendor"]
include = ["src"]

[[coverage.groups]]
name = "alpha"
glob = "alpha-*"

[[coverage.groups]]
name = "beta"
glob = "beta-*"

[report]
open = true
opener = "viewer"
"#;

#[test]
fn test_full_pipeline() {
    let workspace = Workspace::new(TWO_GROUPS);
    let tools = workspace.tools(vec!["alpha-0a", "beta-0b"]);

    let (result, tools) = workspace.run(tools);
    let report = result.unwrap();

    let programs: Vec<&str> = tools.calls.iter().map(|c| c.program.as_str()).collect();
    assert_eq!(programs, ["cargo", "kcov", "kcov", "viewer"]);
    assert!(matches!(report.groups[0].outcome, GroupOutcome::Covered { .. }));
    assert!(matches!(report.groups[1].outcome, GroupOutcome::Covered { .. }));
    assert_eq!(report.report, ReportOutcome::Opened { code: 0 });
    assert_eq!(report.exit_code(), 0);
    assert!(workspace.plan.report_index().is_file());
}

#[test]
fn test_build_failure_skips_coverage() {
    let workspace = Workspace::new(TWO_GROUPS);
    let mut tools = workspace.tools(vec!["alpha-0a"]);
    tools.build_status = 101;

    let (result, tools) = workspace.run(tools);
    let error = result.unwrap_err();

    assert_eq!(error.exit_code(), 101);
    assert_eq!(tools.calls.len(), 1);
    assert!(!workspace.plan.output_dir.exists());
}

#[test]
fn test_missing_tool_touches_nothing() {
    let workspace = Workspace::new(TWO_GROUPS);
    let locator =
        ToolLocator::with_search_path(workspace.dir.path().join("nowhere").into_os_string());
    let mut runner =
        Runner::new(&workspace.plan, workspace.tools(vec![])).with_locator(locator);

    let error = runner.run().unwrap_err();
    assert_eq!(
        error.to_string(),
        "covrun: ERR_TOOL_MISSING: kcov not found on PATH; install kcov first. Aborting."
    );
    assert!(runner.into_commands().calls.is_empty());
    assert!(!workspace.dir.path().join("target").exists());
}

#[test]
fn test_partial_build_reports_missing_group() {
    let workspace = Workspace::new(TWO_GROUPS);
    let tools = workspace.tools(vec!["beta-0b"]);

    let (result, _) = workspace.run(tools);
    let report = result.unwrap();

    assert_eq!(report.groups[0].outcome, GroupOutcome::Missing);
    assert_eq!(
        report.failure_summary(),
        ["alpha: no compiled test binary found"]
    );
    assert_eq!(report.exit_code(), covrun::plan::EXIT_COVERAGE_FAILED);
}

#[test]
fn test_repeat_runs_reuse_output_dir() {
    let workspace = Workspace::new(TWO_GROUPS);

    for _ in 0..2 {
        let (result, _) = workspace.run(workspace.tools(vec!["alpha-0a", "beta-0b"]));
        assert_eq!(result.unwrap().exit_code(), 0);
    }
    assert!(workspace.plan.output_dir.is_dir());
}
