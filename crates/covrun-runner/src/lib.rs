//! Coverage runner
//!
//! Drives one [`Plan`] through its steps, strictly in order:
//!
//! 1. check the coverage tool is installed
//! 2. build the test binaries without running them
//! 3. make sure the report directory exists
//! 4. run every binary group under the coverage tool
//! 5. open the merged report
//!
//! Only the first two steps abort the run. Group failures are collected
//! and judged afterwards according to the plan's [`FailurePolicy`].

use covrun_plan::{CovrunError, EXIT_COVERAGE_FAILED, FailurePolicy, Plan};
use std::path::PathBuf;

pub mod artifacts;
pub mod locate;
pub mod opener;
pub mod process;

pub use artifacts::ArtifactMatcher;
pub use locate::ToolLocator;
pub use process::{CommandRunner, DryRunner, SystemRunner};

/// Shell status for a command that could not be found
const EXIT_NOT_FOUND: i32 = 127;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupOutcome {
    Covered { binary: PathBuf },
    Failed { binary: PathBuf, code: i32 },
    /// No compiled binary matched the group's glob
    Missing,
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupResult {
    pub name: String,
    pub outcome: GroupOutcome,
}

impl GroupResult {
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        !matches!(self.outcome, GroupOutcome::Covered { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    Opened { code: i32 },
    /// Opening was turned off
    Skipped,
    /// The coverage tool left no index behind
    NotProduced,
    OpenerUnavailable { message: String },
}

/// Everything that happened after the build succeeded
#[derive(Debug, Clone)]
pub struct RunReport {
    pub groups: Vec<GroupResult>,
    pub index: PathBuf,
    pub report: ReportOutcome,
    pub policy: FailurePolicy,
}

impl RunReport {
    pub fn failures(&self) -> impl Iterator<Item = &GroupResult> {
        self.groups.iter().filter(|g| g.is_failure())
    }

    /// Process exit status for the whole run
    ///
    /// Under `BestEffort` this is whatever the report opener returned, as if
    /// the groups had never been checked. `Strict` fails with
    /// `EXIT_COVERAGE_FAILED` when any group did not produce coverage.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if self.policy == FailurePolicy::Strict && self.failures().next().is_some() {
            return EXIT_COVERAGE_FAILED;
        }
        match &self.report {
            ReportOutcome::Opened { code } => *code,
            ReportOutcome::OpenerUnavailable { .. } => EXIT_NOT_FOUND,
            ReportOutcome::Skipped | ReportOutcome::NotProduced => 0,
        }
    }

    /// One line per failed group, for the end-of-run summary
    #[must_use]
    pub fn failure_summary(&self) -> Vec<String> {
        self.failures()
            .map(|g| match &g.outcome {
                GroupOutcome::Failed { binary, code } => {
                    format!("{}: {} exited with status {code}", g.name, binary.display())
                }
                GroupOutcome::Missing => format!("{}: no compiled test binary found", g.name),
                GroupOutcome::Error { message } => format!("{}: {message}", g.name),
                GroupOutcome::Covered { .. } => unreachable!("covered groups are not failures"),
            })
            .collect()
    }
}

pub struct Runner<'a, R: CommandRunner> {
    plan: &'a Plan,
    commands: R,
    locator: ToolLocator,
}

impl<'a, R: CommandRunner> Runner<'a, R> {
    /// Runner looking up tools on the process `PATH`
    pub fn new(plan: &'a Plan, commands: R) -> Self {
        Self {
            plan,
            commands,
            locator: ToolLocator::from_env(),
        }
    }

    #[must_use]
    pub fn with_locator(mut self, locator: ToolLocator) -> Self {
        self.locator = locator;
        self
    }

    pub fn into_commands(self) -> R {
        self.commands
    }

    /// Execute the plan
    ///
    /// # Errors
    ///
    /// Returns `CovrunError::ToolMissing` before anything runs if a required
    /// tool is not installed, `CovrunError::InvalidGlob` for an unparsable
    /// group glob, `CovrunError::BuildFailed` (or `Spawn`) if the build does
    /// not succeed, and `CovrunError::Io` if the report directory cannot be
    /// created.
    pub fn run(&mut self) -> Result<RunReport, CovrunError> {
        let plan = self.plan;

        self.check_tools()?;
        let matchers = plan
            .groups
            .iter()
            .map(ArtifactMatcher::new)
            .collect::<Result<Vec<_>, _>>()?;

        self.build()?;
        self.commands.ensure_dir(&plan.output_dir)?;

        let groups = matchers.iter().map(|m| self.cover(m)).collect();
        let report = self.open_report();

        Ok(RunReport {
            groups,
            index: plan.report_index(),
            report,
            policy: plan.failure_policy,
        })
    }

    fn check_tools(&self) -> Result<(), CovrunError> {
        for tool in self.plan.required_tools() {
            match self.locator.find(tool, &self.plan.root) {
                Some(path) => tracing::debug!("using {tool} at {}", path.display()),
                None => {
                    return Err(CovrunError::ToolMissing {
                        tool: tool.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn build(&mut self) -> Result<(), CovrunError> {
        let build = self.plan.build.invocation();
        tracing::info!("building test binaries: {build}");
        let code = self.commands.run(&build)?;
        if code != 0 {
            return Err(CovrunError::BuildFailed {
                command: build.to_string(),
                code,
            });
        }
        Ok(())
    }

    fn cover(&mut self, matcher: &ArtifactMatcher<'_>) -> GroupResult {
        let name = matcher.group().name.clone();
        let outcome = self.cover_outcome(matcher);
        match &outcome {
            GroupOutcome::Covered { .. } => tracing::info!("{name}: covered"),
            GroupOutcome::Failed { code, .. } => {
                tracing::warn!("{name}: coverage run exited with status {code}");
            }
            GroupOutcome::Missing => tracing::warn!(
                "{name}: nothing in {} matches {}",
                self.plan.artifacts_dir.display(),
                matcher.group().glob
            ),
            GroupOutcome::Error { message } => tracing::warn!("{name}: {message}"),
        }
        GroupResult { name, outcome }
    }

    fn cover_outcome(&mut self, matcher: &ArtifactMatcher<'_>) -> GroupOutcome {
        let binary = match matcher.find_latest(&self.plan.artifacts_dir) {
            Ok(Some(binary)) => binary,
            Ok(None) => return GroupOutcome::Missing,
            Err(e) => {
                return GroupOutcome::Error {
                    message: e.to_string(),
                };
            }
        };

        let invocation = self.plan.coverage.invocation(&self.plan.output_dir, &binary);
        tracing::info!("{}: {invocation}", matcher.group().name);
        match self.commands.run(&invocation) {
            Ok(0) => GroupOutcome::Covered { binary },
            Ok(code) => GroupOutcome::Failed { binary, code },
            Err(e) => GroupOutcome::Error {
                message: e.to_string(),
            },
        }
    }

    fn open_report(&mut self) -> ReportOutcome {
        if !self.plan.report.open {
            return ReportOutcome::Skipped;
        }

        let index = self.plan.report_index();
        if !index.is_file() {
            tracing::warn!("no report at {}, not opening it", index.display());
            return ReportOutcome::NotProduced;
        }

        let Some(open) = opener::open_command(&index, self.plan.report.opener.as_deref()) else {
            tracing::warn!("no viewer known for this platform, not opening the report");
            return ReportOutcome::OpenerUnavailable {
                message: "no viewer known for this platform".to_string(),
            };
        };
        match self.commands.run(&open) {
            Ok(code) => {
                if code != 0 {
                    tracing::warn!("`{open}` exited with status {code}");
                }
                ReportOutcome::Opened { code }
            }
            Err(e) => {
                tracing::warn!("{e}");
                ReportOutcome::OpenerUnavailable {
                    message: e.to_string(),
                }
            }
        }
    }
}
