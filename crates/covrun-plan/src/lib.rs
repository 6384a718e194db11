//! Run plan definitions for covrun
//!
//! A `Plan` is the fully resolved description of one coverage run: which
//! external commands get spawned, in which order, with which arguments.
//! Nothing in this crate touches the filesystem or spawns processes.

use std::fmt;
use std::path::{Path, PathBuf};

/// One external command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

/// Quote a word so it survives being pasted into a POSIX shell
fn shell_word(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./,=:~+@%".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", shell_word(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", shell_word(arg))?;
        }
        Ok(())
    }
}

/// Source path filters handed to the coverage tool
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathFilters {
    pub exclude: Vec<String>,
    pub include: Vec<String>,
}

impl PathFilters {
    /// Render as `--exclude-pattern a,b --include-pattern c`
    ///
    /// An empty list emits no flag at all.
    #[must_use]
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if !self.exclude.is_empty() {
            args.push("--exclude-pattern".to_string());
            args.push(self.exclude.join(","));
        }
        if !self.include.is_empty() {
            args.push("--include-pattern".to_string());
            args.push(self.include.join(","));
        }
        args
    }
}

/// Compile-only test build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStep {
    pub program: String,
    pub packages: Vec<String>,
    pub features: Vec<String>,
    pub args: Vec<String>,
}

impl BuildStep {
    #[must_use]
    pub fn invocation(&self) -> Invocation {
        let mut inv = Invocation::new(&self.program).args(["test", "--no-run"]);
        for package in &self.packages {
            inv = inv.arg("-p").arg(package);
        }
        if !self.features.is_empty() {
            inv = inv.arg("--features").arg(self.features.join(","));
        }
        inv.args(self.args.iter().cloned())
    }
}

/// The coverage instrumenter and the flags shared by every run of it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageTool {
    pub program: String,
    pub filters: PathFilters,
    pub verify: bool,
    pub args: Vec<String>,
}

impl CoverageTool {
    /// Command line instrumenting `binary`, merging into `output_dir`
    #[must_use]
    pub fn invocation(&self, output_dir: &Path, binary: &Path) -> Invocation {
        let mut inv = Invocation::new(&self.program).args(self.filters.to_args());
        if self.verify {
            inv = inv.arg("--verify");
        }
        inv.args(self.args.iter().cloned())
            .arg(output_dir.display().to_string())
            .arg(binary.display().to_string())
    }
}

/// A family of compiled test binaries, selected by file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageGroup {
    pub name: String,
    /// Glob matched against file names inside the artifacts directory
    pub glob: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportStep {
    /// File name of the aggregate report inside the output directory
    pub index: String,
    pub open: bool,
    /// Overrides the platform viewer
    pub opener: Option<String>,
}

/// What to do when an individual coverage run fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Keep going and let the report opener decide the exit status
    BestEffort,
    /// Keep going, then fail the whole run if any group failed
    #[default]
    Strict,
}

/// A fully resolved coverage run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// Directory every command runs in and relative paths resolve against
    pub root: PathBuf,
    /// Extra tools that must be on the path besides the coverage tool
    pub require: Vec<String>,
    pub build: BuildStep,
    pub artifacts_dir: PathBuf,
    pub output_dir: PathBuf,
    pub coverage: CoverageTool,
    pub groups: Vec<CoverageGroup>,
    pub report: ReportStep,
    pub failure_policy: FailurePolicy,
}

impl Plan {
    #[must_use]
    pub fn report_index(&self) -> PathBuf {
        self.output_dir.join(&self.report.index)
    }

    /// Tools checked before anything runs, coverage tool first
    #[must_use]
    pub fn required_tools(&self) -> Vec<&str> {
        let mut tools = vec![self.coverage.program.as_str()];
        for tool in &self.require {
            if !tools.contains(&tool.as_str()) {
                tools.push(tool);
            }
        }
        tools
    }
}

/// Exit status used when coverage groups failed under `FailurePolicy::Strict`
pub const EXIT_COVERAGE_FAILED: i32 = 3;

#[derive(thiserror::Error, Debug)]
pub enum CovrunError {
    #[error("covrun: ERR_TOOL_MISSING: {tool} not found on PATH; install {tool} first. Aborting.")]
    ToolMissing { tool: String },

    #[error("covrun: ERR_BUILD_FAILED: `{command}` exited with status {code}")]
    BuildFailed { command: String, code: i32 },

    #[error("covrun: ERR_SPAWN: failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("covrun: ERR_IO: {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("covrun: ERR_INVALID_GLOB: group {group}: {message}")]
    InvalidGlob { group: String, message: String },

    #[error("covrun: ERR_CONFIG: {}: {message}", path.display())]
    Config { path: PathBuf, message: String },
}

impl CovrunError {
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::ToolMissing { .. } => "ERR_TOOL_MISSING",
            Self::BuildFailed { .. } => "ERR_BUILD_FAILED",
            Self::Spawn { .. } => "ERR_SPAWN",
            Self::Io { .. } => "ERR_IO",
            Self::InvalidGlob { .. } => "ERR_INVALID_GLOB",
            Self::Config { .. } => "ERR_CONFIG",
        }
    }

    /// Process exit status for this error
    ///
    /// A failed build propagates its own status. A build killed without a
    /// status still fails with 1.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::BuildFailed { code, .. } if *code != 0 => *code,
            _ => 1,
        }
    }
}
