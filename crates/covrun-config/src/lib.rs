//! Configuration for covrun
//!
//! Reads `covrun.toml` and resolves it into a [`Plan`]. Without a file the
//! built-in defaults describe the ethcore workspace: five crates built in
//! compile-only mode, one kcov run per crate's test binary, all merged into
//! `target/coverage`.
//!
//! ```toml
//! output_dir = "target/coverage"
//! failure_policy = "strict"
//!
//! [build]
//! packages = ["ethcore", "ethsync"]
//!
//! [coverage]
//! exclude = ["~/.multirust", "src/tests"]
//! include = ["src"]
//!
//! [[coverage.groups]]
//! name = "ethcore"
//! glob = "ethcore-*"
//! ```

use covrun_plan::{
    BuildStep, CoverageGroup, CoverageTool, CovrunError, FailurePolicy, PathFilters, Plan,
    ReportStep,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod patterns;

/// Looked up in the project directory when no file is named explicitly
pub const DEFAULT_FILE_NAME: &str = "covrun.toml";

const BUILTIN_ORIGIN: &str = "<built-in defaults>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicySetting {
    BestEffort,
    #[default]
    Strict,
}

impl From<PolicySetting> for FailurePolicy {
    fn from(setting: PolicySetting) -> Self {
        match setting {
            PolicySetting::BestEffort => Self::BestEffort,
            PolicySetting::Strict => Self::Strict,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub output_dir: PathBuf,
    pub artifacts_dir: PathBuf,
    pub failure_policy: PolicySetting,
    /// Tools that must be installed besides the coverage tool
    pub require: Vec<String>,
    pub build: BuildConfig,
    pub coverage: CoverageConfig,
    pub report: ReportConfig,
    #[serde(skip)]
    origin: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    pub program: String,
    pub packages: Vec<String>,
    pub features: Vec<String>,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoverageConfig {
    pub program: String,
    pub exclude: Vec<String>,
    pub include: Vec<String>,
    pub verify: bool,
    pub args: Vec<String>,
    pub groups: Vec<GroupConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupConfig {
    pub name: String,
    pub glob: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    pub index: String,
    pub open: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opener: Option<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("target/coverage"),
            artifacts_dir: PathBuf::from("target/debug/deps"),
            failure_policy: PolicySetting::default(),
            require: Vec::new(),
            build: BuildConfig::default(),
            coverage: CoverageConfig::default(),
            report: ReportConfig::default(),
            origin: PathBuf::from(BUILTIN_ORIGIN),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            program: "cargo".to_string(),
            packages: strings(&["ethash", "ethcore-util", "ethcore", "ethsync", "ethcore-rpc"]),
            features: Vec::new(),
            args: Vec::new(),
        }
    }
}

impl Default for CoverageConfig {
    fn default() -> Self {
        let groups = [
            ("ethcore", "ethcore-*"),
            ("ethash", "ethash-*"),
            ("ethcore_util", "ethcore_util-*"),
            ("ethsync", "ethsync-*"),
            ("ethcore_rpc", "ethcore_rpc-*"),
        ];
        Self {
            program: "kcov".to_string(),
            exclude: strings(&[
                "~/.multirust",
                "rocksdb",
                "secp256k1",
                "src/tests",
                "util/json-tests",
                "util/src/network/tests",
                "sync/src/tests",
                "ethcore/src/tests",
                "ethcore/src/evm/tests",
            ]),
            include: strings(&["src"]),
            verify: true,
            args: Vec::new(),
            groups: groups
                .iter()
                .map(|(name, glob)| GroupConfig {
                    name: (*name).to_string(),
                    glob: (*glob).to_string(),
                })
                .collect(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            index: "index.html".to_string(),
            open: true,
            opener: None,
        }
    }
}

impl Config {
    /// Parse configuration text; `origin` names it in error messages
    ///
    /// # Errors
    ///
    /// Returns `CovrunError::Config` on malformed TOML or unknown keys
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, CovrunError> {
        let mut config: Self =
            toml::from_str(text).map_err(|e| CovrunError::config(origin, e.to_string()))?;
        config.origin = origin.to_path_buf();
        Ok(config)
    }

    /// Load the named file, or `covrun.toml` in `project_dir` if present
    ///
    /// A relative `explicit` path is taken from `project_dir`. Falls back to
    /// the built-in defaults when no file is named and the project has none.
    ///
    /// # Errors
    ///
    /// Returns `CovrunError::Io` if a file cannot be read and
    /// `CovrunError::Config` if it does not parse
    pub fn load(explicit: Option<&Path>, project_dir: &Path) -> Result<Self, CovrunError> {
        let path = match explicit {
            Some(path) => project_dir.join(path),
            None => {
                let candidate = project_dir.join(DEFAULT_FILE_NAME);
                if !candidate.is_file() {
                    tracing::debug!(
                        "no {DEFAULT_FILE_NAME} in {}, using defaults",
                        project_dir.display()
                    );
                    return Ok(Self::default());
                }
                candidate
            }
        };

        tracing::debug!("loading configuration from {}", path.display());
        let text = std::fs::read_to_string(&path).map_err(|e| CovrunError::io(&path, e))?;
        Self::from_toml_str(&text, &path)
    }

    /// Where this configuration came from
    #[must_use]
    pub fn origin(&self) -> &Path {
        &self.origin
    }

    /// Render as TOML, suitable for saving as `covrun.toml`
    ///
    /// # Errors
    ///
    /// Returns `CovrunError::Config` if a path is not valid UTF-8
    pub fn to_toml(&self) -> Result<String, CovrunError> {
        toml::to_string_pretty(self)
            .map_err(|e| CovrunError::config(&self.origin, e.to_string()))
    }

    /// Validate and resolve against `root`
    ///
    /// # Errors
    ///
    /// Returns `CovrunError::Config` for blank programs, invalid path
    /// patterns, or missing, blank or duplicate groups
    pub fn into_plan(self, root: &Path) -> Result<Plan, CovrunError> {
        let invalid = |message: String| CovrunError::config(&self.origin, message);

        if self.build.program.trim().is_empty() {
            return Err(invalid("build.program must not be empty".to_string()));
        }
        if self.coverage.program.trim().is_empty() {
            return Err(invalid("coverage.program must not be empty".to_string()));
        }
        if self.report.index.trim().is_empty() {
            return Err(invalid("report.index must not be empty".to_string()));
        }
        if self.coverage.groups.is_empty() {
            return Err(invalid("coverage.groups must name at least one group".to_string()));
        }

        let mut groups: Vec<CoverageGroup> = Vec::with_capacity(self.coverage.groups.len());
        for group in &self.coverage.groups {
            if group.name.trim().is_empty() || group.glob.trim().is_empty() {
                return Err(invalid("every group needs a name and a glob".to_string()));
            }
            if groups.iter().any(|g| g.name == group.name) {
                return Err(invalid(format!("duplicate group `{}`", group.name)));
            }
            groups.push(CoverageGroup {
                name: group.name.clone(),
                glob: group.glob.clone(),
            });
        }

        let filters = PathFilters {
            exclude: patterns::normalize_patterns("coverage.exclude", &self.coverage.exclude)
                .map_err(invalid)?,
            include: patterns::normalize_patterns("coverage.include", &self.coverage.include)
                .map_err(invalid)?,
        };

        Ok(Plan {
            root: root.to_path_buf(),
            require: self.require,
            build: BuildStep {
                program: self.build.program,
                packages: self.build.packages,
                features: self.build.features,
                args: self.build.args,
            },
            artifacts_dir: root.join(&self.artifacts_dir),
            output_dir: root.join(&self.output_dir),
            coverage: CoverageTool {
                program: self.coverage.program,
                filters,
                verify: self.coverage.verify,
                args: self.coverage.args,
            },
            groups,
            report: ReportStep {
                index: self.report.index,
                open: self.report.open,
                opener: self.report.opener,
            },
            failure_policy: self.failure_policy.into(),
        })
    }
}
