//! covrun: kcov coverage for Rust workspaces
//!
//! Facade over the workspace crates. The `covrun` binary lives in
//! `covrun-cli`.

pub use covrun_config as config;
pub use covrun_plan as plan;
pub use covrun_runner as runner;
