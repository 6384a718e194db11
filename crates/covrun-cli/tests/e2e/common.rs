//! Sandbox with fake tools for driving the real binary

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Tool directory first, then the system one for `sh`, `mkdir` and friends
const SYSTEM_PATH: &str = "/usr/bin:/bin";

pub struct TestEnv {
    _tmp: TempDir,
    pub root: PathBuf,
    pub bin: PathBuf,
    pub log: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let root = tmp.path().join("project");
        let bin = tmp.path().join("bin");
        let log = tmp.path().join("calls.log");
        fs::create_dir_all(&root).expect("create project dir");
        fs::create_dir_all(&bin).expect("create tool dir");

        write_script(&bin.join("cargo"), &fake_cargo(&log));
        write_script(&bin.join("kcov"), &fake_kcov(&log));
        write_script(&bin.join("viewer"), &fake_viewer(&log));

        let env = Self {
            _tmp: tmp,
            root,
            bin,
            log,
        };
        env.write_config("");
        env
    }

    /// Project config using the fake tools, with `extra` appended
    pub fn write_config(&self, extra: &str) {
        let config = format!(
            r#"output_dir = "target/coverage"
{extra}
[build]
program = "{cargo}"
packages = ["alpha", "beta"]

[coverage]
program = "kcov"
exclude = ["vendor", "src/tests"]
include = ["src"]

[[coverage.groups]]
name = "alpha"
glob = "alpha-*"

[[coverage.groups]]
name = "beta"
glob = "beta-*"

[report]
opener = "{viewer}"
"#,
            cargo = self.bin.join("cargo").display(),
            viewer = self.bin.join("viewer").display(),
        );
        fs::write(self.root.join("covrun.toml"), config).expect("write config");
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("covrun");
        cmd.current_dir(&self.root)
            .env("PATH", format!("{}:{SYSTEM_PATH}", self.bin.display()))
            .env_remove("RUST_LOG")
            .env_remove("FAKE_CARGO_STATUS")
            .env_remove("FAKE_KCOV_STATUS");
        cmd
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join("target/coverage")
    }

    /// Every fake tool call so far, one line each
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(&self.log)
            .map(|text| text.lines().map(ToString::to_string).collect())
            .unwrap_or_default()
    }

    pub fn calls_to(&self, tool: &str) -> Vec<String> {
        let prefix = format!("{tool} ");
        self.calls()
            .into_iter()
            .filter(|line| line.starts_with(&prefix))
            .collect()
    }
}

fn write_script(path: &Path, body: &str) {
    fs::write(path, body).expect("write script");
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).expect("chmod script");
}

/// Leaves an executable plus a `.d` file per package, like the real build
fn fake_cargo(log: &Path) -> String {
    format!(
        r#"#!/bin/sh
echo "cargo $*" >> '{log}'
if [ -n "$FAKE_CARGO_STATUS" ]; then exit "$FAKE_CARGO_STATUS"; fi
mkdir -p target/debug/deps
for name in alpha beta; do
    printf '#!/bin/sh\nexit 0\n' > "target/debug/deps/$name-1f2e3d4c"
    chmod +x "target/debug/deps/$name-1f2e3d4c"
    : > "target/debug/deps/$name-1f2e3d4c.d"
done
"#,
        log = log.display()
    )
}

/// Writes an index into the output directory, the second to last argument
fn fake_kcov(log: &Path) -> String {
    format!(
        r#"#!/bin/sh
echo "kcov $*" >> '{log}'
n=$#
i=0
out=
for arg in "$@"; do
    i=$((i + 1))
    if [ "$i" -eq $((n - 1)) ]; then out=$arg; fi
done
mkdir -p "$out"
echo '<html></html>' > "$out/index.html"
exit "${{FAKE_KCOV_STATUS:-0}}"
"#,
        log = log.display()
    )
}

fn fake_viewer(log: &Path) -> String {
    format!(
        r#"#!/bin/sh
echo "viewer $*" >> '{log}'
"#,
        log = log.display()
    )
}
