//! Spawning external commands

use covrun_plan::{CovrunError, Invocation};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command as StdCommand, ExitStatus};

/// Executes invocations on behalf of the runner
///
/// Every call blocks until the command has exited.
pub trait CommandRunner {
    /// Run to completion and return the exit status
    ///
    /// # Errors
    ///
    /// Returns `CovrunError::Spawn` if the program could not be started
    fn run(&mut self, invocation: &Invocation) -> Result<i32, CovrunError>;

    /// Create `path` and its parents; an existing directory is fine
    ///
    /// # Errors
    ///
    /// Returns `CovrunError::Io` if the directory cannot be created
    fn ensure_dir(&mut self, path: &Path) -> Result<(), CovrunError> {
        std::fs::create_dir_all(path).map_err(|e| CovrunError::io(path, e))
    }
}

/// Spawns real processes with inherited stdio
pub struct SystemRunner {
    working_dir: PathBuf,
}

impl SystemRunner {
    #[must_use]
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&mut self, invocation: &Invocation) -> Result<i32, CovrunError> {
        tracing::debug!("running {invocation}");
        let status = StdCommand::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&self.working_dir)
            .status()
            .map_err(|source| CovrunError::Spawn {
                program: invocation.program.clone(),
                source,
            })?;
        Ok(status_code(status))
    }
}

/// Prints what would run and pretends it succeeded
pub struct DryRunner<W: io::Write> {
    out: W,
}

impl<W: io::Write> DryRunner<W> {
    pub const fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn print(&mut self, line: &str) -> Result<(), CovrunError> {
        writeln!(self.out, "{line}").map_err(|e| CovrunError::io("<stdout>", e))
    }
}

impl<W: io::Write> CommandRunner for DryRunner<W> {
    fn run(&mut self, invocation: &Invocation) -> Result<i32, CovrunError> {
        self.print(&invocation.to_string())?;
        Ok(0)
    }

    fn ensure_dir(&mut self, path: &Path) -> Result<(), CovrunError> {
        let mkdir = Invocation::new("mkdir")
            .arg("-p")
            .arg(path.display().to_string());
        self.print(&mkdir.to_string())
    }
}

/// Map an exit status to a shell-style code
///
/// Death by signal becomes `128 + signal` on Unix.
#[must_use]
pub fn status_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
