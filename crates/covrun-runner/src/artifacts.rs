//! Locating compiled test binaries
//!
//! `cargo test --no-run` leaves `<crate>-<hash>` executables in the deps
//! directory next to `.d` files and rlibs sharing the same prefix. Stale
//! hashes from earlier builds linger too, so the newest executable wins.

use crate::locate::is_executable;
use covrun_plan::{CoverageGroup, CovrunError};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use wax::{Glob, Pattern};

/// A group's compiled file name matcher
pub struct ArtifactMatcher<'g> {
    group: &'g CoverageGroup,
    glob: Glob<'g>,
}

impl<'g> ArtifactMatcher<'g> {
    /// # Errors
    ///
    /// Returns `CovrunError::InvalidGlob` if the group's glob does not parse
    pub fn new(group: &'g CoverageGroup) -> Result<Self, CovrunError> {
        let glob = Glob::new(&group.glob).map_err(|e| CovrunError::InvalidGlob {
            group: group.name.clone(),
            message: e.to_string(),
        })?;
        Ok(Self { group, glob })
    }

    #[must_use]
    pub const fn group(&self) -> &CoverageGroup {
        self.group
    }

    #[must_use]
    pub fn matches(&self, file_name: &str) -> bool {
        self.glob.is_match(file_name)
    }

    /// Every executable in `dir` whose file name matches, newest first
    ///
    /// A missing directory has no artifacts.
    ///
    /// # Errors
    ///
    /// Returns `CovrunError::Io` if the directory exists but cannot be read
    pub fn find_all(&self, dir: &Path) -> Result<Vec<PathBuf>, CovrunError> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CovrunError::io(dir, e)),
        };

        let mut found: Vec<(SystemTime, PathBuf)> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CovrunError::io(dir, e))?;
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !self.matches(name) || !is_executable(&path) {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|meta| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            found.push((modified, path));
        }

        found.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        Ok(found.into_iter().map(|(_, path)| path).collect())
    }

    /// The most recently built matching executable
    ///
    /// # Errors
    ///
    /// Returns `CovrunError::Io` if the directory exists but cannot be read
    pub fn find_latest(&self, dir: &Path) -> Result<Option<PathBuf>, CovrunError> {
        Ok(self.find_all(dir)?.into_iter().next())
    }
}
