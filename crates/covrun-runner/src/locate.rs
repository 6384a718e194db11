//! Finding tools on the execution path

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Searches a `PATH`-style directory list for executables
#[derive(Debug, Clone)]
pub struct ToolLocator {
    search_path: Option<OsString>,
}

impl ToolLocator {
    /// Search the current process's `PATH`
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            search_path: std::env::var_os("PATH"),
        }
    }

    #[must_use]
    pub fn with_search_path(search_path: impl Into<OsString>) -> Self {
        Self {
            search_path: Some(search_path.into()),
        }
    }

    /// Resolve `tool` to an executable file
    ///
    /// A name containing a path separator is taken as a path (relative ones
    /// against `base`) and not looked up on the search path.
    #[must_use]
    pub fn find(&self, tool: &str, base: &Path) -> Option<PathBuf> {
        let as_path = Path::new(tool);
        if as_path.components().count() > 1 || as_path.is_absolute() {
            return candidates(&base.join(as_path)).into_iter().find(|p| is_executable(p));
        }

        let search_path = self.search_path.as_ref()?;
        std::env::split_paths(search_path)
            .filter(|dir| !dir.as_os_str().is_empty())
            .flat_map(|dir| candidates(&dir.join(tool)))
            .find(|p| is_executable(p))
    }
}

fn candidates(path: &Path) -> Vec<PathBuf> {
    let mut found = vec![path.to_path_buf()];
    if cfg!(windows) && path.extension().is_none() {
        found.push(path.with_extension("exe"));
    }
    found
}

/// Regular file with at least one execute bit set
#[cfg(unix)]
pub(crate) fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
pub(crate) fn is_executable(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("exe"))
}
