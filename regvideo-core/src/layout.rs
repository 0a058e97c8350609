//! Directory layout of a regression test root.

use crate::{plugin::VideoPlugin, report::Report};
use std::{
    io,
    path::{Path, PathBuf},
};

/// Paths derived from the test root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub root: PathBuf,
    /// Checked-out and built source tree. The emulator binary lives here.
    pub source: PathBuf,
    /// Screenshots of the run in progress, one subdirectory per plugin.
    pub current: PathBuf,
    /// Golden screenshots, one subdirectory per plugin.
    pub reference: PathBuf,
    pub archive: PathBuf,
    /// Optional emulator config directory passed with `--configdir`.
    pub config: PathBuf,
}

impl Layout {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            source: root.join("source"),
            current: root.join("current"),
            reference: root.join("reference"),
            archive: root.join("archive"),
            config: root.join("config"),
            root,
        }
    }

    #[must_use]
    pub fn plugins_dir(&self) -> PathBuf {
        self.source.join("plugins")
    }

    #[must_use]
    pub fn current_dir(&self, plugin: VideoPlugin) -> PathBuf {
        self.current.join(plugin.dir_name())
    }

    #[must_use]
    pub fn reference_dir(&self, plugin: VideoPlugin) -> PathBuf {
        self.reference.join(plugin.dir_name())
    }
}

/// Removes `path` and everything below it. A missing path is not an error.
///
/// Failures are written to the report and signalled with `false`.
pub fn remove_tree(path: &Path, report: &mut Report) -> bool {
    match std::fs::remove_dir_all(path) {
        Ok(()) => true,
        Err(err) if err.kind() == io::ErrorKind::NotFound => true,
        Err(err) => {
            report.failure(format!("Error in deltree(): {err}"));
            false
        }
    }
}

/// Sorted file names directly inside `dir`, creating the directory if needed.
///
/// Returns the names and whether the directory already existed.
pub fn list_or_create(dir: &Path) -> io::Result<(Vec<String>, bool)> {
    if !dir.is_dir() {
        std::fs::create_dir_all(dir)?;
        return Ok((Vec::new(), false));
    }
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok((names, true))
}
