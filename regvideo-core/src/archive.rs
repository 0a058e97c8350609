//! Moves a finished run into the dated archive.

use crate::{capture::CaptureSummary, compare::CompareSummary, layout, report::Report};
use chrono::NaiveDate;
use serde::Serialize;
use std::{
    io,
    path::{Path, PathBuf},
};

/// Machine-readable companion of the report.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary<'a> {
    pub date: String,
    /// Exit code of the steps that ran before archiving.
    pub exit_code: u8,
    pub report_errors: usize,
    pub report_warnings: usize,
    pub capture: Option<&'a CaptureSummary>,
    pub compare: Option<&'a CompareSummary>,
}

pub struct Archiver {
    dir: PathBuf,
    date: NaiveDate,
}

impl Archiver {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, date: NaiveDate) -> Self {
        Self {
            dir: dir.into(),
            date,
        }
    }

    /// `archive/<date>`
    #[must_use]
    pub fn run_dir(&self) -> PathBuf {
        self.dir.join(self.date.to_string())
    }

    /// `archive/report_<date>.txt`
    #[must_use]
    pub fn report_path(&self) -> PathBuf {
        self.dir.join(format!("report_{}.txt", self.date))
    }

    /// `archive/summary_<date>.json`
    #[must_use]
    pub fn summary_path(&self) -> PathBuf {
        self.dir.join(format!("summary_{}.json", self.date))
    }

    /// Moves `screenshots` to the dated directory, replacing an earlier run
    /// from the same day, then writes the report and summary next to it.
    pub fn archive(&self, screenshots: &Path, summary: &RunSummary<'_>, report: &mut Report) -> bool {
        if let Err(err) = std::fs::create_dir_all(&self.dir) {
            report.failure(format!("Error creating archive directory: {err}"));
            return false;
        }

        let run_dir = self.run_dir();
        if !layout::remove_tree(&run_dir, report) {
            return false;
        }

        if screenshots.is_dir() {
            if let Err(err) = move_tree(screenshots, &run_dir) {
                report.failure(format!(
                    "Error moving '{}' to '{}': {err}",
                    screenshots.display(),
                    run_dir.display()
                ));
                return false;
            }
        } else {
            tracing::info!(path = %screenshots.display(), "no screenshots to archive");
        }

        if let Err(err) = std::fs::write(self.report_path(), report.to_string()) {
            report.failure(format!("Error writing report: {err}"));
            return false;
        }

        let written = serde_json::to_vec_pretty(summary)
            .map_err(io::Error::other)
            .and_then(|json| std::fs::write(self.summary_path(), json));
        if let Err(err) = written {
            report.failure(format!("Error writing run summary: {err}"));
            return false;
        }

        tracing::info!(dir = %run_dir.display(), "results archived");
        true
    }
}

fn move_tree(from: &Path, to: &Path) -> io::Result<()> {
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        // Rename cannot cross filesystems; fall back to copy and delete.
        Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
            copy_tree(from, to)?;
            std::fs::remove_dir_all(from)
        }
        Err(err) => Err(err),
    }
}

fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}
