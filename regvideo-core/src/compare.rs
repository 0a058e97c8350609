//! Compares the screenshots of this run against the reference set.
//!
//! Screenshots without a reference are promoted to reference ("seeded") and
//! compared from the next run on. References without a screenshot are
//! reported as missing tests. Everything else goes through a PSNR tool.

use crate::{
    layout::list_or_create,
    plugin::VideoPlugin,
    report::Report,
    tools::run_tool,
};
use serde::Serialize;
use std::{
    io,
    path::{Path, PathBuf},
    process::Command,
};

/// Scores at or below this many decibels are a mismatch.
pub const MATCH_THRESHOLD_DB: f64 = 60.0;

const DIFF_SUFFIX: &str = "_DIFF.png";

/// Computes a PSNR between two images and writes a difference image.
pub trait SimilarityTool {
    /// Returns the tool's raw textual result.
    fn psnr(&self, reference: &Path, current: &Path, diff: &Path) -> io::Result<String>;
}

impl<T: SimilarityTool + ?Sized> SimilarityTool for &T {
    fn psnr(&self, reference: &Path, current: &Path, diff: &Path) -> io::Result<String> {
        (**self).psnr(reference, current, diff)
    }
}

/// ImageMagick's `compare -metric PSNR`.
#[derive(Debug, Clone)]
pub struct ImageMagickCompare {
    program: PathBuf,
}

impl ImageMagickCompare {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl SimilarityTool for ImageMagickCompare {
    fn psnr(&self, reference: &Path, current: &Path, diff: &Path) -> io::Result<String> {
        // `compare` prints the metric on stderr and exits non-zero when the images differ.
        let output = run_tool(
            Command::new(&self.program)
                .args(["-metric", "PSNR"])
                .arg(reference)
                .arg(current)
                .arg(diff),
        )?;
        Ok(output.combined().trim().to_owned())
    }
}

/// Parses a PSNR result. Anything that is not a number scores zero.
#[must_use]
pub fn parse_psnr(text: &str) -> f64 {
    text.trim().parse().unwrap_or(0.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Match,
    Mismatch,
}

impl Verdict {
    #[must_use]
    pub fn from_score(db: f64) -> Self {
        if db > MATCH_THRESHOLD_DB {
            Self::Match
        } else {
            Self::Mismatch
        }
    }
}

/// Result of comparing one screenshot against its reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub plugin: &'static str,
    pub file: String,
    pub score: f64,
    /// Tool output as printed.
    pub raw: String,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompareSummary {
    pub errors: usize,
    pub warnings: usize,
    pub seeded: usize,
    pub missing: usize,
    pub comparisons: Vec<Comparison>,
}

impl CompareSummary {
    #[must_use]
    pub fn mismatches(&self) -> usize {
        self.comparisons
            .iter()
            .filter(|c| c.verdict == Verdict::Mismatch)
            .count()
    }
}

/// Name of the difference image written next to `file`.
#[must_use]
pub fn diff_name(file: &str) -> String {
    let stem = Path::new(file)
        .file_stem()
        .map_or_else(|| file.to_owned(), |s| s.to_string_lossy().into_owned());
    format!("{stem}{DIFF_SUFFIX}")
}

struct PluginShots {
    plugin: VideoPlugin,
    reference: Vec<String>,
    current: Vec<String>,
}

pub struct ImageComparator<'a, T> {
    reference: &'a Path,
    current: &'a Path,
    tool: T,
}

impl<'a, T: SimilarityTool> ImageComparator<'a, T> {
    pub const fn new(reference: &'a Path, current: &'a Path, tool: T) -> Self {
        Self {
            reference,
            current,
            tool,
        }
    }

    fn collect(&self, plugin: VideoPlugin) -> io::Result<PluginShots> {
        let (reference, existed) = list_or_create(&self.reference.join(plugin.dir_name()))?;
        if !existed {
            tracing::info!(%plugin, "initialized empty reference directory");
        }
        let (mut current, _) = list_or_create(&self.current.join(plugin.dir_name()))?;
        current.retain(|name| !name.ends_with(DIFF_SUFFIX));
        Ok(PluginShots {
            plugin,
            reference,
            current,
        })
    }

    /// Compares every plugin's screenshots with its references.
    ///
    /// Mismatches, missing files and failures on a single image only count as
    /// warnings and errors in the summary. `Err` means the directories
    /// themselves could not be read or created.
    pub fn compare(&self, plugins: &[VideoPlugin], report: &mut Report) -> io::Result<CompareSummary> {
        report.blank();
        report.line("Checking regression test results");

        std::fs::create_dir_all(self.reference)?;
        let shots = plugins
            .iter()
            .map(|&plugin| self.collect(plugin))
            .collect::<io::Result<Vec<_>>>()?;

        let mut summary = CompareSummary::default();

        let mut checklist = Vec::new();
        for set in &shots {
            let name = set.plugin.dir_name();
            for file in &set.current {
                if set.reference.contains(file) {
                    checklist.push((set.plugin, file.as_str()));
                } else {
                    report.warning(format_args!(
                        "reference screenshot '{name}/{file}' missing. Copying from current test run"
                    ));
                    summary.warnings += 1;
                    let copied = std::fs::copy(
                        self.current.join(name).join(file),
                        self.reference.join(name).join(file),
                    );
                    match copied {
                        Ok(_) => summary.seeded += 1,
                        Err(err) => {
                            report.error(format_args!(
                                "cannot copy '{name}/{file}' to reference set: {err}"
                            ));
                            summary.errors += 1;
                        }
                    }
                }
            }
        }

        for set in &shots {
            let name = set.plugin.dir_name();
            for file in set.reference.iter().filter(|f| !set.current.contains(f)) {
                report.error(format_args!("Test screenshot '{name}/{file}' missing."));
                summary.missing += 1;
                summary.errors += 1;
            }
        }

        for (plugin, file) in checklist {
            self.compare_one(plugin, file, &mut summary, report);
        }

        report.line(format!("{} errors. {} warnings.", summary.errors, summary.warnings));
        Ok(summary)
    }

    fn compare_one(
        &self,
        plugin: VideoPlugin,
        file: &str,
        summary: &mut CompareSummary,
        report: &mut Report,
    ) {
        let name = plugin.dir_name();
        let reference = self.reference.join(name).join(file);
        let current = self.current.join(name).join(file);
        let diff = self.current.join(name).join(diff_name(file));

        let raw = match self.tool.psnr(&reference, &current, &diff) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(%err, "similarity tool failed");
                format!("(compare failed: {err})")
            }
        };
        let score = parse_psnr(&raw);
        if raw.trim().parse::<f64>().is_err() {
            tracing::warn!(image = %format!("{name}/{file}"), raw = %raw, "unparsable PSNR result");
        }
        tracing::debug!(image = %format!("{name}/{file}"), score, "compared");

        let verdict = Verdict::from_score(score);
        match verdict {
            Verdict::Match => match std::fs::remove_file(&diff) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => {
                    report.error(format_args!(
                        "cannot remove difference image '{}': {err}",
                        diff.display()
                    ));
                    summary.errors += 1;
                }
            },
            Verdict::Mismatch => {
                report.warning(format_args!(
                    "test image '{name}/{file}' does not match reference.  PSNR = {raw}"
                ));
                summary.warnings += 1;
            }
        }

        summary.comparisons.push(Comparison {
            plugin: name,
            file: file.to_owned(),
            score,
            raw,
            verdict,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn psnr_parsing_degrades_to_zero() {
        assert!((parse_psnr(" 72.5 \n") - 72.5).abs() < f64::EPSILON);
        assert!(parse_psnr("inf").is_infinite());
        assert!(parse_psnr("compare: unable to open image").abs() < f64::EPSILON);
        assert!(parse_psnr("").abs() < f64::EPSILON);
    }

    #[test]
    fn threshold_is_strict() {
        assert_eq!(Verdict::from_score(60.0), Verdict::Mismatch);
        assert_eq!(Verdict::from_score(60.0001), Verdict::Match);
        assert_eq!(Verdict::from_score(0.0), Verdict::Mismatch);
        assert_eq!(Verdict::from_score(f64::INFINITY), Verdict::Match);
    }

    #[test]
    fn diff_image_name() {
        assert_eq!(diff_name("foo-010.png"), "foo-010_DIFF.png");
        assert_eq!(diff_name("noext"), "noext_DIFF.png");
    }
}
