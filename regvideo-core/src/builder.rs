//! Source checkout and `make` builds.

use crate::{
    config::BuildSpec,
    layout::{self, Layout},
    plugin::{EMULATOR_BIN, REQUIRED_LIBS},
    report::Report,
    tools::{Tools, last_line, run_tool},
};
use std::{path::PathBuf, process::Command};

/// Final stdout line of a successful `svn co`.
const CHECKOUT_OK_PREFIX: &str = "Checked out revision";

/// What a single line of build output says about the build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineClass {
    pub error: bool,
    pub warning: bool,
}

/// Classifies build-tool output lines.
pub trait OutputClassifier {
    fn classify(&self, line: &str) -> LineClass;
}

/// Looks for the `error:` and `warning:` markers gcc and make print.
///
/// A line may be both, and messages that merely mention these words are
/// counted too.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringClassifier;

impl OutputClassifier for SubstringClassifier {
    fn classify(&self, line: &str) -> LineClass {
        LineClass {
            error: line.contains("error:"),
            warning: line.contains("warning:"),
        }
    }
}

/// Error and warning counts of one build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildTally {
    pub errors: usize,
    pub warnings: usize,
}

/// Whether a build is a compile-only sanity check or produces the binary under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildKind {
    Test,
    Video,
}

pub struct Builder<'a, C = SubstringClassifier> {
    layout: &'a Layout,
    tools: &'a Tools,
    classifier: C,
}

impl<'a> Builder<'a> {
    #[must_use]
    pub const fn new(layout: &'a Layout, tools: &'a Tools) -> Self {
        Self {
            layout,
            tools,
            classifier: SubstringClassifier,
        }
    }
}

impl<'a, C: OutputClassifier> Builder<'a, C> {
    #[must_use]
    pub fn with_classifier<D: OutputClassifier>(self, classifier: D) -> Builder<'a, D> {
        Builder {
            layout: self.layout,
            tools: self.tools,
            classifier,
        }
    }

    /// Wipes the source directory and checks out `repo` into it.
    ///
    /// Success is read from the last stdout line, so warnings svn prints on
    /// stderr do not fail the checkout. On failure the last stderr line is
    /// reported, if there is one.
    pub fn checkout(&self, repo: &str, report: &mut Report) -> bool {
        if !layout::remove_tree(&self.layout.source, report) {
            return false;
        }

        let output = run_tool(
            Command::new(&self.tools.svn)
                .arg("co")
                .arg(repo)
                .arg(&self.layout.source),
        );
        let output = match output {
            Ok(output) => output,
            Err(err) => {
                report.failure(format!("SVN Error: cannot run '{}': {err}", self.tools.svn.display()));
                report.blank();
                return false;
            }
        };

        let stdout_line = last_line(&output.stdout);
        if stdout_line.starts_with(CHECKOUT_OK_PREFIX) {
            report.line(format!("SVN Checkout successful: {stdout_line}"));
            report.blank();
            true
        } else {
            let failure_line = match last_line(&output.stderr) {
                "" => stdout_line,
                stderr_line => stderr_line,
            };
            report.failure(format!("SVN Error: {failure_line}"));
            report.blank();
            false
        }
    }

    /// Counts errors and warnings in build output, copying each flagged line to the report.
    pub fn tally(&self, output: &str, report: &mut Report) -> BuildTally {
        let mut tally = BuildTally::default();
        for line in output.lines() {
            let class = self.classifier.classify(line);
            if class.error {
                report.line(format!("    {line}"));
                tally.errors += 1;
            }
            if class.warning {
                report.line(format!("    {line}"));
                tally.warnings += 1;
            }
        }
        report.line(format!("{} errors. {} warnings.", tally.errors, tally.warnings));
        tally
    }

    /// Artifacts a finished video build must have produced.
    #[must_use]
    pub fn required_artifacts(&self) -> Vec<PathBuf> {
        let plugins = self.layout.plugins_dir();
        core::iter::once(self.layout.source.join(EMULATOR_BIN))
            .chain(REQUIRED_LIBS.iter().map(|lib| plugins.join(lib)))
            .collect()
    }

    /// Runs `make` with the build's parameters.
    ///
    /// A failing test build only leaves lines in the report; the return value
    /// is `false` only when the video build fails.
    pub fn build(&self, spec: &BuildSpec, kind: BuildKind, report: &mut Report) -> bool {
        let command_line = format!(
            "{} -C {} {}",
            self.tools.make.display(),
            self.layout.source.display(),
            spec.params
        );
        match kind {
            BuildKind::Test => report.line(format!(
                "Running test build \"{}\" with command \"{command_line}\"",
                spec.name
            )),
            BuildKind::Video => report.line(format!(
                "Building Mupen64Plus \"{}\" for video test with command \"{command_line}\"",
                spec.name
            )),
        }

        let output = run_tool(
            Command::new(&self.tools.make)
                .arg("-C")
                .arg(&self.layout.source)
                .args(spec.params.split_whitespace()),
        );
        let mut tally = match output {
            Ok(output) => self.tally(&output.combined(), report),
            Err(err) => {
                report.failure(format!("Build failed: cannot run '{}': {err}", self.tools.make.display()));
                BuildTally {
                    errors: 1,
                    warnings: 0,
                }
            }
        };

        if tally.errors > 0 && kind == BuildKind::Video {
            return false;
        }

        for artifact in self.required_artifacts() {
            if !artifact.exists() {
                report.failure(format!("Build failed: '{}' not found", artifact.display()));
                tally.errors += 1;
            }
        }

        match kind {
            BuildKind::Video => tally.errors == 0,
            BuildKind::Test => {
                self.clean(report);
                true
            }
        }
    }

    fn clean(&self, report: &mut Report) {
        let status = Command::new(&self.tools.make)
            .arg("-C")
            .arg(&self.layout.source)
            .arg("clean")
            .output();
        if let Err(err) = status {
            report.failure(format!("Error cleaning build tree: {err}"));
        }
    }
}
