//! The daily regression run from config to archive.
//!
//! Steps run strictly in order. A fatal step skips the remaining test steps
//! but the report is still mailed and archived, and each of those two can
//! fail on its own without undoing the other.

use crate::{
    archive::{Archiver, RunSummary},
    builder::{BuildKind, Builder},
    capture::{CaptureSummary, ScreenshotCapture},
    compare::{CompareSummary, ImageComparator, ImageMagickCompare, SimilarityTool},
    config::{self, TestPlan},
    layout::Layout,
    mail::{self, MailTransport, Sendmail},
    plugin::VideoPlugin,
    report::Report,
    tools::{Timeouts, Tools},
};
use chrono::NaiveDate;
use core::fmt;
use std::path::PathBuf;

/// Outcome of a run, as reported through the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunStatus {
    Success = 0,
    ConfigLoad = 1,
    Checkout = 2,
    Build = 3,
    TestRun = 4,
    ResultCheck = 5,
    ReportSend = 6,
    Archive = 7,
}

impl RunStatus {
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Success => "success",
            Self::ConfigLoad => "config load failure",
            Self::Checkout => "checkout failure",
            Self::Build => "build failure",
            Self::TestRun => "test execution failure",
            Self::ResultCheck => "result check failure",
            Self::ReportSend => "report send failure",
            Self::Archive => "archive failure",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub root: PathBuf,
    /// Resolved against `root` when relative.
    pub config_file: PathBuf,
    /// Skip checkout and all builds and test whatever is already built.
    pub no_build: bool,
    pub date: NaiveDate,
    pub tools: Tools,
    pub timeouts: Timeouts,
}

impl RunOptions {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, date: NaiveDate) -> Self {
        Self {
            root: root.into(),
            config_file: PathBuf::from(config::DEFAULT_CONFIG_FILE),
            no_build: false,
            date,
            tools: Tools::default(),
            timeouts: Timeouts::default(),
        }
    }
}

/// Everything a finished run produced.
#[derive(Debug)]
pub struct RunResult {
    pub status: RunStatus,
    pub report: Report,
    pub capture: Option<CaptureSummary>,
    pub compare: Option<CompareSummary>,
}

#[derive(Default)]
struct Steps {
    plan: Option<TestPlan>,
    /// Set from the config even when it fails validation.
    recipient: Option<String>,
    capture: Option<CaptureSummary>,
    compare: Option<CompareSummary>,
}

pub struct Pipeline<S = ImageMagickCompare, M = Sendmail> {
    options: RunOptions,
    layout: Layout,
    similarity: S,
    mail: M,
}

impl Pipeline {
    #[must_use]
    pub fn new(options: RunOptions) -> Self {
        let similarity = ImageMagickCompare::new(&options.tools.compare);
        let mail = Sendmail::new(&options.tools.sendmail);
        Self {
            layout: Layout::new(&options.root),
            options,
            similarity,
            mail,
        }
    }
}

impl<S: SimilarityTool, M: MailTransport> Pipeline<S, M> {
    #[must_use]
    pub fn with_similarity<T: SimilarityTool>(self, similarity: T) -> Pipeline<T, M> {
        Pipeline {
            options: self.options,
            layout: self.layout,
            similarity,
            mail: self.mail,
        }
    }

    #[must_use]
    pub fn with_mail<N: MailTransport>(self, mail: N) -> Pipeline<S, N> {
        Pipeline {
            options: self.options,
            layout: self.layout,
            similarity: self.similarity,
            mail,
        }
    }

    #[must_use]
    pub const fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn run(&self) -> RunResult {
        let mut report = Report::new();
        let mut steps = Steps::default();

        let mut status = self.test_steps(&mut steps, &mut report);
        if status != RunStatus::Success {
            tracing::error!(%status, "regression run stopped early");
        }

        if !mail::send_report(
            &self.mail,
            steps.recipient.as_deref(),
            self.options.date,
            &mut report,
        ) {
            status = RunStatus::ReportSend;
        }

        let archiver = Archiver::new(&self.layout.archive, self.options.date);
        let summary = RunSummary {
            date: self.options.date.to_string(),
            exit_code: status.code(),
            report_errors: report.errors(),
            report_warnings: report.warnings(),
            capture: steps.capture.as_ref(),
            compare: steps.compare.as_ref(),
        };
        if !archiver.archive(&self.layout.current, &summary, &mut report) {
            status = RunStatus::Archive;
        }

        RunResult {
            status,
            report,
            capture: steps.capture,
            compare: steps.compare,
        }
    }

    fn test_steps(&self, steps: &mut Steps, report: &mut Report) -> RunStatus {
        let config_path = self.layout.root.join(&self.options.config_file);
        let plan = match config::load(&config_path, report) {
            Ok(plan) => plan,
            Err(err) => {
                steps.recipient = err.recipient().map(str::to_owned);
                return RunStatus::ConfigLoad;
            }
        };
        steps.recipient.clone_from(&plan.general.send_email);
        let plan = steps.plan.insert(plan);

        if self.options.no_build {
            tracing::info!("skipping checkout and builds");
        } else {
            let builder = Builder::new(&self.layout, &self.options.tools);
            if !builder.checkout(&plan.general.svn_repo, report) {
                return RunStatus::Checkout;
            }
            if !plan.general.test_build_lists_match() {
                report.line(
                    "Config file error for test builds.  Build name list and makefile parameter \
                     list have different lengths.",
                );
            }
            for spec in &plan.general.test_builds {
                builder.build(spec, BuildKind::Test, report);
            }
            if !builder.build(&plan.general.video_build, BuildKind::Video, report) {
                return RunStatus::Build;
            }
        }

        let capture = ScreenshotCapture::new(&self.layout, self.options.timeouts);
        let Some(captured) = capture.run_all(plan, report) else {
            return RunStatus::TestRun;
        };
        steps.capture = Some(captured);

        let comparator = ImageComparator::new(
            &self.layout.reference,
            &self.layout.current,
            &self.similarity,
        );
        match comparator.compare(&VideoPlugin::ALL, report) {
            Ok(compared) => steps.compare = Some(compared),
            Err(err) => {
                report.failure(format!("Error in CheckResults(): {err}"));
                return RunStatus::ResultCheck;
            }
        }

        RunStatus::Success
    }
}
