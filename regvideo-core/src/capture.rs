//! Runs the emulator once per game and video plugin to take screenshots.

use crate::{
    config::{GameConfig, ShotList, TestPlan},
    layout::{self, Layout},
    plugin::{AUDIO_PLUGIN, EMULATOR_BIN, INPUT_PLUGIN, RSP_PLUGIN, VideoPlugin},
    report::Report,
    task::{Completion, ProcessTask},
    tools::Timeouts,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// One emulator run: a game, a video plugin and the frames to capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub rom: String,
    pub plugin: VideoPlugin,
    pub frames: Vec<u32>,
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl Invocation {
    #[must_use]
    pub fn new(layout: &Layout, rom_path: &Path, rom: &str, plugin: VideoPlugin, frames: &[u32]) -> Self {
        let libs = layout.plugins_dir();
        let path = |p: PathBuf| p.display().to_string();
        let frame_list = frames
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",");

        let mut args: Vec<String> = ["--nogui", "--noosd", "--noask", "--emumode", "1"]
            .into_iter()
            .map(String::from)
            .collect();
        args.extend(["--testshots".to_owned(), frame_list]);
        args.extend(["--installdir".to_owned(), layout.source.display().to_string()]);
        args.extend(["--sshotdir".to_owned(), path(layout.current_dir(plugin))]);
        if layout.config.exists() {
            args.extend(["--configdir".to_owned(), layout.config.display().to_string()]);
        }
        args.extend(["--gfx".to_owned(), path(libs.join(plugin.file_name()))]);
        args.extend(["--audio".to_owned(), path(libs.join(AUDIO_PLUGIN))]);
        args.extend(["--input".to_owned(), path(libs.join(INPUT_PLUGIN))]);
        args.extend(["--rsp".to_owned(), path(libs.join(RSP_PLUGIN))]);
        args.push(path(rom_path.join(rom)));

        Self {
            rom: rom.to_owned(),
            plugin,
            frames: frames.to_vec(),
            program: layout.source.join(EMULATOR_BIN),
            args,
        }
    }
}

/// How one invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The emulator exited on its own, with this exit code if it had one.
    Exited(Option<i32>),
    /// The emulator was killed after the run timeout.
    TimedOut,
    /// The emulator could not be started or watched.
    Failed,
}

/// Counters for the run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CaptureSummary {
    pub games: usize,
    pub skipped_games: usize,
    pub invocations: usize,
    pub timeouts: usize,
    pub failures: usize,
}

pub struct ScreenshotCapture<'a> {
    layout: &'a Layout,
    timeouts: Timeouts,
}

impl<'a> ScreenshotCapture<'a> {
    #[must_use]
    pub const fn new(layout: &'a Layout, timeouts: Timeouts) -> Self {
        Self { layout, timeouts }
    }

    /// Invocations for one game, honoring its frame list and skip list.
    ///
    /// A game without a usable frame list gets a warning and no invocations.
    pub fn invocations(&self, game: &GameConfig, rom_path: &Path, report: &mut Report) -> Vec<Invocation> {
        let frames = match &game.shots {
            ShotList::Missing => {
                report.warning(format_args!("no screenshots taken for game '{}'", game.rom));
                return Vec::new();
            }
            shots => match shots.usable_frames() {
                Some(frames) => frames,
                None => {
                    report.warning(format_args!("invalid screenshot list for game '{}'", game.rom));
                    return Vec::new();
                }
            },
        };

        VideoPlugin::ALL
            .into_iter()
            .filter(|plugin| {
                let skipped = plugin.is_skipped_by(&game.skip_video);
                if skipped {
                    tracing::debug!(rom = %game.rom, %plugin, "plugin skipped");
                }
                !skipped
            })
            .map(|plugin| Invocation::new(self.layout, rom_path, &game.rom, plugin, frames))
            .collect()
    }

    /// Runs one invocation to completion, killing it if it overstays the timeout.
    ///
    /// Returns only after the worker watching the process is done with it.
    pub fn run(&self, invocation: &Invocation, report: &mut Report) -> RunOutcome {
        tracing::debug!(program = %invocation.program.display(), args = ?invocation.args, "starting test run");
        let mut task = match ProcessTask::start(&invocation.program, &invocation.args) {
            Ok(task) => task,
            Err(err) => {
                report.error(format_args!(
                    "Test run for '{}' with {} failed: {err}",
                    invocation.rom, invocation.plugin
                ));
                return RunOutcome::Failed;
            }
        };

        match task.wait(self.timeouts.run) {
            Ok(Completion::Exited(status)) => RunOutcome::Exited(status.code()),
            Ok(Completion::TimedOut) => {
                report.error(format_args!(
                    "Test run timed out after {} seconds:  '{}'",
                    self.timeouts.run.as_secs(),
                    invocation.args.join(" ")
                ));
                if let Err(err) = task.force_stop() {
                    report.error(format_args!("could not stop test process {}: {err}", task.pid()));
                }
                match task.wait(self.timeouts.grace) {
                    Ok(Completion::Exited(_)) => {}
                    Ok(Completion::TimedOut) => tracing::warn!(
                        pid = task.pid(),
                        "test process still alive after grace period"
                    ),
                    Err(err) => tracing::warn!(pid = task.pid(), %err, "waiting for killed process failed"),
                }
                RunOutcome::TimedOut
            }
            Err(err) => {
                report.error(format_args!(
                    "Test run for '{}' with {} failed: {err}",
                    invocation.rom, invocation.plugin
                ));
                RunOutcome::Failed
            }
        }
    }

    /// Runs every configured game against every video plugin, one at a time.
    ///
    /// Returns `None` when the run cannot start at all: the ROM directory is
    /// missing or the screenshot tree cannot be reset.
    pub fn run_all(&self, plan: &TestPlan, report: &mut Report) -> Option<CaptureSummary> {
        let rom_path = &plan.general.rom_path;
        if !rom_path.is_dir() {
            report.error(format_args!(
                "ROM directory '{}' does not exist!",
                rom_path.display()
            ));
            return None;
        }

        if !layout::remove_tree(&self.layout.current, report) {
            return None;
        }
        for plugin in VideoPlugin::ALL {
            if let Err(err) = std::fs::create_dir_all(self.layout.current_dir(plugin)) {
                report.failure(format!("Error creating screenshot directory: {err}"));
                return None;
            }
        }

        report.blank();
        report.line(format!("Running regression tests on {} games.", plan.games.len()));

        let mut summary = CaptureSummary {
            games: plan.games.len(),
            ..CaptureSummary::default()
        };
        for game in &plan.games {
            let invocations = self.invocations(game, rom_path, report);
            if invocations.is_empty() && game.shots.usable_frames().is_none() {
                summary.skipped_games += 1;
            }
            for invocation in &invocations {
                summary.invocations += 1;
                match self.run(invocation, report) {
                    RunOutcome::Exited(_) => {}
                    RunOutcome::TimedOut => summary.timeouts += 1,
                    RunOutcome::Failed => summary.failures += 1,
                }
            }
        }

        Some(summary)
    }
}
