//! External programs and time limits used by a run.

use core::time::Duration;
use std::{
    io,
    path::PathBuf,
    process::{Command, Output},
};

/// Locations of the external tools the pipeline shells out to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tools {
    pub svn: PathBuf,
    pub make: PathBuf,
    /// ImageMagick `compare`.
    pub compare: PathBuf,
    pub sendmail: PathBuf,
}

impl Default for Tools {
    #[inline]
    fn default() -> Self {
        Self {
            svn: PathBuf::from("svn"),
            make: PathBuf::from("make"),
            compare: PathBuf::from("/usr/bin/compare"),
            sendmail: PathBuf::from("/usr/sbin/sendmail"),
        }
    }
}

/// Time limits for a single emulator invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// How long a test run may take before it is killed.
    pub run: Duration,
    /// How long to wait for a killed run to go away.
    pub grace: Duration,
}

impl Default for Timeouts {
    #[inline]
    fn default() -> Self {
        Self {
            run: Duration::from_secs(60),
            grace: Duration::from_secs(10),
        }
    }
}

/// Captured streams of a finished tool run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Stdout followed by stderr.
    pub fn combined(&self) -> String {
        let mut text = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&self.stderr);
        }
        text
    }
}

/// Last line of `text` that is not blank, or `""`.
pub(crate) fn last_line(text: &str) -> &str {
    text.lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or_default()
}

/// Runs `cmd` to completion and captures both streams as text.
pub(crate) fn run_tool(cmd: &mut Command) -> io::Result<ToolOutput> {
    tracing::debug!(?cmd, "running");
    let Output { stdout, stderr, .. } = cmd.output()?;
    Ok(ToolOutput {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits() {
        let timeouts = Timeouts::default();
        assert_eq!(timeouts.run, Duration::from_secs(60));
        assert_eq!(timeouts.grace, Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn streams_are_kept_apart() -> io::Result<()> {
        let output = run_tool(Command::new("sh").args(["-c", "echo err >&2; printf out"]))?;
        assert_eq!(output.stdout, "out");
        assert_eq!(output.stderr, "err\n");
        assert_eq!(output.combined(), "out\nerr\n");
        Ok(())
    }

    #[test]
    fn last_line_skips_blank_lines() {
        assert_eq!(last_line("A  x\nChecked out revision 7.\n\n  \n"), "Checked out revision 7.");
        assert_eq!(last_line(""), "");
    }
}
