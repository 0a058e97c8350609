//! Human-readable run report.
//!
//! Every component appends to a single [`Report`] owned by the pipeline. Lines
//! keep their call order and are mirrored to `tracing` so an operator watching
//! the log sees the same story the email recipient will read.

use core::fmt;

const HEADER: &str = "Mupen64Plus Regression Test report\n----------------------------------";

/// Append-only buffer of report lines.
#[derive(Debug, Clone)]
pub struct Report {
    lines: Vec<String>,
}

impl Default for Report {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Report {
    /// Creates a report seeded with the fixed header.
    #[must_use]
    pub fn new() -> Self {
        Self {
            lines: HEADER.lines().map(String::from).collect(),
        }
    }

    /// Appends a plain status line.
    pub fn line(&mut self, text: impl Into<String>) {
        let text = text.into();
        if !text.trim().is_empty() {
            tracing::info!("{}", text.trim());
        }
        self.lines.push(text);
    }

    /// Appends an empty separator line.
    pub fn blank(&mut self) {
        self.lines.push(String::new());
    }

    /// Appends an indented `Warning:` line.
    pub fn warning(&mut self, text: impl fmt::Display) {
        tracing::warn!("{text}");
        self.lines.push(format!("    Warning: {text}"));
    }

    /// Appends an indented `Error:` line.
    pub fn error(&mut self, text: impl fmt::Display) {
        tracing::error!("{text}");
        self.lines.push(format!("    Error: {text}"));
    }

    /// Appends a line verbatim without a severity prefix but logged as an error.
    ///
    /// Used for tool output and failures whose wording is fixed by the step
    /// that produced them.
    pub fn failure(&mut self, text: impl Into<String>) {
        let text = text.into();
        tracing::error!("{}", text.trim());
        self.lines.push(text);
    }

    /// Appends a block of text, one report line per input line.
    pub fn extend_text(&mut self, text: &str) {
        self.lines.extend(text.lines().map(String::from));
    }

    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Number of lines containing `needle`.
    #[must_use]
    pub fn count_containing(&self, needle: &str) -> usize {
        self.lines.iter().filter(|line| line.contains(needle)).count()
    }

    #[must_use]
    pub fn warnings(&self) -> usize {
        self.count_containing("Warning:")
    }

    #[must_use]
    pub fn errors(&self) -> usize {
        self.lines
            .iter()
            .filter(|line| line.contains("Error:") || line.contains("Error in "))
            .count()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_comes_first() {
        let report = Report::new();
        assert_eq!(report.lines()[0], "Mupen64Plus Regression Test report");
        assert!(report.lines()[1].chars().all(|c| c == '-'));
    }

    #[test]
    fn lines_keep_call_order() {
        let mut report = Report::new();
        report.line("first");
        report.warning("second");
        report.error("third");
        report.line("first");

        let tail: Vec<&str> = report.lines()[2..].iter().map(String::as_str).collect();
        assert_eq!(
            tail,
            [
                "first",
                "    Warning: second",
                "    Error: third",
                "first"
            ]
        );
        assert_eq!(report.warnings(), 1);
        assert_eq!(report.errors(), 1);
    }

    #[test]
    fn error_lines_are_counted_once() {
        let mut report = Report::new();
        report.failure("Error in CheckResults(): Error: disk full");
        report.error("missing");
        assert_eq!(report.errors(), 2);
    }

    #[test]
    fn display_ends_every_line_with_newline() {
        let mut report = Report::new();
        report.blank();
        report.line("done");
        let text = report.to_string();
        assert!(text.ends_with("\n\ndone\n"));
    }
}
