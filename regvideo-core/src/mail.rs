//! Emailing the finished report.

use crate::report::Report;
use chrono::NaiveDate;
use std::{
    io::{self, Write as _},
    path::PathBuf,
    process::{Command, Stdio},
};

const SENDER: &str = "Mupen64Plus-Tester@fascination.homelinux.net";
const REPLY_TO: &str = "do-not-reply@fascination.homelinux.net";

/// Hands a complete message to a mail system.
pub trait MailTransport {
    fn send(&self, message: &str) -> io::Result<()>;
}

impl<T: MailTransport + ?Sized> MailTransport for &T {
    fn send(&self, message: &str) -> io::Result<()> {
        (**self).send(message)
    }
}

/// Pipes the message into `sendmail -t`, which reads recipients from the headers.
#[derive(Debug, Clone)]
pub struct Sendmail {
    program: PathBuf,
}

impl Sendmail {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl MailTransport for Sendmail {
    fn send(&self, message: &str) -> io::Result<()> {
        let mut child = Command::new(&self.program)
            .arg("-t")
            .stdin(Stdio::piped())
            .spawn()?;
        {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| io::Error::other("sendmail stdin unavailable"))?;
            stdin.write_all(message.as_bytes())?;
        }
        let status = child.wait()?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::other(format!("sendmail exited with {status}")))
        }
    }
}

/// Message headers for the daily report.
#[must_use]
pub fn header(recipient: &str, date: NaiveDate) -> String {
    format!(
        "To: {recipient}\n\
         From: {SENDER}\n\
         Subject: {date} Regression Test Results for Mupen64Plus\n\
         Reply-to: {REPLY_TO}\n\
         Content-Type: text/plain; charset=UTF-8\n\
         Content-Transfer-Encoding: 8bit\n\n"
    )
}

/// Sends the report if a recipient is configured.
///
/// Returns `false` only when sending was attempted and failed; the failure and
/// the header that was used are appended to the report.
pub fn send_report(
    transport: &impl MailTransport,
    recipient: Option<&str>,
    date: NaiveDate,
    report: &mut Report,
) -> bool {
    let Some(recipient) = recipient else {
        return true;
    };

    let header = header(recipient, date);
    let message = format!("{header}{report}");
    match transport.send(&message) {
        Ok(()) => {
            tracing::info!(recipient, "report sent");
            true
        }
        Err(err) => {
            report.failure(format!("Exception encountered when calling sendmail: '{err}'"));
            report.line("Email header:");
            report.extend_text(&header);
            false
        }
    }
}
