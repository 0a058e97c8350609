//! A child process watched by a worker thread.
//!
//! The worker polls the child and sends its exit status over a channel, so
//! the caller can block with a deadline. Only the owner of the [`ProcessTask`]
//! can kill the child; the worker just notices the exit and finishes.

use core::{fmt, time::Duration};
use std::{
    ffi::OsStr,
    io,
    process::{Child, Command, ExitStatus, Stdio},
    sync::{
        Arc, Mutex,
        mpsc::{self, Receiver, RecvTimeoutError},
    },
    thread::JoinHandle,
};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug)]
pub enum Error {
    Spawn(io::Error),
    Wait(io::Error),
    Kill(io::Error),
    ThreadSpawn(io::Error),
    ThreadJoin,
    /// The worker went away without reporting an exit status.
    Disconnected,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn(err) => write!(f, "cannot start process: {err}"),
            Self::Wait(err) => write!(f, "cannot wait for process: {err}"),
            Self::Kill(err) => write!(f, "cannot kill process: {err}"),
            Self::ThreadSpawn(err) => write!(f, "cannot start worker thread: {err}"),
            Self::ThreadJoin => write!(f, "worker thread panicked"),
            Self::Disconnected => write!(f, "worker thread disconnected"),
        }
    }
}

impl std::error::Error for Error {}

/// How a wait on a task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Exited(ExitStatus),
    TimedOut,
}

pub struct ProcessTask {
    child: Arc<Mutex<Child>>,
    pid: u32,
    status_rx: Receiver<io::Result<ExitStatus>>,
    status: Option<ExitStatus>,
    worker: Option<JoinHandle<()>>,
}

impl ProcessTask {
    /// Spawns `program` with `args` and starts watching it.
    pub fn start<I, S>(program: impl AsRef<OsStr>, args: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .spawn()
            .map_err(Error::Spawn)?;
        let pid = child.id();
        let child = Arc::new(Mutex::new(child));

        let (status_tx, status_rx) = mpsc::channel();
        let watched = Arc::clone(&child);
        let worker = std::thread::Builder::new()
            .name(format!("test-run-{pid}"))
            .spawn(move || {
                let status = loop {
                    let polled = match watched.lock() {
                        Ok(mut child) => child.try_wait(),
                        Err(_poisoned) => break Err(io::Error::other("child lock poisoned")),
                    };
                    match polled {
                        Ok(Some(status)) => break Ok(status),
                        Ok(None) => std::thread::sleep(POLL_INTERVAL),
                        Err(err) => break Err(err),
                    }
                };
                // The receiver may already be gone if the owner gave up.
                status_tx.send(status).ok();
            });

        let worker = match worker {
            Ok(worker) => worker,
            Err(err) => {
                if let Ok(mut child) = child.lock() {
                    child.kill().ok();
                    child.wait().ok();
                }
                return Err(Error::ThreadSpawn(err));
            }
        };

        tracing::debug!(pid, "test process started");
        Ok(Self {
            child,
            pid,
            status_rx,
            status: None,
            worker: Some(worker),
        })
    }

    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Blocks until the process exits or `timeout` elapses.
    pub fn wait(&mut self, timeout: Duration) -> Result<Completion, Error> {
        if let Some(status) = self.status {
            return Ok(Completion::Exited(status));
        }
        match self.status_rx.recv_timeout(timeout) {
            Ok(Ok(status)) => {
                self.status = Some(status);
                self.join()?;
                Ok(Completion::Exited(status))
            }
            Ok(Err(err)) => {
                self.join()?;
                Err(Error::Wait(err))
            }
            Err(RecvTimeoutError::Timeout) => Ok(Completion::TimedOut),
            Err(RecvTimeoutError::Disconnected) => {
                self.join()?;
                Err(Error::Disconnected)
            }
        }
    }

    /// Kills the process with a signal it cannot catch.
    pub fn force_stop(&mut self) -> Result<(), Error> {
        if self.status.is_some() {
            return Ok(());
        }
        tracing::debug!(pid = self.pid, "killing test process");
        let mut child = self
            .child
            .lock()
            .map_err(|_poisoned| Error::Kill(io::Error::other("child lock poisoned")))?;
        match child.kill() {
            Ok(()) => Ok(()),
            // Already exited and reaped by the worker.
            Err(err) if err.kind() == io::ErrorKind::InvalidInput => Ok(()),
            Err(err) => Err(Error::Kill(err)),
        }
    }

    fn join(&mut self) -> Result<(), Error> {
        match self.worker.take() {
            Some(worker) => worker.join().map_err(|_panic| Error::ThreadJoin),
            None => Ok(()),
        }
    }
}

impl Drop for ProcessTask {
    fn drop(&mut self) {
        if self.status.is_none()
            && let Ok(mut child) = self.child.lock()
        {
            // Never leave an emulator running behind the next invocation. The
            // worker, if still alive, reaps it.
            if matches!(child.try_wait(), Ok(None)) {
                child.kill().ok();
            }
        }
    }
}
