//! Video plugin regression testing for Mupen64Plus.
//!
//! A run loads the test config, checks out and builds the emulator, captures
//! screenshots of every configured game with every video plugin, compares
//! them against a reference set with a PSNR metric and mails and archives a
//! plain-text report. See [`pipeline::Pipeline`] for the entry point.

pub mod archive;
pub mod builder;
pub mod capture;
pub mod compare;
pub mod config;
pub mod layout;
pub mod mail;
pub mod pipeline;
pub mod plugin;
pub mod report;
pub mod task;
pub mod tools;

pub use layout::Layout;
pub use pipeline::{Pipeline, RunOptions, RunResult, RunStatus};
pub use plugin::VideoPlugin;
pub use report::Report;
pub use tools::{Timeouts, Tools};
