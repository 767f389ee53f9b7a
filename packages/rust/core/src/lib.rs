//! Generation coordination for Quizsmith.
//!
//! This crate ties together article extraction, quiz synthesis and storage
//! into the end-to-end `generate` workflow.

pub mod pipeline;

pub use pipeline::{Coordinator, ProgressReporter, SilentProgress, Stage};
