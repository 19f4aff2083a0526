//! Core library for the ttygrade CLI.
//!
//! This crate provides the machinery for grading interactive console
//! programs:
//! - Grading spec loading from YAML
//! - Child process session management over piped stdio
//! - Cursor-advancing regex matching against the live transcript
//! - Dependency-aware check sequencing and scoring
//! - Score report generation (text summary and JSON document)

pub mod matcher;
pub mod report;
pub mod reporter;
pub mod runner;
pub mod session;
pub mod spec;
pub mod types;

pub use matcher::{Pattern, PatternError, Transcript};
pub use report::{GradeReport, ReportError, ResultDocument, ResultEntry};
pub use reporter::{Reporter, ReporterConfig};
pub use runner::{ProgressEvent, ProgressSender, run_checks, run_grading, skipped_outcomes};
pub use session::{Session, SessionError, Wait};
pub use spec::{Check, GradeSpec, SpecError, SpecOverrides, apply_overrides, load_spec};
pub use types::{CheckStatus, Outcome, ScalePolicy};
