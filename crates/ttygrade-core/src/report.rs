//! Grade report reduction and persistence.
//!
//! The report is derived from the outcome list in one pass at the end of the
//! run; nothing is persisted mid-run. Write failures are surfaced to the
//! caller: a grade that cannot be recorded must be a visible error, never a
//! silent zero.

use crate::types::{CheckStatus, Outcome, ScalePolicy};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;
use time::OffsetDateTime;
use time::macros::format_description;

/// Errors from report persistence.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("failed to write report to {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Final grade derived from the outcome list.
#[derive(Debug, Clone, Serialize)]
pub struct GradeReport {
    pub outcomes: Vec<Outcome>,
    /// Points earned across passed checks.
    pub earned: u32,
    /// Maximum attainable points across all checks, attempted or not.
    pub total: u32,
    /// Presented score after the scale policy.
    pub score: u32,
    /// Denominator the score is presented against.
    pub denominator: u32,
}

impl GradeReport {
    /// Reduce an outcome list into a report under the given scale policy.
    #[must_use]
    pub fn from_outcomes(outcomes: Vec<Outcome>, scale: ScalePolicy) -> Self {
        let earned: u32 = outcomes
            .iter()
            .filter(|o| o.status == CheckStatus::Passed)
            .map(|o| o.earned)
            .sum();
        let total = outcomes.iter().map(|o| o.max).sum();

        let (score, denominator) = match scale {
            ScalePolicy::Raw => (earned, total),
            ScalePolicy::ClampTo(n) => (earned.min(n), n),
        };

        Self {
            outcomes,
            earned,
            total,
            score,
            denominator,
        }
    }

    /// Whether the presented score is the maximum attainable. Drives the
    /// process exit status when grading is used as a pipeline gate.
    #[must_use]
    pub const fn is_perfect(&self) -> bool {
        self.score == self.denominator
    }

    /// Human-readable summary: one line per check plus a trailing total.
    #[must_use]
    pub fn format_summary(&self) -> String {
        let mut out = String::new();
        for o in &self.outcomes {
            out.push_str(&format!(
                "{}: {}/{} ({})\n",
                o.name,
                o.earned,
                o.max,
                o.status.label()
            ));
        }
        out.push_str(&format!("\nTOTAL: {}/{}\n", self.score, self.denominator));
        out
    }

    /// Write the text summary.
    ///
    /// # Errors
    /// Returns `ReportError::Write` if the file cannot be written.
    pub fn write_summary<P: AsRef<Path>>(&self, path: P) -> Result<(), ReportError> {
        std::fs::write(path.as_ref(), self.format_summary()).map_err(|source| {
            ReportError::Write {
                path: path.as_ref().display().to_string(),
                source,
            }
        })
    }

    /// Build the machine-readable result document.
    #[must_use]
    pub fn to_document(&self) -> ResultDocument {
        ResultDocument {
            timestamp: timestamp_utc(),
            tests: self
                .outcomes
                .iter()
                .map(|o| ResultEntry {
                    name: o.name.clone(),
                    score: o.earned,
                    max_score: o.max,
                    status: o.status,
                })
                .collect(),
            score: self.score,
            max_score: self.denominator,
        }
    }

    /// Write the machine-readable result document as pretty JSON.
    ///
    /// # Errors
    /// Returns `ReportError` if serialization or the write fails.
    pub fn write_document<P: AsRef<Path>>(&self, path: P) -> Result<(), ReportError> {
        let json = serde_json::to_string_pretty(&self.to_document())?;
        std::fs::write(path.as_ref(), json).map_err(|source| ReportError::Write {
            path: path.as_ref().display().to_string(),
            source,
        })
    }
}

/// Machine-readable result document (`--emit` output).
#[derive(Debug, Clone, Serialize)]
pub struct ResultDocument {
    pub timestamp: String,
    pub tests: Vec<ResultEntry>,
    pub score: u32,
    pub max_score: u32,
}

/// One check in the result document.
#[derive(Debug, Clone, Serialize)]
pub struct ResultEntry {
    pub name: String,
    pub score: u32,
    pub max_score: u32,
    pub status: CheckStatus,
}

fn timestamp_utc() -> String {
    OffsetDateTime::now_utc()
        .format(&format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second]Z"
        ))
        .unwrap_or_else(|_| "unknown".to_string())
}
