//! Core data types for ttygrade.

use serde::{Deserialize, Serialize};

/// Terminal state of one check attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Passed,
    Failed,
    TimedOut,
    Skipped,
}

impl CheckStatus {
    /// Short label used in summary lines.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Passed => "OK",
            Self::Failed | Self::TimedOut | Self::Skipped => "FAIL",
        }
    }
}

/// Recorded result of attempting one check. Created exactly once per check,
/// in sequence order, and never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub name: String,
    pub status: CheckStatus,
    /// Points earned: the check's full value on pass, zero otherwise.
    pub earned: u32,
    /// The check's maximum value. Counts toward the rubric total regardless
    /// of whether the check was attempted.
    pub max: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Outcome {
    #[must_use]
    pub fn passed(name: &str, max: u32) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Passed,
            earned: max,
            max,
            detail: None,
        }
    }

    #[must_use]
    pub fn failed(name: &str, max: u32, detail: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Failed,
            earned: 0,
            max,
            detail: Some(detail.to_string()),
        }
    }

    #[must_use]
    pub fn timed_out(name: &str, max: u32) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::TimedOut,
            earned: 0,
            max,
            detail: None,
        }
    }

    #[must_use]
    pub fn skipped(name: &str, max: u32, detail: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Skipped,
            earned: 0,
            max,
            detail: Some(detail.to_string()),
        }
    }

    /// Attach a non-fatal annotation (prompt resync failure and the like).
    pub fn annotate(&mut self, note: &str) {
        match &mut self.detail {
            Some(d) => {
                d.push_str("; ");
                d.push_str(note);
            }
            None => self.detail = Some(note.to_string()),
        }
    }
}

/// How the final score is presented.
///
/// `Raw` reports `earned/total` against the rubric. `ClampTo(n)` caps the
/// earned score at `n` and reports it against the fixed denominator `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScalePolicy {
    #[default]
    Raw,
    ClampTo(u32),
}

impl<'de> Deserialize<'de> for ScalePolicy {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Word(String),
            Denominator(u32),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Word(w) if w == "raw" => Ok(Self::Raw),
            Repr::Word(w) => Err(serde::de::Error::custom(format!(
                "unknown scale '{w}': expected 'raw' or a number"
            ))),
            Repr::Denominator(n) => Ok(Self::ClampTo(n)),
        }
    }
}
