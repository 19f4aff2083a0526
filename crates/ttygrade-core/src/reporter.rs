//! Console progress reporter with cargo test-like formatting.

use crate::report::GradeReport;
use crate::types::{CheckStatus, Outcome};
use std::io::{self, Write};
use std::time::Duration;

/// Reporter configuration.
#[derive(Debug, Clone)]
pub struct ReporterConfig {
    /// Show verbose output (per-check detail annotations).
    pub verbose: bool,
    /// Use colors in output.
    pub color: bool,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            color: true,
        }
    }
}

/// Console reporter for grading progress and the final score.
#[derive(Clone)]
pub struct Reporter {
    config: ReporterConfig,
}

impl Reporter {
    /// Create a new reporter with the given configuration.
    #[must_use]
    pub const fn new(config: ReporterConfig) -> Self {
        Self { config }
    }

    /// Print the start of a grading run.
    pub fn run_start(&self, launch: &str, check_count: usize) {
        println!();
        println!("running {check_count} checks against `{launch}`");
    }

    /// Print one check's outcome line.
    pub fn check_result(&self, outcome: &Outcome) {
        let status = match outcome.status {
            CheckStatus::Passed => {
                if self.config.color {
                    "\x1b[32mok\x1b[0m"
                } else {
                    "ok"
                }
            }
            CheckStatus::Failed => {
                if self.config.color {
                    "\x1b[31mFAILED\x1b[0m"
                } else {
                    "FAILED"
                }
            }
            CheckStatus::TimedOut => {
                if self.config.color {
                    "\x1b[31mtimeout\x1b[0m"
                } else {
                    "timeout"
                }
            }
            CheckStatus::Skipped => {
                if self.config.color {
                    "\x1b[33mskipped\x1b[0m"
                } else {
                    "skipped"
                }
            }
        };

        println!(
            "check {} ... {status} ({}/{})",
            outcome.name, outcome.earned, outcome.max
        );

        if self.config.verbose {
            if let Some(detail) = &outcome.detail {
                println!("     ({detail})");
            }
        }
    }

    /// Print the details of every non-passed check.
    pub fn failures(&self, outcomes: &[Outcome]) {
        let has_failures = outcomes.iter().any(|o| o.status != CheckStatus::Passed);
        if !has_failures {
            return;
        }

        println!();
        println!("failures:");
        println!();

        for outcome in outcomes {
            if outcome.status == CheckStatus::Passed {
                continue;
            }
            println!("---- {} ----", outcome.name);
            if let Some(detail) = &outcome.detail {
                println!("    {detail}");
            } else {
                println!("    no matching output within the timeout");
            }
            println!();
        }
    }

    /// Print the final score summary.
    pub fn summary(&self, report: &GradeReport, duration: Duration) {
        let status = if report.is_perfect() {
            if self.config.color {
                "\x1b[32mok\x1b[0m"
            } else {
                "ok"
            }
        } else if self.config.color {
            "\x1b[31mFAILED\x1b[0m"
        } else {
            "FAILED"
        };

        let passed = report
            .outcomes
            .iter()
            .filter(|o| o.status == CheckStatus::Passed)
            .count();
        let failed = report.outcomes.len() - passed;

        println!();
        println!(
            "grade result: {}. {} passed; {} failed; score {}/{}; finished in {:.1}s",
            status,
            passed,
            failed,
            report.score,
            report.denominator,
            duration.as_secs_f64()
        );
    }

    /// Print a warning message.
    pub fn warn(&self, message: &str) {
        if self.config.color {
            eprintln!("\x1b[33mwarning\x1b[0m: {message}");
        } else {
            eprintln!("warning: {message}");
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        if self.config.color {
            eprintln!("\x1b[31merror\x1b[0m: {message}");
        } else {
            eprintln!("error: {message}");
        }
    }

    /// Flush stdout.
    pub fn flush(&self) {
        let _ = io::stdout().flush();
    }
}
