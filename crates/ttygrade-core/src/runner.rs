//! Check sequencing and scoring.
//!
//! Walks the ordered check list, driving the session, and records exactly
//! one outcome per check in order. Failures short of a spawn error are local
//! to one check; the sequence always runs to completion (or to an expected
//! early termination) so partial credit reflects every independent check.

use crate::session::{Session, SessionError, Wait};
use crate::spec::{Check, GradeSpec};
use crate::types::{CheckStatus, Outcome};
use std::io::Write;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Progress events emitted while grading.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// The session launched and grading is starting.
    SessionStarted { check_count: usize },
    /// A check is being attempted.
    CheckStarted { name: String },
    /// A check's outcome was recorded.
    CheckCompleted { outcome: Outcome },
}

/// Sender for progress events.
pub type ProgressSender = mpsc::UnboundedSender<ProgressEvent>;

/// Run a full grading session: spawn, sequence every check, terminate.
///
/// The child and reader tasks are torn down on every path out of the check
/// sequence. On success the outcome list always contains one entry per
/// check, in spec order.
///
/// # Errors
/// Returns `SessionError::Spawn` if the launch command cannot be started;
/// the caller reports that as a zero score. No other failure aborts the run.
pub async fn run_grading(
    spec: &GradeSpec,
    sink: Option<Box<dyn Write + Send>>,
    progress: Option<&ProgressSender>,
) -> Result<Vec<Outcome>, SessionError> {
    let mut session = Session::spawn(&spec.launch, sink)?;
    if let Some(tx) = progress {
        let _ = tx.send(ProgressEvent::SessionStarted {
            check_count: spec.check_count(),
        });
    }
    let outcomes = run_checks(&mut session, spec, progress).await;
    session.shutdown().await;
    Ok(outcomes)
}

/// One outcome per check (pre-boot checks first), for when the session never
/// started or could not be graded at all.
#[must_use]
pub fn skipped_outcomes(spec: &GradeSpec, detail: &str) -> Vec<Outcome> {
    spec.pre_boot
        .iter()
        .chain(&spec.checks)
        .map(|c| Outcome::skipped(&c.name, c.points, detail))
        .collect()
}

/// Sequence every check against a live session.
///
/// The overall wall-clock budget is the spec's global timeout; per-check
/// waits are capped at the remaining budget, and once it is exhausted the
/// rest of the checks are recorded as skipped.
pub async fn run_checks(
    session: &mut Session,
    spec: &GradeSpec,
    progress: Option<&ProgressSender>,
) -> Vec<Outcome> {
    let deadline = Instant::now() + spec.default_timeout;
    let mut outcomes: Vec<Outcome> = Vec::with_capacity(spec.check_count());
    // Set once an expected termination check passes; everything after is
    // skipped without touching the session.
    let mut session_ended = false;

    for check in spec.pre_boot.iter().chain(&spec.checks) {
        if let Some(tx) = progress {
            let _ = tx.send(ProgressEvent::CheckStarted {
                name: check.name.clone(),
            });
        }

        let outcome = if session_ended {
            Outcome::skipped(&check.name, check.points, "session ended by earlier check")
        } else if let Some(blocker) = failed_prerequisite(check, &outcomes) {
            Outcome::skipped(
                &check.name,
                check.points,
                &format!("prerequisite '{blocker}' did not pass"),
            )
        } else {
            match remaining(deadline) {
                None => Outcome::skipped(&check.name, check.points, "time budget exhausted"),
                Some(budget) => {
                    let mut outcome = attempt(session, spec, check, budget).await;
                    if outcome.status == CheckStatus::Passed {
                        if check.expect_exit {
                            session_ended = true;
                        } else if check.input.is_some() {
                            resync(session, spec, deadline, &mut outcome).await;
                        }
                    }
                    outcome
                }
            }
        };

        if let Some(tx) = progress {
            let _ = tx.send(ProgressEvent::CheckCompleted {
                outcome: outcome.clone(),
            });
        }
        outcomes.push(outcome);
    }

    outcomes
}

/// The name of the dependency check if it did not pass.
fn failed_prerequisite<'a>(check: &Check, outcomes: &'a [Outcome]) -> Option<&'a str> {
    let dep = check.depends_on?;
    let prior = outcomes.get(dep)?;
    if prior.status == CheckStatus::Passed {
        None
    } else {
        Some(&prior.name)
    }
}

async fn attempt(
    session: &mut Session,
    spec: &GradeSpec,
    check: &Check,
    budget: Duration,
) -> Outcome {
    if let Some(input) = &check.input {
        if let Err(e) = session.send(input).await {
            // Writes fail once the child is gone. A shutdown check that
            // already observed the exit still passes.
            if check.expect_exit && session.exit_observed() {
                return Outcome::passed(&check.name, check.points);
            }
            return Outcome::failed(
                &check.name,
                check.points,
                &format!("could not send input: {e}"),
            );
        }
    }

    let timeout = check.timeout.unwrap_or(spec.default_timeout).min(budget);

    if check.expect_exit {
        return match session.await_exit(timeout).await {
            Wait::Exited => Outcome::passed(&check.name, check.points),
            Wait::TimedOut | Wait::Matched(_) => Outcome::timed_out(&check.name, check.points),
        };
    }

    let Some(pattern) = &check.pattern else {
        // Spec validation guarantees a pattern on non-exit checks.
        return Outcome::failed(&check.name, check.points, "check has no pattern");
    };

    match session.expect(pattern, timeout).await {
        Wait::Matched(_) => Outcome::passed(&check.name, check.points),
        Wait::TimedOut => Outcome::timed_out(&check.name, check.points),
        Wait::Exited => Outcome::failed(
            &check.name,
            check.points,
            "process exited before pattern matched",
        ),
    }
}

/// Best-effort realignment to the idle prompt after a passed command check.
/// Never revokes points; failure is only annotated, and the wait is bounded
/// by both the resync timeout and the remaining session budget.
async fn resync(
    session: &mut Session,
    spec: &GradeSpec,
    deadline: Instant,
    outcome: &mut Outcome,
) {
    let Some(budget) = remaining(deadline) else {
        outcome.annotate("no time left to resync prompt");
        return;
    };
    match session
        .expect(&spec.prompt, spec.resync_timeout.min(budget))
        .await
    {
        Wait::Matched(_) => {}
        Wait::TimedOut => outcome.annotate("prompt not observed after match"),
        Wait::Exited => outcome.annotate("process exited after match"),
    }
}

fn remaining(deadline: Instant) -> Option<Duration> {
    let left = deadline.checked_duration_since(Instant::now())?;
    if left.is_zero() { None } else { Some(left) }
}
