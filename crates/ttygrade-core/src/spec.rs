//! Grading spec loading and validation.
//!
//! The spec is a YAML document naming the launch command, the idle prompt,
//! optional pre-boot expectations, and the ordered list of scored checks.
//! Regexes are compiled and dependencies resolved up front so grading never
//! hits a malformed spec mid-session.

use crate::matcher::{Pattern, PatternError};
use crate::types::ScalePolicy;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors from spec loading and validation.
#[derive(Error, Debug)]
pub enum SpecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yml::Error),
    #[error(transparent)]
    Pattern(#[from] PatternError),
    #[error("check name cannot be empty")]
    EmptyName,
    #[error("duplicate check name '{0}'")]
    DuplicateName(String),
    #[error("check '{0}' needs exactly one of ok_regex or expect_exit")]
    PatternOrExit(String),
    #[error("pre-boot check '{0}' cannot have cmd or expect_exit")]
    PreBootWithInput(String),
    #[error("check '{check}' depends on unknown or later check '{target}'")]
    UnknownDependency { check: String, target: String },
    #[error("timeout for '{0}' must be a finite positive number of seconds")]
    InvalidTimeout(String),
    #[error("spec has no checks")]
    NoChecks,
}

const fn default_points() -> u32 {
    5
}

fn default_prompt() -> String {
    r"\$ ".to_string()
}

const fn default_timeout() -> f64 {
    90.0
}

const fn default_resync() -> f64 {
    5.0
}

/// One check as written in the YAML spec.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawCheck {
    pub name: String,
    /// Input line sent before waiting (pre-boot checks have none).
    #[serde(default)]
    pub cmd: Option<String>,
    /// Expected output pattern. Required unless `expect_exit`.
    #[serde(default)]
    pub ok_regex: Option<String>,
    #[serde(default = "default_points")]
    pub points: u32,
    /// Per-check timeout in seconds; defaults to the global timeout.
    #[serde(default)]
    pub timeout: Option<f64>,
    /// Name of an earlier check that must have passed first.
    #[serde(default)]
    pub depends_on: Option<String>,
    /// The check passes when the child terminates instead of printing.
    #[serde(default)]
    pub expect_exit: bool,
}

/// The grading spec document as written in YAML.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawSpec {
    /// Launch command, run through `/bin/sh -c`.
    pub launch: String,
    /// Idle prompt regex, used for the boot wait and post-check resync.
    #[serde(default = "default_prompt")]
    pub prompt: String,
    /// Global default per-check timeout and overall session budget (seconds).
    #[serde(default = "default_timeout")]
    pub timeout: f64,
    /// Bounded secondary wait for the prompt after a passed check (seconds).
    #[serde(default = "default_resync")]
    pub resync_timeout: f64,
    #[serde(default)]
    pub scale: ScalePolicy,
    /// Expectations matched against boot output before any input is sent.
    #[serde(default)]
    pub pre_boot: Vec<RawCheck>,
    pub checks: Vec<RawCheck>,
}

/// A validated, compiled check.
#[derive(Debug, Clone)]
pub struct Check {
    pub name: String,
    pub input: Option<String>,
    pub pattern: Option<Pattern>,
    pub points: u32,
    /// Explicit per-check timeout; `None` falls back to the spec's global
    /// default at run time (so CLI overrides apply).
    pub timeout: Option<Duration>,
    /// Index into the combined outcome sequence (pre-boot checks first).
    pub depends_on: Option<usize>,
    pub expect_exit: bool,
}

/// A validated grading spec, ready to run.
#[derive(Debug, Clone)]
pub struct GradeSpec {
    pub launch: String,
    pub prompt: Pattern,
    pub default_timeout: Duration,
    pub resync_timeout: Duration,
    pub scale: ScalePolicy,
    pub pre_boot: Vec<Check>,
    pub checks: Vec<Check>,
}

impl GradeSpec {
    /// Parse and validate a spec from YAML text.
    ///
    /// # Errors
    /// Returns an error on parse failure, invalid regexes, duplicate or
    /// empty names, unresolved dependencies, or non-positive timeouts.
    pub fn from_yaml(yaml: &str) -> Result<Self, SpecError> {
        let raw: RawSpec = serde_yml::from_str(yaml)?;
        compile(raw)
    }

    /// Maximum attainable points across every check, attempted or not.
    #[must_use]
    pub fn total_points(&self) -> u32 {
        self.pre_boot
            .iter()
            .chain(&self.checks)
            .map(|c| c.points)
            .sum()
    }

    /// Number of outcomes a full run records.
    #[must_use]
    pub fn check_count(&self) -> usize {
        self.pre_boot.len() + self.checks.len()
    }
}

/// Load a grading spec from a YAML file.
///
/// # Errors
/// Returns an error if the file cannot be read or fails validation.
pub fn load_spec<P: AsRef<Path>>(path: P) -> Result<GradeSpec, SpecError> {
    let content = std::fs::read_to_string(path)?;
    GradeSpec::from_yaml(&content)
}

/// CLI override options for the spec.
#[derive(Debug, Clone, Default)]
pub struct SpecOverrides {
    pub launch: Option<String>,
    pub timeout: Option<f64>,
}

/// Apply CLI overrides to a loaded spec.
#[must_use]
pub fn apply_overrides(mut spec: GradeSpec, overrides: &SpecOverrides) -> GradeSpec {
    if let Some(ref launch) = overrides.launch {
        spec.launch.clone_from(launch);
    }
    // Out-of-range override values are ignored rather than crashing the run.
    if let Some(timeout) = overrides.timeout.and_then(positive_secs) {
        spec.default_timeout = timeout;
    }
    spec
}

/// Convert seconds to a `Duration`, rejecting NaN, infinities, zero,
/// negatives, and values too large for a `Duration`.
fn positive_secs(secs: f64) -> Option<Duration> {
    if secs.is_finite() && secs > 0.0 {
        Duration::try_from_secs_f64(secs).ok()
    } else {
        None
    }
}

fn compile(raw: RawSpec) -> Result<GradeSpec, SpecError> {
    if raw.checks.is_empty() {
        return Err(SpecError::NoChecks);
    }
    let default_timeout = positive_secs(raw.timeout)
        .ok_or_else(|| SpecError::InvalidTimeout("timeout".to_string()))?;
    let resync_timeout = positive_secs(raw.resync_timeout)
        .ok_or_else(|| SpecError::InvalidTimeout("resync_timeout".to_string()))?;

    let prompt = Pattern::new(&raw.prompt)?;

    // Names seen so far across the combined sequence; depends_on may only
    // reference an earlier check.
    let mut seen: Vec<String> = Vec::new();

    let mut pre_boot = Vec::with_capacity(raw.pre_boot.len());
    for rc in &raw.pre_boot {
        if rc.cmd.is_some() || rc.expect_exit {
            return Err(SpecError::PreBootWithInput(rc.name.clone()));
        }
        pre_boot.push(compile_check(rc, &mut seen)?);
    }

    let mut checks = Vec::with_capacity(raw.checks.len());
    for rc in &raw.checks {
        checks.push(compile_check(rc, &mut seen)?);
    }

    Ok(GradeSpec {
        launch: raw.launch,
        prompt,
        default_timeout,
        resync_timeout,
        scale: raw.scale,
        pre_boot,
        checks,
    })
}

fn compile_check(rc: &RawCheck, seen: &mut Vec<String>) -> Result<Check, SpecError> {
    if rc.name.is_empty() {
        return Err(SpecError::EmptyName);
    }
    if seen.contains(&rc.name) {
        return Err(SpecError::DuplicateName(rc.name.clone()));
    }
    if rc.ok_regex.is_some() == rc.expect_exit {
        return Err(SpecError::PatternOrExit(rc.name.clone()));
    }

    let pattern = rc.ok_regex.as_deref().map(Pattern::new).transpose()?;

    let timeout = rc
        .timeout
        .map(|secs| {
            positive_secs(secs).ok_or_else(|| SpecError::InvalidTimeout(rc.name.clone()))
        })
        .transpose()?;

    let depends_on = rc
        .depends_on
        .as_ref()
        .map(|target| {
            seen.iter()
                .position(|name| name == target)
                .ok_or_else(|| SpecError::UnknownDependency {
                    check: rc.name.clone(),
                    target: target.clone(),
                })
        })
        .transpose()?;

    seen.push(rc.name.clone());

    Ok(Check {
        name: rc.name.clone(),
        input: rc.cmd.clone(),
        pattern,
        points: rc.points,
        timeout,
        depends_on,
        expect_exit: rc.expect_exit,
    })
}
