//! ttygrade CLI - expectation-driven grader for interactive console programs.

use clap::Parser;
use comfy_table::{Cell, Color, Table};
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tokio::sync::mpsc;
use ttygrade_core::{
    CheckStatus, GradeReport, Outcome, ProgressEvent, Reporter, ReporterConfig, SpecOverrides,
    apply_overrides, load_spec, run_grading, skipped_outcomes,
};

/// Exit codes for the CLI.
mod exit_code {
    pub const FULL_SCORE: u8 = 0;
    pub const BELOW_FULL: u8 = 1;
    pub const CONFIG_ERROR: u8 = 2;
    pub const EXECUTION_ERROR: u8 = 3;
}

/// Handles console output for check progress.
/// Encapsulates the `verbose` conditionals.
struct CheckPrinter {
    reporter: Reporter,
    launch: String,
    verbose: bool,
}

impl CheckPrinter {
    const fn new(reporter: Reporter, launch: String, verbose: bool) -> Self {
        Self {
            reporter,
            launch,
            verbose,
        }
    }

    fn on_session_started(&self, check_count: usize) {
        self.reporter.run_start(&self.launch, check_count);
        self.reporter.flush();
    }

    fn on_check_started(&self, name: &str) {
        if !self.verbose {
            return;
        }
        println!("  starting: {name}");
        self.reporter.flush();
    }

    fn on_check_completed(&self, outcome: &Outcome) {
        self.reporter.check_result(outcome);
        self.reporter.flush();
    }

    fn on_finished(&self) {
        println!();
        self.reporter.flush();
    }
}

#[derive(Parser)]
#[command(name = "ttygrade")]
#[command(about = "Expectation-driven grader for interactive console programs")]
#[command(version)]
struct Cli {
    /// Grading spec (YAML)
    #[arg(value_name = "SPEC")]
    spec: PathBuf,

    /// Launch command override (run through /bin/sh -c)
    #[arg(long)]
    launch: Option<String>,

    /// Global timeout override in seconds (per-check default and session budget)
    #[arg(long)]
    timeout: Option<f64>,

    /// Write the machine-readable JSON result document to this file ("-" for stdout)
    #[arg(long, value_name = "FILE")]
    emit: Option<PathBuf>,

    /// Directory for the text summary and session transcript
    #[arg(long, default_value = "grade-report", value_name = "DIR")]
    report_dir: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    run_command(&cli).await
}

fn print_results_table(report: &GradeReport) {
    let mut table = Table::new();
    table.set_header(vec!["Check", "Points", "Status"]);

    for outcome in &report.outcomes {
        let status_cell = match outcome.status {
            CheckStatus::Passed => Cell::new("Passed").fg(Color::Green),
            CheckStatus::Failed => Cell::new("Failed").fg(Color::Red),
            CheckStatus::TimedOut => Cell::new("Timed out").fg(Color::Red),
            CheckStatus::Skipped => Cell::new("Skipped").fg(Color::Yellow),
        };
        table.add_row(vec![
            Cell::new(&outcome.name),
            Cell::new(format!("{}/{}", outcome.earned, outcome.max)),
            status_cell,
        ]);
    }

    println!("{table}");
}

#[allow(clippy::too_many_lines)]
async fn run_command(cli: &Cli) -> ExitCode {
    let reporter = Reporter::new(ReporterConfig {
        verbose: cli.verbose,
        color: !cli.no_color,
    });

    let spec = match load_spec(&cli.spec) {
        Ok(s) => s,
        Err(e) => {
            reporter.error(&format!("failed to load {}: {e}", cli.spec.display()));
            return ExitCode::from(exit_code::CONFIG_ERROR);
        }
    };
    let spec = apply_overrides(
        spec,
        &SpecOverrides {
            launch: cli.launch.clone(),
            timeout: cli.timeout,
        },
    );

    if let Err(e) = fs::create_dir_all(&cli.report_dir) {
        reporter.error(&format!(
            "failed to create {}: {e}",
            cli.report_dir.display()
        ));
        return ExitCode::from(exit_code::EXECUTION_ERROR);
    }

    // The full transcript is teed to session.log while grading runs, so a
    // hung or crashed session still leaves the output on disk.
    let log_path = cli.report_dir.join("session.log");
    let sink: Option<Box<dyn Write + Send>> = match File::create(&log_path) {
        Ok(f) => Some(Box::new(f)),
        Err(e) => {
            reporter.warn(&format!(
                "cannot write transcript {}: {e}",
                log_path.display()
            ));
            None
        }
    };

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<ProgressEvent>();
    let printer = CheckPrinter::new(reporter.clone(), spec.launch.clone(), cli.verbose);

    let progress_handle = tokio::spawn(async move {
        while let Some(event) = progress_rx.recv().await {
            match event {
                ProgressEvent::SessionStarted { check_count } => {
                    printer.on_session_started(check_count);
                }
                ProgressEvent::CheckStarted { name } => printer.on_check_started(&name),
                ProgressEvent::CheckCompleted { outcome } => printer.on_check_completed(&outcome),
            }
        }
        printer.on_finished();
    });

    let start_time = Instant::now();
    let (outcomes, launch_failed) = match run_grading(&spec, sink, Some(&progress_tx)).await {
        Ok(outcomes) => (outcomes, false),
        Err(e) => {
            reporter.error(&e.to_string());
            (skipped_outcomes(&spec, "session never started"), true)
        }
    };
    drop(progress_tx);
    let _ = progress_handle.await;
    let duration = start_time.elapsed();

    let report = GradeReport::from_outcomes(outcomes, spec.scale);

    reporter.failures(&report.outcomes);
    if cli.verbose {
        print_results_table(&report);
    }
    print!("{}", report.format_summary());
    reporter.summary(&report, duration);

    // The report was already printed above, so a persistence failure loses
    // nothing a caller could still capture, but it must not look like a
    // successful grade.
    let mut write_failed = false;
    if let Err(e) = report.write_summary(cli.report_dir.join("summary.txt")) {
        reporter.error(&e.to_string());
        write_failed = true;
    }

    if let Some(path) = &cli.emit {
        if path.as_os_str() == "-" {
            match serde_json::to_string_pretty(&report.to_document()) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    reporter.error(&format!("failed to serialize results: {e}"));
                    return ExitCode::from(exit_code::EXECUTION_ERROR);
                }
            }
        } else if let Err(e) = report.write_document(path) {
            reporter.error(&e.to_string());
            write_failed = true;
        }
    }

    if launch_failed || write_failed {
        ExitCode::from(exit_code::EXECUTION_ERROR)
    } else if report.is_perfect() {
        ExitCode::from(exit_code::FULL_SCORE)
    } else {
        ExitCode::from(exit_code::BELOW_FULL)
    }
}
