//! invigilate - scripted black-box test driver.
//!
//! Runs a program once per test case file and verifies, in order and in
//! real time, that the program's standard I/O matches the script embedded
//! in the file's comment lines. See the `-h` output for the file format.

mod cli;
mod discover;
mod engine;
mod harness;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use invigilate_core::RunSummary;
use tokio::sync::mpsc;
use tracing::debug;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args = Cli::parse();
    if args.help {
        cli::print_usage();
        return ExitCode::SUCCESS;
    }

    let (program, roots) = cli::split_args(&args.args);
    if program.is_empty() {
        cli::print_usage();
        eprintln!("No program specified");
        return ExitCode::FAILURE;
    }
    if roots.is_empty() {
        cli::print_usage();
        eprintln!("No test cases specified");
        return ExitCode::FAILURE;
    }

    let config = args.config();
    let roots: Vec<PathBuf> = roots.into_iter().map(PathBuf::from).collect();

    let (tx, mut rx) = mpsc::channel(discover::JOB_BUFFER);
    let walker = {
        let extension = config.extension.clone();
        tokio::task::spawn_blocking(move || discover::find_tests(&roots, &extension, &tx))
    };

    let mut summary = RunSummary::default();
    while let Some(job) = rx.recv().await {
        match job.content {
            Err(err) => {
                eprintln!("{err:#}");
                summary.record_error();
            }
            Ok(content) => {
                let outcome = engine::run_case(&job.path, &content, &program, &config).await;
                summary.record(outcome);
            }
        }
    }
    if let Err(err) = walker.await {
        debug!(error = %err, "discovery task panicked");
    }
    debug!(
        failed = summary.failed(),
        errors = summary.errors(),
        "run complete"
    );

    if summary.all_passed() {
        if config.verbose {
            println!();
            println!("All tests passed.");
        }
    } else {
        // The summary is always the last line on stderr.
        eprintln!("{summary}");
    }
    summary.exit_code()
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
