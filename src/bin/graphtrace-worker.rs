//! `graphtrace-worker` – runs one submission and reports on stdout.
//!
//! Spawned by the supervisor; not meant to be started by hand. Logs go to
//! stderr because stdout carries the report.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(io::stderr)
        .init();

    let stdin = io::stdin();
    let stdout = io::stdout();
    match graphtrace::supervisor::worker::run_worker(stdin.lock(), stdout.lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("graphtrace-worker: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
