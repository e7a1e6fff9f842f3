use std::process::ExitCode;

use clap::Parser;
use pdfqa_cli::{Cli, report};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine; the environment may already be set.
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    match pdfqa_cli::run(cli, &mut std::io::stdout().lock()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let (message, code) = report::failure(&err);
            eprintln!("{message}");
            ExitCode::from(code)
        }
    }
}

/// Log to stderr so stdout carries only answers.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,pdfqa_rag=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
