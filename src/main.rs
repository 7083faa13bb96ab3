//! skein CLI entrypoint

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use skein::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let mut cli = Cli::parse();

    // For run commands the capture is attached as a tracing layer, so
    // ambient log lines land in the run's durable log store
    let capture = cli.ensure_run_identity();

    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false));

    match capture.as_ref() {
        Some(capture) => registry.with(capture.layer()).init(),
        None => registry.init(),
    }

    match cli.execute(capture).await {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("skein: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
