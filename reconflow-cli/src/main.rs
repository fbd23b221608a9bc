//! `scanner` - runs the reconflow recon pipeline against one domain.

mod cli;
mod console;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use reconflow::cancellation::CancellationToken;
use reconflow::events::{EventSink, LoggingEventSink};
use reconflow::orchestrator::Orchestrator;
use reconflow::run::Run;

use crate::cli::Cli;
use crate::console::ConsoleEventSink;

fn init_tracing(filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn event_sink(cli: &Cli) -> Arc<dyn EventSink> {
    if cli.console_progress() {
        Arc::new(ConsoleEventSink::stderr())
    } else if cli.verbose {
        Arc::new(LoggingEventSink::debug())
    } else {
        Arc::new(LoggingEventSink::default())
    }
}

async fn run(cli: Cli, cancellation: Arc<CancellationToken>) -> anyhow::Result<()> {
    let target = cli.target()?;
    let config = cli
        .scanner_config()
        .context("Failed to load configuration")?;

    let run = Arc::new(
        Run::new(target, &config.output_root, cli.mode()).with_webhook(cli.webhook.clone()),
    );
    let orchestrator = Orchestrator::new(config)?
        .with_event_sink(event_sink(&cli))
        .with_cancellation(cancellation);

    eprintln!(
        "{}",
        format!("🎯 Target: {} ({} mode)", run.target(), run.mode()).bold()
    );
    let result = orchestrator.execute(run).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result.summary)?);
    } else {
        println!("{}", result.summary.render().cyan());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_filter());

    let cancellation = Arc::new(CancellationToken::new());
    let token = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "⚠ Interrupt received, stopping running tools...".yellow());
            token.cancel("interrupt");
        }
    });

    match run(cli, cancellation).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", "✖".red());
            eprintln!("Usage: scanner <domain> [--webhook URL] [--parallel]");
            ExitCode::FAILURE
        }
    }
}
