//! urlsift - recon pipeline runner and URL liveness prober.

use anyhow::{Context as _, Result};
use clap::Parser;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use urlsift::cli::{Cli, Commands, Context};
use urlsift::config::AppSettings;
use urlsift::error::CliError;
use urlsift::{logging, output};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version print to stdout and succeed.
            let code = if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
            let _ = e.print();
            return code;
        }
    };

    logging::init(cli.verbose, cli.quiet);

    let cancel = CancellationToken::new();
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted, stopping workers...");
            cancel_for_signal.cancel();
        }
    });

    match run(cli, cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let interrupted = e
                .downcast_ref::<CliError>()
                .is_some_and(CliError::is_interrupt);
            if interrupted {
                output::print_warning("interrupted, no artifact was written");
            } else {
                output::print_error(&format!("{:#}", e));
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, cancel: CancellationToken) -> Result<()> {
    let settings = AppSettings::load(cli.config.as_deref()).context("failed to load settings")?;
    let ctx = Context::new(settings, cli.verbose, cli.quiet);

    match cli.command {
        Commands::Probe(cmd) => cmd.execute(&ctx, cancel).await?,
        Commands::Run(cmd) => cmd.execute(&ctx, cancel).await?,
        Commands::Stages(cmd) => cmd.execute(&ctx)?,
        Commands::Merge(cmd) => cmd.execute(&ctx)?,
    }
    Ok(())
}
