//! Mend CLI - an encrypted, append-only personal log with file encryption
//!
//! This is the command-line interface for Mend. It provides a user-friendly
//! interface to the core library functionality.

mod app;
mod cli;
mod commands;
mod config;
mod constants;
mod errors;
mod helpers;
mod security;

use clap::Parser;
use mend_core::VERSION;
use tracing_subscriber::EnvFilter;

use crate::app::AppContext;
use crate::cli::{Cli, Commands};
use crate::commands::{files, identity, keys, logs, misc};
use crate::constants::LOG_FILTER_ENV;

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);
    let ctx = AppContext::new(&cli);

    if let Err(e) = run(&ctx, &cli) {
        errors::exit_with(e);
    }
}

fn setup_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}

fn run(ctx: &AppContext, cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Some(Commands::Init(args)) => identity::handle_init(ctx, args)?,
        Some(Commands::Import(args)) => identity::handle_import(ctx, args)?,
        Some(Commands::Unlock) => keys::handle_unlock(ctx)?,
        Some(Commands::Lock) => keys::handle_lock(ctx)?,
        Some(Commands::Status) => keys::handle_status(ctx)?,
        Some(Commands::Log(args)) => logs::handle_log(ctx, args)?,
        Some(Commands::Read(args)) => logs::handle_read(ctx, args)?,
        Some(Commands::Logs) => logs::handle_logs(ctx)?,
        Some(Commands::Use(args)) => logs::handle_use(ctx, args)?,
        Some(Commands::Encrypt(args)) => files::handle_encrypt(ctx, args)?,
        Some(Commands::Decrypt(args)) => files::handle_decrypt(ctx, args)?,
        Some(Commands::Merge(args)) => logs::handle_merge(ctx, args)?,
        Some(Commands::Completions { shell }) => misc::handle_completions(*shell)?,
        None => {
            println!("Mend v{}", VERSION);
            println!("\nRun `mend --help` for usage information.");
        }
    }
    Ok(())
}
