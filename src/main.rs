//! CLI entry point for the portalguard tool.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use portalguard_core::{
    DnsProbe, FileConfig, Journal, Orchestrator, PortalLogin, PortalSession, RunOutcome,
    StateStore,
};
use tracing::{debug, info};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    match run(args).await {
        // Lock contention: a concurrent invocation is already handling this
        // decision cycle. Distinct exit status for automation.
        Ok(RunOutcome::Skipped) => ExitCode::from(2),
        // Every completed decision exits 0 — including a failed login,
        // whose outcome lives in the state record and journal.
        Ok(_) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("Error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<RunOutcome> {
    let config = load_config(&args)?;

    let state_dir = args
        .state_dir
        .clone()
        .or_else(|| config.state_dir.clone())
        .or_else(portalguard_core::state::default_state_dir)
        .context("cannot resolve a state directory (set --state-dir or $HOME)")?;

    let store = StateStore::open(&state_dir)
        .with_context(|| format!("failed to provision state directory '{}'", state_dir.display()))?;
    let journal = Journal::new(store.journal_path());

    let probe = DnsProbe::new(
        config.probe_host(),
        Duration::from_secs(config.probe_timeout_secs()),
    );

    // Missing credentials only become fatal if this run actually needs a
    // login; the skip and mark-authenticated branches must still complete.
    let portal: Option<Arc<dyn PortalLogin>> = match config.credentials() {
        Some(credentials) => {
            let session = PortalSession::new(config.probe_url(), credentials)
                .context("failed to construct the portal HTTP client")?;
            Some(Arc::new(session))
        }
        None => None,
    };

    let orchestrator = Orchestrator::new(
        store,
        journal,
        Arc::new(probe),
        portal,
        config.session_duration(),
    )
    .with_force_login(args.force_login);

    let outcome = orchestrator.run_once().await?;
    info!(?outcome, "decision cycle complete");
    Ok(outcome)
}

fn load_config(args: &Args) -> Result<FileConfig> {
    if let Some(path) = args.config.as_deref() {
        if !path.exists() {
            bail!("config file '{}' does not exist", path.display());
        }
        return portalguard_core::config::load_file_config(path);
    }

    let loaded = portalguard_core::load_default_file_config()?;
    if let Some(path) = loaded.path.as_deref() {
        debug!(path = %path.display(), loaded = loaded.config.is_some(), "default config path");
    }
    Ok(loaded.config.unwrap_or_default())
}
