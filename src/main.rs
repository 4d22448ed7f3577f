use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use paperflow_lib::bootstrap::{
    init_tracing_subscriber, resolve_config, run_replay, wire_session, ReplayOptions,
};
use pf_infra::SystemClock;
use tracing::info;

/// Replay an upload through the processing-status stores and print the
/// resulting state as JSON.
#[derive(Parser, Debug)]
#[command(name = "paperflow")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: <config_dir>/paperflow/paperflow.toml)
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Navigate to the detail view when the job completes
    #[arg(long = "redirect")]
    redirect: bool,

    /// Id the backend assigns to the uploaded entity
    #[arg(long = "entity-id", default_value = "p42")]
    entity_id: String,

    /// Progress steps pushed while processing, e.g. `--progress 40,90`
    #[arg(long = "progress", value_delimiter = ',', default_value = "40,90")]
    progress: Vec<u8>,

    /// End the job with a failure
    #[arg(long = "fail")]
    fail: bool,

    /// Pretty-print the JSON state dump
    #[arg(long = "pretty")]
    pretty: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let resolved = resolve_config(cli.config.as_deref())?;
    init_tracing_subscriber(&resolved.config.logging)?;
    info!(version = env!("CARGO_PKG_VERSION"), "paperflow starting");
    resolved.log_source();

    let mut config = resolved.config;
    if cli.redirect {
        config.sync.redirect_on_completion = true;
    }

    let (session, adapters) = wire_session(config.sync, Arc::new(SystemClock));
    let options = ReplayOptions {
        entity_id: cli.entity_id,
        progress_steps: cli.progress,
        fail: cli.fail,
        ..ReplayOptions::default()
    };

    let report = run_replay(&session, &adapters, &options).await?;
    let dump = if cli.pretty {
        serde_json::to_string_pretty(&report)
    } else {
        serde_json::to_string(&report)
    }
    .context("Failed to serialize state dump")?;
    println!("{dump}");

    session.sign_out();
    Ok(())
}
