//! Cyrkensia origin server
//!
//! Serves a directory of albums over HTTP: a hostinfo document describing the
//! catalog, per-directory listings and the files themselves, optionally
//! behind HTTP Basic auth.

mod config;
mod delivery;
mod response;
mod routes;
mod server;

use std::path::Path;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use cyrkensia_core::{meta, ConfigResolver, CredentialStore};

use config::Cli;
use server::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(cli.verbose, cli.log_dir.as_deref())?;

    info!("{} {} starting", meta::NAME_RICH, meta::VERSION);

    let config = ConfigResolver::standard(cli.config.as_deref(), cli.to_layer())
        .resolve()
        .context("Invalid configuration")?;
    info!("Content root: {:?}", config.root);
    if !config.root.is_dir() {
        warn!("Content root {:?} is not a directory, the catalog will be empty", config.root);
    }

    let credentials = match &config.htpasswd {
        Some(path) => {
            let store = CredentialStore::load(path)
                .with_context(|| format!("Failed to load credentials from {:?}", path))?;
            info!("Gated mode: {} user(s)", store.len());
            Some(store)
        }
        None => None,
    };

    server::run(AppState::new(config, credentials)).await
}

/// Console logging plus optional daily rolling files.
///
/// The returned guard flushes the file writer and must outlive `main`.
fn init_logging(verbose: bool, log_dir: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{}={level},cyrkensia_core={level},tower_http={level}",
            env!("CARGO_CRATE_NAME")
        ))
    });

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "cyrkensia.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .with(file_layer)
        .try_init()
        .context("Failed to initialise logging")?;

    Ok(guard)
}
