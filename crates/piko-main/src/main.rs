// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of PikoBridge.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! PikoBridge - polls a Kostal PIKO MP plus and publishes its measurements

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use config::{AppConfig, StoreBackend, ValidationResult};
use piko_core::{
    FieldSchema, HttpTransport, MemoryStateStore, PIKO_MP_PLUS_FIELDS, PollCycle, PollOutcome,
    RetryScheduler, StatePublisher, StateStore, StopReason, TokioTimer,
};
use piko_ha::{HomeAssistantClient, HomeAssistantStateStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Parser)]
#[command(name = "piko", version)]
#[command(about = "Kostal PIKO MP plus to Home Assistant bridge", long_about = None)]
struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print the field table as markdown and exit
    #[arg(long)]
    print_schema: bool,

    /// Run a single poll and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let schema = Arc::new(
        FieldSchema::new(PIKO_MP_PLUS_FIELDS).context("Built-in field table is invalid")?,
    );
    if cli.print_schema {
        println!("{}", schema.markdown_table());
        return Ok(());
    }

    let config = AppConfig::load(cli.config.as_deref())?;
    init_tracing(config.is_debug_mode());

    info!("🚀 Starting PikoBridge v{}", env!("CARGO_PKG_VERSION"));
    info!("📋 Configuration loaded from {}", config.source);
    info!(
        "   Inverter: {} (timeout {} ms)",
        config.base_url(),
        config.inverter.timeout_ms
    );
    info!(
        "   Polling: every {} ms, {} retries every {} ms",
        config.polling.interval_ms, config.polling.max_retries, config.polling.retry_interval_ms
    );
    info!("   Store: {:?}", config.store.backend);
    info!("   Debug mode: {}", config.system.debug_mode);
    let validation: ValidationResult = config.validate_detailed();
    for warning in validation.warnings {
        warn!("⚠️ [CONFIG] {}", warning);
    }
    debug!("Field table:\n{}", schema.markdown_table());

    let store = create_store(&config).await?;
    info!("💾 State store: {}", store.name());

    let transport = HttpTransport::with_timeout(config.base_url(), config.request_timeout())
        .context("Failed to create HTTP client")?;
    let publisher = StatePublisher::new(store).with_stale_policy(config.store.stale_fields);
    let mut cycle = PollCycle::new(Arc::new(transport), schema, publisher);

    if cli.once {
        return run_once(&mut cycle).await;
    }

    let mut scheduler =
        RetryScheduler::new(cycle, config.retry_policy(), Arc::new(TokioTimer));

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        let _ = shutdown_tx.send(true);
    });

    match scheduler.run(&mut shutdown_rx).await {
        StopReason::Shutdown => {
            info!("👋 Shutting down");
            Ok(())
        }
        StopReason::RetriesExhausted => {
            // Leave the indicator in a defined state before exiting
            scheduler.shutdown().await;
            anyhow::bail!("Inverter unreachable, polling stopped")
        }
    }
}

fn init_tracing(debug_mode: bool) {
    // Respects RUST_LOG; debug_mode only changes the fallback level
    let fallback = if debug_mode { "debug" } else { "info" };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback)),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

async fn create_store(config: &AppConfig) -> Result<Arc<dyn StateStore>> {
    match config.store.backend {
        StoreBackend::Memory => {
            info!("📝 Dry run: values are logged, not published");
            Ok(Arc::new(MemoryStateStore::logging()))
        }
        StoreBackend::HomeAssistant => {
            let client = HomeAssistantClient::from_config(
                config.store.ha_base_url.clone(),
                config.store.ha_token.clone(),
            )
            .context("Failed to create Home Assistant client")?;
            info!("🏠 Publishing to Home Assistant at {}", client.base_url());
            // Unreachable at startup is not fatal; writes retry on every poll
            if !client.ping().await {
                warn!("⚠️ [HA] Home Assistant API not reachable yet");
            }
            Ok(Arc::new(HomeAssistantStateStore::with_prefix(
                client,
                config.store.entity_prefix.clone(),
            )))
        }
    }
}

async fn run_once(cycle: &mut PollCycle) -> Result<()> {
    cycle.publish_connection(false).await;

    match cycle.run().await {
        PollOutcome::Success(report) => {
            println!(
                "Poll succeeded: {} published, {} absent, {} deleted, {} field errors",
                report.published,
                report.absent,
                report.deleted,
                report.field_errors.len()
            );
            for field_error in &report.field_errors {
                println!("  {field_error}");
            }
            cycle.publish_connection(false).await;
            Ok(())
        }
        PollOutcome::Failure(reason) => {
            error!("❌ Poll failed: {}", reason);
            anyhow::bail!("Poll failed: {reason}")
        }
    }
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("SIGINT received"),
                    _ = sigterm.recv() => info!("SIGTERM received"),
                }
                return;
            }
            Err(e) => warn!("Failed to install SIGTERM handler: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
