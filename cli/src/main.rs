// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # fleetd
//!
//! The `fleetd` binary is the device agent daemon.
//!
//! It constructs the control-plane client and the agent core, bootstraps the
//! device identity, takes over the device API listener from a predecessor
//! generation when one exists, and then runs the reconciliation loop and the
//! background subsystems until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use fleetd_core::application::agent::{Agent, AgentConfig};
use fleetd_core::infrastructure::connector::DisabledTunnel;
use fleetd_core::infrastructure::control_plane::HttpControlPlaneClient;

/// fleetd device agent - reconcile this device against its fleet
#[derive(Parser)]
#[command(name = "fleetd")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Control plane base URL
    #[arg(long, env = "FLEETD_CONTROLLER", value_name = "URL")]
    controller: String,

    /// Project identifier this device belongs to
    #[arg(long, env = "FLEETD_PROJECT")]
    project: String,

    /// One-time registration token (unused once the device is registered)
    #[arg(long, env = "FLEETD_REGISTRATION_TOKEN", default_value = "")]
    registration_token: String,

    /// Configuration directory holding device variable files
    #[arg(long, env = "FLEETD_CONF_DIR", default_value = "/etc/fleetd")]
    conf_dir: PathBuf,

    /// State directory for persisted identity and bundle files
    #[arg(long, env = "FLEETD_STATE_DIR", default_value = "/var/lib/fleetd")]
    state_dir: PathBuf,

    /// Local device API port (ignored when a listener is inherited)
    #[arg(long, env = "FLEETD_SERVER_PORT", default_value = "4444")]
    server_port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "FLEETD_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    let client = Arc::new(HttpControlPlaneClient::new(&cli.controller, &cli.project));
    let config = AgentConfig::new(
        cli.project,
        cli.registration_token,
        cli.conf_dir,
        cli.state_dir,
        env!("CARGO_PKG_VERSION"),
        cli.server_port,
    );

    let agent = Agent::new(config, client, Arc::new(DisabledTunnel))
        .context("construct agent")?;

    let identity = agent.initialize().await.context("initialize agent")?;
    info!(device_id = %identity.device_id, "device identity ready");

    let token = CancellationToken::new();
    tokio::spawn(shutdown_signal(token.clone()));

    agent.run(token).await;
    Ok(())
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}

/// Cancel the agent's token on SIGINT/SIGTERM; the agent joins its tasks and
/// the process exits cleanly.
async fn shutdown_signal(token: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate =
            signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("shutdown signal received");
    token.cancel();
}
