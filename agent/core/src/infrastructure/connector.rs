// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::application::runner::Subsystem;
use crate::domain::tunnel::{Tunnel, TunnelError};
use crate::infrastructure::variables::{FsVariables, REMOTE_ACCESS_ENABLED};

/// Keeps the remote-access tunnel reconciled with the device's variables:
/// connected while remote access is enabled, torn down otherwise. The tunnel
/// transport itself lives behind the [`Tunnel`] trait.
pub struct Connector {
    tunnel: Arc<dyn Tunnel>,
    variables: Arc<FsVariables>,
}

impl Connector {
    pub fn new(tunnel: Arc<dyn Tunnel>, variables: Arc<FsVariables>) -> Self {
        Self { tunnel, variables }
    }
}

#[async_trait]
impl Subsystem for Connector {
    fn name(&self) -> &'static str {
        "connector"
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(1)
    }

    async fn tick(&self) -> anyhow::Result<()> {
        if self.variables.get_bool(REMOTE_ACCESS_ENABLED, true) {
            self.tunnel.ensure_connected().await?;
        } else if self.tunnel.is_connected() {
            self.tunnel.disconnect().await?;
        }
        Ok(())
    }
}

/// Placeholder transport for deployments that have not wired a real tunnel.
pub struct DisabledTunnel;

#[async_trait]
impl Tunnel for DisabledTunnel {
    async fn ensure_connected(&self) -> Result<(), TunnelError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TunnelError> {
        Ok(())
    }

    fn is_connected(&self) -> bool {
        false
    }
}
