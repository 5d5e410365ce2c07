// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::info;

use crate::application::runner::Subsystem;
use crate::application::supervisor::WorkloadSupervisor;
use crate::application::updater::Updater;
use crate::domain::identity::DeviceId;
use crate::presentation::api::{app, AppState};

/// Serves the local device API from whatever listener the handoff
/// coordinator produced, freshly bound or inherited from a predecessor
/// generation. The server cannot tell which and does not care.
pub struct DeviceApiServer {
    state: Arc<AppState>,
    listener: Mutex<Option<TcpListener>>,
}

impl DeviceApiServer {
    pub fn new(
        supervisor: Arc<WorkloadSupervisor>,
        updater: Arc<Updater>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            state: Arc::new(AppState {
                version: version.into(),
                device_id: RwLock::new(None),
                supervisor,
                updater,
            }),
            listener: Mutex::new(None),
        }
    }

    pub fn set_device_id(&self, device_id: DeviceId) {
        *self.state.device_id.write() = Some(device_id);
    }

    /// Install the listener produced by the handoff coordinator. Must happen
    /// before the server's runner launches.
    pub fn set_listener(&self, listener: TcpListener) {
        *self.listener.lock() = Some(listener);
    }

    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.listener
            .lock()
            .as_ref()
            .and_then(|listener| listener.local_addr().ok())
    }

    /// Accept and handle connections until the listener fails. The original
    /// listener is kept so a failed serve can be retried on the same socket.
    async fn serve_once(&self) -> anyhow::Result<()> {
        let std_listener = {
            let guard = self.listener.lock();
            guard
                .as_ref()
                .context("no device API listener installed")?
                .try_clone()
                .context("clone device API listener")?
        };
        std_listener
            .set_nonblocking(true)
            .context("configure device API listener")?;
        let listener =
            tokio::net::TcpListener::from_std(std_listener).context("adopt listener into runtime")?;

        info!(addr = ?listener.local_addr().ok(), "device API serving");
        axum::serve(listener, app(self.state.clone()))
            .await
            .context("device API serve")?;
        Ok(())
    }
}

#[async_trait]
impl Subsystem for DeviceApiServer {
    fn name(&self) -> &'static str {
        "server"
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(1)
    }

    async fn tick(&self) -> anyhow::Result<()> {
        self.serve_once().await
    }
}
