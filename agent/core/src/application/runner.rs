// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! The uniform retry-forever execution shape shared by every independent
//! background task: one unit of work per tick, errors logged with the
//! subsystem's name, nothing fatal to the process.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// A named unit of recurring work with a fixed polling interval and a
/// failure-tolerant body. State lives in the collaborator it drives, not in
/// the subsystem itself.
#[async_trait]
pub trait Subsystem: Send + Sync {
    fn name(&self) -> &'static str;

    fn interval(&self) -> Duration;

    /// Advance this subsystem by one unit of work. A blocking body (such as
    /// a server accept loop) is fine: the interval then bounds how quickly a
    /// failed unit is retried, not how often successful units run.
    async fn tick(&self) -> anyhow::Result<()>;
}

/// Drives a subsystem until `token` is cancelled. Errors are logged and the
/// loop proceeds to the next tick unconditionally.
pub async fn run_subsystem(subsystem: Arc<dyn Subsystem>, token: CancellationToken) {
    loop {
        if token.is_cancelled() {
            break;
        }

        tokio::select! {
            _ = token.cancelled() => break,
            result = subsystem.tick() => {
                if let Err(err) = result {
                    error!(subsystem = subsystem.name(), error = %err, "subsystem tick failed");
                }
            }
        }

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(subsystem.interval()) => {}
        }
    }
    debug!(subsystem = subsystem.name(), "subsystem stopped");
}
