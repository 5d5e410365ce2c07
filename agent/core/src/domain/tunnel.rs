// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("tunnel dial failed: {0}")]
    Dial(String),
    #[error("tunnel teardown failed: {0}")]
    Teardown(String),
}

/// Remote-access transport boundary. The concrete tunnel lives outside this
/// core; the connector only needs to keep whatever implementation it is
/// given connected or torn down.
#[async_trait]
pub trait Tunnel: Send + Sync {
    /// Establish the tunnel if it is not already up. Idempotent.
    async fn ensure_connected(&self) -> Result<(), TunnelError>;

    /// Tear the tunnel down if it is up. Idempotent.
    async fn disconnect(&self) -> Result<(), TunnelError>;

    fn is_connected(&self) -> bool;
}
