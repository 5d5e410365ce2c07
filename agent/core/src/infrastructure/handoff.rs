// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Listener handoff across process generations. A replacement agent binary
//! inherits the device API listener as an open file descriptor so in-flight
//! and future connections are not dropped during a self-update; the first
//! generation binds fresh. Callers cannot tell which case they got.

use std::net::TcpListener;

use thiserror::Error;
use tracing::info;

/// Environment variable carrying the inherited listener's file descriptor.
pub const LISTENER_FD_ENV: &str = "FLEETD_LISTENER_FD";

#[derive(Debug, Error)]
pub enum HandoffError {
    #[error("invalid inherited listener descriptor {value:?}: {reason}")]
    InvalidInheritedFd { value: String, reason: String },

    #[error("failed to configure listener: {0}")]
    Configure(#[source] std::io::Error),

    #[error("failed to bind device API listener on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
}

pub struct HandoffCoordinator {
    port: u16,
}

impl HandoffCoordinator {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    /// Produce a listener that is already accepting connections: adopt the
    /// descriptor a predecessor handed down, or bind fresh.
    pub fn takeover(&self) -> Result<TcpListener, HandoffError> {
        self.takeover_with(std::env::var(LISTENER_FD_ENV).ok())
    }

    fn takeover_with(&self, inherited: Option<String>) -> Result<TcpListener, HandoffError> {
        #[cfg(unix)]
        if let Some(value) = inherited {
            use std::os::unix::io::FromRawFd;

            let fd: i32 = value.parse().map_err(|_| HandoffError::InvalidInheritedFd {
                value: value.clone(),
                reason: "not a file descriptor number".into(),
            })?;

            // Safety: the predecessor passes a listening socket it owns and
            // stops using once the successor has started.
            let listener = unsafe { TcpListener::from_raw_fd(fd) };
            listener
                .set_nonblocking(true)
                .map_err(HandoffError::Configure)?;
            info!(fd, "adopted device API listener from predecessor");
            return Ok(listener);
        }

        #[cfg(not(unix))]
        let _ = inherited;

        let listener = TcpListener::bind(("127.0.0.1", self.port)).map_err(|source| {
            HandoffError::Bind {
                port: self.port,
                source,
            }
        })?;
        listener
            .set_nonblocking(true)
            .map_err(HandoffError::Configure)?;
        info!(port = self.port, "bound fresh device API listener");
        Ok(listener)
    }

    /// The environment a successor process must inherit to adopt `listener`.
    #[cfg(unix)]
    pub fn handoff_env(listener: &TcpListener) -> (&'static str, String) {
        use std::os::unix::io::AsRawFd;
        (LISTENER_FD_ENV, listener.as_raw_fd().to_string())
    }
}
