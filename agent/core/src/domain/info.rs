// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Device facts reported to the control plane by the info reporter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub agent_version: String,
    pub hostname: Option<String>,
    pub os: String,
    pub arch: String,
    pub reported_at: DateTime<Utc>,
}

impl DeviceInfo {
    pub fn collect(agent_version: &str) -> Self {
        Self {
            agent_version: agent_version.to_string(),
            hostname: hostname::get().ok().and_then(|h| h.into_string().ok()),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            reported_at: Utc::now(),
        }
    }
}
