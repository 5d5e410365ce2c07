// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::application::runner::Subsystem;
use crate::domain::client::ControlPlaneClient;
use crate::domain::info::DeviceInfo;

/// Periodically reports device facts to the control plane.
pub struct InfoReporter {
    client: Arc<dyn ControlPlaneClient>,
    version: String,
}

impl InfoReporter {
    pub fn new(client: Arc<dyn ControlPlaneClient>, version: impl Into<String>) -> Self {
        Self {
            client,
            version: version.into(),
        }
    }
}

#[async_trait]
impl Subsystem for InfoReporter {
    fn name(&self) -> &'static str {
        "info-reporter"
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(60)
    }

    async fn tick(&self) -> anyhow::Result<()> {
        let info = DeviceInfo::collect(&self.version);
        self.client.report_info(info).await?;
        Ok(())
    }
}
