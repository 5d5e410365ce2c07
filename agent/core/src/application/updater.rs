// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use parking_lot::Mutex;
use tracing::info;

use crate::domain::bundle::AgentServiceSpec;

/// Decides when the running agent should be replaced. Binary fetch and
/// process replacement belong to the external update executor; this trigger
/// records the pending desired spec and keeps it observable.
pub struct Updater {
    version: String,
    desired: Mutex<Option<AgentServiceSpec>>,
}

impl Updater {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            desired: Mutex::new(None),
        }
    }

    /// Propagated by the reconciliation loop on every cycle whose bundle
    /// carried a decodable spec.
    pub fn set_desired_spec(&self, spec: AgentServiceSpec) {
        let mut desired = self.desired.lock();
        let changed = desired.as_ref() != Some(&spec);
        if changed {
            if let Some(desired_version) = spec.version() {
                if desired_version != self.version {
                    info!(
                        current = %self.version,
                        desired = %desired_version,
                        image = %spec.image,
                        "desired agent version differs; update pending"
                    );
                }
            }
        }
        *desired = Some(spec);
    }

    pub fn desired_spec(&self) -> Option<AgentServiceSpec> {
        self.desired.lock().clone()
    }

    /// Whether the desired spec names a version other than the one running.
    pub fn update_pending(&self) -> bool {
        self.desired
            .lock()
            .as_ref()
            .and_then(|spec| spec.version().map(|v| v != self.version))
            .unwrap_or(false)
    }
}
