// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! The core control loop: replay cached state, then repeatedly fetch the
//! latest bundle, persist it, and push it to the workload supervisor, the
//! status garbage collector, and the update trigger.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::application::garbage_collector::StatusGarbageCollector;
use crate::application::supervisor::WorkloadSupervisor;
use crate::application::updater::Updater;
use crate::domain::bundle::{AgentServiceSpec, Bundle};
use crate::domain::client::ControlPlaneClient;
use crate::infrastructure::state::StateStore;

pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(5);

pub struct Reconciler {
    client: Arc<dyn ControlPlaneClient>,
    store: Arc<StateStore>,
    supervisor: Arc<WorkloadSupervisor>,
    garbage_collector: Arc<StatusGarbageCollector>,
    updater: Arc<Updater>,
    interval: Duration,
}

impl Reconciler {
    pub fn new(
        client: Arc<dyn ControlPlaneClient>,
        store: Arc<StateStore>,
        supervisor: Arc<WorkloadSupervisor>,
        garbage_collector: Arc<StatusGarbageCollector>,
        updater: Arc<Updater>,
        interval: Duration,
    ) -> Self {
        Self {
            client,
            store,
            supervisor,
            garbage_collector,
            updater,
            interval,
        }
    }

    /// Warm start, then the steady-state fetch loop. On fetch failure the
    /// next tick is the retry, with no backoff. Returns only once `token`
    /// is cancelled.
    pub async fn run(&self, token: CancellationToken) {
        self.warm_start().await;

        loop {
            if token.is_cancelled() {
                break;
            }

            self.reconcile_once().await;

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        debug!("reconciler stopped");
    }

    /// Push the last persisted bundle into the supervisor so workloads
    /// resume before the first network round trip succeeds.
    pub async fn warm_start(&self) {
        if let Some(bundle) = self.store.load_saved_bundle().await {
            debug!(
                applications = bundle.applications.len(),
                "replaying saved bundle"
            );
            self.supervisor.set_applications(bundle.applications).await;
        }
    }

    /// One steady-state cycle: fetch, persist, propagate.
    pub async fn reconcile_once(&self) {
        let bundle = match self.client.get_bundle().await {
            Ok(bundle) => bundle,
            Err(err) => {
                error!(error = %err, "get bundle");
                return;
            }
        };

        // A persistence failure must not block applying live state: the
        // supervisor sees the new bundle either way.
        if let Err(err) = self.store.save_bundle(&bundle).await {
            error!(error = %err, "save bundle");
        }

        self.apply(bundle).await;
    }

    /// Strict propagation order: supervisor, then garbage collector, then
    /// update trigger.
    async fn apply(&self, bundle: Bundle) {
        self.supervisor
            .set_applications(bundle.applications.clone())
            .await;

        self.garbage_collector.set_bundle(&bundle).await;

        match AgentServiceSpec::parse(&bundle.desired_agent_spec) {
            Ok(spec) => self.updater.set_desired_spec(spec),
            // Not an error distinct from "nothing changed": skip propagation
            // for this cycle only.
            Err(err) => debug!(reason = %err, "desired agent spec not propagated this cycle"),
        }
    }
}
