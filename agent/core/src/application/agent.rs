// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! The orchestrator: composes identity bootstrap, the durable bundle cache,
//! the reconciliation loop, and one subsystem runner per independent task,
//! then parks until cancelled. Nothing recoverable ever escapes a task; the
//! agent never terminates on its own once running.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::application::garbage_collector::StatusGarbageCollector;
use crate::application::reconciler::{Reconciler, DEFAULT_RECONCILE_INTERVAL};
use crate::application::runner::{run_subsystem, Subsystem};
use crate::application::supervisor::WorkloadSupervisor;
use crate::application::updater::Updater;
use crate::domain::client::ControlPlaneClient;
use crate::domain::identity::DeviceIdentity;
use crate::domain::status::ClientStatusApi;
use crate::domain::tunnel::Tunnel;
use crate::infrastructure::connector::Connector;
use crate::infrastructure::handoff::HandoffCoordinator;
use crate::infrastructure::info_reporter::InfoReporter;
use crate::infrastructure::state::StateStore;
use crate::infrastructure::variables::FsVariables;
use crate::presentation::DeviceApiServer;

/// How long warm start waits out a transiently unreadable saved bundle.
pub const DEFAULT_STARTUP_WAIT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("version not set")]
    VersionNotSet,
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub project_id: String,
    pub registration_token: String,
    pub conf_dir: PathBuf,
    pub state_dir: PathBuf,
    pub version: String,
    pub server_port: u16,
    pub reconcile_interval: Duration,
    pub startup_wait: Duration,
}

impl AgentConfig {
    pub fn new(
        project_id: impl Into<String>,
        registration_token: impl Into<String>,
        conf_dir: impl Into<PathBuf>,
        state_dir: impl Into<PathBuf>,
        version: impl Into<String>,
        server_port: u16,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            registration_token: registration_token.into(),
            conf_dir: conf_dir.into(),
            state_dir: state_dir.into(),
            version: version.into(),
            server_port,
            reconcile_interval: DEFAULT_RECONCILE_INTERVAL,
            startup_wait: DEFAULT_STARTUP_WAIT,
        }
    }
}

pub struct Agent {
    config: AgentConfig,
    client: Arc<dyn ControlPlaneClient>,
    store: Arc<StateStore>,
    reconciler: Arc<Reconciler>,
    variables: Arc<FsVariables>,
    connector: Arc<Connector>,
    info_reporter: Arc<InfoReporter>,
    server: Arc<DeviceApiServer>,
    handoff: HandoffCoordinator,
}

impl Agent {
    pub fn new(
        config: AgentConfig,
        client: Arc<dyn ControlPlaneClient>,
        tunnel: Arc<dyn Tunnel>,
    ) -> Result<Self, AgentError> {
        if config.version.is_empty() {
            return Err(AgentError::VersionNotSet);
        }

        let store = Arc::new(StateStore::new(
            &config.state_dir,
            &config.project_id,
            config.startup_wait,
        ));
        let status_api = Arc::new(ClientStatusApi::new(client.clone()));
        let supervisor = Arc::new(WorkloadSupervisor::new(status_api.clone()));
        let garbage_collector = Arc::new(StatusGarbageCollector::new(status_api));
        let updater = Arc::new(Updater::new(&config.version));
        let reconciler = Arc::new(Reconciler::new(
            client.clone(),
            store.clone(),
            supervisor.clone(),
            garbage_collector,
            updater.clone(),
            config.reconcile_interval,
        ));
        let variables = Arc::new(FsVariables::new(&config.conf_dir));
        let connector = Arc::new(Connector::new(tunnel, variables.clone()));
        let info_reporter = Arc::new(InfoReporter::new(client.clone(), &config.version));
        let server = Arc::new(DeviceApiServer::new(supervisor, updater, &config.version));
        let handoff = HandoffCoordinator::new(config.server_port);

        Ok(Self {
            config,
            client,
            store,
            reconciler,
            variables,
            connector,
            info_reporter,
            server,
            handoff,
        })
    }

    /// Identity bootstrap and listener takeover. Every failure here is fatal:
    /// the caller decides whether to abort the process.
    pub async fn initialize(&self) -> anyhow::Result<DeviceIdentity> {
        let identity = self
            .store
            .ensure_registered(self.client.as_ref(), &self.config.registration_token)
            .await
            .context("bootstrap device identity")?;

        self.client.install_identity(&identity);
        self.server.set_device_id(identity.device_id.clone());

        self.variables
            .start()
            .context("start variables watcher")?;

        let listener = self
            .handoff
            .takeover()
            .context("take over device API listener")?;
        self.server.set_listener(listener);

        Ok(identity)
    }

    /// Launch every subsystem and park until `token` is cancelled. Each task
    /// holds a child token and is joined before this returns, so callers
    /// (and tests) know all tasks observed the cancellation.
    pub async fn run(&self, token: CancellationToken) {
        info!(version = %self.config.version, "agent running");

        let mut tasks = Vec::new();

        let reconciler = self.reconciler.clone();
        let reconciler_token = token.child_token();
        tasks.push(tokio::spawn(async move {
            reconciler.run(reconciler_token).await;
        }));

        let subsystems: Vec<Arc<dyn Subsystem>> = vec![
            self.connector.clone(),
            self.info_reporter.clone(),
            self.server.clone(),
        ];
        for subsystem in subsystems {
            tasks.push(tokio::spawn(run_subsystem(subsystem, token.child_token())));
        }

        for task in tasks {
            let _ = task.await;
        }
        info!("agent stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bundle::Bundle;
    use crate::domain::client::{ClientError, RegisterDeviceResponse};
    use crate::domain::info::DeviceInfo;
    use crate::infrastructure::connector::DisabledTunnel;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeControlPlane {
        registrations: AtomicUsize,
        installed: parking_lot::Mutex<Option<String>>,
    }

    #[async_trait]
    impl ControlPlaneClient for FakeControlPlane {
        async fn register_device(
            &self,
            _: &str,
        ) -> Result<RegisterDeviceResponse, ClientError> {
            self.registrations.fetch_add(1, Ordering::SeqCst);
            Ok(RegisterDeviceResponse {
                device_access_key_value: "key_abc".into(),
                device_id: "dev_1".into(),
            })
        }

        fn install_identity(&self, identity: &DeviceIdentity) {
            *self.installed.lock() = Some(identity.device_id.as_str().to_string());
        }

        async fn get_bundle(&self) -> Result<Bundle, ClientError> {
            Ok(Bundle::default())
        }

        async fn set_application_status(&self, _: &str, _: &str) -> Result<(), ClientError> {
            Ok(())
        }

        async fn set_service_status(&self, _: &str, _: &str, _: &str) -> Result<(), ClientError> {
            Ok(())
        }

        async fn delete_application_status(&self, _: &str) -> Result<(), ClientError> {
            Ok(())
        }

        async fn delete_service_status(&self, _: &str, _: &str) -> Result<(), ClientError> {
            Ok(())
        }

        async fn report_info(&self, _: DeviceInfo) -> Result<(), ClientError> {
            Ok(())
        }
    }

    fn config(state_dir: &std::path::Path, conf_dir: &std::path::Path) -> AgentConfig {
        let mut config = AgentConfig::new("proj_1", "tok_1", conf_dir, state_dir, "1.0.0", 0);
        config.reconcile_interval = Duration::from_millis(10);
        config.startup_wait = Duration::ZERO;
        config
    }

    #[test]
    fn empty_version_fails_construction() {
        let config = AgentConfig::new("proj_1", "tok_1", "/etc/fleetd", "/var/lib/fleetd", "", 0);
        assert!(matches!(
            Agent::new(config, Arc::new(FakeControlPlane::default()), Arc::new(DisabledTunnel)),
            Err(AgentError::VersionNotSet)
        ));
    }

    #[tokio::test]
    async fn initialize_registers_once_and_installs_identity() {
        let state_dir = tempfile::tempdir().unwrap();
        let conf_dir = tempfile::tempdir().unwrap();
        let client = Arc::new(FakeControlPlane::default());

        let agent = Agent::new(
            config(state_dir.path(), conf_dir.path()),
            client.clone(),
            Arc::new(DisabledTunnel),
        )
        .unwrap();

        let identity = agent.initialize().await.unwrap();
        assert_eq!(identity.device_id.as_str(), "dev_1");
        assert_eq!(client.installed.lock().as_deref(), Some("dev_1"));

        // A second initialization finds the persisted credential and never
        // issues another registration call.
        agent.initialize().await.unwrap();
        assert_eq!(client.registrations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn run_joins_every_task_on_cancellation() {
        let state_dir = tempfile::tempdir().unwrap();
        let conf_dir = tempfile::tempdir().unwrap();

        let agent = Agent::new(
            config(state_dir.path(), conf_dir.path()),
            Arc::new(FakeControlPlane::default()),
            Arc::new(DisabledTunnel),
        )
        .unwrap();
        agent.initialize().await.unwrap();

        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        // Must return once every task has observed the cancellation.
        agent.run(token).await;
    }
}
