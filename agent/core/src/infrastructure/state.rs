// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Durable per-tenant agent state: the device credential and identifier
//! written once by registration, and the last-known-good bundle persisted
//! for crash recovery.
//!
//! Layout under `<state_dir>/<project_id>/`:
//!
//! ```text
//! access-key     # opaque credential
//! device-id      # opaque identifier
//! bundle         # JSON-encoded Bundle
//! ```
//!
//! Single writer, single reader per file; correctness relies on atomic
//! replace semantics rather than file locking.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{error, info};

use crate::domain::bundle::Bundle;
use crate::domain::client::{ClientError, ControlPlaneClient};
use crate::domain::identity::{AccessKey, DeviceId, DeviceIdentity};
use crate::infrastructure::fs::{atomic_write, FsError};

const ACCESS_KEY_FILE: &str = "access-key";
const DEVICE_ID_FILE: &str = "device-id";
const BUNDLE_FILE: &str = "bundle";

/// How often an unreadable saved bundle is retried within the startup
/// window.
const LOAD_RETRY_TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to {context}: {source}")]
    Persist {
        context: String,
        #[source]
        source: FsError,
    },

    #[error("failed to encode bundle: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to register device: {0}")]
    Registration(#[source] ClientError),
}

impl StateError {
    fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    fn persist(context: impl Into<String>, source: FsError) -> Self {
        Self::Persist {
            context: context.into(),
            source,
        }
    }
}

/// Identity store and durable bundle cache over one per-tenant directory.
pub struct StateStore {
    dir: PathBuf,
    startup_wait: Duration,
}

impl StateStore {
    pub fn new(state_dir: &Path, project_id: &str, startup_wait: Duration) -> Self {
        Self {
            dir: state_dir.join(project_id),
            startup_wait,
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn ensure_dir(&self) -> Result<(), StateError> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            std::fs::DirBuilder::new()
                .recursive(true)
                .mode(0o700)
                .create(&self.dir)
                .map_err(|e| StateError::io("create state directory", e))
        }
        #[cfg(not(unix))]
        {
            std::fs::create_dir_all(&self.dir)
                .map_err(|e| StateError::io("create state directory", e))
        }
    }

    fn write_file(&self, name: &str, contents: &[u8]) -> Result<(), StateError> {
        self.ensure_dir()?;
        atomic_write(&self.path(name), contents)
            .map_err(|e| StateError::persist(format!("write {name}"), e))
    }

    /// Load the identity, registering first if this device has never
    /// registered. Absence of the access-key file is the only condition
    /// treated as "not yet registered"; any other filesystem error is fatal.
    pub async fn ensure_registered(
        &self,
        client: &dyn ControlPlaneClient,
        registration_token: &str,
    ) -> Result<DeviceIdentity, StateError> {
        match std::fs::metadata(self.path(ACCESS_KEY_FILE)) {
            Ok(_) => info!("device already registered"),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!("registering device");
                self.register(client, registration_token).await?;
            }
            Err(err) => return Err(StateError::io("check for access key", err)),
        }

        let access_key = std::fs::read_to_string(self.path(ACCESS_KEY_FILE))
            .map_err(|e| StateError::io("read access key", e))?;
        let device_id = std::fs::read_to_string(self.path(DEVICE_ID_FILE))
            .map_err(|e| StateError::io("read device ID", e))?;

        Ok(DeviceIdentity {
            access_key: AccessKey::new(access_key),
            device_id: DeviceId::new(device_id),
        })
    }

    async fn register(
        &self,
        client: &dyn ControlPlaneClient,
        registration_token: &str,
    ) -> Result<(), StateError> {
        let response = client
            .register_device(registration_token)
            .await
            .map_err(StateError::Registration)?;

        self.write_file(ACCESS_KEY_FILE, response.device_access_key_value.as_bytes())?;
        self.write_file(DEVICE_ID_FILE, response.device_id.as_bytes())?;
        Ok(())
    }

    /// Replay the last persisted bundle, if any.
    ///
    /// "Not found" is deterministic: no saved state. An unreadable file is
    /// assumed to be a transient disk condition and retried on a short tick,
    /// but only within the startup window; a permanently broken filesystem
    /// must not wedge warm start. Undecodable content is discarded outright:
    /// retrying cannot fix static corruption.
    pub async fn load_saved_bundle(&self) -> Option<Bundle> {
        let path = self.path(BUNDLE_FILE);
        let deadline = Instant::now() + self.startup_wait;

        loop {
            match std::fs::read(&path) {
                Ok(bytes) => match serde_json::from_slice(&bytes) {
                    Ok(bundle) => return Some(bundle),
                    Err(err) => {
                        error!(error = %err, "discarding invalid saved bundle");
                        return None;
                    }
                },
                Err(err) if err.kind() == ErrorKind::NotFound => return None,
                Err(err) => {
                    error!(error = %err, "read saved bundle");
                    if Instant::now() >= deadline {
                        return None;
                    }
                }
            }

            tokio::time::sleep(LOAD_RETRY_TICK).await;
        }
    }

    /// Persist a freshly fetched bundle for crash recovery. Failures are
    /// reported to the caller but must not block applying the new state.
    pub async fn save_bundle(&self, bundle: &Bundle) -> Result<(), StateError> {
        let encoded = serde_json::to_vec(bundle).map_err(StateError::Encode)?;
        self.write_file(BUNDLE_FILE, &encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::client::RegisterDeviceResponse;
    use crate::domain::info::DeviceInfo;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingClient {
        registrations: AtomicUsize,
    }

    #[async_trait]
    impl ControlPlaneClient for CountingClient {
        async fn register_device(
            &self,
            registration_token: &str,
        ) -> Result<RegisterDeviceResponse, ClientError> {
            assert_eq!(registration_token, "tok_1");
            self.registrations.fetch_add(1, Ordering::SeqCst);
            Ok(RegisterDeviceResponse {
                device_access_key_value: "key_abc".into(),
                device_id: "dev_1".into(),
            })
        }

        fn install_identity(&self, _identity: &DeviceIdentity) {}

        async fn get_bundle(&self) -> Result<Bundle, ClientError> {
            unreachable!("not used in state tests")
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

    fn store(dir: &Path) -> StateStore {
        StateStore::new(dir, "proj_1", Duration::ZERO)
    }

    #[tokio::test]
    async fn first_boot_registers_and_persists_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let client = CountingClient::default();

        let identity = store.ensure_registered(&client, "tok_1").await.unwrap();

        assert_eq!(identity.device_id.as_str(), "dev_1");
        assert_eq!(identity.access_key.expose(), "key_abc");
        assert_eq!(client.registrations.load(Ordering::SeqCst), 1);

        let tenant = dir.path().join("proj_1");
        assert_eq!(
            std::fs::read_to_string(tenant.join("access-key")).unwrap(),
            "key_abc"
        );
        assert_eq!(
            std::fs::read_to_string(tenant.join("device-id")).unwrap(),
            "dev_1"
        );
    }

    #[tokio::test]
    async fn existing_credential_never_registers_again() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let client = CountingClient::default();

        store.ensure_registered(&client, "tok_1").await.unwrap();
        let identity = store.ensure_registered(&client, "tok_1").await.unwrap();

        assert_eq!(client.registrations.load(Ordering::SeqCst), 1);
        assert_eq!(identity.device_id.as_str(), "dev_1");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn tenant_directory_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store
            .ensure_registered(&CountingClient::default(), "tok_1")
            .await
            .unwrap();

        let mode = std::fs::metadata(dir.path().join("proj_1"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[tokio::test]
    async fn missing_bundle_is_no_saved_state() {
        let dir = tempfile::tempdir().unwrap();
        assert!(store(dir.path()).load_saved_bundle().await.is_none());
    }

    #[tokio::test]
    async fn corrupt_bundle_is_discarded_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        std::fs::create_dir_all(dir.path().join("proj_1")).unwrap();
        std::fs::write(dir.path().join("proj_1").join("bundle"), b"{not json").unwrap();

        assert!(store.load_saved_bundle().await.is_none());
    }

    #[tokio::test]
    async fn saved_bundle_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let bundle = Bundle {
            desired_agent_spec: "image: fleetd/agent:1.2.3\n".into(),
            ..Default::default()
        };
        store.save_bundle(&bundle).await.unwrap();

        assert_eq!(store.load_saved_bundle().await, Some(bundle));
    }

    #[tokio::test]
    async fn save_overwrites_previous_bundle_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let first = Bundle::default();
        let second = Bundle {
            desired_agent_spec: "image: fleetd/agent:9.9.9\n".into(),
            ..Default::default()
        };

        store.save_bundle(&first).await.unwrap();
        store.save_bundle(&second).await.unwrap();

        assert_eq!(store.load_saved_bundle().await, Some(second));
    }
}
