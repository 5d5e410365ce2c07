// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::bundle::Bundle;
use crate::domain::identity::DeviceIdentity;
use crate::domain::info::DeviceInfo;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("control plane rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("device credentials not installed")]
    MissingCredentials,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDeviceResponse {
    pub device_access_key_value: String,
    pub device_id: String,
}

/// Abstract contract with the control plane. Wire format and authentication
/// details belong to the implementation; this core only relies on the
/// operations below.
#[async_trait]
pub trait ControlPlaneClient: Send + Sync {
    /// One-time device registration with a registration token. The only
    /// operation valid before `install_identity`.
    async fn register_device(
        &self,
        registration_token: &str,
    ) -> Result<RegisterDeviceResponse, ClientError>;

    /// Install the credential and device identifier obtained from identity
    /// bootstrap; all device-scoped operations require it.
    fn install_identity(&self, identity: &DeviceIdentity);

    async fn get_bundle(&self) -> Result<Bundle, ClientError>;

    async fn set_application_status(
        &self,
        application_id: &str,
        current_release_id: &str,
    ) -> Result<(), ClientError>;

    async fn set_service_status(
        &self,
        application_id: &str,
        service: &str,
        current_release_id: &str,
    ) -> Result<(), ClientError>;

    async fn delete_application_status(&self, application_id: &str) -> Result<(), ClientError>;

    async fn delete_service_status(
        &self,
        application_id: &str,
        service: &str,
    ) -> Result<(), ClientError>;

    async fn report_info(&self, info: DeviceInfo) -> Result<(), ClientError>;
}
