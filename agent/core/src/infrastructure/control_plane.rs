// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::json;

use crate::domain::bundle::Bundle;
use crate::domain::client::{ClientError, ControlPlaneClient, RegisterDeviceResponse};
use crate::domain::identity::DeviceIdentity;
use crate::domain::info::DeviceInfo;

/// reqwest-backed control-plane client. Timeouts are the transport's own;
/// this core sets no deadlines of its own.
pub struct HttpControlPlaneClient {
    http: reqwest::Client,
    base_url: String,
    project_id: String,
    identity: RwLock<Option<DeviceIdentity>>,
}

impl HttpControlPlaneClient {
    pub fn new(base_url: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            project_id: project_id.into(),
            identity: RwLock::new(None),
        }
    }

    fn project_url(&self, suffix: &str) -> String {
        format!("{}/projects/{}/{suffix}", self.base_url, self.project_id)
    }

    fn authed(&self, suffix: &str) -> Result<(String, DeviceIdentity), ClientError> {
        let identity = self
            .identity
            .read()
            .clone()
            .ok_or(ClientError::MissingCredentials)?;
        let url = self.project_url(&format!("devices/{}/{suffix}", identity.device_id));
        Ok((url, identity))
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(ClientError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_authed(
        &self,
        method: reqwest::Method,
        suffix: &str,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response, ClientError> {
        let (url, identity) = self.authed(suffix)?;
        let mut request = self
            .http
            .request(method, url)
            .bearer_auth(identity.access_key.expose());
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.map_err(transport)?;
        Self::check(response).await
    }
}

fn transport(err: reqwest::Error) -> ClientError {
    ClientError::Transport(err.to_string())
}

#[async_trait]
impl ControlPlaneClient for HttpControlPlaneClient {
    async fn register_device(
        &self,
        registration_token: &str,
    ) -> Result<RegisterDeviceResponse, ClientError> {
        let response = self
            .http
            .post(self.project_url("devices/register"))
            .json(&json!({ "registrationToken": registration_token }))
            .send()
            .await
            .map_err(transport)?;

        Self::check(response)
            .await?
            .json()
            .await
            .map_err(|err| ClientError::Decode(err.to_string()))
    }

    fn install_identity(&self, identity: &DeviceIdentity) {
        *self.identity.write() = Some(identity.clone());
    }

    async fn get_bundle(&self) -> Result<Bundle, ClientError> {
        self.send_authed(reqwest::Method::GET, "bundle", None)
            .await?
            .json()
            .await
            .map_err(|err| ClientError::Decode(err.to_string()))
    }

    async fn set_application_status(
        &self,
        application_id: &str,
        current_release_id: &str,
    ) -> Result<(), ClientError> {
        self.send_authed(
            reqwest::Method::POST,
            &format!("applications/{application_id}/status"),
            Some(json!({ "currentReleaseId": current_release_id })),
        )
        .await
        .map(|_| ())
    }

    async fn set_service_status(
        &self,
        application_id: &str,
        service: &str,
        current_release_id: &str,
    ) -> Result<(), ClientError> {
        self.send_authed(
            reqwest::Method::POST,
            &format!("applications/{application_id}/services/{service}/status"),
            Some(json!({ "currentReleaseId": current_release_id })),
        )
        .await
        .map(|_| ())
    }

    async fn delete_application_status(&self, application_id: &str) -> Result<(), ClientError> {
        self.send_authed(
            reqwest::Method::DELETE,
            &format!("applications/{application_id}/status"),
            None,
        )
        .await
        .map(|_| ())
    }

    async fn delete_service_status(
        &self,
        application_id: &str,
        service: &str,
    ) -> Result<(), ClientError> {
        self.send_authed(
            reqwest::Method::DELETE,
            &format!("applications/{application_id}/services/{service}/status"),
            None,
        )
        .await
        .map(|_| ())
    }

    async fn report_info(&self, info: DeviceInfo) -> Result<(), ClientError> {
        let body = serde_json::to_value(&info)
            .map_err(|err| ClientError::Decode(err.to_string()))?;
        self.send_authed(reqwest::Method::POST, "info", Some(body))
            .await
            .map(|_| ())
    }
}
