// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Status capabilities handed to the workload supervisor and the status
//! garbage collector. Keeping them as narrow traits (rather than closures
//! over the client) makes the dependency explicit and mockable.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::client::{ClientError, ControlPlaneClient};

/// Reports the currently-running release of applications and services.
#[async_trait]
pub trait StatusReporter: Send + Sync {
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
}

/// Deletes status records that no longer correspond to anything in the
/// current bundle.
#[async_trait]
pub trait StatusPruner: Send + Sync {
    async fn delete_application_status(&self, application_id: &str) -> Result<(), ClientError>;

    async fn delete_service_status(
        &self,
        application_id: &str,
        service: &str,
    ) -> Result<(), ClientError>;
}

/// Routes both status capabilities through the control-plane client.
pub struct ClientStatusApi {
    client: Arc<dyn ControlPlaneClient>,
}

impl ClientStatusApi {
    pub fn new(client: Arc<dyn ControlPlaneClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StatusReporter for ClientStatusApi {
    async fn set_application_status(
        &self,
        application_id: &str,
        current_release_id: &str,
    ) -> Result<(), ClientError> {
        self.client
            .set_application_status(application_id, current_release_id)
            .await
    }

    async fn set_service_status(
        &self,
        application_id: &str,
        service: &str,
        current_release_id: &str,
    ) -> Result<(), ClientError> {
        self.client
            .set_service_status(application_id, service, current_release_id)
            .await
    }
}

#[async_trait]
impl StatusPruner for ClientStatusApi {
    async fn delete_application_status(&self, application_id: &str) -> Result<(), ClientError> {
        self.client.delete_application_status(application_id).await
    }

    async fn delete_service_status(
        &self,
        application_id: &str,
        service: &str,
    ) -> Result<(), ClientError> {
        self.client.delete_service_status(application_id, service).await
    }
}
