// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::bundle::Bundle;
use crate::domain::status::StatusPruner;

/// Deletes stale per-application and per-service status records: records the
/// control plane still holds for this device but whose application or
/// service no longer appears in the current bundle.
pub struct StatusGarbageCollector {
    pruner: Arc<dyn StatusPruner>,
}

impl StatusGarbageCollector {
    pub fn new(pruner: Arc<dyn StatusPruner>) -> Self {
        Self { pruner }
    }

    /// Reconcile status records against a freshly fetched bundle. Delete
    /// failures are logged; the next bundle push retries them naturally.
    pub async fn set_bundle(&self, bundle: &Bundle) {
        let live_applications: HashSet<&str> = bundle
            .applications
            .iter()
            .map(|application| application.id.as_str())
            .collect();

        let live_services: HashSet<(&str, &str)> = bundle
            .applications
            .iter()
            .flat_map(|application| {
                application
                    .services
                    .iter()
                    .map(move |service| (application.id.as_str(), service.as_str()))
            })
            .collect();

        for status in &bundle.application_statuses {
            if live_applications.contains(status.application_id.as_str()) {
                continue;
            }
            debug!(application = %status.application_id, "deleting stale application status");
            if let Err(err) = self
                .pruner
                .delete_application_status(&status.application_id)
                .await
            {
                warn!(
                    application = %status.application_id,
                    error = %err,
                    "delete stale application status"
                );
            }
        }

        for status in &bundle.service_statuses {
            if live_services.contains(&(status.application_id.as_str(), status.service.as_str()))
            {
                continue;
            }
            debug!(
                application = %status.application_id,
                service = %status.service,
                "deleting stale service status"
            );
            if let Err(err) = self
                .pruner
                .delete_service_status(&status.application_id, &status.service)
                .await
            {
                warn!(
                    application = %status.application_id,
                    service = %status.service,
                    error = %err,
                    "delete stale service status"
                );
            }
        }
    }
}
