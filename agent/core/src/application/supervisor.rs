// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

use crate::domain::bundle::Application;
use crate::domain::status::StatusReporter;

/// Boundary to the workload supervisor. Scheduling of individual workloads
/// is out of scope for this core; this component records the desired set,
/// keeps it observable for the device API, and reports per-application and
/// per-service status through the injected reporter capability.
pub struct WorkloadSupervisor {
    reporter: Arc<dyn StatusReporter>,
    applications: RwLock<Vec<Application>>,
}

impl WorkloadSupervisor {
    pub fn new(reporter: Arc<dyn StatusReporter>) -> Self {
        Self {
            reporter,
            applications: RwLock::new(Vec::new()),
        }
    }

    /// Apply a new desired set. Invoked synchronously by the reconciliation
    /// loop (the sole writer); report failures are recoverable-per-cycle and
    /// the next bundle push retries them naturally.
    pub async fn set_applications(&self, applications: Vec<Application>) {
        *self.applications.write() = applications.clone();

        for application in &applications {
            if let Err(err) = self
                .reporter
                .set_application_status(&application.id, &application.release_id)
                .await
            {
                warn!(application = %application.id, error = %err, "report application status");
            }

            for service in &application.services {
                if let Err(err) = self
                    .reporter
                    .set_service_status(&application.id, service, &application.release_id)
                    .await
                {
                    warn!(
                        application = %application.id,
                        service = %service,
                        error = %err,
                        "report service status"
                    );
                }
            }
        }
    }

    /// The most recently applied desired set.
    pub fn current_applications(&self) -> Vec<Application> {
        self.applications.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::client::ClientError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingReporter {
        application_reports: parking_lot::Mutex<Vec<(String, String)>>,
        service_reports: parking_lot::Mutex<Vec<(String, String, String)>>,
        failures: AtomicUsize,
    }

    #[async_trait]
    impl StatusReporter for RecordingReporter {
        async fn set_application_status(
            &self,
            application_id: &str,
            current_release_id: &str,
        ) -> Result<(), ClientError> {
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(ClientError::Transport("offline".into()));
            }
            self.application_reports
                .lock()
                .push((application_id.into(), current_release_id.into()));
            Ok(())
        }

        async fn set_service_status(
            &self,
            application_id: &str,
            service: &str,
            current_release_id: &str,
        ) -> Result<(), ClientError> {
            self.service_reports.lock().push((
                application_id.into(),
                service.into(),
                current_release_id.into(),
            ));
            Ok(())
        }
    }

    fn app(id: &str, release: &str, services: &[&str]) -> Application {
        Application {
            id: id.into(),
            release_id: release.into(),
            services: services.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn applying_a_set_reports_every_application_and_service() {
        let reporter = Arc::new(RecordingReporter::default());
        let supervisor = WorkloadSupervisor::new(reporter.clone());

        supervisor
            .set_applications(vec![app("app_1", "rel_1", &["web", "worker"])])
            .await;

        assert_eq!(
            supervisor.current_applications(),
            vec![app("app_1", "rel_1", &["web", "worker"])]
        );
        assert_eq!(
            *reporter.application_reports.lock(),
            vec![("app_1".to_string(), "rel_1".to_string())]
        );
        assert_eq!(reporter.service_reports.lock().len(), 2);
    }

    #[tokio::test]
    async fn report_failure_does_not_block_applying_the_set() {
        let reporter = Arc::new(RecordingReporter {
            failures: AtomicUsize::new(1),
            ..Default::default()
        });
        let supervisor = WorkloadSupervisor::new(reporter.clone());

        supervisor
            .set_applications(vec![app("app_1", "rel_1", &["web"])])
            .await;

        // The desired set is applied and the service report still went out.
        assert_eq!(supervisor.current_applications().len(), 1);
        assert_eq!(reporter.service_reports.lock().len(), 1);
    }
}
