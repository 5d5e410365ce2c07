// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The control-plane-declared desired state for a device: the applications it
/// should run, the status records the control plane currently holds for it,
/// and the agent's own desired configuration.
///
/// The agent only ever holds the single most-recently-fetched instance, and
/// persists it locally so a restart can resume workloads before the first
/// network round trip succeeds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    #[serde(default)]
    pub applications: Vec<Application>,

    /// Application statuses the control plane currently holds for this
    /// device; the status garbage collector compares these against
    /// `applications` to find stale records.
    #[serde(default)]
    pub application_statuses: Vec<ApplicationStatus>,

    #[serde(default)]
    pub service_statuses: Vec<ServiceStatus>,

    /// Serialized (YAML) configuration for the agent's own desired
    /// version/behavior. Decoded lazily: a malformed spec must not poison
    /// the rest of the bundle.
    #[serde(default)]
    pub desired_agent_spec: String,
}

/// One application the device should run, pinned to a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: String,
    pub release_id: String,
    #[serde(default)]
    pub services: Vec<String>,
}

/// A per-application status record as the control plane stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStatus {
    pub application_id: String,
    pub current_release_id: String,
}

/// A per-service status record as the control plane stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub application_id: String,
    pub service: String,
    pub current_release_id: String,
}

/// The agent's own desired service definition, embedded in the bundle as a
/// YAML string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentServiceSpec {
    pub image: String,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl AgentServiceSpec {
    pub fn parse(raw: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }

    /// The version carried by the image tag, when one is present.
    /// `registry/fleetd-agent:1.4.2` yields `1.4.2`.
    pub fn version(&self) -> Option<&str> {
        let (_, tag) = self.image.rsplit_once(':')?;
        // A slash after the colon means we split a registry port, not a tag.
        if tag.contains('/') {
            None
        } else {
            Some(tag)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_round_trips_camel_case_json() {
        let raw = r#"{
            "applications": [
                {"id": "app_1", "releaseId": "rel_9", "services": ["web"]}
            ],
            "applicationStatuses": [
                {"applicationId": "app_1", "currentReleaseId": "rel_8"}
            ],
            "serviceStatuses": [
                {"applicationId": "app_1", "service": "web", "currentReleaseId": "rel_8"}
            ],
            "desiredAgentSpec": "image: fleetd/agent:1.2.3\n"
        }"#;

        let bundle: Bundle = serde_json::from_str(raw).unwrap();
        assert_eq!(bundle.applications[0].release_id, "rel_9");
        assert_eq!(bundle.application_statuses[0].current_release_id, "rel_8");

        let reencoded = serde_json::to_string(&bundle).unwrap();
        assert!(reencoded.contains("desiredAgentSpec"));
    }

    #[test]
    fn bundle_tolerates_missing_fields() {
        let bundle: Bundle = serde_json::from_str("{}").unwrap();
        assert!(bundle.applications.is_empty());
        assert!(bundle.desired_agent_spec.is_empty());
    }

    #[test]
    fn agent_spec_parses_yaml_and_extracts_version() {
        let spec = AgentServiceSpec::parse("image: registry.example.com/fleetd/agent:2.0.1\n")
            .unwrap();
        assert_eq!(spec.version(), Some("2.0.1"));
    }

    #[test]
    fn agent_spec_without_tag_has_no_version() {
        let spec = AgentServiceSpec::parse("image: fleetd/agent\n").unwrap();
        assert_eq!(spec.version(), None);
    }

    #[test]
    fn agent_spec_registry_port_is_not_a_version() {
        let spec = AgentServiceSpec::parse("image: registry.example.com:5000/fleetd/agent\n")
            .unwrap();
        assert_eq!(spec.version(), None);
    }

    #[test]
    fn malformed_agent_spec_fails_to_parse() {
        assert!(AgentServiceSpec::parse("{{not yaml").is_err());
        // An empty document is also not a valid spec: `image` is required.
        assert!(AgentServiceSpec::parse("").is_err());
    }
}
