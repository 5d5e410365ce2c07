// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use parking_lot::RwLock;
use serde_json::json;

use crate::application::supervisor::WorkloadSupervisor;
use crate::application::updater::Updater;
use crate::domain::identity::DeviceId;

pub struct AppState {
    pub version: String,
    pub device_id: RwLock<Option<DeviceId>>,
    pub supervisor: Arc<WorkloadSupervisor>,
    pub updater: Arc<Updater>,
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/info", get(info))
        .route("/applications", get(applications))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let device_id = state
        .device_id
        .read()
        .as_ref()
        .map(|id| id.as_str().to_string());
    Json(json!({
        "agentVersion": state.version,
        "deviceId": device_id,
        "updatePending": state.updater.update_pending(),
    }))
}

async fn applications(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.supervisor.current_applications())
}
