// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Liveness and readiness probes.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::AppState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
	pub status: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReadinessResponse {
	pub status: String,
	pub mode: String,
	pub registry_version: u64,
	pub subjects: usize,
}

#[utoipa::path(
    get,
    path = "/_/healthy",
    responses(
        (status = 200, description = "Process is alive", body = HealthResponse)
    ),
    tag = "health"
)]
/// GET /_/healthy - Liveness probe.
pub async fn healthy() -> Json<HealthResponse> {
	Json(HealthResponse {
		status: "ok".to_string(),
	})
}

#[utoipa::path(
    get,
    path = "/_/ready",
    responses(
        (status = 200, description = "Ready to exchange tokens", body = ReadinessResponse)
    ),
    tag = "health"
)]
/// GET /_/ready - Readiness probe reporting the published subject table.
pub async fn ready(State(state): State<AppState>) -> Json<ReadinessResponse> {
	let table = state.registry.snapshot();
	Json(ReadinessResponse {
		status: "ready".to_string(),
		mode: state.mode.to_string(),
		registry_version: table.version(),
		subjects: table.len(),
	})
}
