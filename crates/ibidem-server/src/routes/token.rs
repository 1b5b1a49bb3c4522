// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Token exchange HTTP handlers.

use axum::{
	extract::{rejection::JsonRejection, State},
	http::{header, HeaderMap, HeaderValue},
	response::{IntoResponse, Response},
	Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::AppState;
use crate::error::{ErrorResponse, ExchangeError};
use crate::exchange::ExchangeOutcome;
use crate::kubeconfig::{assemble, KubeConfig};

/// Request body shared by both exchange endpoints.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct TokenExchangeRequest {
	/// Compact JWT issued by the CI workload identity provider.
	pub token: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct TokenExchangeResponse {
	pub token: String,
	pub service_account: String,
	pub namespace: String,
}

const YAML_MEDIA_TYPES: [&str; 2] = ["application/yaml", "application/x-yaml"];

async fn run_exchange(
	state: &AppState,
	payload: Result<Json<TokenExchangeRequest>, JsonRejection>,
) -> Result<ExchangeOutcome, ExchangeError> {
	let Json(request) = payload.map_err(|e| ExchangeError::BadRequest(e.body_text()))?;
	state.exchange.exchange(&request.token).await
}

#[utoipa::path(
    post,
    path = "/token",
    request_body = TokenExchangeRequest,
    responses(
        (status = 200, description = "Credential issued", body = TokenExchangeResponse),
        (status = 400, description = "Malformed token or claim policy violation", body = ErrorResponse),
        (status = 401, description = "Token has expired", body = ErrorResponse),
        (status = 404, description = "Repository is not authorized", body = ErrorResponse),
        (status = 500, description = "Signing keys unavailable", body = ErrorResponse),
        (status = 502, description = "Cluster refused to issue a credential", body = ErrorResponse),
        (status = 504, description = "Cluster did not answer in time", body = ErrorResponse)
    ),
    tag = "token"
)]
/// POST /token - Exchange an identity token for a service account token.
pub async fn exchange_token(
	State(state): State<AppState>,
	payload: Result<Json<TokenExchangeRequest>, JsonRejection>,
) -> Result<Json<TokenExchangeResponse>, ExchangeError> {
	let outcome = run_exchange(&state, payload).await?;
	Ok(Json(TokenExchangeResponse {
		token: outcome.credential.bearer_token,
		service_account: outcome.subject.service_account,
		namespace: outcome.subject.namespace,
	}))
}

#[utoipa::path(
    post,
    path = "/token/kubeconfig",
    request_body = TokenExchangeRequest,
    responses(
        (status = 200, description = "Kubeconfig for the issued credential, YAML when requested via Accept", body = KubeConfig),
        (status = 400, description = "Malformed token or claim policy violation", body = ErrorResponse),
        (status = 401, description = "Token has expired", body = ErrorResponse),
        (status = 404, description = "Repository is not authorized", body = ErrorResponse),
        (status = 500, description = "Signing keys unavailable", body = ErrorResponse),
        (status = 502, description = "Cluster refused to issue a credential", body = ErrorResponse),
        (status = 504, description = "Cluster did not answer in time", body = ErrorResponse)
    ),
    tag = "token"
)]
/// POST /token/kubeconfig - Exchange an identity token for a ready-to-use kubeconfig.
///
/// Responds with YAML when the `Accept` header asks for it, JSON otherwise.
pub async fn exchange_kubeconfig(
	State(state): State<AppState>,
	headers: HeaderMap,
	payload: Result<Json<TokenExchangeRequest>, JsonRejection>,
) -> Result<Response, ExchangeError> {
	let outcome = run_exchange(&state, payload).await?;
	let config = assemble(
		&state.cluster_address,
		state.ca_bundle.as_deref(),
		&outcome.subject.namespace,
		&outcome.credential,
	);

	if wants_yaml(&headers) {
		let body =
			serde_yaml::to_string(&config).map_err(|e| ExchangeError::Internal(e.to_string()))?;
		return Ok((
			[(header::CONTENT_TYPE, HeaderValue::from_static("application/yaml"))],
			body,
		)
			.into_response());
	}

	Ok(Json(config).into_response())
}

fn wants_yaml(headers: &HeaderMap) -> bool {
	headers
		.get_all(header::ACCEPT)
		.iter()
		.filter_map(|value| value.to_str().ok())
		.flat_map(|value| value.split(','))
		.filter_map(|item| item.split(';').next())
		.any(|media| {
			YAML_MEDIA_TYPES
				.iter()
				.any(|yaml| media.trim().eq_ignore_ascii_case(yaml))
		})
}
