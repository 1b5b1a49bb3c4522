// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Exchange error types and HTTP response conversions.
//!
//! Every failure of a token exchange ends up here. Components below the
//! orchestrator return their own error kinds; this is the only place they
//! are turned into status codes.

use axum::{
	http::StatusCode,
	response::{IntoResponse, Response},
	Json,
};
use ibidem_server_k8s::K8sError;
use ibidem_server_oidc::{KeyFetchError, ValidationFailure};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
	/// Request body was not the expected JSON shape.
	#[error("Invalid request: {0}")]
	BadRequest(String),

	#[error("Malformed token: {0}")]
	MalformedToken(String),

	#[error("Token has expired")]
	ExpiredToken,

	#[error("Claim policy violation: {0}")]
	ClaimPolicyViolation(String),

	#[error("Repository is not authorized: {repository}")]
	UnknownSubject { repository: String },

	#[error("Could not obtain signing keys: {0}")]
	KeyFetch(#[from] KeyFetchError),

	#[error("Credential issuance failed: {0}")]
	UpstreamIssuance(String),

	#[error("Credential issuance timed out")]
	UpstreamTimeout,

	/// Response body could not be rendered.
	#[error("Internal error: {0}")]
	Internal(String),
}

impl ExchangeError {
	pub fn status_code(&self) -> StatusCode {
		match self {
			ExchangeError::BadRequest(_)
			| ExchangeError::MalformedToken(_)
			| ExchangeError::ClaimPolicyViolation(_) => StatusCode::BAD_REQUEST,
			ExchangeError::ExpiredToken => StatusCode::UNAUTHORIZED,
			ExchangeError::UnknownSubject { .. } => StatusCode::NOT_FOUND,
			ExchangeError::KeyFetch(_) | ExchangeError::Internal(_) => {
				StatusCode::INTERNAL_SERVER_ERROR
			}
			ExchangeError::UpstreamIssuance(_) => StatusCode::BAD_GATEWAY,
			ExchangeError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
		}
	}

	/// Stable snake_case identifier returned in the `error` field.
	pub fn kind(&self) -> &'static str {
		match self {
			ExchangeError::BadRequest(_) => "bad_request",
			ExchangeError::MalformedToken(_) => "malformed_token",
			ExchangeError::ExpiredToken => "expired_token",
			ExchangeError::ClaimPolicyViolation(_) => "claim_policy_violation",
			ExchangeError::UnknownSubject { .. } => "unknown_subject",
			ExchangeError::KeyFetch(_) => "key_fetch_failed",
			ExchangeError::UpstreamIssuance(_) => "upstream_issuance_failed",
			ExchangeError::UpstreamTimeout => "upstream_timeout",
			ExchangeError::Internal(_) => "internal_error",
		}
	}
}

impl From<ValidationFailure> for ExchangeError {
	fn from(failure: ValidationFailure) -> Self {
		match failure {
			ValidationFailure::Malformed { reason } => ExchangeError::MalformedToken(reason),
			ValidationFailure::Expired { .. } => ExchangeError::ExpiredToken,
			ValidationFailure::PolicyViolation { reason, .. } => {
				ExchangeError::ClaimPolicyViolation(reason)
			}
		}
	}
}

impl From<K8sError> for ExchangeError {
	fn from(err: K8sError) -> Self {
		match err {
			K8sError::Timeout => ExchangeError::UpstreamTimeout,
			other => ExchangeError::UpstreamIssuance(other.to_string()),
		}
	}
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
	pub error: String,
	pub message: String,
}

impl IntoResponse for ExchangeError {
	fn into_response(self) -> Response {
		let status = self.status_code();
		let message = match &self {
			ExchangeError::KeyFetch(e) => {
				tracing::error!(error = %e, "signing key fetch failed");
				"Signing keys are unavailable".to_string()
			}
			ExchangeError::UpstreamIssuance(e) => {
				tracing::error!(error = %e, "credential issuance failed");
				"The cluster refused to issue a credential".to_string()
			}
			ExchangeError::Internal(e) => {
				tracing::error!(error = %e, "internal error");
				"An internal error occurred".to_string()
			}
			other => other.to_string(),
		};

		let body = ErrorResponse {
			error: self.kind().to_string(),
			message,
		};
		(status, Json(body)).into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn validation_failures_keep_distinct_statuses() {
		let malformed: ExchangeError = ValidationFailure::Malformed {
			reason: "bad signature".into(),
		}
		.into();
		let expired: ExchangeError = ValidationFailure::Expired { repository: None }.into();
		let policy: ExchangeError = ValidationFailure::PolicyViolation {
			reason: "ref mismatch".into(),
			repository: Some("org/repo".into()),
		}
		.into();

		assert_eq!(malformed.status_code(), StatusCode::BAD_REQUEST);
		assert_eq!(malformed.kind(), "malformed_token");
		assert_eq!(expired.status_code(), StatusCode::UNAUTHORIZED);
		assert_eq!(policy.status_code(), StatusCode::BAD_REQUEST);
		assert_eq!(policy.kind(), "claim_policy_violation");
	}

	#[test]
	fn issuance_timeout_is_gateway_timeout() {
		let err: ExchangeError = K8sError::Timeout.into();
		assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);

		let err: ExchangeError = K8sError::Forbidden {
			message: "denied".into(),
		}
		.into();
		assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
	}

	#[test]
	fn key_fetch_is_server_error() {
		let err: ExchangeError = KeyFetchError::Status { status: 503 }.into();
		assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(err.kind(), "key_fetch_failed");
	}

	#[test]
	fn unknown_subject_is_not_found() {
		let err = ExchangeError::UnknownSubject {
			repository: "org/unregistered".into(),
		};
		assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
		assert!(err.to_string().contains("org/unregistered"));
	}
}
