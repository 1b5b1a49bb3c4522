// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use thiserror::Error;

/// Result type alias for signing key retrieval.
pub type KeyFetchResult<T> = Result<T, KeyFetchError>;

/// Errors raised while obtaining the issuer's verification keys.
#[derive(Error, Debug)]
pub enum KeyFetchError {
	#[error("Failed to build HTTP client: {message}")]
	Client { message: String },

	#[error("Key discovery endpoint unreachable: {message}")]
	Transport { message: String },

	#[error("Key discovery endpoint returned HTTP {status}")]
	Status { status: u16 },

	#[error("Key discovery document is invalid: {message}")]
	InvalidDocument { message: String },
}

/// Reasons an inbound identity token is refused.
///
/// Each variant maps to a distinct caller-facing outcome. `Expired` must never
/// be folded into `PolicyViolation`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
	/// Structure, encoding or signature could not be verified.
	#[error("Malformed token: {reason}")]
	Malformed { reason: String },

	/// The `exp` claim lies in the past.
	#[error("Token has expired")]
	Expired { repository: Option<String> },

	/// Signature is valid but a claim does not satisfy the policy.
	#[error("Claim policy violation: {reason}")]
	PolicyViolation {
		reason: String,
		repository: Option<String>,
	},
}

impl ValidationFailure {
	pub(crate) fn malformed(reason: impl Into<String>) -> Self {
		ValidationFailure::Malformed {
			reason: reason.into(),
		}
	}

	/// Repository claim carried by the rejected token, when it could be decoded.
	pub fn repository(&self) -> Option<&str> {
		match self {
			ValidationFailure::Malformed { .. } => None,
			ValidationFailure::Expired { repository }
			| ValidationFailure::PolicyViolation { repository, .. } => repository.as_deref(),
		}
	}
}
