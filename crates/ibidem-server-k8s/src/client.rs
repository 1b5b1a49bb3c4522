// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use async_trait::async_trait;

use crate::error::K8sError;
use crate::types::{IssuedCredential, TokenOptions};

/// Trait for K8s client operations.
///
/// This abstraction allows for easy mocking in tests while providing
/// a clean interface for the one control plane call the exchange needs.
#[async_trait]
pub trait K8sClient: Send + Sync {
	/// Mint a bearer token for `service_account` in `namespace`.
	///
	/// Uses the service account `token` subresource with no audience
	/// restriction, so the token carries the cluster's default audience.
	/// Every call creates a new, independent token.
	///
	/// # Returns
	/// * `Ok(IssuedCredential)` - The token and its expiry, when reported
	/// * `Err(K8sError)` - If the control plane rejects the request
	async fn create_service_account_token(
		&self,
		namespace: &str,
		service_account: &str,
		options: &TokenOptions,
	) -> Result<IssuedCredential, K8sError>;
}
