// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::client::K8sClient;
use crate::error::{K8sError, K8sResult};
use crate::types::{IssuedCredential, TokenOptions};

/// One recorded call to [`MockK8sClient::create_service_account_token`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuanceCall {
	pub namespace: String,
	pub service_account: String,
	pub options: TokenOptions,
}

/// A mock K8s client for exercising credential issuance without a cluster.
///
/// Every call is recorded. Configured responses are returned in FIFO order;
/// once they run out, each call mints a distinct `mock-token-<n>`.
#[derive(Debug, Clone, Default)]
pub struct MockK8sClient {
	calls: Arc<Mutex<Vec<IssuanceCall>>>,
	responses: Arc<Mutex<VecDeque<K8sResult<IssuedCredential>>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockK8sClient {
	/// Create a new mock client.
	pub fn new() -> Self {
		Self::default()
	}

	/// Queue a response for the next call.
	pub fn add_response(&self, response: K8sResult<IssuedCredential>) {
		lock(&self.responses).push_back(response);
	}

	/// Queue a failure for the next call.
	pub fn fail_next(&self, error: K8sError) {
		self.add_response(Err(error));
	}

	/// All calls made so far, oldest first.
	pub fn calls(&self) -> Vec<IssuanceCall> {
		lock(&self.calls).clone()
	}

	pub fn call_count(&self) -> usize {
		lock(&self.calls).len()
	}
}

#[async_trait]
impl K8sClient for MockK8sClient {
	async fn create_service_account_token(
		&self,
		namespace: &str,
		service_account: &str,
		options: &TokenOptions,
	) -> Result<IssuedCredential, K8sError> {
		let call_number = {
			let mut calls = lock(&self.calls);
			calls.push(IssuanceCall {
				namespace: namespace.to_string(),
				service_account: service_account.to_string(),
				options: options.clone(),
			});
			calls.len()
		};

		match lock(&self.responses).pop_front() {
			Some(response) => response,
			None => Ok(IssuedCredential {
				bearer_token: format!("mock-token-{call_number}"),
				expires_at: None,
			}),
		}
	}
}
