// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::authentication::v1::{TokenRequest, TokenRequestSpec};
use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{
	api::{Api, PostParams},
	Client,
};
use tracing::{debug, instrument};

use crate::client::K8sClient;
use crate::error::K8sError;
use crate::types::{IssuedCredential, TokenOptions};

/// Default bound on a single control plane call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Production K8s client implementation using the kube crate.
pub struct KubeClient {
	client: Client,
	request_timeout: Duration,
}

impl KubeClient {
	/// Create a new KubeClient that auto-discovers cluster configuration.
	///
	/// This will attempt to load config from:
	/// 1. In-cluster service account (when running in K8s)
	/// 2. KUBECONFIG environment variable
	/// 3. ~/.kube/config
	pub async fn new() -> Result<Self, K8sError> {
		let client = Client::try_default().await?;
		debug!("K8s client initialized");
		Ok(Self::from_client(client))
	}

	/// Wrap an already configured kube client.
	pub fn from_client(client: Client) -> Self {
		Self {
			client,
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
		}
	}

	/// Bound every control plane call by `timeout`.
	pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;
		self
	}
}

fn token_request(namespace: &str, service_account: &str, options: &TokenOptions) -> TokenRequest {
	TokenRequest {
		metadata: ObjectMeta {
			name: Some(service_account.to_string()),
			namespace: Some(namespace.to_string()),
			..Default::default()
		},
		spec: TokenRequestSpec {
			// Empty means the API server's default audience.
			audiences: Vec::new(),
			bound_object_ref: None,
			expiration_seconds: options.expiration_seconds,
		},
		status: None,
	}
}

fn map_api_error(err: kube::Error, namespace: &str, service_account: &str) -> K8sError {
	match err {
		kube::Error::Api(ref response) if response.code == 404 => K8sError::ServiceAccountNotFound {
			namespace: namespace.into(),
			name: service_account.into(),
		},
		kube::Error::Api(ref response) if response.code == 403 => K8sError::Forbidden {
			message: response.message.clone(),
		},
		e => e.into(),
	}
}

#[async_trait]
impl K8sClient for KubeClient {
	#[instrument(skip(self, options), fields(namespace = %namespace, service_account = %service_account))]
	async fn create_service_account_token(
		&self,
		namespace: &str,
		service_account: &str,
		options: &TokenOptions,
	) -> Result<IssuedCredential, K8sError> {
		let request = token_request(namespace, service_account, options);
		let body = serde_json::to_vec(&request).map_err(|e| K8sError::Encode {
			message: e.to_string(),
		})?;

		let service_accounts: Api<ServiceAccount> = Api::namespaced(self.client.clone(), namespace);
		let post_params = PostParams::default();
		let call = service_accounts.create_subresource::<TokenRequest>(
			"token",
			service_account,
			&post_params,
			body,
		);

		let response = tokio::time::timeout(self.request_timeout, call)
			.await
			.map_err(|_| K8sError::Timeout)?
			.map_err(|e| map_api_error(e, namespace, service_account))?;

		let status = response.status.ok_or(K8sError::MissingStatus)?;
		debug!(expires_at = %status.expiration_timestamp.0, "service account token minted");

		Ok(IssuedCredential {
			bearer_token: status.token,
			expires_at: Some(status.expiration_timestamp.0),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;
	use wiremock::matchers::{body_partial_json, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	const TOKEN_PATH: &str = "/api/v1/namespaces/default/serviceaccounts/deploy-svc/token";

	async fn client_for(server: &MockServer) -> KubeClient {
		let uri: http::Uri = server.uri().parse().unwrap();
		let client = Client::try_from(kube::Config::new(uri)).unwrap();
		KubeClient::from_client(client).with_request_timeout(Duration::from_secs(5))
	}

	fn status_body(code: u16, reason: &str, message: &str) -> serde_json::Value {
		json!({
			"kind": "Status",
			"apiVersion": "v1",
			"metadata": {},
			"status": "Failure",
			"message": message,
			"reason": reason,
			"code": code,
		})
	}

	#[test]
	fn token_request_has_no_audience_restriction() {
		let request = token_request("default", "deploy-svc", &TokenOptions::default());
		assert!(request.spec.audiences.is_empty());
		assert!(request.spec.bound_object_ref.is_none());
		assert_eq!(request.spec.expiration_seconds, None);
		assert_eq!(request.metadata.name.as_deref(), Some("deploy-svc"));
		assert_eq!(request.metadata.namespace.as_deref(), Some("default"));
	}

	#[test]
	fn token_request_carries_requested_lifetime() {
		let options = TokenOptions {
			expiration_seconds: Some(600),
		};
		let request = token_request("default", "deploy-svc", &options);
		assert_eq!(request.spec.expiration_seconds, Some(600));
	}

	#[tokio::test]
	async fn mints_token_through_subresource() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path(TOKEN_PATH))
			.and(body_partial_json(json!({ "spec": { "audiences": [] } })))
			.respond_with(ResponseTemplate::new(201).set_body_json(json!({
				"kind": "TokenRequest",
				"apiVersion": "authentication.k8s.io/v1",
				"metadata": { "name": "deploy-svc", "namespace": "default" },
				"spec": { "audiences": ["https://kubernetes.default.svc"] },
				"status": {
					"token": "minted-token",
					"expirationTimestamp": "2026-10-16T12:00:00Z"
				}
			})))
			.expect(1)
			.mount(&server)
			.await;

		let client = client_for(&server).await;
		let credential = client
			.create_service_account_token("default", "deploy-svc", &TokenOptions::default())
			.await
			.unwrap();

		assert_eq!(credential.bearer_token, "minted-token");
		assert_eq!(
			credential.expires_at.map(|t| t.to_rfc3339()),
			Some("2026-10-16T12:00:00+00:00".to_string())
		);
	}

	#[tokio::test]
	async fn missing_service_account_maps_to_not_found() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path(TOKEN_PATH))
			.respond_with(ResponseTemplate::new(404).set_body_json(status_body(
				404,
				"NotFound",
				"serviceaccounts \"deploy-svc\" not found",
			)))
			.mount(&server)
			.await;

		let client = client_for(&server).await;
		let err = client
			.create_service_account_token("default", "deploy-svc", &TokenOptions::default())
			.await
			.unwrap_err();

		assert!(matches!(err, K8sError::ServiceAccountNotFound { .. }));
	}

	#[tokio::test]
	async fn access_denied_maps_to_forbidden() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path(TOKEN_PATH))
			.respond_with(ResponseTemplate::new(403).set_body_json(status_body(
				403,
				"Forbidden",
				"cannot create resource \"serviceaccounts/token\"",
			)))
			.mount(&server)
			.await;

		let client = client_for(&server).await;
		let err = client
			.create_service_account_token("default", "deploy-svc", &TokenOptions::default())
			.await
			.unwrap_err();

		assert!(matches!(err, K8sError::Forbidden { .. }));
	}

	#[tokio::test]
	async fn slow_control_plane_times_out() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path(TOKEN_PATH))
			.respond_with(ResponseTemplate::new(201).set_delay(Duration::from_secs(5)))
			.mount(&server)
			.await;

		let uri: http::Uri = server.uri().parse().unwrap();
		let client = KubeClient::from_client(Client::try_from(kube::Config::new(uri)).unwrap())
			.with_request_timeout(Duration::from_millis(100));
		let err = client
			.create_service_account_token("default", "deploy-svc", &TokenOptions::default())
			.await
			.unwrap_err();

		assert!(matches!(err, K8sError::Timeout));
	}
}
