// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Application state and router construction.

use std::sync::Arc;
use std::time::Duration;

use axum::{
	routing::{get, post},
	Json, Router,
};
use ibidem_server_config::{Mode, ServerConfig};
use ibidem_server_k8s::{K8sClient, TokenOptions};
use ibidem_server_oidc::{ClaimsPolicy, KeyFetchError, SigningKeyProvider};
use utoipa::OpenApi;

use crate::exchange::TokenExchange;
use crate::kubeconfig::load_ca_bundle;
use crate::registry::{RegistryError, SubjectRegistry};
use crate::routes;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
	pub exchange: Arc<TokenExchange>,
	pub registry: SubjectRegistry,
	/// Cluster address written into kubeconfig documents.
	pub cluster_address: Arc<str>,
	/// CA bundle read once at startup.
	pub ca_bundle: Option<Arc<[u8]>>,
	pub mode: Mode,
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
	#[error("Failed to build subject registry: {0}")]
	Registry(#[from] RegistryError),

	#[error("Failed to build signing key provider: {0}")]
	KeyProvider(#[from] KeyFetchError),
}

/// Build the subject registry from the configured file, or from the inline
/// entries when no file is configured.
pub fn build_registry(config: &ServerConfig) -> Result<SubjectRegistry, RegistryError> {
	match &config.subjects.path {
		Some(path) => {
			if !config.subjects.entries.is_empty() {
				tracing::warn!(
					path = %path.display(),
					"subjects file configured, ignoring inline subject entries"
				);
			}
			SubjectRegistry::from_file(path)
		}
		None => SubjectRegistry::new(config.subjects.entries.clone()),
	}
}

/// Build the key provider selected by the operating mode.
pub fn build_key_provider(config: &ServerConfig) -> Result<SigningKeyProvider, KeyFetchError> {
	match config.mode {
		Mode::Debug => Ok(SigningKeyProvider::debug()),
		Mode::Release => SigningKeyProvider::jwks(
			config.oidc.jwks_url.clone(),
			Duration::from_secs(config.oidc.fetch_timeout_secs),
		),
	}
}

/// Wire the exchange together from resolved configuration.
pub fn create_app_state(
	config: &ServerConfig,
	k8s: Arc<dyn K8sClient>,
) -> Result<AppState, StartupError> {
	let registry = build_registry(config)?;
	let keys = build_key_provider(config)?;
	let ca_bundle: Option<Arc<[u8]>> = load_ca_bundle(&config.kubernetes.ca_cert_path).map(Arc::from);

	let policy = ClaimsPolicy::new(
		config.oidc.issuer.clone(),
		config.oidc.audience.clone(),
		config.oidc.required_ref.clone(),
	);
	let token_options = TokenOptions {
		expiration_seconds: config.kubernetes.token_expiration_secs,
	};

	tracing::info!(
		mode = %config.mode,
		key_source = keys.source_name(),
		registry_version = registry.version(),
		subjects = registry.snapshot().len(),
		ca_bundle = ca_bundle.is_some(),
		"token exchange ready"
	);

	let exchange = TokenExchange::new(
		Arc::new(keys),
		policy,
		registry.clone(),
		k8s,
		token_options,
	);

	Ok(AppState {
		exchange: Arc::new(exchange),
		registry,
		cluster_address: Arc::from(config.kubernetes.advertised_cluster_address.as_str()),
		ca_bundle,
		mode: config.mode,
	})
}

pub fn create_router(state: AppState) -> Router {
	Router::new()
		.route("/token", post(routes::token::exchange_token))
		.route("/token/kubeconfig", post(routes::token::exchange_kubeconfig))
		.route("/_/healthy", get(routes::health::healthy))
		.route("/_/ready", get(routes::health::ready))
		.route(
			"/api/openapi.json",
			get(|| async { Json(crate::api_docs::ApiDoc::openapi()) }),
		)
		.with_state(state)
}
