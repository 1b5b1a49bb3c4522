// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Centralized configuration management for the ibidem server.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`IBIDEM_SERVER_*`)
//!
//! # Usage
//!
//! ```ignore
//! use ibidem_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("Server listening on {}:{}", config.http.host, config.http.port);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub http: HttpConfig,
	pub mode: Mode,
	pub oidc: OidcConfig,
	pub kubernetes: KubernetesConfig,
	pub subjects: SubjectsConfig,
	pub logging: LoggingConfig,
}

impl ServerConfig {
	/// Get the socket address string for binding.
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.http.host, self.http.port)
	}
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`IBIDEM_SERVER_*`)
/// 2. Config file (`/etc/ibidem/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
pub fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let http = layer.http.unwrap_or_default().finalize();
	let mode = match layer.mode {
		Some(raw) => raw
			.parse::<Mode>()
			.map_err(|message| ConfigError::InvalidValue {
				key: "mode".to_string(),
				message,
			})?,
		None => Mode::default(),
	};
	let oidc = layer.oidc.unwrap_or_default().finalize();
	let kubernetes = layer.kubernetes.unwrap_or_default().finalize();
	let subjects = layer.subjects.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	let config = ServerConfig {
		http,
		mode,
		oidc,
		kubernetes,
		subjects,
		logging,
	};
	validate_config(&config)?;

	info!(
		host = %config.http.host,
		port = config.http.port,
		mode = %config.mode,
		issuer = %config.oidc.issuer,
		audience = %config.oidc.audience,
		required_ref = %config.oidc.required_ref,
		cluster_address = %config.kubernetes.advertised_cluster_address,
		subjects_path = ?config.subjects.path,
		inline_subjects = config.subjects.entries.len(),
		"Server configuration loaded"
	);

	Ok(config)
}

/// Validate cross-field configuration rules.
fn validate_config(config: &ServerConfig) -> Result<(), ConfigError> {
	if config.kubernetes.advertised_cluster_address.trim().is_empty() {
		return Err(ConfigError::Validation(
			"kubernetes.advertised_cluster_address must not be empty".to_string(),
		));
	}

	if config.oidc.fetch_timeout_secs == 0 {
		return Err(ConfigError::Validation(
			"oidc.fetch_timeout_secs must be greater than zero".to_string(),
		));
	}

	if config.kubernetes.request_timeout_secs == 0 {
		return Err(ConfigError::Validation(
			"kubernetes.request_timeout_secs must be greater than zero".to_string(),
		));
	}

	if matches!(config.kubernetes.token_expiration_secs, Some(secs) if secs <= 0) {
		return Err(ConfigError::Validation(
			"kubernetes.token_expiration_secs must be positive when set".to_string(),
		));
	}

	if config.oidc.audience.is_empty() || config.oidc.issuer.is_empty() {
		return Err(ConfigError::Validation(
			"oidc.issuer and oidc.audience must not be empty".to_string(),
		));
	}

	Ok(())
}
