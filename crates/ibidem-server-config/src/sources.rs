// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	HttpConfigLayer, KubernetesConfigLayer, LoggingConfigLayer, OidcConfigLayer, Subject,
	SubjectsConfigLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file configuration source.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/ibidem/server.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: IBIDEM_SERVER_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		layer_from_env(&Env::process())
	}
}

/// Variable lookup, swappable so tests never touch the process environment.
pub(crate) struct Env<'a> {
	lookup: Box<dyn Fn(&str) -> Option<String> + 'a>,
}

impl<'a> Env<'a> {
	fn process() -> Self {
		Self::from_fn(|name| std::env::var(name).ok())
	}

	pub(crate) fn from_fn(lookup: impl Fn(&str) -> Option<String> + 'a) -> Self {
		Self {
			lookup: Box::new(lookup),
		}
	}

	fn var(&self, name: &str) -> Option<String> {
		(self.lookup)(name).filter(|s| !s.is_empty())
	}

	fn bool(&self, name: &str) -> Option<bool> {
		self.var(name)
			.map(|v| v.eq_ignore_ascii_case("true") || v == "1")
	}

	fn parsed<T: std::str::FromStr>(&self, name: &str, kind: &str) -> Result<Option<T>, ConfigError> {
		match self.var(name) {
			Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
				key: name.to_string(),
				message: format!("invalid {kind} value '{v}'"),
			}),
			None => Ok(None),
		}
	}

	fn u16(&self, name: &str) -> Result<Option<u16>, ConfigError> {
		self.parsed(name, "u16")
	}

	fn u64(&self, name: &str) -> Result<Option<u64>, ConfigError> {
		self.parsed(name, "u64")
	}

	fn i64(&self, name: &str) -> Result<Option<i64>, ConfigError> {
		self.parsed(name, "i64")
	}
}

pub(crate) fn layer_from_env(env: &Env<'_>) -> Result<ServerConfigLayer, ConfigError> {
	Ok(ServerConfigLayer {
		http: Some(load_http_from_env(env)?),
		mode: env.var("IBIDEM_SERVER_MODE"),
		oidc: Some(load_oidc_from_env(env)?),
		kubernetes: Some(load_kubernetes_from_env(env)?),
		subjects: Some(load_subjects_from_env(env)?),
		logging: Some(load_logging_from_env(env)),
	})
}

fn load_http_from_env(env: &Env<'_>) -> Result<HttpConfigLayer, ConfigError> {
	Ok(HttpConfigLayer {
		host: env.var("IBIDEM_SERVER_HOST"),
		port: env.u16("IBIDEM_SERVER_PORT")?,
	})
}

fn load_oidc_from_env(env: &Env<'_>) -> Result<OidcConfigLayer, ConfigError> {
	Ok(OidcConfigLayer {
		issuer: env.var("IBIDEM_SERVER_OIDC_ISSUER"),
		audience: env.var("IBIDEM_SERVER_OIDC_AUDIENCE"),
		required_ref: env.var("IBIDEM_SERVER_OIDC_REQUIRED_REF"),
		jwks_url: env.var("IBIDEM_SERVER_OIDC_JWKS_URL"),
		fetch_timeout_secs: env.u64("IBIDEM_SERVER_OIDC_FETCH_TIMEOUT_SECS")?,
	})
}

fn load_kubernetes_from_env(env: &Env<'_>) -> Result<KubernetesConfigLayer, ConfigError> {
	Ok(KubernetesConfigLayer {
		advertised_cluster_address: env.var("IBIDEM_SERVER_ADVERTISED_CLUSTER_ADDRESS"),
		ca_cert_path: env.var("IBIDEM_SERVER_CA_CERT_PATH").map(PathBuf::from),
		request_timeout_secs: env.u64("IBIDEM_SERVER_K8S_REQUEST_TIMEOUT_SECS")?,
		token_expiration_secs: env.i64("IBIDEM_SERVER_K8S_TOKEN_EXPIRATION_SECS")?,
	})
}

/// `IBIDEM_SERVER_SUBJECTS` carries a JSON array of subject objects.
fn load_subjects_from_env(env: &Env<'_>) -> Result<SubjectsConfigLayer, ConfigError> {
	let entries = match env.var("IBIDEM_SERVER_SUBJECTS") {
		Some(raw) => Some(serde_json::from_str::<Vec<Subject>>(&raw).map_err(|e| {
			ConfigError::InvalidValue {
				key: "IBIDEM_SERVER_SUBJECTS".to_string(),
				message: format!("expected a JSON array of subjects: {e}"),
			}
		})?),
		None => None,
	};

	Ok(SubjectsConfigLayer {
		path: env.var("IBIDEM_SERVER_SUBJECTS_PATH").map(PathBuf::from),
		entries,
	})
}

fn load_logging_from_env(env: &Env<'_>) -> LoggingConfigLayer {
	LoggingConfigLayer {
		level: env.var("IBIDEM_SERVER_LOG_LEVEL"),
		json: env.bool("IBIDEM_SERVER_LOG_JSON"),
	}
}
