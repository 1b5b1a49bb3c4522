// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Kubeconfig documents wrapping a freshly issued credential.
//!
//! The shape follows the `kubectl` client configuration format: one cluster,
//! one user and one context, all named `default`.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ibidem_server_k8s::IssuedCredential;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use utoipa::ToSchema;

const ENTRY_NAME: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct KubeConfig {
	#[serde(rename = "apiVersion")]
	pub api_version: String,
	pub kind: String,
	pub clusters: Vec<NamedCluster>,
	pub users: Vec<NamedUser>,
	pub contexts: Vec<NamedContext>,
	#[serde(rename = "current-context")]
	pub current_context: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NamedCluster {
	pub name: String,
	pub cluster: Cluster,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub struct Cluster {
	pub server: String,
	/// Base64 PEM bundle. Absent means the client's own trust store applies.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub certificate_authority_data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NamedUser {
	pub name: String,
	pub user: User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct User {
	pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NamedContext {
	pub name: String,
	pub context: Context,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Context {
	pub cluster: String,
	pub user: String,
	pub namespace: String,
}

/// Build a single-cluster kubeconfig for `credential`.
pub fn assemble(
	cluster_address: &str,
	ca_bytes: Option<&[u8]>,
	namespace: &str,
	credential: &IssuedCredential,
) -> KubeConfig {
	KubeConfig {
		api_version: "v1".to_string(),
		kind: "Config".to_string(),
		clusters: vec![NamedCluster {
			name: ENTRY_NAME.to_string(),
			cluster: Cluster {
				server: cluster_address.to_string(),
				certificate_authority_data: ca_bytes.map(|bytes| STANDARD.encode(bytes)),
			},
		}],
		users: vec![NamedUser {
			name: ENTRY_NAME.to_string(),
			user: User {
				token: credential.bearer_token.clone(),
			},
		}],
		contexts: vec![NamedContext {
			name: ENTRY_NAME.to_string(),
			context: Context {
				cluster: ENTRY_NAME.to_string(),
				user: ENTRY_NAME.to_string(),
				namespace: namespace.to_string(),
			},
		}],
		current_context: ENTRY_NAME.to_string(),
	}
}

/// Read the cluster CA bundle once at startup.
///
/// A missing or unreadable file is not fatal: documents are then issued
/// without `certificate-authority-data`.
pub fn load_ca_bundle(path: &Path) -> Option<Vec<u8>> {
	match std::fs::read(path) {
		Ok(bytes) if bytes.is_empty() => {
			warn!(path = %path.display(), "CA bundle is empty, omitting it from kubeconfigs");
			None
		}
		Ok(bytes) => {
			debug!(path = %path.display(), bytes = bytes.len(), "loaded CA bundle");
			Some(bytes)
		}
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
			debug!(path = %path.display(), "no CA bundle found");
			None
		}
		Err(e) => {
			warn!(path = %path.display(), error = %e, "failed to read CA bundle");
			None
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn credential() -> IssuedCredential {
		IssuedCredential {
			bearer_token: "minted-token".to_string(),
			expires_at: None,
		}
	}

	#[test]
	fn uses_kubeconfig_key_casing() {
		let config = assemble(
			"https://k8s.example:6443",
			Some(b"-----BEGIN CERTIFICATE-----"),
			"default",
			&credential(),
		);
		let value = serde_json::to_value(&config).unwrap();

		assert_eq!(value["apiVersion"], "v1");
		assert_eq!(value["kind"], "Config");
		assert_eq!(value["current-context"], "default");
		assert_eq!(value["clusters"][0]["cluster"]["server"], "https://k8s.example:6443");
		assert_eq!(
			value["clusters"][0]["cluster"]["certificate-authority-data"],
			STANDARD.encode(b"-----BEGIN CERTIFICATE-----")
		);
		assert_eq!(value["users"][0]["user"]["token"], "minted-token");
		assert_eq!(value["contexts"][0]["context"]["namespace"], "default");
	}

	#[test]
	fn absent_ca_is_omitted_not_empty() {
		let config = assemble("http://localhost:8001", None, "prod", &credential());
		let value = serde_json::to_value(&config).unwrap();
		let cluster = value["clusters"][0]["cluster"].as_object().unwrap();

		assert!(!cluster.contains_key("certificate-authority-data"));
		assert_eq!(value["contexts"][0]["context"]["namespace"], "prod");
	}

	#[test]
	fn single_entry_of_each_kind_all_named_default() {
		let config = assemble("http://localhost:8001", None, "default", &credential());

		assert_eq!(config.clusters.len(), 1);
		assert_eq!(config.users.len(), 1);
		assert_eq!(config.contexts.len(), 1);
		assert_eq!(config.clusters[0].name, "default");
		assert_eq!(config.users[0].name, "default");
		assert_eq!(config.contexts[0].context.cluster, "default");
		assert_eq!(config.contexts[0].context.user, "default");
	}

	#[test]
	fn renders_as_yaml_with_same_keys() {
		let config = assemble("http://localhost:8001", Some(b"ca"), "default", &credential());
		let yaml = serde_yaml::to_string(&config).unwrap();

		assert!(yaml.contains("apiVersion: v1"));
		assert!(yaml.contains("current-context: default"));
		assert!(yaml.contains("certificate-authority-data: Y2E="));
	}

	#[test]
	fn missing_ca_file_is_tolerated() {
		assert_eq!(load_ca_bundle(Path::new("/nonexistent/ca.crt")), None);
	}

	#[test]
	fn ca_file_is_read() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("ca.crt");
		std::fs::write(&path, b"pem bytes").unwrap();

		assert_eq!(load_ca_bundle(&path), Some(b"pem bytes".to_vec()));
	}
}
