// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cluster-facing configuration.

use std::path::PathBuf;

use serde::Deserialize;

/// Where in-cluster workloads find the cluster CA certificate.
pub const DEFAULT_CA_CERT_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";

/// Cluster configuration (runtime, fully resolved).
#[derive(Debug, Clone)]
pub struct KubernetesConfig {
	/// Cluster API address written into generated kubeconfigs.
	pub advertised_cluster_address: String,
	pub ca_cert_path: PathBuf,
	pub request_timeout_secs: u64,
	/// Requested lifetime of minted credentials; `None` leaves it to the cluster.
	pub token_expiration_secs: Option<i64>,
}

impl Default for KubernetesConfig {
	fn default() -> Self {
		KubernetesConfigLayer::default().finalize()
	}
}

/// Cluster configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KubernetesConfigLayer {
	#[serde(default)]
	pub advertised_cluster_address: Option<String>,
	#[serde(default)]
	pub ca_cert_path: Option<PathBuf>,
	#[serde(default)]
	pub request_timeout_secs: Option<u64>,
	#[serde(default)]
	pub token_expiration_secs: Option<i64>,
}

impl KubernetesConfigLayer {
	pub fn merge(&mut self, other: KubernetesConfigLayer) {
		if other.advertised_cluster_address.is_some() {
			self.advertised_cluster_address = other.advertised_cluster_address;
		}
		if other.ca_cert_path.is_some() {
			self.ca_cert_path = other.ca_cert_path;
		}
		if other.request_timeout_secs.is_some() {
			self.request_timeout_secs = other.request_timeout_secs;
		}
		if other.token_expiration_secs.is_some() {
			self.token_expiration_secs = other.token_expiration_secs;
		}
	}

	pub fn finalize(self) -> KubernetesConfig {
		KubernetesConfig {
			advertised_cluster_address: self
				.advertised_cluster_address
				.unwrap_or_else(|| "http://localhost:8001".to_string()),
			ca_cert_path: self
				.ca_cert_path
				.unwrap_or_else(|| PathBuf::from(DEFAULT_CA_CERT_PATH)),
			request_timeout_secs: self.request_timeout_secs.unwrap_or(10),
			token_expiration_secs: self.token_expiration_secs,
		}
	}
}
