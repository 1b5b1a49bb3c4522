// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Workload identity token verification configuration.

use serde::Deserialize;

pub const DEFAULT_ISSUER: &str = "https://token.actions.githubusercontent.com";
pub const DEFAULT_JWKS_URL: &str = "https://token.actions.githubusercontent.com/.well-known/jwks";
pub const DEFAULT_AUDIENCE: &str = "ibidem.no:deploy";
pub const DEFAULT_REQUIRED_REF: &str = "refs/heads/main";

/// Token verification configuration (runtime, fully resolved).
#[derive(Debug, Clone)]
pub struct OidcConfig {
	pub issuer: String,
	pub audience: String,
	pub required_ref: String,
	pub jwks_url: String,
	/// Bound on a single key set fetch.
	pub fetch_timeout_secs: u64,
}

impl Default for OidcConfig {
	fn default() -> Self {
		OidcConfigLayer::default().finalize()
	}
}

/// Token verification configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OidcConfigLayer {
	#[serde(default)]
	pub issuer: Option<String>,
	#[serde(default)]
	pub audience: Option<String>,
	#[serde(default)]
	pub required_ref: Option<String>,
	#[serde(default)]
	pub jwks_url: Option<String>,
	#[serde(default)]
	pub fetch_timeout_secs: Option<u64>,
}

impl OidcConfigLayer {
	pub fn merge(&mut self, other: OidcConfigLayer) {
		if other.issuer.is_some() {
			self.issuer = other.issuer;
		}
		if other.audience.is_some() {
			self.audience = other.audience;
		}
		if other.required_ref.is_some() {
			self.required_ref = other.required_ref;
		}
		if other.jwks_url.is_some() {
			self.jwks_url = other.jwks_url;
		}
		if other.fetch_timeout_secs.is_some() {
			self.fetch_timeout_secs = other.fetch_timeout_secs;
		}
	}

	pub fn finalize(self) -> OidcConfig {
		OidcConfig {
			issuer: self.issuer.unwrap_or_else(|| DEFAULT_ISSUER.to_string()),
			audience: self.audience.unwrap_or_else(|| DEFAULT_AUDIENCE.to_string()),
			required_ref: self
				.required_ref
				.unwrap_or_else(|| DEFAULT_REQUIRED_REF.to_string()),
			jwks_url: self.jwks_url.unwrap_or_else(|| DEFAULT_JWKS_URL.to_string()),
			fetch_timeout_secs: self.fetch_timeout_secs.unwrap_or(10),
		}
	}
}
