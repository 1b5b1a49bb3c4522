// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Claim set carried by CI workload identity tokens and the policy applied to it.

use serde::{Deserialize, Serialize};

/// Fixed claim policy enforced on every inbound token.
///
/// Built once at startup and shared read-only; there is no way to mutate a
/// policy after construction. The `repository` claim is always required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimsPolicy {
	issuer: String,
	audience: String,
	required_ref: String,
}

impl ClaimsPolicy {
	pub fn new(
		issuer: impl Into<String>,
		audience: impl Into<String>,
		required_ref: impl Into<String>,
	) -> Self {
		Self {
			issuer: issuer.into(),
			audience: audience.into(),
			required_ref: required_ref.into(),
		}
	}

	pub fn issuer(&self) -> &str {
		&self.issuer
	}

	pub fn audience(&self) -> &str {
		&self.audience
	}

	pub fn required_ref(&self) -> &str {
		&self.required_ref
	}
}

/// Raw claims decoded from a verified token, before policy checks.
///
/// Every field is optional so that a missing claim surfaces as a policy
/// violation rather than a decode failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionsClaims {
	#[serde(default)]
	pub iss: Option<String>,

	#[serde(default, deserialize_with = "deserialize_audience")]
	pub aud: Vec<String>,

	#[serde(default)]
	pub exp: Option<u64>,

	#[serde(default)]
	pub nbf: Option<u64>,

	#[serde(default)]
	pub repository: Option<String>,

	#[serde(default, rename = "ref")]
	pub git_ref: Option<String>,

	#[serde(default)]
	pub sub: Option<String>,

	#[serde(default)]
	pub actor: Option<String>,

	#[serde(default)]
	pub workflow: Option<String>,

	#[serde(default)]
	pub run_id: Option<String>,
}

/// Accept `aud` as either a single string or an array of strings.
fn deserialize_audience<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
	D: serde::Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Audience {
		One(String),
		Many(Vec<String>),
	}

	Ok(match Audience::deserialize(deserializer)? {
		Audience::One(aud) => vec![aud],
		Audience::Many(auds) => auds,
	})
}

/// Identity asserted by a token that passed signature and policy checks.
///
/// Only [`crate::validate`] constructs this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedIdentity {
	pub repository: String,
	pub git_ref: String,
	pub expires_at: u64,
	pub subject: Option<String>,
	pub actor: Option<String>,
	pub workflow: Option<String>,
	pub run_id: Option<String>,
}
