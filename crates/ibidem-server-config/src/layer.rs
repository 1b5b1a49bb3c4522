// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration layer for merging from multiple sources.

use serde::Deserialize;

use crate::sections::{
	HttpConfigLayer, KubernetesConfigLayer, LoggingConfigLayer, OidcConfigLayer, SubjectsConfigLayer,
};

/// Server configuration layer - all fields are Option for merging.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfigLayer {
	#[serde(default)]
	pub http: Option<HttpConfigLayer>,
	/// Kept as text until finalize so the value can be matched case-insensitively.
	#[serde(default)]
	pub mode: Option<String>,
	#[serde(default)]
	pub oidc: Option<OidcConfigLayer>,
	#[serde(default)]
	pub kubernetes: Option<KubernetesConfigLayer>,
	#[serde(default)]
	pub subjects: Option<SubjectsConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

impl ServerConfigLayer {
	/// Merge another layer into this one. Other layer takes precedence.
	pub fn merge(&mut self, other: ServerConfigLayer) {
		merge_option(&mut self.http, other.http, HttpConfigLayer::merge);
		if other.mode.is_some() {
			self.mode = other.mode;
		}
		merge_option(&mut self.oidc, other.oidc, OidcConfigLayer::merge);
		merge_option(
			&mut self.kubernetes,
			other.kubernetes,
			KubernetesConfigLayer::merge,
		);
		merge_option(&mut self.subjects, other.subjects, SubjectsConfigLayer::merge);
		merge_option(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}

fn merge_option<T, F>(target: &mut Option<T>, source: Option<T>, merge_fn: F)
where
	F: FnOnce(&mut T, T),
{
	match (target.as_mut(), source) {
		(Some(t), Some(s)) => merge_fn(t, s),
		(None, Some(s)) => *target = Some(s),
		_ => {}
	}
}
