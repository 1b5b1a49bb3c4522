// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Deploy subject configuration.
//!
//! Subjects can be listed inline or kept in a separate file that is
//! reloaded while the server runs. When a file is configured it wins over
//! any inline entries.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Binds a source repository to the service account it may impersonate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subject {
	pub repository: String,
	pub namespace: String,
	pub service_account: String,
}

/// Subject configuration (runtime, fully resolved).
#[derive(Debug, Clone, Default)]
pub struct SubjectsConfig {
	pub path: Option<PathBuf>,
	pub entries: Vec<Subject>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubjectsConfigLayer {
	#[serde(default)]
	pub path: Option<PathBuf>,
	#[serde(default)]
	pub entries: Option<Vec<Subject>>,
}

impl SubjectsConfigLayer {
	pub fn merge(&mut self, other: SubjectsConfigLayer) {
		if other.path.is_some() {
			self.path = other.path;
		}
		if other.entries.is_some() {
			self.entries = other.entries;
		}
	}

	pub fn finalize(self) -> SubjectsConfig {
		SubjectsConfig {
			path: self.path,
			entries: self.entries.unwrap_or_default(),
		}
	}
}
