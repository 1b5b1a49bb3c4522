// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};

/// Options applied to every token request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenOptions {
	/// Requested lifetime. `None` leaves the cluster default in place.
	pub expiration_seconds: Option<i64>,
}

/// A freshly minted bearer token for one service account.
///
/// Never cached or reused across requests.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedCredential {
	pub bearer_token: String,
	pub expires_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for IssuedCredential {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("IssuedCredential")
			.field("bearer_token", &"[redacted]")
			.field("expires_at", &self.expires_at)
			.finish()
	}
}
