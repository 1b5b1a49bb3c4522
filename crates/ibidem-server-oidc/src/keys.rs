// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Issuer verification keys and their process-wide cache.
//!
//! Keys are fetched lazily on first use and kept for the lifetime of the
//! process. Concurrent cold-cache callers may each trigger a fetch; whichever
//! successful fetch lands last is the snapshot later readers observe. Failed
//! fetches are never cached, so the next request tries again.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey, Header};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::error::{KeyFetchError, KeyFetchResult, ValidationFailure};

/// Shared secret used in debug mode.
///
/// This is the well-known default HMAC secret of jwt.io, so debug tokens can
/// be minted there by hand. Never enable debug mode in production.
pub const DEBUG_SIGNING_SECRET: &str = "a-string-secret-at-least-256-bits-long";

/// Verification keys of the token issuer, indexed by key identifier.
#[derive(Clone)]
pub enum SigningKeySet {
	/// Public keys published by the issuer.
	Jwks(JwkSet),
	/// A single symmetric key; the token's `kid` is ignored.
	Shared(Arc<[u8]>),
}

impl std::fmt::Debug for SigningKeySet {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			SigningKeySet::Jwks(jwks) => f
				.debug_struct("Jwks")
				.field("keys", &jwks.keys.len())
				.finish(),
			SigningKeySet::Shared(_) => f.write_str("Shared([redacted])"),
		}
	}
}

impl SigningKeySet {
	/// The fixed key used in debug mode.
	pub fn debug() -> Self {
		SigningKeySet::Shared(Arc::from(DEBUG_SIGNING_SECRET.as_bytes()))
	}

	/// Number of keys in the set.
	pub fn len(&self) -> usize {
		match self {
			SigningKeySet::Jwks(jwks) => jwks.keys.len(),
			SigningKeySet::Shared(_) => 1,
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Select the key referenced by the token header.
	///
	/// Published key sets only verify asymmetric algorithms; the shared key
	/// only verifies HMAC algorithms. Anything else is treated as malformed.
	pub(crate) fn decoding_key(&self, header: &Header) -> Result<DecodingKey, ValidationFailure> {
		match self {
			SigningKeySet::Jwks(jwks) => {
				if is_hmac(header.alg) {
					return Err(ValidationFailure::malformed(format!(
						"algorithm {:?} is not accepted for published keys",
						header.alg
					)));
				}
				let kid = header
					.kid
					.as_deref()
					.ok_or_else(|| ValidationFailure::malformed("token header has no 'kid'"))?;
				let jwk = jwks.find(kid).ok_or_else(|| {
					ValidationFailure::malformed(format!("key '{kid}' is not in the issuer key set"))
				})?;
				DecodingKey::from_jwk(jwk)
					.map_err(|e| ValidationFailure::malformed(format!("unusable key '{kid}': {e}")))
			}
			SigningKeySet::Shared(secret) => {
				if !is_hmac(header.alg) {
					return Err(ValidationFailure::malformed(format!(
						"algorithm {:?} is not accepted for the shared key",
						header.alg
					)));
				}
				Ok(DecodingKey::from_secret(secret))
			}
		}
	}
}

fn is_hmac(alg: Algorithm) -> bool {
	matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}

/// Where verification keys come from.
#[async_trait]
pub trait KeySource: Send + Sync {
	/// Short name used in logs.
	fn name(&self) -> &'static str;

	/// Retrieve the current key set. Called at most once per cold cache.
	async fn fetch(&self) -> KeyFetchResult<SigningKeySet>;
}

/// Live key discovery endpoint of the issuer.
pub struct JwksEndpoint {
	url: String,
	http: reqwest::Client,
}

impl JwksEndpoint {
	/// Create a source for `url` whose requests give up after `timeout`.
	pub fn new(url: impl Into<String>, timeout: Duration) -> KeyFetchResult<Self> {
		let http = reqwest::Client::builder()
			.timeout(timeout)
			.user_agent(concat!("ibidem/", env!("CARGO_PKG_VERSION")))
			.build()
			.map_err(|e| KeyFetchError::Client {
				message: e.to_string(),
			})?;
		Ok(Self {
			url: url.into(),
			http,
		})
	}

	pub fn url(&self) -> &str {
		&self.url
	}
}

#[async_trait]
impl KeySource for JwksEndpoint {
	fn name(&self) -> &'static str {
		"jwks"
	}

	#[instrument(skip(self), fields(url = %self.url))]
	async fn fetch(&self) -> KeyFetchResult<SigningKeySet> {
		let response = self
			.http
			.get(&self.url)
			.header(reqwest::header::ACCEPT, "application/json")
			.send()
			.await
			.map_err(|e| KeyFetchError::Transport {
				message: e.to_string(),
			})?;

		let status = response.status();
		if !status.is_success() {
			return Err(KeyFetchError::Status {
				status: status.as_u16(),
			});
		}

		let jwks: JwkSet = response
			.json()
			.await
			.map_err(|e| KeyFetchError::InvalidDocument {
				message: e.to_string(),
			})?;

		debug!(keys = jwks.keys.len(), "fetched issuer key set");
		Ok(SigningKeySet::Jwks(jwks))
	}
}

/// A key set known ahead of time. Used for debug mode and tests.
pub struct FixedKeys {
	keys: SigningKeySet,
}

impl FixedKeys {
	pub fn new(keys: SigningKeySet) -> Self {
		Self { keys }
	}
}

#[async_trait]
impl KeySource for FixedKeys {
	fn name(&self) -> &'static str {
		"fixed"
	}

	async fn fetch(&self) -> KeyFetchResult<SigningKeySet> {
		Ok(self.keys.clone())
	}
}

/// Lazily populated, process-wide cache in front of a [`KeySource`].
pub struct SigningKeyProvider {
	source: Arc<dyn KeySource>,
	cached: RwLock<Option<Arc<SigningKeySet>>>,
}

impl SigningKeyProvider {
	pub fn new(source: Arc<dyn KeySource>) -> Self {
		Self {
			source,
			cached: RwLock::new(None),
		}
	}

	/// Provider backed by the fixed debug key; never touches the network.
	pub fn debug() -> Self {
		warn!("using the publicly known debug signing key; tokens are NOT authenticated");
		Self::new(Arc::new(FixedKeys::new(SigningKeySet::debug())))
	}

	/// Provider backed by the issuer's key discovery endpoint.
	pub fn jwks(url: impl Into<String>, timeout: Duration) -> KeyFetchResult<Self> {
		Ok(Self::new(Arc::new(JwksEndpoint::new(url, timeout)?)))
	}

	pub fn source_name(&self) -> &'static str {
		self.source.name()
	}

	/// Whether a key set has been fetched already.
	pub async fn is_cached(&self) -> bool {
		self.cached.read().await.is_some()
	}

	/// Return the cached key set, fetching it on a cold cache.
	///
	/// The lock is not held across the fetch, so concurrent cold callers may
	/// fetch more than once. That is harmless: every fetch yields a complete
	/// set and the last writer wins.
	pub async fn get_keys(&self) -> KeyFetchResult<Arc<SigningKeySet>> {
		if let Some(keys) = self.cached.read().await.as_ref() {
			return Ok(Arc::clone(keys));
		}

		let keys = match self.source.fetch().await {
			Ok(keys) => Arc::new(keys),
			Err(e) => {
				warn!(source = self.source.name(), error = %e, "failed to fetch signing keys");
				return Err(e);
			}
		};

		*self.cached.write().await = Some(Arc::clone(&keys));
		info!(
			source = self.source.name(),
			keys = keys.len(),
			"signing keys cached"
		);
		Ok(keys)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use wiremock::matchers::{method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	struct CountingSource {
		calls: AtomicUsize,
		fail_first: bool,
	}

	#[async_trait]
	impl KeySource for CountingSource {
		fn name(&self) -> &'static str {
			"counting"
		}

		async fn fetch(&self) -> KeyFetchResult<SigningKeySet> {
			let call = self.calls.fetch_add(1, Ordering::SeqCst);
			if self.fail_first && call == 0 {
				return Err(KeyFetchError::Status { status: 503 });
			}
			Ok(SigningKeySet::debug())
		}
	}

	fn sample_jwks() -> serde_json::Value {
		serde_json::json!({
			"keys": [
				{
					"kid": "test-key-1",
					"kty": "RSA",
					"alg": "RS256",
					"use": "sig",
					"n": "0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw",
					"e": "AQAB"
				}
			]
		})
	}

	#[tokio::test]
	async fn keys_are_fetched_once_and_cached() {
		let source = Arc::new(CountingSource {
			calls: AtomicUsize::new(0),
			fail_first: false,
		});
		let provider = SigningKeyProvider::new(source.clone());

		assert!(!provider.is_cached().await);
		provider.get_keys().await.unwrap();
		provider.get_keys().await.unwrap();
		provider.get_keys().await.unwrap();

		assert!(provider.is_cached().await);
		assert_eq!(source.calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn failed_fetch_is_not_cached() {
		let source = Arc::new(CountingSource {
			calls: AtomicUsize::new(0),
			fail_first: true,
		});
		let provider = SigningKeyProvider::new(source.clone());

		let err = provider.get_keys().await.unwrap_err();
		assert!(matches!(err, KeyFetchError::Status { status: 503 }));
		assert!(!provider.is_cached().await);

		provider.get_keys().await.unwrap();
		assert_eq!(source.calls.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn debug_provider_returns_shared_key() {
		let provider = SigningKeyProvider::debug();
		let keys = provider.get_keys().await.unwrap();
		assert!(matches!(keys.as_ref(), SigningKeySet::Shared(_)));
		assert_eq!(provider.source_name(), "fixed");
	}

	#[tokio::test]
	async fn jwks_endpoint_parses_key_set() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/.well-known/jwks"))
			.respond_with(ResponseTemplate::new(200).set_body_json(sample_jwks()))
			.expect(1)
			.mount(&server)
			.await;

		let provider = SigningKeyProvider::jwks(
			format!("{}/.well-known/jwks", server.uri()),
			Duration::from_secs(5),
		)
		.unwrap();

		let keys = provider.get_keys().await.unwrap();
		assert_eq!(keys.len(), 1);
		match keys.as_ref() {
			SigningKeySet::Jwks(jwks) => assert!(jwks.find("test-key-1").is_some()),
			other => panic!("unexpected key set: {other:?}"),
		}

		// Served from cache; the mock expects exactly one request.
		provider.get_keys().await.unwrap();
	}

	#[tokio::test]
	async fn jwks_endpoint_error_status_is_key_fetch_error() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/.well-known/jwks"))
			.respond_with(ResponseTemplate::new(500).set_body_string("boom"))
			.mount(&server)
			.await;

		let endpoint = JwksEndpoint::new(
			format!("{}/.well-known/jwks", server.uri()),
			Duration::from_secs(5),
		)
		.unwrap();

		let err = endpoint.fetch().await.unwrap_err();
		assert!(matches!(err, KeyFetchError::Status { status: 500 }));
	}

	#[tokio::test]
	async fn jwks_endpoint_invalid_body_is_key_fetch_error() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.respond_with(ResponseTemplate::new(200).set_body_string("not json"))
			.mount(&server)
			.await;

		let endpoint = JwksEndpoint::new(server.uri(), Duration::from_secs(5)).unwrap();
		let err = endpoint.fetch().await.unwrap_err();
		assert!(matches!(err, KeyFetchError::InvalidDocument { .. }));
	}

	#[tokio::test]
	async fn unreachable_endpoint_is_transport_error() {
		let endpoint =
			JwksEndpoint::new("http://127.0.0.1:9/.well-known/jwks", Duration::from_secs(2)).unwrap();
		let err = endpoint.fetch().await.unwrap_err();
		assert!(matches!(err, KeyFetchError::Transport { .. }));
	}

	#[test]
	fn debug_key_set_is_redacted_in_debug_output() {
		let rendered = format!("{:?}", SigningKeySet::debug());
		assert!(!rendered.contains(DEBUG_SIGNING_SECRET));
	}
}
