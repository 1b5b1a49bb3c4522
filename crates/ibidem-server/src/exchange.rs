// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Token exchange: workload identity token in, service account credential out.
//!
//! A request passes through
//! `Received -> Decoded -> ClaimsValidated -> Authorized -> CredentialIssued`
//! exactly once. Any failure ends the exchange with an [`ExchangeError`]
//! naming the stage it was rejected from; nothing is retried.

use std::sync::Arc;

use chrono::Utc;
use ibidem_server_config::Subject;
use ibidem_server_k8s::{IssuedCredential, K8sClient, TokenOptions};
use ibidem_server_oidc::{validate, ClaimsPolicy, SigningKeyProvider, ValidatedIdentity};
use tracing::{debug, info, instrument, warn, Span};

use crate::error::ExchangeError;
use crate::registry::SubjectRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeStage {
	Received,
	Decoded,
	ClaimsValidated,
	Authorized,
	CredentialIssued,
}

impl ExchangeStage {
	pub fn as_str(self) -> &'static str {
		match self {
			ExchangeStage::Received => "received",
			ExchangeStage::Decoded => "decoded",
			ExchangeStage::ClaimsValidated => "claims_validated",
			ExchangeStage::Authorized => "authorized",
			ExchangeStage::CredentialIssued => "credential_issued",
		}
	}
}

/// Everything a response needs from a successful exchange.
#[derive(Debug, Clone)]
pub struct ExchangeOutcome {
	pub identity: ValidatedIdentity,
	pub subject: Subject,
	pub credential: IssuedCredential,
}

pub struct TokenExchange {
	keys: Arc<SigningKeyProvider>,
	policy: ClaimsPolicy,
	registry: SubjectRegistry,
	k8s: Arc<dyn K8sClient>,
	token_options: TokenOptions,
}

impl TokenExchange {
	pub fn new(
		keys: Arc<SigningKeyProvider>,
		policy: ClaimsPolicy,
		registry: SubjectRegistry,
		k8s: Arc<dyn K8sClient>,
		token_options: TokenOptions,
	) -> Self {
		Self {
			keys,
			policy,
			registry,
			k8s,
			token_options,
		}
	}

	pub fn policy(&self) -> &ClaimsPolicy {
		&self.policy
	}

	#[instrument(
		name = "token_exchange",
		skip_all,
		fields(repository = tracing::field::Empty)
	)]
	pub async fn exchange(&self, raw_token: &str) -> Result<ExchangeOutcome, ExchangeError> {
		debug!(token_len = raw_token.len(), "exchange request received");

		let keys = self
			.keys
			.get_keys()
			.await
			.map_err(|e| reject(ExchangeError::KeyFetch(e)))?;

		let now = Utc::now().timestamp().max(0) as u64;
		let identity = validate(raw_token, &keys, &self.policy, now).map_err(|failure| {
			if let Some(repository) = failure.repository() {
				Span::current().record("repository", repository);
			}
			reject(ExchangeError::from(failure))
		})?;
		Span::current().record("repository", identity.repository.as_str());
		debug!(stage = ExchangeStage::ClaimsValidated.as_str(), "claims accepted");

		let subject = self.registry.lookup(&identity.repository).ok_or_else(|| {
			reject(ExchangeError::UnknownSubject {
				repository: identity.repository.clone(),
			})
		})?;
		debug!(
			stage = ExchangeStage::Authorized.as_str(),
			namespace = %subject.namespace,
			service_account = %subject.service_account,
			"repository authorized"
		);

		let credential = self
			.k8s
			.create_service_account_token(
				&subject.namespace,
				&subject.service_account,
				&self.token_options,
			)
			.await
			.map_err(|e| reject(ExchangeError::from(e)))?;

		info!(
			stage = ExchangeStage::CredentialIssued.as_str(),
			namespace = %subject.namespace,
			service_account = %subject.service_account,
			expires_at = ?credential.expires_at,
			"credential issued"
		);

		Ok(ExchangeOutcome {
			identity,
			subject,
			credential,
		})
	}
}

/// Last stage an exchange reached before failing with `err`.
fn rejected_at(err: &ExchangeError) -> ExchangeStage {
	match err {
		ExchangeError::BadRequest(_)
		| ExchangeError::MalformedToken(_)
		| ExchangeError::KeyFetch(_)
		| ExchangeError::Internal(_) => ExchangeStage::Received,
		ExchangeError::ExpiredToken | ExchangeError::ClaimPolicyViolation(_) => {
			ExchangeStage::Decoded
		}
		ExchangeError::UnknownSubject { .. }
		| ExchangeError::UpstreamIssuance(_)
		| ExchangeError::UpstreamTimeout => ExchangeStage::Authorized,
	}
}

fn reject(err: ExchangeError) -> ExchangeError {
	warn!(stage = rejected_at(&err).as_str(), reason = %err, "exchange rejected");
	err
}
