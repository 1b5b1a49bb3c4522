// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Token verification against a [`ClaimsPolicy`].
//!
//! Checks run in a fixed order and stop at the first failure:
//! 1. signature and structure (malformed)
//! 2. expiration (expired), then not-before (policy violation)
//! 3. issuer, audience, ref, repository presence (policy violation)
//!
//! Expiration is checked before the policy so an expired but otherwise
//! correct token is never reported as unauthorized.

use std::collections::HashSet;

use jsonwebtoken::{decode, decode_header, Validation};

use crate::claims::{ActionsClaims, ClaimsPolicy, ValidatedIdentity};
use crate::error::ValidationFailure;
use crate::keys::SigningKeySet;

/// Verify `raw_token` and enforce `policy` at time `now` (seconds since epoch).
///
/// Pure: no I/O, no clock reads.
pub fn validate(
	raw_token: &str,
	keys: &SigningKeySet,
	policy: &ClaimsPolicy,
	now: u64,
) -> Result<ValidatedIdentity, ValidationFailure> {
	let claims = verify_signature(raw_token, keys)?;
	check_expiration(&claims, now)?;
	check_policy(claims, policy)
}

fn verify_signature(
	raw_token: &str,
	keys: &SigningKeySet,
) -> Result<ActionsClaims, ValidationFailure> {
	let header = decode_header(raw_token)
		.map_err(|e| ValidationFailure::malformed(format!("invalid token header: {e}")))?;
	let key = keys.decoding_key(&header)?;

	// Only the signature is verified here; time and claim checks follow.
	let mut validation = Validation::new(header.alg);
	validation.validate_exp = false;
	validation.validate_nbf = false;
	validation.validate_aud = false;
	validation.required_spec_claims = HashSet::new();

	decode::<ActionsClaims>(raw_token, &key, &validation)
		.map(|data| data.claims)
		.map_err(|e| ValidationFailure::malformed(format!("token verification failed: {e}")))
}

fn check_expiration(claims: &ActionsClaims, now: u64) -> Result<(), ValidationFailure> {
	match claims.exp {
		Some(exp) if exp < now => {
			return Err(ValidationFailure::Expired {
				repository: claims.repository.clone(),
			})
		}
		Some(_) => {}
		None => {
			return Err(ValidationFailure::PolicyViolation {
				reason: "missing 'exp' claim".to_string(),
				repository: claims.repository.clone(),
			})
		}
	}

	match claims.nbf {
		Some(nbf) if nbf > now => Err(ValidationFailure::PolicyViolation {
			reason: format!("token not valid before {nbf}"),
			repository: claims.repository.clone(),
		}),
		_ => Ok(()),
	}
}

fn check_policy(
	claims: ActionsClaims,
	policy: &ClaimsPolicy,
) -> Result<ValidatedIdentity, ValidationFailure> {
	let violation = |reason: String| ValidationFailure::PolicyViolation {
		reason,
		repository: claims.repository.clone(),
	};

	match claims.iss.as_deref() {
		Some(iss) if iss == policy.issuer() => {}
		Some(iss) => return Err(violation(format!("invalid 'iss' claim: {iss:?}"))),
		None => return Err(violation("missing 'iss' claim".to_string())),
	}

	if claims.aud.is_empty() {
		return Err(violation("missing 'aud' claim".to_string()));
	}
	if !claims.aud.iter().any(|aud| aud == policy.audience()) {
		return Err(violation(format!("invalid 'aud' claim: {:?}", claims.aud)));
	}

	match claims.git_ref.as_deref() {
		Some(git_ref) if git_ref == policy.required_ref() => {}
		Some(git_ref) => return Err(violation(format!("invalid 'ref' claim: {git_ref:?}"))),
		None => return Err(violation("missing 'ref' claim".to_string())),
	}

	let Some(repository) = claims.repository.clone() else {
		return Err(violation("missing 'repository' claim".to_string()));
	};

	Ok(ValidatedIdentity {
		repository,
		git_ref: policy.required_ref().to_string(),
		// exp presence was enforced by check_expiration
		expires_at: claims.exp.unwrap_or_default(),
		subject: claims.sub,
		actor: claims.actor,
		workflow: claims.workflow,
		run_id: claims.run_id,
	})
}
