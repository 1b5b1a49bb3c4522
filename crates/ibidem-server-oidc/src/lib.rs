// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Verification of CI workload identity tokens.
//!
//! This crate provides:
//! - A lazily populated cache of the issuer's verification keys
//! - A fixed claim policy and a pure validation function
//! - Distinct failure kinds for malformed, expired and non-conforming tokens

mod claims;
mod error;
mod keys;
mod validate;

pub use claims::{ActionsClaims, ClaimsPolicy, ValidatedIdentity};
pub use error::{KeyFetchError, KeyFetchResult, ValidationFailure};
pub use keys::{
	FixedKeys, JwksEndpoint, KeySource, SigningKeyProvider, SigningKeySet, DEBUG_SIGNING_SECRET,
};
pub use validate::validate;
