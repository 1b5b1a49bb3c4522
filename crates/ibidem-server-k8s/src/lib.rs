// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! K8s client abstraction for minting service account tokens.
//!
//! This crate provides:
//! - A trait-based K8s client abstraction for testability
//! - Production implementation using the kube crate
//! - A recording mock for tests

mod client;
mod error;
mod kube_client;
mod mock;
mod types;

pub use client::K8sClient;
pub use error::{K8sError, K8sResult};
pub use kube_client::{KubeClient, DEFAULT_REQUEST_TIMEOUT};
pub use mock::{IssuanceCall, MockK8sClient};
pub use types::{IssuedCredential, TokenOptions};
