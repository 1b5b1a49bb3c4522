// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections for ibidem-server.

pub mod http;
pub mod kubernetes;
pub mod logging;
pub mod mode;
pub mod oidc;
pub mod subjects;

pub use http::{HttpConfig, HttpConfigLayer};
pub use kubernetes::{KubernetesConfig, KubernetesConfigLayer, DEFAULT_CA_CERT_PATH};
pub use logging::{LoggingConfig, LoggingConfigLayer};
pub use mode::Mode;
pub use oidc::{OidcConfig, OidcConfigLayer};
pub use subjects::{Subject, SubjectsConfig, SubjectsConfigLayer};
