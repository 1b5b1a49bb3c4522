// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! ibidem token exchange server.
//!
//! Accepts a CI workload identity token, checks it against a fixed claim
//! policy and the subject registry, and answers with a short-lived
//! Kubernetes service account token or a kubeconfig wrapping one.

pub mod api;
pub mod api_docs;
pub mod error;
pub mod exchange;
pub mod kubeconfig;
pub mod registry;
pub mod registry_watcher;
pub mod routes;

pub use api::{create_app_state, create_router, AppState, StartupError};
pub use api_docs::ApiDoc;
pub use error::{ErrorResponse, ExchangeError};
pub use exchange::{ExchangeOutcome, ExchangeStage, TokenExchange};
pub use ibidem_server_config::ServerConfig;
pub use kubeconfig::{assemble, KubeConfig};
pub use registry::{RegistryError, SubjectRegistry, SubjectTable};
pub use registry_watcher::{RegistryWatcher, WatchError};
