// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! OpenAPI documentation for ibidem-server, generated with utoipa and served
//! at `/api/openapi.json`.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "ibidem token exchange",
        version = "1.0.0",
        description = "Exchanges CI workload identity tokens for short-lived Kubernetes service account credentials.",
        license(name = "Proprietary")
    ),
    servers(
        (url = "/", description = "Local server")
    ),
    tags(
        (name = "token", description = "Identity token to cluster credential exchange"),
        (name = "health", description = "Liveness and readiness probes")
    ),
    paths(
        crate::routes::token::exchange_token,
        crate::routes::token::exchange_kubeconfig,
        crate::routes::health::healthy,
        crate::routes::health::ready,
    ),
    components(
        schemas(
            crate::routes::token::TokenExchangeRequest,
            crate::routes::token::TokenExchangeResponse,
            crate::routes::health::HealthResponse,
            crate::routes::health::ReadinessResponse,
            crate::kubeconfig::KubeConfig,
            crate::kubeconfig::NamedCluster,
            crate::kubeconfig::Cluster,
            crate::kubeconfig::NamedUser,
            crate::kubeconfig::User,
            crate::kubeconfig::NamedContext,
            crate::kubeconfig::Context,
            crate::error::ErrorResponse,
        )
    )
)]
pub struct ApiDoc;
