// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! ibidem token exchange server binary.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use ibidem_server::{create_app_state, create_router, RegistryWatcher};
use ibidem_server_config::ServerConfig;
use ibidem_server_k8s::KubeClient;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod version;

/// ibidem server - exchanges CI identity tokens for cluster credentials.
#[derive(Parser, Debug)]
#[command(
	name = "ibidem-server",
	about = "CI identity token to Kubernetes credential exchange",
	version
)]
struct Args {
	/// Path to the TOML config file
	#[arg(long, env = "IBIDEM_SERVER_CONFIG")]
	config: Option<PathBuf>,

	/// Subcommands for ibidem-server (e.g., `version`)
	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Show version and build information
	Version,
}

fn init_tracing(config: &ServerConfig) {
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| config.logging.level.clone().into());
	let registry = tracing_subscriber::registry().with(filter);

	if config.logging.json {
		registry.with(tracing_subscriber::fmt::layer().json()).init();
	} else {
		registry.with(tracing_subscriber::fmt::layer()).init();
	}
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = tokio::signal::ctrl_c().await {
			tracing::error!(error = %e, "failed to listen for Ctrl-C");
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
			Ok(mut signal) => {
				signal.recv().await;
			}
			Err(e) => {
				tracing::error!(error = %e, "failed to listen for SIGTERM");
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
	tracing::info!("Received shutdown signal");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	// Parse CLI arguments
	let args = Args::parse();

	// Handle subcommands that should not start the server
	if let Some(Command::Version) = args.command {
		println!("{}", version::format_version_info());
		return Ok(());
	}

	// Load .env file if present
	dotenvy::dotenv().ok();

	let config = match &args.config {
		Some(path) => ibidem_server_config::load_config_with_file(path)?,
		None => ibidem_server_config::load_config()?,
	};

	init_tracing(&config);

	tracing::info!(
		host = %config.http.host,
		port = config.http.port,
		mode = %config.mode,
		"starting ibidem-server"
	);

	let k8s = KubeClient::new()
		.await?
		.with_request_timeout(Duration::from_secs(config.kubernetes.request_timeout_secs));
	let state = create_app_state(&config, Arc::new(k8s))?;

	// Keep the watcher alive for the lifetime of the server.
	let _watcher = match &config.subjects.path {
		Some(path) => Some(RegistryWatcher::spawn(
			state.registry.clone(),
			path,
			ibidem_server::registry_watcher::DEFAULT_DEBOUNCE,
		)?),
		None => None,
	};

	let app = create_router(state).layer(TraceLayer::new_for_http());

	let addr = config.socket_addr();
	tracing::info!("listening on {}", addr);

	let listener = tokio::net::TcpListener::bind(&addr).await?;
	axum::serve(listener, app)
		.with_graceful_shutdown(shutdown_signal())
		.await?;

	tracing::info!("Server shutdown complete");
	Ok(())
}
