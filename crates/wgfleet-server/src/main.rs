// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! wgfleet datastore server binary.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use wgfleet_client::RemoteLogSource;
use wgfleet_log::{CrudLog, EntityWriter, LogWriter, ReadOnlyWriter};
use wgfleet_server::config::{self, ServerConfig};
use wgfleet_server::jobs::{self, LogTrimJob, PeerExpiryJob};
use wgfleet_server::registration::RegistrationService;
use wgfleet_server::sessions::SessionManager;
use wgfleet_server::{create_router, AppState};

/// wgfleet-server - datastore node for the WireGuard fleet control plane.
#[derive(Parser, Debug)]
#[command(name = "wgfleet-server", about = "wgfleet datastore server", version)]
struct Args {
	#[command(subcommand)]
	command: Option<Command>,

	/// Path or URL of the SQLite database (overrides WGFLEET_DATABASE_URL).
	#[arg(long)]
	db: Option<String>,

	/// Listen address host (overrides WGFLEET_HTTP_HOST).
	#[arg(long)]
	host: Option<String>,

	/// Listen address port (overrides WGFLEET_HTTP_PORT).
	#[arg(long)]
	port: Option<u16>,

	/// Primary datastore URL for pull replication. When set, this node is a
	/// read-only mirror (overrides WGFLEET_LOG_URL).
	#[arg(long)]
	log_url: Option<String>,

	/// Log retention in days, 1 to 120 (overrides WGFLEET_LOG_RETENTION_DAYS).
	#[arg(long)]
	retention_days: Option<u32>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Show version information
	Version,
}

impl Args {
	fn apply(self, config: &mut ServerConfig) {
		if let Some(db) = self.db {
			config.database.url = db;
		}
		if let Some(host) = self.host {
			config.http.host = host;
		}
		if let Some(port) = self.port {
			config.http.port = port;
		}
		if let Some(log_url) = self.log_url {
			config.replication.log_url = Some(log_url);
		}
		if let Some(days) = self.retention_days {
			config.log.retention_days = days;
		}
	}
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	if let Some(Command::Version) = args.command {
		println!("wgfleet-server {}", env!("CARGO_PKG_VERSION"));
		return Ok(());
	}

	dotenvy::dotenv().ok();

	let mut config = config::load_config()?;
	args.apply(&mut config);

	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
		)
		.with(tracing_subscriber::fmt::layer())
		.init();

	tracing::info!(
		host = %config.http.host,
		port = config.http.port,
		database = %config.database.url,
		primary = config.is_primary(),
		"starting wgfleet-server"
	);

	let pool = wgfleet_db::open_pool(&config.database.url).await?;
	let log = Arc::new(CrudLog::new(pool.clone()));

	// A mirror never originates ops: its writer is hard read-only and its
	// state only changes through the follower.
	let writer: Arc<dyn EntityWriter> = if config.is_primary() {
		Arc::new(LogWriter::new(Arc::clone(&log)))
	} else {
		Arc::new(ReadOnlyWriter)
	};

	let state = AppState {
		log: Arc::clone(&log),
		writer: Arc::clone(&writer),
		registration: config
			.is_primary()
			.then(|| Arc::new(RegistrationService::new(pool.clone(), Arc::clone(&writer)))),
		sessions: config
			.is_primary()
			.then(|| Arc::new(SessionManager::new(pool.clone()))),
	};

	if config.is_primary() {
		jobs::spawn_periodic(
			Arc::new(PeerExpiryJob::new(pool.clone(), Arc::clone(&writer))),
			Duration::from_secs(config.jobs.expire_interval_secs),
		);
	}
	jobs::spawn_periodic(
		Arc::new(LogTrimJob::new(Arc::clone(&log), config.log_retention())),
		Duration::from_secs(config.jobs.trim_interval_secs),
	);

	// A mirror follows its primary for as long as the process lives; a
	// permanent replication error takes the node down.
	let follower = config.replication.log_url.clone().map(|url| {
		let log = Arc::clone(&log);
		tokio::spawn(async move {
			let source = RemoteLogSource::new(url, wgfleet_client::http::new_client());
			wgfleet_log::follow(&source, &*log).await
		})
	});

	let app = create_router(state)
		.layer(TraceLayer::new_for_http())
		.layer(
			CorsLayer::new()
				.allow_origin(Any)
				.allow_methods(Any)
				.allow_headers(Any),
		);

	let addr = config.socket_addr();
	tracing::info!("listening on {}", addr);
	let listener = tokio::net::TcpListener::bind(&addr).await?;

	tokio::select! {
		result = axum::serve(listener, app) => {
			if let Err(e) = result {
				tracing::error!(error = %e, "server error");
			}
		}
		message = wait_follower(follower) => {
			tracing::error!(error = %message, "replication stopped");
			return Err(message.into());
		}
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("received shutdown signal");
		}
	}

	tracing::info!("server shutdown complete");
	Ok(())
}

async fn wait_follower(
	handle: Option<tokio::task::JoinHandle<wgfleet_core::Error>>,
) -> String {
	match handle {
		Some(handle) => match handle.await {
			Ok(err) => err.to_string(),
			Err(join_err) => join_err.to_string(),
		},
		None => std::future::pending().await,
	}
}
