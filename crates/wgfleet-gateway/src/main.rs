// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! wgfleet gateway node binary.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use wgfleet_client::RemoteLogSource;
use wgfleet_gateway::{spawn_stats_loop, RemoteStatsSink, SysWgControl, WgControl, WgSink};

/// wgfleet-gateway - VPN gateway node for the WireGuard fleet control plane.
#[derive(Parser, Debug)]
#[command(name = "wgfleet-gateway", about = "wgfleet VPN gateway node", version)]
struct Args {
	/// URL of the datastore log API.
	#[arg(long)]
	log_url: String,

	/// URL of the stats API (defaults to --log-url).
	#[arg(long)]
	status_url: Option<String>,

	/// Seconds between stats reports.
	#[arg(long, default_value_t = 60)]
	stats_interval_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();
	dotenvy::dotenv().ok();

	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
		)
		.with(tracing_subscriber::fmt::layer())
		.init();

	let status_url = args.status_url.clone().unwrap_or_else(|| args.log_url.clone());
	tracing::info!(log_url = %args.log_url, status_url = %status_url, "starting wgfleet-gateway");

	let ctrl: Arc<dyn WgControl> = Arc::new(SysWgControl::new());
	let sink = Arc::new(WgSink::new(Arc::clone(&ctrl)));

	let stats = Arc::new(RemoteStatsSink::new(status_url, wgfleet_client::http::new_client()));
	spawn_stats_loop(
		Arc::clone(&sink),
		Arc::clone(&ctrl),
		stats,
		Duration::from_secs(args.stats_interval_secs),
	);

	let source = RemoteLogSource::new(args.log_url, wgfleet_client::http::new_client());

	tokio::select! {
		err = wgfleet_log::follow(&source, &*sink) => {
			tracing::error!(error = %err, "replication stopped");
			return Err(err.to_string().into());
		}
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("received shutdown signal");
		}
	}

	Ok(())
}
