// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Session telemetry reporting back to the datastore.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use wgfleet_core::{Error, PeerStats, Result};

use crate::control::WgControl;
use crate::sink::WgSink;

pub const STATS_INTERVAL: Duration = Duration::from_secs(60);

#[async_trait]
pub trait StatsSink: Send + Sync {
	async fn receive_peer_stats(&self, stats: Vec<PeerStats>) -> Result<()>;
}

/// Posts stats dumps to the datastore's receive endpoint.
pub struct RemoteStatsSink {
	url: String,
	client: reqwest::Client,
}

impl RemoteStatsSink {
	pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
		let base_url: String = base_url.into();
		Self {
			url: format!("{}/api/v1/receive-stats", base_url.trim_end_matches('/')),
			client,
		}
	}
}

#[async_trait]
impl StatsSink for RemoteStatsSink {
	async fn receive_peer_stats(&self, stats: Vec<PeerStats>) -> Result<()> {
		let resp = self
			.client
			.post(&self.url)
			.json(&stats)
			.send()
			.await
			.map_err(|e| Error::Transport(e.to_string()))?;
		if !resp.status().is_success() {
			return Err(Error::RemoteStatus {
				status: resp.status().as_u16(),
				message: resp.text().await.unwrap_or_default(),
			});
		}
		Ok(())
	}
}

/// Periodically scrape every configured device and report the combined
/// dump. Collection failures are logged and skipped; the loop never stops.
pub fn spawn_stats_loop(
	sink: Arc<WgSink>,
	ctrl: Arc<dyn WgControl>,
	stats: Arc<dyn StatsSink>,
	interval: Duration,
) -> JoinHandle<()> {
	tokio::spawn(async move {
		let mut tick = tokio::time::interval(interval);
		tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
		tick.tick().await;
		loop {
			tick.tick().await;

			let mut dump = Vec::new();
			for name in sink.interface_names().await {
				match ctrl.collect_stats(&name).await {
					Ok(mut s) => dump.append(&mut s),
					Err(e) => tracing::warn!(interface = %name, error = %e, "stats collection failed"),
				}
			}
			if dump.is_empty() {
				continue;
			}

			if let Err(e) = stats.receive_peer_stats(dump).await {
				tracing::warn!(error = %e, "failed to report peer stats");
			}
		}
	})
}
