// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Periodic background jobs.

mod log_trim;
mod peer_expiry;

pub use log_trim::LogTrimJob;
pub use peer_expiry::PeerExpiryJob;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use wgfleet_core::Result;

#[async_trait]
pub trait Job: Send + Sync {
	fn name(&self) -> &'static str;
	async fn run(&self) -> Result<()>;
}

/// Run `job` every `interval`, forever. Failures are logged and the next
/// tick proceeds as scheduled.
pub fn spawn_periodic(job: Arc<dyn Job>, interval: Duration) -> JoinHandle<()> {
	tokio::spawn(async move {
		let mut tick = tokio::time::interval(interval);
		tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
		// The first tick fires immediately; jobs wait one full interval.
		tick.tick().await;
		loop {
			tick.tick().await;
			if let Err(e) = job.run().await {
				tracing::warn!(job = job.name(), error = %e, "background job failed");
			}
		}
	})
}
