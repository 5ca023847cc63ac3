// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Peer expiry: delete peers whose `expire` timestamp has passed.
//!
//! The scan is a direct query, but the deletions go through the log writer
//! so they replicate to every follower like any other op.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqlitePool;

use wgfleet_core::{Entity, Peer, Result};
use wgfleet_db::entity_store;
use wgfleet_log::EntityWriter;

use super::Job;

pub struct PeerExpiryJob {
	pool: SqlitePool,
	writer: Arc<dyn EntityWriter>,
}

impl PeerExpiryJob {
	pub fn new(pool: SqlitePool, writer: Arc<dyn EntityWriter>) -> Self {
		Self { pool, writer }
	}
}

#[async_trait]
impl Job for PeerExpiryJob {
	fn name(&self) -> &'static str {
		"peer-expiry"
	}

	async fn run(&self) -> Result<()> {
		let mut conn = self.pool.acquire().await?;
		let expired = entity_store::expired_peers(&mut conn, Utc::now()).await?;
		drop(conn);

		let mut last_err = None;
		for public_key in expired {
			tracing::info!(%public_key, "expiring peer");
			let peer = Entity::Peer(Peer {
				public_key,
				..Default::default()
			});
			if let Err(e) = self.writer.delete(peer).await {
				tracing::warn!(error = %e, "failed to expire peer");
				last_err = Some(e);
			}
		}
		match last_err {
			Some(e) => Err(e),
			None => Ok(()),
		}
	}
}
