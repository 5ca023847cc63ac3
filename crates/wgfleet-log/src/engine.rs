// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! The transactional log engine.
//!
//! One process-wide lock per log instance orders everything: writers hold
//! the exclusive side across the whole transaction *and* the fan-out, so
//! emit order equals commit order equals persisted sequence order, and a
//! subscriber that has processed op N will see state >= N on any later
//! query. Snapshots and reads share the read side; SQLite's own isolation
//! is not enough here because all tasks share one connection.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use tokio::sync::{mpsc, RwLock};

use wgfleet_core::{Entity, EntityKind, Error, Op, OpType, Result, Sequence};
use wgfleet_db::{entity_store, log_store, sequencer};

use crate::pubsub::{PubSub, CHANNEL_CAPACITY};
use crate::traits::{LogSink, LogSource, Snapshot, Subscription};

pub struct CrudLog {
	pool: SqlitePool,
	lock: RwLock<()>,
	pubsub: PubSub,
}

impl CrudLog {
	pub fn new(pool: SqlitePool) -> Self {
		Self {
			pool,
			lock: RwLock::new(()),
			pubsub: PubSub::new(),
		}
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	/// Apply one op: entity mutation, log append and sequence advance in a
	/// single transaction, then fan-out to live subscribers under the same
	/// lock. Any failure rolls back with no emit.
	#[tracing::instrument(skip(self, op), fields(op_type = %op.op_type, entity = op.entity.kind().name()))]
	pub async fn apply(&self, mut op: Op, from_log: bool) -> Result<Op> {
		let _write = self.lock.write().await;
		let mut tx = self.pool.begin().await?;

		if !from_log {
			op.seq = sequencer::next(&mut tx).await?;
		} else if op.seq <= sequencer::current(&mut tx).await? {
			return Err(Error::OutOfSequence);
		}

		match op.op_type {
			OpType::Create => entity_store::insert(&mut tx, &op.entity).await?,
			OpType::Update => entity_store::update(&mut tx, &op.entity).await?,
			OpType::Delete => entity_store::delete(&mut tx, &op.entity).await?,
			OpType::Unknown => return Err(Error::InvalidOpType),
		}

		log_store::append(&mut tx, &op).await?;
		sequencer::set(&mut tx, op.seq).await?;
		tx.commit().await?;

		tracing::debug!(seq = %op.seq, "op committed");
		self.pubsub.emit(&op).await;
		Ok(op)
	}

	pub async fn latest_sequence(&self) -> Result<Sequence> {
		let _read = self.lock.read().await;
		let mut tx = self.pool.begin().await?;
		let seq = sequencer::current(&mut tx).await?;
		tx.rollback().await?;
		Ok(seq)
	}

	/// The full entity state at the current sequence. Sequence and items
	/// come from the same transaction, under the read lock, so no
	/// interleaved write can skew them against each other.
	#[tracing::instrument(skip(self))]
	pub async fn snapshot(&self) -> Result<Snapshot> {
		let _read = self.lock.read().await;
		let mut tx = self.pool.begin().await?;
		let seq = sequencer::current(&mut tx).await?;
		let items = entity_store::all(&mut tx).await?;
		tx.rollback().await?;
		Ok(Snapshot { seq, items })
	}

	/// Subscribe from `start` (inclusive). The retained backlog is drained
	/// and the live subscriber attached inside the write-locked section, so
	/// no commit can fall between preload and live attachment.
	#[tracing::instrument(skip(self), fields(%start))]
	pub async fn subscribe(&self, start: Sequence) -> Result<Subscription> {
		let _write = self.lock.write().await;
		let mut tx = self.pool.begin().await?;

		let current = sequencer::current(&mut tx).await?;
		let horizon = log_store::horizon(&mut tx).await?.unwrap_or_else(|| current.next());
		if start < horizon {
			return Err(Error::Horizon);
		}

		let preload = log_store::since(&mut tx, start).await?;
		tx.rollback().await?;

		let (guard, mut live) = self.pubsub.add_subscriber();
		let (tx_out, rx_out) = mpsc::channel(CHANNEL_CAPACITY);
		let task = tokio::spawn(async move {
			// The guard lives as long as the merge task: aborting the task
			// drops it and schedules the live channel for closing.
			let _guard = guard;
			for op in preload {
				if tx_out.send(op).await.is_err() {
					return;
				}
			}
			while let Some(op) = live.recv().await {
				// The live channel carries every commit; the subscription
				// contract is ops with seq >= start only.
				if op.seq < start {
					continue;
				}
				if tx_out.send(op).await.is_err() {
					return;
				}
			}
		});

		Ok(Subscription::new(rx_out, task))
	}

	/// Replace the whole store with a snapshot: purge, recreate, set the
	/// sequence, in one transaction.
	#[tracing::instrument(skip(self, snapshot), fields(seq = %snapshot.seq, items = snapshot.items.len()))]
	pub async fn load_snapshot(&self, snapshot: Snapshot) -> Result<()> {
		let _write = self.lock.write().await;
		let mut tx = self.pool.begin().await?;

		entity_store::delete_all(&mut tx).await?;
		for item in &snapshot.items {
			entity_store::insert(&mut tx, item).await?;
		}
		sequencer::set(&mut tx, snapshot.seq).await?;

		tx.commit().await?;
		Ok(())
	}

	/// Read-side equality query on one entity kind.
	pub async fn find(
		&self,
		kind: EntityKind,
		filter: &BTreeMap<String, String>,
	) -> Result<Vec<Entity>> {
		let _read = self.lock.read().await;
		let mut tx = self.pool.begin().await?;
		let out = entity_store::find(&mut tx, kind, filter).await?;
		tx.rollback().await?;
		Ok(out)
	}

	/// Drop log entries older than `cutoff`, raising the horizon.
	#[tracing::instrument(skip(self))]
	pub async fn trim(&self, cutoff: DateTime<Utc>) -> Result<u64> {
		let _write = self.lock.write().await;
		let mut tx = self.pool.begin().await?;
		let removed = log_store::trim(&mut tx, cutoff).await?;
		tx.commit().await?;
		if removed > 0 {
			tracing::info!(removed, "trimmed log entries");
		}
		Ok(removed)
	}
}

#[async_trait::async_trait]
impl LogSource for CrudLog {
	async fn snapshot(&self) -> Result<Snapshot> {
		CrudLog::snapshot(self).await
	}

	async fn subscribe(&self, start: Sequence) -> Result<Subscription> {
		CrudLog::subscribe(self, start).await
	}
}

#[async_trait::async_trait]
impl LogSink for CrudLog {
	async fn apply(&self, op: Op, from_log: bool) -> Result<Op> {
		CrudLog::apply(self, op, from_log).await
	}

	async fn latest_sequence(&self) -> Result<Sequence> {
		CrudLog::latest_sequence(self).await
	}

	async fn load_snapshot(&self, snapshot: Snapshot) -> Result<()> {
		CrudLog::load_snapshot(self, snapshot).await
	}
}
