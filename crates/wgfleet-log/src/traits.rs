// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! The seams between log producers and consumers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use wgfleet_core::{Entity, Op, Result, Sequence};

/// The full entity state at a specific sequence, used to bootstrap
/// followers past the log horizon. Item order is unspecified but
/// consistent within one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
	pub seq: Sequence,
	pub items: Vec<Entity>,
}

/// What a consumer uses to track a log: bootstrap state plus a live feed.
#[async_trait]
pub trait LogSource: Send + Sync {
	async fn snapshot(&self) -> Result<Snapshot>;

	/// Subscribe from `start` (inclusive). Callers resume with
	/// `latest_local + 1`. Fails with `Horizon` when `start` is below the
	/// lowest retained sequence.
	async fn subscribe(&self, start: Sequence) -> Result<Subscription>;
}

/// What the follower drives: a local receiver of replayed ops.
#[async_trait]
pub trait LogSink: Send + Sync {
	/// Apply one op. `from_log` is true for replayed ops, which keep their
	/// original sequence; locally originated ops get the next one assigned.
	async fn apply(&self, op: Op, from_log: bool) -> Result<Op>;

	async fn latest_sequence(&self) -> Result<Sequence>;

	/// Replace all local state with the snapshot's items and sequence.
	async fn load_snapshot(&self, snapshot: Snapshot) -> Result<()>;
}

/// The write half of the CRUD interface. On the primary this originates
/// log ops; follower nodes install [`crate::ReadOnlyWriter`] instead.
#[async_trait]
pub trait EntityWriter: Send + Sync {
	async fn create(&self, entity: Entity) -> Result<()>;
	async fn update(&self, entity: Entity) -> Result<()>;
	async fn delete(&self, entity: Entity) -> Result<()>;
}

/// A live op feed. Ops arrive in strictly increasing sequence order, the
/// preload (catchup) segment first, then the live stream, with no seam
/// between the two.
///
/// Dropping the subscription tears down the feeding task, which releases
/// the live channel (local) or closes the HTTP response body (remote).
#[derive(Debug)]
pub struct Subscription {
	rx: mpsc::Receiver<Op>,
	task: JoinHandle<()>,
}

impl Subscription {
	pub fn new(rx: mpsc::Receiver<Op>, task: JoinHandle<()>) -> Self {
		Self { rx, task }
	}

	/// The next op, or `None` once the feed is closed (server disconnect or
	/// deferred close after unsubscribing).
	pub async fn next(&mut self) -> Option<Op> {
		self.rx.recv().await
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		self.task.abort();
	}
}
