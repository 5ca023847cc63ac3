// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! In-process fan-out to live subscribers.
//!
//! The subscriber set is keyed by id with a deferred-close buffer:
//! unsubscribing only marks the id, and the sender is dropped at the next
//! `emit`, so readers always observe closure from the emitting side. The
//! internal mutex is fine-grained and only ever entered while the engine's
//! write lock is held (lock order: write → pubsub).

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use wgfleet_core::Op;

/// Per-subscriber buffer. A full buffer blocks the emitting writer: the
/// slowest live subscriber bounds the commit rate.
pub(crate) const CHANNEL_CAPACITY: usize = 1000;

#[derive(Default)]
struct PubSubState {
	next_id: u64,
	subscribers: BTreeMap<u64, mpsc::Sender<Op>>,
	to_close: Vec<u64>,
}

#[derive(Clone, Default)]
pub(crate) struct PubSub {
	inner: Arc<Mutex<PubSubState>>,
}

impl PubSub {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a live subscriber. The guard schedules removal on drop.
	pub fn add_subscriber(&self) -> (SubscriberGuard, mpsc::Receiver<Op>) {
		let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
		let mut state = self.inner.lock().expect("pubsub lock poisoned");
		let id = state.next_id;
		state.next_id += 1;
		state.subscribers.insert(id, tx);
		(
			SubscriberGuard {
				id,
				inner: Arc::clone(&self.inner),
			},
			rx,
		)
	}

	/// Deliver `op` to every live subscriber, in registration order,
	/// blocking on full buffers. Deferred closes are processed first.
	pub async fn emit(&self, op: &Op) {
		let senders: Vec<(u64, mpsc::Sender<Op>)> = {
			let mut state = self.inner.lock().expect("pubsub lock poisoned");
			let to_close = std::mem::take(&mut state.to_close);
			for id in to_close {
				state.subscribers.remove(&id);
			}
			state
				.subscribers
				.iter()
				.map(|(id, tx)| (*id, tx.clone()))
				.collect()
		};

		for (id, tx) in senders {
			if tx.send(op.clone()).await.is_err() {
				// Receiver gone without unsubscribing; clean up next emit.
				self.schedule_close(id);
			}
		}
	}

	fn schedule_close(&self, id: u64) {
		let mut state = self.inner.lock().expect("pubsub lock poisoned");
		state.to_close.push(id);
	}

	#[cfg(test)]
	pub fn subscriber_count(&self) -> usize {
		self.inner.lock().expect("pubsub lock poisoned").subscribers.len()
	}
}

pub(crate) struct SubscriberGuard {
	id: u64,
	inner: Arc<Mutex<PubSubState>>,
}

impl Drop for SubscriberGuard {
	fn drop(&mut self) {
		let mut state = self.inner.lock().expect("pubsub lock poisoned");
		state.to_close.push(self.id);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use wgfleet_core::{Entity, OpType, Peer, Sequence};

	fn op(seq: u64) -> Op {
		Op::new(
			OpType::Create,
			Entity::Peer(Peer {
				public_key: format!("P{seq}"),
				..Default::default()
			}),
		)
		.with_seq(Sequence::from_u64(seq))
	}

	#[tokio::test]
	async fn delivers_in_order_to_all_subscribers() {
		let pubsub = PubSub::new();
		let (_g1, mut rx1) = pubsub.add_subscriber();
		let (_g2, mut rx2) = pubsub.add_subscriber();

		pubsub.emit(&op(1)).await;
		pubsub.emit(&op(2)).await;

		for rx in [&mut rx1, &mut rx2] {
			assert_eq!(rx.recv().await.unwrap().seq, Sequence::from_u64(1));
			assert_eq!(rx.recv().await.unwrap().seq, Sequence::from_u64(2));
		}
	}

	#[tokio::test]
	async fn close_is_deferred_to_next_emit() {
		let pubsub = PubSub::new();
		let (guard, mut rx) = pubsub.add_subscriber();

		pubsub.emit(&op(1)).await;
		drop(guard);

		// Removal is scheduled, not applied.
		assert_eq!(pubsub.subscriber_count(), 1);

		pubsub.emit(&op(2)).await;
		assert_eq!(pubsub.subscriber_count(), 0);

		// The reader drains what was delivered before the close, then
		// observes closure.
		assert_eq!(rx.recv().await.unwrap().seq, Sequence::from_u64(1));
		assert!(rx.recv().await.is_none());
	}

	#[tokio::test]
	async fn dropped_receiver_is_cleaned_up() {
		let pubsub = PubSub::new();
		let (_guard, rx) = pubsub.add_subscriber();
		drop(rx);

		pubsub.emit(&op(1)).await;
		pubsub.emit(&op(2)).await;
		assert_eq!(pubsub.subscriber_count(), 0);
	}
}
