// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Horizon recovery: a follower starting below the primary's retained log
//! converges through exactly one snapshot plus subscribe cycle.

mod common;

use chrono::Utc;
use common::{peer_entity, spawn_follower, spawn_primary, wait_for_sequence};
use wgfleet_core::Sequence;

#[tokio::test]
async fn follower_past_the_horizon_recovers_via_snapshot() {
	let primary = spawn_primary().await;

	// 90 writes that are then trimmed away entirely, then 10 retained ones:
	// the log covers sequences 91..=100 only.
	for i in 1..=90 {
		primary
			.writer
			.create(peer_entity(&format!("P{i}"), "wg0", "10.0.0.2/32"))
			.await
			.unwrap();
	}
	primary
		.log
		.trim(Utc::now() + chrono::Duration::seconds(1))
		.await
		.unwrap();
	for i in 91..=100 {
		primary
			.writer
			.create(peer_entity(&format!("P{i}"), "wg0", "10.0.0.2/32"))
			.await
			.unwrap();
	}

	// A follower starting from sequence 0 must go through the snapshot.
	let follower = spawn_follower(&primary.url).await;
	wait_for_sequence(&follower.log, Sequence::from_u64(100)).await;

	assert_eq!(
		follower.log.latest_sequence().await.unwrap(),
		primary.log.latest_sequence().await.unwrap()
	);
	let follower_snap = follower.log.snapshot().await.unwrap();
	let primary_snap = primary.log.snapshot().await.unwrap();
	assert_eq!(follower_snap.items.len(), 100);
	assert_eq!(follower_snap.items, primary_snap.items);

	// The subscription stays live past the recovery.
	primary
		.writer
		.create(peer_entity("P101", "wg0", "10.0.0.2/32"))
		.await
		.unwrap();
	wait_for_sequence(&follower.log, Sequence::from_u64(101)).await;
}
