// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Transport interruption: the follower backs off while its upstream is
//! unreachable, then resumes from `latest + 1` with no snapshot, missing
//! nothing and duplicating nothing.

mod common;

use common::{peer_entity, spawn_follower, spawn_primary, wait_for_sequence, TestProxy};
use wgfleet_core::Sequence;

#[tokio::test]
async fn follower_resumes_after_the_stream_is_severed() {
	let primary = spawn_primary().await;
	let proxy = TestProxy::spawn(primary.url.clone()).await;
	let follower = spawn_follower(&proxy.url).await;

	for i in 1..=5 {
		primary
			.writer
			.create(peer_entity(&format!("P{i}"), "wg0", "10.0.0.2/32"))
			.await
			.unwrap();
	}
	wait_for_sequence(&follower.log, Sequence::from_u64(5)).await;

	// Sever the stream mid-flight and keep writing while the follower is
	// cut off.
	proxy.set_enabled(false);
	for i in 6..=10 {
		primary
			.writer
			.create(peer_entity(&format!("P{i}"), "wg0", "10.0.0.2/32"))
			.await
			.unwrap();
	}
	tokio::time::sleep(std::time::Duration::from_millis(300)).await;
	assert_eq!(
		follower.log.latest_sequence().await.unwrap(),
		Sequence::from_u64(5)
	);

	// Upstream comes back; the follower resumes from 6 over the retained
	// log, no snapshot needed.
	proxy.set_enabled(true);
	wait_for_sequence(&follower.log, Sequence::from_u64(10)).await;

	let follower_snap = follower.log.snapshot().await.unwrap();
	let primary_snap = primary.log.snapshot().await.unwrap();
	assert_eq!(follower_snap.items.len(), 10);
	assert_eq!(follower_snap.items, primary_snap.items);
}
