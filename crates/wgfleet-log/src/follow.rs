// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! The follower loop: continuously pull from a [`LogSource`] and feed a
//! local [`LogSink`].
//!
//! Catchup resumes from the sink's own latest sequence. When the source
//! rejects the start as below its horizon, the follower bootstraps once per
//! attempt from a snapshot and resubscribes; a second horizon miss in the
//! same attempt is permanent. Transport failures (including a server
//! closing the stream) restart the attempt under backoff, forever.

use wgfleet_core::{Error, Result};

use crate::backoff::Backoff;
use crate::traits::{LogSink, LogSource};

/// Run the follower until a permanent error. Returns only on failure;
/// callers race it against their shutdown signal.
pub async fn follow<S, D>(src: &S, dst: &D) -> Error
where
	S: LogSource + ?Sized,
	D: LogSink + ?Sized,
{
	let mut backoff = Backoff::default();

	loop {
		match follow_once(src, dst, &mut backoff).await {
			Ok(()) => {
				tracing::debug!("log stream ended, resubscribing");
			}
			Err(e) if e.is_transient() => {
				tracing::warn!(error = %e, "transient error while following log");
			}
			Err(e) => return e,
		}

		let delay = backoff.next_delay();
		tracing::debug!(delay_ms = delay.as_millis() as u64, "waiting before resubscribe");
		tokio::time::sleep(delay).await;
	}
}

/// One follow attempt: subscribe (with at most one snapshot bootstrap),
/// then apply ops until the stream ends.
async fn follow_once<S, D>(src: &S, dst: &D, backoff: &mut Backoff) -> Result<()>
where
	S: LogSource + ?Sized,
	D: LogSink + ?Sized,
{
	let mut start = dst.latest_sequence().await?;
	let mut snapshot_taken = false;

	tracing::info!(%start, "follow starts from local sequence");

	let mut sub = loop {
		match src.subscribe(start.next()).await {
			Ok(sub) => break sub,
			Err(Error::Horizon) if !snapshot_taken => {
				tracing::info!(%start, "local sequence is past the remote horizon, grabbing snapshot");
				let snapshot = src.snapshot().await?;
				let seq = snapshot.seq;
				dst.load_snapshot(snapshot).await?;
				tracing::info!(%seq, "loaded snapshot");
				start = seq;
				snapshot_taken = true;
			}
			Err(e) => return Err(e),
		}
	};

	while let Some(op) = sub.next().await {
		let seq = op.seq;
		dst.apply(op, true)
			.await
			.map_err(|e| match e {
				e if e.is_transient() => e,
				e => {
					tracing::error!(%seq, error = %e, "failed to apply op");
					e
				}
			})?;
		// The stream made progress: the next interruption starts over with
		// a short delay.
		backoff.reset();
	}

	Ok(())
}
