// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Session telemetry: edge detection over the stats stream from gateways.
//!
//! Peers can roam between gateways, so the finder keeps the most recent
//! handshake time per peer to build one linear history of events. Active
//! sessions live in memory; a session is persisted once its "down" edge is
//! detected.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::SqlitePool;

use wgfleet_core::{PeerStats, Result, Session};

/// A peer with no handshake for this many seconds is considered gone.
const SESSION_INACTIVITY_SECS: i64 = 600;

/// How many persisted sessions a lookup returns.
const SESSION_QUERY_LIMIT: i64 = 100;

#[derive(Default)]
pub struct SessionFinder {
	active: HashMap<String, Session>,
	last_handshake: HashMap<String, DateTime<Utc>>,
}

impl SessionFinder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Feed one stats sample; returns a completed session on a "down" edge.
	pub fn analyze(&mut self, now: DateTime<Utc>, stats: &PeerStats) -> Option<Session> {
		let ht = self.observe_handshake(stats);
		let active = ht.is_some_and(|ht| now - Duration::seconds(SESSION_INACTIVITY_SECS) < ht);

		match (self.active.contains_key(&stats.public_key), active) {
			(false, true) => {
				// "Up" edge, a new session.
				let ht = ht.expect("active implies a handshake time");
				self.active.insert(
					stats.public_key.clone(),
					Session {
						peer_public_key: stats.public_key.clone(),
						begin: ht,
						end: None,
						active: true,
					},
				);
				None
			}
			(true, false) => {
				// "Down" edge, the session has gone stale.
				let mut session = self.active.remove(&stats.public_key)?;
				session.end = ht;
				session.active = false;
				Some(session)
			}
			_ => None,
		}
	}

	/// Track the most recently seen handshake time for the peer; stale
	/// reports from lagging gateways never move it backwards.
	fn observe_handshake(&mut self, stats: &PeerStats) -> Option<DateTime<Utc>> {
		let observed = stats.last_handshake_time?;
		let entry = self
			.last_handshake
			.entry(stats.public_key.clone())
			.or_insert(observed);
		if observed > *entry {
			*entry = observed;
		}
		Some(*entry)
	}

	pub fn active_by_public_key(&self, public_key: &str) -> Option<Session> {
		self.active.get(public_key).cloned()
	}
}

pub struct SessionManager {
	pool: SqlitePool,
	finder: Mutex<SessionFinder>,
}

impl SessionManager {
	pub fn new(pool: SqlitePool) -> Self {
		Self {
			pool,
			finder: Mutex::new(SessionFinder::new()),
		}
	}

	#[tracing::instrument(skip(self, dump), fields(samples = dump.len()))]
	pub async fn receive_peer_stats(&self, dump: Vec<PeerStats>) -> Result<()> {
		self.receive_peer_stats_at(Utc::now(), dump).await
	}

	async fn receive_peer_stats_at(&self, now: DateTime<Utc>, dump: Vec<PeerStats>) -> Result<()> {
		let completed: Vec<Session> = {
			let mut finder = self.finder.lock().expect("session finder lock poisoned");
			dump.iter().filter_map(|s| finder.analyze(now, s)).collect()
		};

		if completed.is_empty() {
			return Ok(());
		}

		let mut tx = self.pool.begin().await?;
		for session in &completed {
			tracing::debug!(peer = %session.peer_public_key, "session completed");
			sqlx::query(
				"INSERT INTO sessions (peer_public_key, begin_timestamp, end_timestamp, active)
				 VALUES (?, ?, ?, 0)",
			)
			.bind(&session.peer_public_key)
			.bind(session.begin)
			.bind(session.end)
			.execute(&mut *tx)
			.await?;
		}
		tx.commit().await?;
		Ok(())
	}

	/// The peer's active session (if any) followed by its most recent
	/// completed sessions.
	pub async fn find_by_public_key(&self, public_key: &str) -> Result<Vec<Session>> {
		let mut out = Vec::new();
		if let Some(active) = self
			.finder
			.lock()
			.expect("session finder lock poisoned")
			.active_by_public_key(public_key)
		{
			out.push(active);
		}

		let rows: Vec<(String, DateTime<Utc>, Option<DateTime<Utc>>, bool)> = sqlx::query_as(
			"SELECT peer_public_key, begin_timestamp, end_timestamp, active
			 FROM sessions WHERE peer_public_key = ?
			 ORDER BY begin_timestamp DESC LIMIT ?",
		)
		.bind(public_key)
		.bind(SESSION_QUERY_LIMIT)
		.fetch_all(&self.pool)
		.await?;

		out.extend(rows.into_iter().map(|(peer_public_key, begin, end, active)| Session {
			peer_public_key,
			begin,
			end,
			active,
		}));
		Ok(out)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use wgfleet_db::open_pool;

	fn stats(pk: &str, handshake: Option<DateTime<Utc>>) -> PeerStats {
		PeerStats {
			public_key: pk.into(),
			last_handshake_time: handshake,
			rx_bytes: 0,
			tx_bytes: 0,
			endpoint: String::new(),
		}
	}

	#[test]
	fn up_and_down_edges() {
		let mut finder = SessionFinder::new();
		let now = Utc::now();

		// Fresh handshake: an "up" edge, nothing completed yet.
		assert!(finder.analyze(now, &stats("P1", Some(now))).is_none());
		assert!(finder.active_by_public_key("P1").is_some());

		// Still active a minute later.
		let later = now + Duration::seconds(60);
		assert!(finder.analyze(later, &stats("P1", Some(now))).is_none());

		// Past the inactivity timeout: a "down" edge completes the session.
		let stale = now + Duration::seconds(700);
		let session = finder.analyze(stale, &stats("P1", Some(now))).unwrap();
		assert_eq!(session.peer_public_key, "P1");
		assert!(!session.active);
		assert_eq!(session.begin, now);
		assert_eq!(session.end, Some(now));
		assert!(finder.active_by_public_key("P1").is_none());
	}

	#[test]
	fn handshake_time_never_goes_backwards() {
		let mut finder = SessionFinder::new();
		let now = Utc::now();
		let earlier = now - Duration::seconds(120);

		finder.analyze(now, &stats("P1", Some(now)));
		// A lagging gateway reports an older handshake; the session stays
		// anchored to the newer one.
		finder.analyze(now, &stats("P1", Some(earlier)));
		let session = finder
			.analyze(now + Duration::seconds(700), &stats("P1", Some(earlier)))
			.unwrap();
		assert_eq!(session.end, Some(now));
	}

	#[test]
	fn peer_without_handshake_never_starts_a_session() {
		let mut finder = SessionFinder::new();
		assert!(finder.analyze(Utc::now(), &stats("P1", None)).is_none());
		assert!(finder.active_by_public_key("P1").is_none());
	}

	#[tokio::test]
	async fn completed_sessions_are_persisted_and_found() {
		let pool = open_pool("sqlite::memory:").await.unwrap();
		let manager = SessionManager::new(pool);
		let begin = Utc::now();

		// Up edge...
		manager
			.receive_peer_stats_at(begin, vec![stats("P1", Some(begin))])
			.await
			.unwrap();
		let found = manager.find_by_public_key("P1").await.unwrap();
		assert_eq!(found.len(), 1);
		assert!(found[0].active);

		// ...then the handshake goes stale and the session completes.
		manager
			.receive_peer_stats_at(begin + Duration::seconds(700), vec![stats("P1", Some(begin))])
			.await
			.unwrap();
		let found = manager.find_by_public_key("P1").await.unwrap();
		assert_eq!(found.len(), 1);
		assert!(!found[0].active);
		assert_eq!(found[0].end, Some(begin));
	}
}
