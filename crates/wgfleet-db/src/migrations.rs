// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Schema migrations, tracked with the SQLite `user_version` pragma and
//! applied in order inside a single transaction.

use sqlx::sqlite::SqlitePool;

use wgfleet_core::{Error, Result};

/// One migration is a list of DDL statements executed in order.
const MIGRATIONS: &[&[&str]] = &[
	// v1: the replicated inventory, the op log and the sequence counter.
	&[
		"CREATE TABLE log (
			seq INTEGER PRIMARY KEY NOT NULL,
			type INTEGER NOT NULL,
			timestamp DATETIME NOT NULL,
			value BLOB NOT NULL
		)",
		"CREATE TABLE sequence (
			seq INTEGER NOT NULL
		)",
		"INSERT INTO sequence (seq) VALUES (0)",
		"CREATE TABLE interfaces (
			name TEXT PRIMARY KEY NOT NULL,
			port INTEGER NOT NULL DEFAULT 0,
			ip TEXT,
			ip6 TEXT,
			fwmark INTEGER NOT NULL DEFAULT 0,
			private_key TEXT NOT NULL DEFAULT '',
			public_key TEXT NOT NULL DEFAULT ''
		)",
		"CREATE TABLE peers (
			public_key TEXT PRIMARY KEY NOT NULL,
			interface TEXT NOT NULL DEFAULT '',
			ip TEXT,
			ip6 TEXT,
			expire DATETIME
		)",
		"CREATE INDEX idx_peers_interface ON peers (interface)",
		"CREATE TABLE tokens (
			id TEXT PRIMARY KEY NOT NULL,
			secret TEXT NOT NULL DEFAULT '',
			roles TEXT NOT NULL DEFAULT ''
		)",
	],
	// v2: session telemetry written by the stats collector.
	&[
		"CREATE TABLE sessions (
			peer_public_key TEXT NOT NULL,
			begin_timestamp DATETIME NOT NULL,
			end_timestamp DATETIME,
			active BOOLEAN NOT NULL DEFAULT 0
		)",
		"CREATE INDEX idx_sessions_peer ON sessions (peer_public_key)",
	],
];

/// Apply any pending migrations.
pub async fn run(pool: &SqlitePool) -> Result<()> {
	let mut tx = pool.begin().await?;

	let (applied,): (i64,) = sqlx::query_as("PRAGMA user_version").fetch_one(&mut *tx).await?;
	let applied = applied as usize;

	if applied == MIGRATIONS.len() {
		return Ok(());
	}
	if applied > MIGRATIONS.len() {
		return Err(Error::Validation(format!(
			"database is at schema version {applied}, which is more recent than this binary understands"
		)));
	}

	for (version, statements) in MIGRATIONS.iter().enumerate().skip(applied) {
		for stmt in *statements {
			sqlx::query(stmt).execute(&mut *tx).await.map_err(|e| {
				Error::Validation(format!("migration to version {} failed: {e}", version + 1))
			})?;
		}
	}

	// Parameter substitution is not available in PRAGMA statements.
	sqlx::query(&format!("PRAGMA user_version = {}", MIGRATIONS.len()))
		.execute(&mut *tx)
		.await?;

	tx.commit().await?;
	Ok(())
}
