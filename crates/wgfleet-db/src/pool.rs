// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{
	SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};

use wgfleet_core::Result;

use crate::migrations;

/// Create a SqlitePool with WAL mode and run the schema migrations.
///
/// The pool is capped at a single connection: SQLite transaction isolation
/// between tasks sharing a connection is weaker than the snapshot semantics
/// the log engine needs, so all concurrency is mediated by the engine's
/// lock instead of the pool.
#[tracing::instrument(skip(database_url))]
pub async fn open_pool(database_url: &str) -> Result<SqlitePool> {
	let options = SqliteConnectOptions::from_str(database_url)?
		.journal_mode(SqliteJournalMode::Wal)
		.synchronous(SqliteSynchronous::Normal)
		.busy_timeout(Duration::from_secs(10))
		.create_if_missing(true);

	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.min_connections(1)
		.connect_with(options)
		.await?;

	migrations::run(&pool).await?;

	tracing::debug!("database pool created");
	Ok(pool)
}
