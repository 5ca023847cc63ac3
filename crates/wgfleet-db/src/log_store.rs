// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Append-only op log storage.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use wgfleet_core::{codec, Op, OpType, Result, Sequence};

/// Append a serialized op. Must run in the same transaction as the entity
/// mutation it records.
pub async fn append(conn: &mut SqliteConnection, op: &Op) -> Result<()> {
	let value = codec::encode_entity(&op.entity)?;
	sqlx::query("INSERT INTO log (seq, type, timestamp, value) VALUES (?, ?, ?, ?)")
		.bind(op.seq.as_u64() as i64)
		.bind(op.op_type.as_i64())
		.bind(op.timestamp)
		.bind(value)
		.execute(conn)
		.await?;
	Ok(())
}

/// All retained ops with `seq >= start`, in sequence order.
pub async fn since(conn: &mut SqliteConnection, start: Sequence) -> Result<Vec<Op>> {
	let rows: Vec<(i64, i64, DateTime<Utc>, Vec<u8>)> = sqlx::query_as(
		"SELECT seq, type, timestamp, value FROM log WHERE seq >= ? ORDER BY seq ASC",
	)
	.bind(start.as_u64() as i64)
	.fetch_all(conn)
	.await?;

	let mut out = Vec::with_capacity(rows.len());
	for (seq, op_type, timestamp, value) in rows {
		out.push(Op {
			seq: Sequence::from_u64(seq as u64),
			op_type: OpType::from_i64(op_type),
			timestamp,
			entity: codec::decode_entity(&value)?,
		});
	}
	Ok(out)
}

/// The lowest retained sequence, if any entries are retained at all.
pub async fn horizon(conn: &mut SqliteConnection) -> Result<Option<Sequence>> {
	let (min,): (Option<i64>,) = sqlx::query_as("SELECT MIN(seq) FROM log")
		.fetch_one(conn)
		.await?;
	Ok(min.map(|v| Sequence::from_u64(v as u64)))
}

/// Delete entries older than `cutoff`, raising the horizon. Trimming only
/// ever removes a prefix of the log (timestamps are assigned in commit
/// order), so it cannot punch holes.
pub async fn trim(conn: &mut SqliteConnection, cutoff: DateTime<Utc>) -> Result<u64> {
	let result = sqlx::query("DELETE FROM log WHERE timestamp < ?")
		.bind(cutoff)
		.execute(conn)
		.await?;
	Ok(result.rows_affected())
}
