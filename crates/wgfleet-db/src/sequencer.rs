// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! The persistent sequence counter: a singleton row read and written inside
//! the same transaction as the op it labels.

use sqlx::SqliteConnection;

use wgfleet_core::{Error, Result, Sequence};

/// The current sequence; 0 on an empty store.
pub async fn current(conn: &mut SqliteConnection) -> Result<Sequence> {
	let row: Option<(i64,)> = sqlx::query_as("SELECT seq FROM sequence LIMIT 1")
		.fetch_optional(conn)
		.await?;
	Ok(Sequence::from_u64(row.map(|(v,)| v as u64).unwrap_or(0)))
}

/// The sequence the next committed op will get.
pub async fn next(conn: &mut SqliteConnection) -> Result<Sequence> {
	Ok(current(conn).await?.next())
}

/// Advance the counter. Moving it backwards is a log rewind and fatal.
pub async fn set(conn: &mut SqliteConnection, seq: Sequence) -> Result<()> {
	if seq < current(conn).await? {
		return Err(Error::OutOfSequence);
	}
	sqlx::query("UPDATE sequence SET seq = ?")
		.bind(seq.as_u64() as i64)
		.execute(conn)
		.await?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::pool::testing::memory_pool;

	#[tokio::test]
	async fn starts_at_zero_and_advances() {
		let pool = memory_pool().await;
		let mut conn = pool.acquire().await.unwrap();

		assert_eq!(current(&mut conn).await.unwrap(), Sequence::ZERO);
		assert_eq!(next(&mut conn).await.unwrap(), Sequence::from_u64(1));

		set(&mut conn, Sequence::from_u64(1)).await.unwrap();
		assert_eq!(current(&mut conn).await.unwrap(), Sequence::from_u64(1));
		assert_eq!(next(&mut conn).await.unwrap(), Sequence::from_u64(2));
	}

	#[tokio::test]
	async fn rewind_is_rejected() {
		let pool = memory_pool().await;
		let mut conn = pool.acquire().await.unwrap();

		set(&mut conn, Sequence::from_u64(10)).await.unwrap();
		// Setting the same value again is allowed, going backwards is not.
		set(&mut conn, Sequence::from_u64(10)).await.unwrap();
		let err = set(&mut conn, Sequence::from_u64(9)).await.unwrap_err();
		assert!(matches!(err, Error::OutOfSequence));
	}
}
