// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! The relational adapter: maps entity operations to parameterized SQL on
//! the per-kind tables, dispatching by variant.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use wgfleet_core::{Cidr, Entity, EntityKind, Error, Interface, Peer, Result, Token};

type InterfaceRow = (String, i64, Option<String>, Option<String>, i64, String, String);
type PeerRow = (String, String, Option<String>, Option<String>, Option<DateTime<Utc>>);
type TokenRow = (String, String, String);

const INTERFACE_COLUMNS: &str = "name, port, ip, ip6, fwmark, private_key, public_key";
const PEER_COLUMNS: &str = "public_key, interface, ip, ip6, expire";
const TOKEN_COLUMNS: &str = "id, secret, roles";

pub async fn insert(conn: &mut SqliteConnection, entity: &Entity) -> Result<()> {
	match entity {
		Entity::Interface(i) => {
			sqlx::query(
				"INSERT INTO interfaces (name, port, ip, ip6, fwmark, private_key, public_key)
				 VALUES (?, ?, ?, ?, ?, ?, ?)",
			)
			.bind(&i.name)
			.bind(i.port as i64)
			.bind(i.ip.map(|c| c.to_string()))
			.bind(i.ip6.map(|c| c.to_string()))
			.bind(i.fwmark as i64)
			.bind(&i.private_key)
			.bind(&i.public_key)
			.execute(conn)
			.await?;
		}
		Entity::Peer(p) => {
			sqlx::query(
				"INSERT INTO peers (public_key, interface, ip, ip6, expire)
				 VALUES (?, ?, ?, ?, ?)",
			)
			.bind(&p.public_key)
			.bind(&p.interface)
			.bind(p.ip.map(|c| c.to_string()))
			.bind(p.ip6.map(|c| c.to_string()))
			.bind(p.expire)
			.execute(conn)
			.await?;
		}
		Entity::Token(t) => {
			sqlx::query("INSERT INTO tokens (id, secret, roles) VALUES (?, ?, ?)")
				.bind(&t.id)
				.bind(&t.secret)
				.bind(t.roles.join(","))
				.execute(conn)
				.await?;
		}
	}
	Ok(())
}

pub async fn update(conn: &mut SqliteConnection, entity: &Entity) -> Result<()> {
	match entity {
		Entity::Interface(i) => {
			sqlx::query(
				"UPDATE interfaces
				 SET port = ?, ip = ?, ip6 = ?, fwmark = ?, private_key = ?, public_key = ?
				 WHERE name = ?",
			)
			.bind(i.port as i64)
			.bind(i.ip.map(|c| c.to_string()))
			.bind(i.ip6.map(|c| c.to_string()))
			.bind(i.fwmark as i64)
			.bind(&i.private_key)
			.bind(&i.public_key)
			.bind(&i.name)
			.execute(conn)
			.await?;
		}
		Entity::Peer(p) => {
			sqlx::query(
				"UPDATE peers SET interface = ?, ip = ?, ip6 = ?, expire = ? WHERE public_key = ?",
			)
			.bind(&p.interface)
			.bind(p.ip.map(|c| c.to_string()))
			.bind(p.ip6.map(|c| c.to_string()))
			.bind(p.expire)
			.bind(&p.public_key)
			.execute(conn)
			.await?;
		}
		Entity::Token(t) => {
			sqlx::query("UPDATE tokens SET secret = ?, roles = ? WHERE id = ?")
				.bind(&t.secret)
				.bind(t.roles.join(","))
				.bind(&t.id)
				.execute(conn)
				.await?;
		}
	}
	Ok(())
}

pub async fn delete(conn: &mut SqliteConnection, entity: &Entity) -> Result<()> {
	let kind = entity.kind();
	let sql = format!(
		"DELETE FROM {} WHERE {} = ?",
		kind.table(),
		kind.primary_key()
	);
	sqlx::query(&sql)
		.bind(entity.primary_key())
		.execute(conn)
		.await?;
	Ok(())
}

/// Purge every entity of every kind. Used by snapshot loading.
pub async fn delete_all(conn: &mut SqliteConnection) -> Result<()> {
	for kind in EntityKind::ALL {
		let sql = format!("DELETE FROM {}", kind.table());
		sqlx::query(&sql).execute(&mut *conn).await?;
	}
	Ok(())
}

pub async fn count_all(conn: &mut SqliteConnection) -> Result<i64> {
	let mut total = 0;
	for kind in EntityKind::ALL {
		let sql = format!("SELECT COUNT(*) FROM {}", kind.table());
		let (count,): (i64,) = sqlx::query_as(&sql).fetch_one(&mut *conn).await?;
		total += count;
	}
	Ok(total)
}

/// Every entity of every kind, for snapshot generation. Order is stable
/// within one call but otherwise unspecified.
pub async fn all(conn: &mut SqliteConnection) -> Result<Vec<Entity>> {
	let mut out = Vec::new();
	for kind in EntityKind::ALL {
		out.extend(find(conn, kind, &BTreeMap::new()).await?);
	}
	Ok(out)
}

/// Entities of `kind` matching the conjunction of field equality filters.
/// Filter keys must name declared columns of the kind.
pub async fn find(
	conn: &mut SqliteConnection,
	kind: EntityKind,
	filter: &BTreeMap<String, String>,
) -> Result<Vec<Entity>> {
	let columns = match kind {
		EntityKind::Interface => INTERFACE_COLUMNS,
		EntityKind::Peer => PEER_COLUMNS,
		EntityKind::Token => TOKEN_COLUMNS,
	};

	let mut sql = format!("SELECT {} FROM {}", columns, kind.table());
	for (i, field) in filter.keys().enumerate() {
		if !kind.has_field(field) {
			return Err(Error::Validation(format!(
				"unknown field {:?} for type {}",
				field,
				kind.name()
			)));
		}
		sql.push_str(if i == 0 { " WHERE " } else { " AND " });
		sql.push_str(field);
		sql.push_str(" = ?");
	}
	sql.push_str(" ORDER BY ");
	sql.push_str(kind.primary_key());

	match kind {
		EntityKind::Interface => {
			let mut query = sqlx::query_as::<_, InterfaceRow>(&sql);
			for value in filter.values() {
				query = query.bind(value);
			}
			let rows = query.fetch_all(conn).await?;
			rows.into_iter().map(interface_from_row).collect()
		}
		EntityKind::Peer => {
			let mut query = sqlx::query_as::<_, PeerRow>(&sql);
			for value in filter.values() {
				query = query.bind(value);
			}
			let rows = query.fetch_all(conn).await?;
			rows.into_iter().map(peer_from_row).collect()
		}
		EntityKind::Token => {
			let mut query = sqlx::query_as::<_, TokenRow>(&sql);
			for value in filter.values() {
				query = query.bind(value);
			}
			let rows = query.fetch_all(conn).await?;
			rows.into_iter().map(token_from_row).collect()
		}
	}
}

/// Public keys of peers whose expiry has passed. Fast path for the expiry
/// job; deletion itself goes through the log writer.
pub async fn expired_peers(conn: &mut SqliteConnection, now: DateTime<Utc>) -> Result<Vec<String>> {
	let rows: Vec<(String,)> =
		sqlx::query_as("SELECT public_key FROM peers WHERE expire IS NOT NULL AND expire < ?")
			.bind(now)
			.fetch_all(conn)
			.await?;
	Ok(rows.into_iter().map(|(pk,)| pk).collect())
}

fn parse_cidr(value: Option<String>) -> Result<Option<Cidr>> {
	value.map(|s| s.parse()).transpose()
}

fn interface_from_row(row: InterfaceRow) -> Result<Entity> {
	let (name, port, ip, ip6, fwmark, private_key, public_key) = row;
	Ok(Entity::Interface(Interface {
		name,
		port: port as u16,
		ip: parse_cidr(ip)?,
		ip6: parse_cidr(ip6)?,
		fwmark: fwmark as u32,
		private_key,
		public_key,
	}))
}

fn peer_from_row(row: PeerRow) -> Result<Entity> {
	let (public_key, interface, ip, ip6, expire) = row;
	Ok(Entity::Peer(Peer {
		public_key,
		interface,
		ip: parse_cidr(ip)?,
		ip6: parse_cidr(ip6)?,
		expire,
	}))
}

fn token_from_row(row: TokenRow) -> Result<Entity> {
	let (id, secret, roles) = row;
	let roles = if roles.is_empty() {
		Vec::new()
	} else {
		roles.split(',').map(str::to_string).collect()
	};
	Ok(Entity::Token(Token { id, secret, roles }))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::pool::testing::memory_pool;

	fn peer(pk: &str, interface: &str) -> Entity {
		Entity::Peer(Peer {
			public_key: pk.into(),
			interface: interface.into(),
			ip: Some("10.0.0.2/32".parse().unwrap()),
			..Default::default()
		})
	}

	#[tokio::test]
	async fn insert_find_update_delete() {
		let pool = memory_pool().await;
		let mut conn = pool.acquire().await.unwrap();

		insert(&mut conn, &peer("P1", "wg0")).await.unwrap();

		let mut filter = BTreeMap::new();
		filter.insert("public_key".to_string(), "P1".to_string());
		let found = find(&mut conn, EntityKind::Peer, &filter).await.unwrap();
		assert_eq!(found.len(), 1);
		assert_eq!(found[0], peer("P1", "wg0"));

		let updated = Entity::Peer(Peer {
			public_key: "P1".into(),
			interface: "wg0".into(),
			ip: Some("10.0.0.5/32".parse().unwrap()),
			..Default::default()
		});
		update(&mut conn, &updated).await.unwrap();
		let found = find(&mut conn, EntityKind::Peer, &filter).await.unwrap();
		assert_eq!(found[0], updated);

		delete(&mut conn, &updated).await.unwrap();
		let found = find(&mut conn, EntityKind::Peer, &filter).await.unwrap();
		assert!(found.is_empty());
	}

	#[tokio::test]
	async fn find_filters_conjunctively() {
		let pool = memory_pool().await;
		let mut conn = pool.acquire().await.unwrap();

		insert(&mut conn, &peer("P1", "wg0")).await.unwrap();
		insert(&mut conn, &peer("P2", "wg0")).await.unwrap();
		insert(&mut conn, &peer("P3", "wg1")).await.unwrap();

		let mut filter = BTreeMap::new();
		filter.insert("interface".to_string(), "wg0".to_string());
		let found = find(&mut conn, EntityKind::Peer, &filter).await.unwrap();
		assert_eq!(found.len(), 2);

		filter.insert("public_key".to_string(), "P2".to_string());
		let found = find(&mut conn, EntityKind::Peer, &filter).await.unwrap();
		assert_eq!(found.len(), 1);
		assert_eq!(found[0].primary_key(), "P2");
	}

	#[tokio::test]
	async fn find_rejects_unknown_fields() {
		let pool = memory_pool().await;
		let mut conn = pool.acquire().await.unwrap();

		let mut filter = BTreeMap::new();
		filter.insert("port; DROP TABLE peers".to_string(), "x".to_string());
		let err = find(&mut conn, EntityKind::Peer, &filter).await.unwrap_err();
		assert!(matches!(err, Error::Validation(_)));
	}

	#[tokio::test]
	async fn all_spans_every_kind() {
		let pool = memory_pool().await;
		let mut conn = pool.acquire().await.unwrap();

		insert(
			&mut conn,
			&Entity::Interface(Interface {
				name: "wg0".into(),
				port: 4004,
				ip: Some("10.0.0.1/24".parse().unwrap()),
				..Default::default()
			}),
		)
		.await
		.unwrap();
		insert(&mut conn, &peer("P1", "wg0")).await.unwrap();
		insert(
			&mut conn,
			&Entity::Token(Token {
				id: "t1".into(),
				secret: "s".into(),
				roles: vec!["admin".into()],
			}),
		)
		.await
		.unwrap();

		let everything = all(&mut conn).await.unwrap();
		assert_eq!(everything.len(), 3);
		assert_eq!(count_all(&mut conn).await.unwrap(), 3);

		delete_all(&mut conn).await.unwrap();
		assert_eq!(count_all(&mut conn).await.unwrap(), 0);
	}

	#[tokio::test]
	async fn token_roles_round_trip() {
		let pool = memory_pool().await;
		let mut conn = pool.acquire().await.unwrap();

		let token = Entity::Token(Token {
			id: "t1".into(),
			secret: "s".into(),
			roles: vec!["admin".into(), "follower".into()],
		});
		insert(&mut conn, &token).await.unwrap();

		let mut filter = BTreeMap::new();
		filter.insert("id".to_string(), "t1".to_string());
		let found = find(&mut conn, EntityKind::Token, &filter).await.unwrap();
		assert_eq!(found[0], token);
	}

	#[tokio::test]
	async fn expired_peers_query() {
		let pool = memory_pool().await;
		let mut conn = pool.acquire().await.unwrap();

		let expired = Entity::Peer(Peer {
			public_key: "OLD".into(),
			interface: "wg0".into(),
			expire: Some(Utc::now() - chrono::Duration::hours(1)),
			..Default::default()
		});
		let fresh = Entity::Peer(Peer {
			public_key: "NEW".into(),
			interface: "wg0".into(),
			expire: Some(Utc::now() + chrono::Duration::hours(1)),
			..Default::default()
		});
		let permanent = peer("P1", "wg0");
		insert(&mut conn, &expired).await.unwrap();
		insert(&mut conn, &fresh).await.unwrap();
		insert(&mut conn, &permanent).await.unwrap();

		let pks = expired_peers(&mut conn, Utc::now()).await.unwrap();
		assert_eq!(pks, vec!["OLD".to_string()]);
	}
}
