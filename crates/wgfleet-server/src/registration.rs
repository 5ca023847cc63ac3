// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Peer self-registration: allocate a free address in the interface's
//! ranges and create the peer through the log writer, so the registration
//! propagates to followers like any other op.

use std::collections::{BTreeMap, HashSet};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::sqlite::SqlitePool;
use tokio::sync::Mutex;

use wgfleet_core::{Cidr, Entity, Error, Interface, Peer, RegisterPeerRequest, Result};
use wgfleet_db::entity_store;
use wgfleet_log::EntityWriter;

pub struct RegistrationService {
	pool: SqlitePool,
	writer: Arc<dyn EntityWriter>,
	// The SQL transaction alone cannot serialize allocations: two requests
	// reading the same free address concurrently would both claim it. The
	// scan is also expensive, but allocation only happens at registration
	// time, not on the packet path.
	lock: Mutex<()>,
}

impl RegistrationService {
	pub fn new(pool: SqlitePool, writer: Arc<dyn EntityWriter>) -> Self {
		Self {
			pool,
			writer,
			lock: Mutex::new(()),
		}
	}

	#[tracing::instrument(skip(self, req), fields(interface = %req.interface, public_key = %req.public_key))]
	pub async fn register_new_peer(&self, req: &RegisterPeerRequest) -> Result<Peer> {
		if req.interface.is_empty() || req.public_key.is_empty() {
			return Err(Error::Validation(
				"registration needs both interface and public_key".into(),
			));
		}

		let _guard = self.lock.lock().await;

		let (interface, taken) = self.interface_and_allocations(&req.interface).await?;

		let mut peer = Peer {
			public_key: req.public_key.clone(),
			interface: req.interface.clone(),
			..Default::default()
		};
		if req.ttl > 0 {
			peer.expire = Some(
				Utc::now()
					+ chrono::Duration::from_std(Duration::from_secs(req.ttl))
						.map_err(|e| Error::Validation(format!("invalid ttl: {e}")))?,
			);
		}

		if let Some(range) = interface.ip {
			peer.ip = Some(Cidr::host(next_free_ip(&range, &taken)?));
		}
		if let Some(range) = interface.ip6 {
			peer.ip6 = Some(Cidr::host(next_free_ip(&range, &taken)?));
		}

		self.writer.create(Entity::Peer(peer.clone())).await?;
		tracing::info!(
			ip = ?peer.ip.map(|c| c.to_string()),
			ip6 = ?peer.ip6.map(|c| c.to_string()),
			"registered peer"
		);
		Ok(peer)
	}

	async fn interface_and_allocations(
		&self,
		interface: &str,
	) -> Result<(Interface, HashSet<IpAddr>)> {
		let mut tx = self.pool.begin().await?;

		let mut filter = BTreeMap::new();
		filter.insert("name".to_string(), interface.to_string());
		let found =
			entity_store::find(&mut tx, wgfleet_core::EntityKind::Interface, &filter).await?;
		let Some(Entity::Interface(intf)) = found.into_iter().next() else {
			return Err(Error::Validation(format!("unknown interface {interface:?}")));
		};

		let mut filter = BTreeMap::new();
		filter.insert("interface".to_string(), interface.to_string());
		let peers = entity_store::find(&mut tx, wgfleet_core::EntityKind::Peer, &filter).await?;
		tx.rollback().await?;

		let mut taken = HashSet::new();
		for peer in peers {
			let Entity::Peer(p) = peer else { continue };
			if let Some(c) = p.ip {
				taken.insert(c.addr());
			}
			if let Some(c) = p.ip6 {
				taken.insert(c.addr());
			}
		}
		Ok((intf, taken))
	}
}

fn next_free_ip(range: &Cidr, taken: &HashSet<IpAddr>) -> Result<IpAddr> {
	range
		.hosts_after()
		.find(|ip| !taken.contains(ip))
		.ok_or_else(|| Error::Validation(format!("address pool {range} exhausted")))
}
