// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Typed client for the per-type CRUD endpoints and peer registration.

use std::collections::BTreeMap;

use wgfleet_core::{codec, Entity, EntityKind, Error, Peer, RegisterPeerRequest, Result};

use crate::http::join_url;
use crate::remote::unwrap_error;

pub struct CrudClient {
	base_url: String,
	client: reqwest::Client,
}

impl CrudClient {
	pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
		Self {
			base_url: base_url.into(),
			client,
		}
	}

	pub async fn create(&self, entity: &Entity) -> Result<()> {
		self.write_op(entity, "create").await
	}

	pub async fn update(&self, entity: &Entity) -> Result<()> {
		self.write_op(entity, "update").await
	}

	pub async fn delete(&self, entity: &Entity) -> Result<()> {
		self.write_op(entity, "delete").await
	}

	async fn write_op(&self, entity: &Entity, verb: &str) -> Result<()> {
		let url = join_url(
			&self.base_url,
			&format!("/api/v1/{}/{verb}", entity.kind().name()),
		);
		let payload = codec::entity_payload(entity)?;
		let resp = self
			.client
			.post(&url)
			.json(&payload)
			.send()
			.await
			.map_err(|e| Error::Transport(e.to_string()))?;
		if !resp.status().is_success() {
			return Err(unwrap_error(resp).await);
		}
		Ok(())
	}

	/// Entities of `kind` matching the given field equality filters.
	pub async fn find(
		&self,
		kind: EntityKind,
		filter: &BTreeMap<String, String>,
	) -> Result<Vec<Entity>> {
		let url = join_url(&self.base_url, &format!("/api/v1/{}/find", kind.name()));
		let resp = self
			.client
			.get(&url)
			.query(filter)
			.send()
			.await
			.map_err(|e| Error::Transport(e.to_string()))?;
		if !resp.status().is_success() {
			return Err(unwrap_error(resp).await);
		}
		let payloads: Vec<serde_json::Value> = resp
			.json()
			.await
			.map_err(|e| Error::Transport(e.to_string()))?;
		payloads
			.into_iter()
			.map(|p| codec::entity_from_payload(kind, p))
			.collect()
	}

	/// Self-register a peer into a free slot of the interface's ranges.
	pub async fn register_peer(&self, req: &RegisterPeerRequest) -> Result<Peer> {
		let url = join_url(&self.base_url, "/api/v1/register-peer");
		let resp = self
			.client
			.post(&url)
			.json(req)
			.send()
			.await
			.map_err(|e| Error::Transport(e.to_string()))?;
		if !resp.status().is_success() {
			return Err(unwrap_error(resp).await);
		}
		resp.json::<Peer>()
			.await
			.map_err(|e| Error::Transport(e.to_string()))
	}
}
