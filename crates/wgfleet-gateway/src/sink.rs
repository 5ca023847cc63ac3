// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! The configuration sink: applies replicated ops to kernel state.
//!
//! Peer ops are routed through a `public_key -> interface` index, so an
//! update that moves a peer between interfaces removes it from the old
//! device, and a delete finds its device even when the op only carries the
//! public key. Sequence state is in memory only: a restarted gateway
//! bootstraps from a fresh snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use wgfleet_core::{Entity, Error, Interface, Op, OpType, Peer, Result, Sequence};
use wgfleet_log::{LogSink, Snapshot};

use crate::control::WgControl;

#[derive(Default)]
struct SinkState {
	seq: Sequence,
	interfaces: HashMap<String, Interface>,
	peer_index: HashMap<String, String>,
}

pub struct WgSink {
	ctrl: Arc<dyn WgControl>,
	state: Mutex<SinkState>,
}

impl WgSink {
	pub fn new(ctrl: Arc<dyn WgControl>) -> Self {
		Self {
			ctrl,
			state: Mutex::new(SinkState::default()),
		}
	}

	/// Names of the interfaces currently configured, for the stats loop.
	pub async fn interface_names(&self) -> Vec<String> {
		let state = self.state.lock().await;
		let mut names: Vec<String> = state.interfaces.keys().cloned().collect();
		names.sort();
		names
	}

	async fn apply_interface(
		&self,
		state: &mut SinkState,
		op_type: OpType,
		interface: &Interface,
	) -> Result<()> {
		match op_type {
			OpType::Create | OpType::Update => {
				if state.interfaces.contains_key(&interface.name) {
					tracing::info!(name = %interface.name, "reconfiguring interface");
					self.ctrl.stop_interface(&interface.name).await?;
				} else {
					tracing::info!(name = %interface.name, "creating interface");
				}
				self.ctrl.start_interface(interface).await?;
				state.interfaces.insert(interface.name.clone(), interface.clone());
			}
			OpType::Delete => {
				tracing::info!(name = %interface.name, "tearing down interface");
				self.ctrl.stop_interface(&interface.name).await?;
				state.interfaces.remove(&interface.name);
				state.peer_index.retain(|_, intf| *intf != interface.name);
			}
			OpType::Unknown => return Err(Error::InvalidOpType),
		}
		Ok(())
	}

	async fn apply_peer(
		&self,
		state: &mut SinkState,
		op_type: OpType,
		peer: &Peer,
	) -> Result<()> {
		match op_type {
			OpType::Create | OpType::Update => {
				tracing::info!(public_key = %peer.public_key, interface = %peer.interface, "configuring peer");
				// The peer may have moved: drop it from its old device first.
				if let Some(old) = state.peer_index.get(&peer.public_key) {
					if old != &peer.interface {
						let old = old.clone();
						if let Err(e) = self.ctrl.remove_peer(&old, &peer.public_key).await {
							tracing::warn!(error = %e, "failed to remove peer from old interface");
						}
					}
				}
				self.ctrl.set_peer(&peer.interface, peer).await?;
				state
					.peer_index
					.insert(peer.public_key.clone(), peer.interface.clone());
			}
			OpType::Delete => {
				tracing::info!(public_key = %peer.public_key, "removing peer");
				let interface = state
					.peer_index
					.remove(&peer.public_key)
					.or_else(|| (!peer.interface.is_empty()).then(|| peer.interface.clone()));
				if let Some(interface) = interface {
					// An already-removed peer is fine: the follower may
					// replay the op after a partial restart.
					if let Err(e) = self.ctrl.remove_peer(&interface, &peer.public_key).await {
						tracing::debug!(error = %e, "peer already absent");
					}
				}
			}
			OpType::Unknown => return Err(Error::InvalidOpType),
		}
		Ok(())
	}
}

#[async_trait]
impl LogSink for WgSink {
	async fn apply(&self, op: Op, _from_log: bool) -> Result<Op> {
		let mut state = self.state.lock().await;
		match &op.entity {
			Entity::Interface(interface) => {
				self.apply_interface(&mut state, op.op_type, interface).await?
			}
			Entity::Peer(peer) => self.apply_peer(&mut state, op.op_type, peer).await?,
			// Tokens have no kernel-side counterpart.
			Entity::Token(_) => {}
		}
		state.seq = op.seq;
		Ok(op)
	}

	async fn latest_sequence(&self) -> Result<Sequence> {
		Ok(self.state.lock().await.seq)
	}

	async fn load_snapshot(&self, snapshot: Snapshot) -> Result<()> {
		let mut state = self.state.lock().await;
		tracing::info!(seq = %snapshot.seq, items = snapshot.items.len(), "loading snapshot");

		let mut interfaces = Vec::new();
		let mut peers: HashMap<String, Vec<Peer>> = HashMap::new();
		for item in snapshot.items {
			match item {
				Entity::Interface(i) => interfaces.push(i),
				Entity::Peer(p) => peers.entry(p.interface.clone()).or_default().push(p),
				Entity::Token(_) => {}
			}
		}

		// Tear down everything we know about and rebuild from scratch.
		for name in state.interfaces.keys() {
			if let Err(e) = self.ctrl.stop_interface(name).await {
				tracing::warn!(name = %name, error = %e, "teardown failed");
			}
		}
		state.interfaces.clear();
		state.peer_index.clear();

		for interface in interfaces {
			self.ctrl.start_interface(&interface).await?;
			let peer_set = peers.remove(&interface.name).unwrap_or_default();
			self.ctrl.replace_peers(&interface.name, &peer_set).await?;
			for peer in &peer_set {
				state
					.peer_index
					.insert(peer.public_key.clone(), interface.name.clone());
			}
			state.interfaces.insert(interface.name.clone(), interface);
		}

		for (interface, orphans) in peers {
			for peer in orphans {
				tracing::warn!(
					public_key = %peer.public_key,
					interface = %interface,
					"snapshot peer references an unknown interface"
				);
			}
		}

		state.seq = snapshot.seq;
		Ok(())
	}
}
