// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Request/response payloads shared between the datastore API and its
//! clients (gateways, registrars).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Peer self-registration request. A zero TTL registers a permanent peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterPeerRequest {
	pub interface: String,
	pub public_key: String,
	#[serde(default)]
	pub ttl: u64,
}

/// One peer's counters as scraped from a gateway device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerStats {
	pub public_key: String,
	pub last_handshake_time: Option<DateTime<Utc>>,
	pub rx_bytes: i64,
	pub tx_bytes: i64,
	#[serde(default)]
	pub endpoint: String,
}

/// A VPN session reconstructed from gateway stats by edge detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
	pub peer_public_key: String,
	pub begin: DateTime<Utc>,
	pub end: Option<DateTime<Utc>>,
	pub active: bool,
}
