// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! The replicated entity model.
//!
//! Three entity kinds flow through the log: network interfaces, peers, and
//! access tokens. An [`Entity`] is a tagged variant whose JSON form is the
//! `{"type": ..., "data": ...}` envelope used on the wire and in the log
//! BLOB column; dispatch by runtime type is a match on the variant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cidr::Cidr;
use crate::error::Error;

/// A WireGuard interface definition.
///
/// The `ip`/`ip6` ranges double as the address pools peers register into;
/// the address part is the gateway's own address on the device.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Interface {
	pub name: String,
	pub port: u16,
	pub ip: Option<Cidr>,
	pub ip6: Option<Cidr>,
	pub fwmark: u32,
	pub private_key: String,
	pub public_key: String,
}

/// A peer attached to an interface. `expire` drives periodic expiry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Peer {
	pub public_key: String,
	pub interface: String,
	pub ip: Option<Cidr>,
	pub ip6: Option<Cidr>,
	pub expire: Option<DateTime<Utc>>,
}

/// An access token. Roles are authorization input for the outer layers;
/// the control plane only replicates them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Token {
	pub id: String,
	pub secret: String,
	pub roles: Vec<String>,
}

/// A value of one of the replicated kinds, tagged with its type name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Entity {
	Interface(Interface),
	Peer(Peer),
	Token(Token),
}

/// Static descriptor data for an entity kind: type name, backing table,
/// primary-key column and the non-PK column list used to validate filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
	Interface,
	Peer,
	Token,
}

impl EntityKind {
	pub const ALL: [EntityKind; 3] = [EntityKind::Interface, EntityKind::Peer, EntityKind::Token];

	pub fn name(self) -> &'static str {
		match self {
			EntityKind::Interface => "interface",
			EntityKind::Peer => "peer",
			EntityKind::Token => "token",
		}
	}

	pub fn from_name(name: &str) -> Option<Self> {
		match name {
			"interface" => Some(EntityKind::Interface),
			"peer" => Some(EntityKind::Peer),
			"token" => Some(EntityKind::Token),
			_ => None,
		}
	}

	pub fn table(self) -> &'static str {
		match self {
			EntityKind::Interface => "interfaces",
			EntityKind::Peer => "peers",
			EntityKind::Token => "tokens",
		}
	}

	pub fn primary_key(self) -> &'static str {
		match self {
			EntityKind::Interface => "name",
			EntityKind::Peer => "public_key",
			EntityKind::Token => "id",
		}
	}

	pub fn fields(self) -> &'static [&'static str] {
		match self {
			EntityKind::Interface => &["port", "ip", "ip6", "fwmark", "private_key", "public_key"],
			EntityKind::Peer => &["interface", "ip", "ip6", "expire"],
			EntityKind::Token => &["secret", "roles"],
		}
	}

	/// True when `field` names the primary key or a declared column.
	pub fn has_field(self, field: &str) -> bool {
		field == self.primary_key() || self.fields().contains(&field)
	}
}

impl Entity {
	pub fn kind(&self) -> EntityKind {
		match self {
			Entity::Interface(_) => EntityKind::Interface,
			Entity::Peer(_) => EntityKind::Peer,
			Entity::Token(_) => EntityKind::Token,
		}
	}

	/// The value of this entity's primary-key field.
	pub fn primary_key(&self) -> &str {
		match self {
			Entity::Interface(i) => &i.name,
			Entity::Peer(p) => &p.public_key,
			Entity::Token(t) => &t.id,
		}
	}

	/// Caller-input validation: an entity submitted over the API must at
	/// least carry its primary key.
	pub fn validate(&self) -> Result<(), Error> {
		if self.primary_key().is_empty() {
			return Err(Error::Validation(format!(
				"{} is missing its {} field",
				self.kind().name(),
				self.kind().primary_key()
			)));
		}
		Ok(())
	}
}
