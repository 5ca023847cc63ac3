// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Entity and op serialization.
//!
//! The codec wraps the type-specific payload in a `{type, data}` envelope so
//! that log storage and the wire protocol never need compile-time knowledge
//! of the payload schema. Decoding goes through the envelope explicitly to
//! tell an unknown type name apart from a malformed payload.

use serde::Deserialize;
use serde_json::Value;

use crate::entity::{Entity, EntityKind};
use crate::error::{Error, Result};
use crate::op::Op;

#[derive(Deserialize)]
struct Envelope {
	#[serde(rename = "type")]
	type_name: String,
	data: Value,
}

#[derive(Deserialize)]
struct WireOp {
	seq: crate::sequence::Sequence,
	#[serde(rename = "type")]
	op_type: crate::op::OpType,
	timestamp: chrono::DateTime<chrono::Utc>,
	value: Envelope,
}

/// Builds an [`Entity`] from a type name and its bare payload, as submitted
/// to the per-type CRUD endpoints.
pub fn entity_from_payload(kind: EntityKind, payload: Value) -> Result<Entity> {
	let entity = match kind {
		EntityKind::Interface => Entity::Interface(serde_json::from_value(payload)?),
		EntityKind::Peer => Entity::Peer(serde_json::from_value(payload)?),
		EntityKind::Token => Entity::Token(serde_json::from_value(payload)?),
	};
	Ok(entity)
}

/// The bare payload of an entity, without the envelope.
pub fn entity_payload(entity: &Entity) -> Result<Value> {
	let v = match entity {
		Entity::Interface(i) => serde_json::to_value(i)?,
		Entity::Peer(p) => serde_json::to_value(p)?,
		Entity::Token(t) => serde_json::to_value(t)?,
	};
	Ok(v)
}

/// Serializes an entity into its `{type, data}` envelope.
pub fn encode_entity(entity: &Entity) -> Result<Vec<u8>> {
	Ok(serde_json::to_vec(entity)?)
}

/// Decodes a `{type, data}` envelope. An unregistered type name is
/// [`Error::UnknownType`], not a generic decode failure.
pub fn decode_entity(bytes: &[u8]) -> Result<Entity> {
	let env: Envelope = serde_json::from_slice(bytes)?;
	decode_envelope(env)
}

fn decode_envelope(env: Envelope) -> Result<Entity> {
	let kind =
		EntityKind::from_name(&env.type_name).ok_or_else(|| Error::UnknownType(env.type_name))?;
	entity_from_payload(kind, env.data)
}

/// Serializes an op into its wire/log form.
pub fn encode_op(op: &Op) -> Result<Vec<u8>> {
	Ok(serde_json::to_vec(op)?)
}

/// Decodes one wire-framed op, surfacing `UnknownType` for unregistered
/// entity names.
pub fn decode_op(bytes: &[u8]) -> Result<Op> {
	let wire: WireOp = serde_json::from_slice(bytes)?;
	let entity = decode_envelope(wire.value)?;
	Ok(Op {
		seq: wire.seq,
		op_type: wire.op_type,
		timestamp: wire.timestamp,
		entity,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::entity::{Interface, Peer, Token};
	use crate::op::OpType;
	use crate::sequence::Sequence;

	#[test]
	fn entity_round_trip_all_kinds() {
		let entities = [
			Entity::Interface(Interface {
				name: "wg0".into(),
				port: 4004,
				ip: Some("10.0.0.1/24".parse().unwrap()),
				..Default::default()
			}),
			Entity::Peer(Peer {
				public_key: "P1".into(),
				interface: "wg0".into(),
				ip: Some("10.0.0.2/32".parse().unwrap()),
				..Default::default()
			}),
			Entity::Token(Token {
				id: "t1".into(),
				secret: "s".into(),
				roles: vec!["admin".into(), "registrar".into()],
			}),
		];
		for e in entities {
			let bytes = encode_entity(&e).unwrap();
			assert_eq!(decode_entity(&bytes).unwrap(), e);
		}
	}

	#[test]
	fn unknown_type_is_its_own_error() {
		let err = decode_entity(br#"{"type":"gadget","data":{}}"#).unwrap_err();
		assert!(matches!(err, Error::UnknownType(name) if name == "gadget"));
	}

	#[test]
	fn op_round_trip() {
		let op = Op::new(
			OpType::Update,
			Entity::Peer(Peer {
				public_key: "P1".into(),
				ip: Some("10.0.0.5/32".parse().unwrap()),
				..Default::default()
			}),
		)
		.with_seq(Sequence::from_u64(3));
		let bytes = encode_op(&op).unwrap();
		assert_eq!(decode_op(&bytes).unwrap(), op);
	}

	#[test]
	fn payload_round_trip() {
		let e = Entity::Token(Token {
			id: "t1".into(),
			secret: "s".into(),
			roles: vec!["admin".into()],
		});
		let payload = entity_payload(&e).unwrap();
		assert!(payload.get("type").is_none());
		assert_eq!(entity_from_payload(EntityKind::Token, payload).unwrap(), e);
	}
}
