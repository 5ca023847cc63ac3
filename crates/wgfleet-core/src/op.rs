// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Log operations.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::sequence::Sequence;

/// The kind of mutation an op carries. Integer-valued on the wire and in
/// the log table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpType {
	Unknown,
	Create,
	Update,
	Delete,
}

impl OpType {
	pub fn as_i64(self) -> i64 {
		match self {
			OpType::Unknown => 0,
			OpType::Create => 1,
			OpType::Update => 2,
			OpType::Delete => 3,
		}
	}

	pub fn from_i64(value: i64) -> Self {
		match value {
			1 => OpType::Create,
			2 => OpType::Update,
			3 => OpType::Delete,
			_ => OpType::Unknown,
		}
	}
}

impl fmt::Display for OpType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			OpType::Unknown => "unknown",
			OpType::Create => "create",
			OpType::Update => "update",
			OpType::Delete => "delete",
		};
		f.write_str(s)
	}
}

impl Serialize for OpType {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_i64(self.as_i64())
	}
}

impl<'de> Deserialize<'de> for OpType {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let v = i64::deserialize(deserializer)?;
		if !(0..=3).contains(&v) {
			return Err(de::Error::custom(format!("invalid op type {v}")));
		}
		Ok(OpType::from_i64(v))
	}
}

/// A single CRUD operation promoted to a first-class log record.
///
/// `seq` is 0 until the op commits on the primary; replayed ops keep the
/// sequence they were committed with. `timestamp` is wall clock at creation
/// and drives age-based log trimming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Op {
	pub seq: Sequence,
	#[serde(rename = "type")]
	pub op_type: OpType,
	pub timestamp: DateTime<Utc>,
	#[serde(rename = "value")]
	pub entity: Entity,
}

impl Op {
	/// A new, not-yet-committed op (sequence 0).
	pub fn new(op_type: OpType, entity: Entity) -> Self {
		Self {
			seq: Sequence::ZERO,
			op_type,
			timestamp: Utc::now(),
			entity,
		}
	}

	pub fn with_seq(mut self, seq: Sequence) -> Self {
		self.seq = seq;
		self
	}
}
