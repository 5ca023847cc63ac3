// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Log sequence numbers.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserialize, Deserializer, Visitor};
use serde::ser::{Serialize, Serializer};

use crate::error::Error;

/// A monotonically incrementing log position.
///
/// Sequence 0 is the "never seen" sentinel: the first committed op gets
/// sequence 1. The external string form is lowercase hexadecimal with no
/// zero-padding, which is also how sequences appear in JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Sequence(u64);

impl Sequence {
	/// The "never seen" sentinel.
	pub const ZERO: Sequence = Sequence(0);

	pub fn from_u64(value: u64) -> Self {
		Self(value)
	}

	pub fn as_u64(&self) -> u64 {
		self.0
	}

	/// Returns the next sequence.
	pub fn next(&self) -> Self {
		Self(self.0 + 1)
	}

	pub fn is_zero(&self) -> bool {
		self.0 == 0
	}
}

impl fmt::Display for Sequence {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:x}", self.0)
	}
}

impl FromStr for Sequence {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		u64::from_str_radix(s, 16)
			.map(Sequence)
			.map_err(|_| Error::Validation(format!("invalid sequence: {s:?}")))
	}
}

impl Serialize for Sequence {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(&format_args!("{:x}", self.0))
	}
}

impl<'de> Deserialize<'de> for Sequence {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		struct SequenceVisitor;

		impl Visitor<'_> for SequenceVisitor {
			type Value = Sequence;

			fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str("a hexadecimal sequence string")
			}

			fn visit_str<E: de::Error>(self, v: &str) -> Result<Sequence, E> {
				u64::from_str_radix(v, 16)
					.map(Sequence)
					.map_err(|_| E::custom(format!("invalid sequence: {v:?}")))
			}
		}

		deserializer.deserialize_str(SequenceVisitor)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn hex_round_trip() {
		let seq = Sequence::from_u64(0xdeadbeef);
		assert_eq!(seq.to_string(), "deadbeef");
		assert_eq!("deadbeef".parse::<Sequence>().unwrap(), seq);
	}

	#[test]
	fn zero_is_sentinel() {
		assert!(Sequence::ZERO.is_zero());
		assert_eq!(Sequence::ZERO.to_string(), "0");
		assert_eq!(Sequence::ZERO.next(), Sequence::from_u64(1));
	}

	#[test]
	fn json_form_is_hex_string() {
		let json = serde_json::to_string(&Sequence::from_u64(255)).unwrap();
		assert_eq!(json, r#""ff""#);
		let back: Sequence = serde_json::from_str(&json).unwrap();
		assert_eq!(back, Sequence::from_u64(255));
	}

	#[test]
	fn rejects_non_hex() {
		assert!("zz".parse::<Sequence>().is_err());
		assert!(serde_json::from_str::<Sequence>(r#""not hex""#).is_err());
	}

	#[test]
	fn ordering() {
		assert!(Sequence::from_u64(1) < Sequence::from_u64(2));
		assert_eq!(Sequence::from_u64(1).next(), Sequence::from_u64(2));
	}
}
