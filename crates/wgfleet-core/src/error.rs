// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! The shared error taxonomy.
//!
//! Domain errors carry a stable wire code so they survive a round trip
//! through the HTTP error envelope; everything else is classified as
//! transient (retried forever by followers) or permanent.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	/// The requested start sequence is below the log's retention horizon.
	#[error("sequence out of horizon")]
	Horizon,

	/// A sequence rewind: applying an op at or below the current sequence.
	#[error("out of sequence (log rewind)")]
	OutOfSequence,

	#[error("unknown entity type: {0}")]
	UnknownType(String),

	/// A write reached a node that does not accept mutations.
	#[error("read-only datastore")]
	ReadOnly,

	#[error("invalid op type in log")]
	InvalidOpType,

	/// Malformed caller input.
	#[error("{0}")]
	Validation(String),

	#[error("database error: {0}")]
	Storage(#[from] sqlx::Error),

	#[error("encoding error: {0}")]
	Encoding(#[from] serde_json::Error),

	/// Network-level failure talking to a remote log. Always retried.
	#[error("transport error: {0}")]
	Transport(String),

	/// A non-envelope HTTP error from a remote log.
	#[error("remote error (HTTP {status}): {message}")]
	RemoteStatus { status: u16, message: String },

	/// A system command run by the gateway failed.
	#[error("command failed: {0}")]
	Command(String),
}

impl Error {
	/// The wire code for the HTTP error envelope, when this error has one.
	pub fn code(&self) -> Option<&'static str> {
		match self {
			Error::Horizon => Some("horizon"),
			Error::OutOfSequence => Some("out-of-sequence"),
			Error::UnknownType(_) => Some("unknown-type"),
			Error::ReadOnly => Some("readonly"),
			Error::Validation(_) => Some("validation"),
			_ => None,
		}
	}

	/// Rebuilds a domain error from an envelope code received over HTTP.
	pub fn from_code(code: &str, message: &str) -> Option<Self> {
		match code {
			"horizon" => Some(Error::Horizon),
			"out-of-sequence" => Some(Error::OutOfSequence),
			"unknown-type" => Some(Error::UnknownType(message.to_string())),
			"readonly" => Some(Error::ReadOnly),
			"validation" => Some(Error::Validation(message.to_string())),
			_ => None,
		}
	}

	/// True when retrying the operation may succeed without intervention.
	/// Followers retry transient errors forever; everything else surfaces.
	pub fn is_transient(&self) -> bool {
		match self {
			Error::Transport(_) => true,
			Error::RemoteStatus { status, .. } => *status == 429 || *status >= 500,
			_ => false,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn codes_round_trip() {
		for err in [
			Error::Horizon,
			Error::OutOfSequence,
			Error::UnknownType("x".into()),
			Error::ReadOnly,
			Error::Validation("bad".into()),
		] {
			let code = err.code().unwrap();
			let back = Error::from_code(code, "msg").unwrap();
			assert_eq!(back.code(), Some(code));
		}
		assert!(Error::from_code("no-such-code", "m").is_none());
	}

	#[test]
	fn transience_classification() {
		assert!(Error::Transport("connection refused".into()).is_transient());
		assert!(Error::RemoteStatus { status: 503, message: String::new() }.is_transient());
		assert!(Error::RemoteStatus { status: 429, message: String::new() }.is_transient());
		assert!(!Error::RemoteStatus { status: 403, message: String::new() }.is_transient());
		assert!(!Error::Horizon.is_transient());
		assert!(!Error::ReadOnly.is_transient());
	}
}
