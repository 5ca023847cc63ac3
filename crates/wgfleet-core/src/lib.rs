// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Core domain types for the wgfleet control plane.
//!
//! Everything that crosses a crate boundary lives here: the log sequence,
//! the op record, the replicated entity model, the `{type, data}` codec and
//! the shared error taxonomy.

pub mod api;
pub mod cidr;
pub mod codec;
pub mod entity;
pub mod error;
pub mod op;
pub mod sequence;

pub use api::{PeerStats, RegisterPeerRequest, Session};
pub use cidr::Cidr;
pub use entity::{Entity, EntityKind, Interface, Peer, Token};
pub use error::{Error, Result};
pub use op::{Op, OpType};
pub use sequence::Sequence;
