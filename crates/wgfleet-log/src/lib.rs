// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! The replicated CRUD log.
//!
//! A [`CrudLog`] is a durable, single-writer command log layered on the
//! relational store: every mutation is applied to its table, appended to the
//! log, stamped with the next sequence and fanned out to live subscribers,
//! all inside one critical section. Everything that consumes the log (the
//! SQL mirror on another datastore node, the gateway's kernel
//! reconfiguration loop) is a [`follow`]er driving a [`LogSink`] from a
//! [`LogSource`].

pub mod backoff;
pub mod engine;
pub mod follow;
mod pubsub;
pub mod traits;
pub mod writer;

pub use backoff::Backoff;
pub use engine::CrudLog;
pub use follow::follow;
pub use traits::{EntityWriter, LogSink, LogSource, Snapshot, Subscription};
pub use writer::{LogWriter, ReadOnlyWriter};
