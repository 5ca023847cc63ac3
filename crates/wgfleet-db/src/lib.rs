// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! SQLite persistence for the wgfleet datastore.
//!
//! All functions here are transaction-scoped: they take a
//! `&mut SqliteConnection` and never begin or commit transactions
//! themselves. Locking and transaction boundaries belong to the log engine.

pub mod entity_store;
pub mod log_store;
pub mod migrations;
pub mod pool;
pub mod sequencer;

pub use pool::open_pool;
