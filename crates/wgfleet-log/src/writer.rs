// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Entity writers: the log-backed one and the hard read-only one.

use std::sync::Arc;

use async_trait::async_trait;

use wgfleet_core::{Entity, Error, Op, OpType, Result};

use crate::engine::CrudLog;
use crate::traits::EntityWriter;

/// Originates log ops from CRUD calls. Only the primary node constructs
/// one of these.
pub struct LogWriter {
	log: Arc<CrudLog>,
}

impl LogWriter {
	pub fn new(log: Arc<CrudLog>) -> Self {
		Self { log }
	}
}

#[async_trait]
impl EntityWriter for LogWriter {
	async fn create(&self, entity: Entity) -> Result<()> {
		self.log.apply(Op::new(OpType::Create, entity), false).await?;
		Ok(())
	}

	async fn update(&self, entity: Entity) -> Result<()> {
		self.log.apply(Op::new(OpType::Update, entity), false).await?;
		Ok(())
	}

	async fn delete(&self, entity: Entity) -> Result<()> {
		self.log.apply(Op::new(OpType::Delete, entity), false).await?;
		Ok(())
	}
}

/// The writer installed on follower nodes. Every mutation is rejected with
/// `ReadOnly`; there is no way to flip it at runtime.
pub struct ReadOnlyWriter;

#[async_trait]
impl EntityWriter for ReadOnlyWriter {
	async fn create(&self, _entity: Entity) -> Result<()> {
		Err(Error::ReadOnly)
	}

	async fn update(&self, _entity: Entity) -> Result<()> {
		Err(Error::ReadOnly)
	}

	async fn delete(&self, _entity: Entity) -> Result<()> {
		Err(Error::ReadOnly)
	}
}
