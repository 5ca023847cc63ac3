// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Age-based log trimming: the retention enforcement behind the horizon.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use wgfleet_core::Result;
use wgfleet_log::CrudLog;

use super::Job;

pub struct LogTrimJob {
	log: Arc<CrudLog>,
	retention: Duration,
}

impl LogTrimJob {
	pub fn new(log: Arc<CrudLog>, retention: Duration) -> Self {
		Self { log, retention }
	}
}

#[async_trait]
impl Job for LogTrimJob {
	fn name(&self) -> &'static str {
		"log-trim"
	}

	async fn run(&self) -> Result<()> {
		let retention = chrono::Duration::from_std(self.retention)
			.unwrap_or_else(|_| chrono::Duration::days(7));
		self.log.trim(Utc::now() - retention).await?;
		Ok(())
	}
}
