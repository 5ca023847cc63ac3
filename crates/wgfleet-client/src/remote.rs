// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! The remote log client: a [`LogSource`] over the datastore's HTTP API.
//!
//! Transport failures never surface from `snapshot`/`subscribe`; they are
//! retried forever under exponential backoff. Domain errors decoded from
//! the `{code, message}` envelope are returned as-is. Once subscribed, a
//! scanner task turns the chunked newline-delimited body into ops; dropping
//! the subscription aborts the scanner, which drops the response body and
//! closes the connection. Body close is the cancellation signal; task
//! cancellation alone would not unblock an in-progress read.

use std::future::Future;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;

use wgfleet_core::{codec, Error, Op, Result, Sequence};
use wgfleet_log::{Backoff, LogSource, Snapshot, Subscription};

use crate::http::join_url;

const API_URL_SNAPSHOT: &str = "/api/v1/log/snapshot";
const API_URL_SUBSCRIBE: &str = "/api/v1/log/subscribe";

/// Matches the pubsub channel size on the serving side.
const CHANNEL_CAPACITY: usize = 1000;

pub struct RemoteLogSource {
	base_url: String,
	client: reqwest::Client,
}

impl RemoteLogSource {
	pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
		Self {
			base_url: base_url.into(),
			client,
		}
	}

	async fn do_snapshot(&self) -> Result<Snapshot> {
		let url = join_url(&self.base_url, API_URL_SNAPSHOT);
		let resp = self
			.client
			.get(&url)
			.send()
			.await
			.map_err(|e| Error::Transport(e.to_string()))?;
		if !resp.status().is_success() {
			return Err(unwrap_error(resp).await);
		}
		resp.json::<Snapshot>()
			.await
			.map_err(|e| Error::Transport(e.to_string()))
	}

	async fn do_subscribe(&self, start: Sequence) -> Result<Subscription> {
		let url = format!("{}?start={start}", join_url(&self.base_url, API_URL_SUBSCRIBE));
		let resp = self
			.client
			.get(&url)
			.send()
			.await
			.map_err(|e| Error::Transport(e.to_string()))?;
		if !resp.status().is_success() {
			return Err(unwrap_error(resp).await);
		}

		let mut body = resp.bytes_stream();
		let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
		let task = tokio::spawn(async move {
			let mut buf: Vec<u8> = Vec::new();
			while let Some(chunk) = body.next().await {
				let chunk = match chunk {
					Ok(c) => c,
					Err(e) => {
						tracing::debug!(error = %e, "log stream closed");
						return;
					}
				};
				buf.extend_from_slice(&chunk);
				while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
					let line: Vec<u8> = buf.drain(..=pos).collect();
					let line = &line[..line.len() - 1];
					// Empty lines are a normal artifact of chunking.
					if line.is_empty() {
						continue;
					}
					let op = match codec::decode_op(line) {
						Ok(op) => op,
						Err(e) => {
							tracing::warn!(error = %e, "error decoding op from stream");
							return;
						}
					};
					if tx.send(op).await.is_err() {
						return;
					}
				}
			}
		});

		Ok(Subscription::new(rx, task))
	}
}

#[async_trait]
impl LogSource for RemoteLogSource {
	async fn snapshot(&self) -> Result<Snapshot> {
		retry_transient(|| self.do_snapshot()).await
	}

	async fn subscribe(&self, start: Sequence) -> Result<Subscription> {
		retry_transient(|| self.do_subscribe(start)).await
	}
}

/// Retry transient failures forever; pass everything else through.
async fn retry_transient<T, F, Fut>(mut f: F) -> Result<T>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T>>,
{
	let mut backoff = Backoff::default();
	loop {
		match f().await {
			Ok(v) => return Ok(v),
			Err(e) if e.is_transient() => {
				let delay = backoff.next_delay();
				tracing::warn!(
					error = %e,
					delay_ms = delay.as_millis() as u64,
					"transient error talking to remote log, retrying"
				);
				tokio::time::sleep(delay).await;
			}
			Err(e) => return Err(e),
		}
	}
}

#[derive(Deserialize)]
struct ErrorBody {
	code: String,
	message: String,
}

/// Decode an HTTP error response: domain errors travel in a 400 JSON
/// envelope, everything else is classified by status code.
pub(crate) async fn unwrap_error(resp: reqwest::Response) -> Error {
	let status = resp.status().as_u16();
	let is_json = resp
		.headers()
		.get(reqwest::header::CONTENT_TYPE)
		.and_then(|v| v.to_str().ok())
		.map(|v| v.starts_with("application/json"))
		.unwrap_or(false);

	let body = resp.text().await.unwrap_or_default();
	if status == 400 && is_json {
		if let Ok(err) = serde_json::from_str::<ErrorBody>(&body) {
			if let Some(e) = Error::from_code(&err.code, &err.message) {
				return e;
			}
		}
	}
	Error::RemoteStatus {
		status,
		message: body,
	}
}
