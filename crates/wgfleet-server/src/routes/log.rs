// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! The log endpoints: snapshot download and the streaming subscription.

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use bytes::Bytes;
use serde::Deserialize;

use wgfleet_core::{Error, Sequence};
use wgfleet_log::Snapshot;

use crate::error::ApiError;
use crate::AppState;

/// GET /api/v1/log/snapshot - the full entity state at the current sequence.
pub async fn snapshot(State(state): State<AppState>) -> Result<Json<Snapshot>, ApiError> {
	tracing::debug!("snapshot requested");
	Ok(Json(state.log.snapshot().await?))
}

#[derive(Deserialize)]
pub struct SubscribeParams {
	start: String,
}

/// GET /api/v1/log/subscribe?start=HEX - stream ops with seq >= start as
/// newline-delimited JSON: the retained backlog first, then live commits,
/// until the client disconnects.
pub async fn subscribe(
	State(state): State<AppState>,
	Query(params): Query<SubscribeParams>,
) -> Result<Response, ApiError> {
	let start: Sequence = params.start.parse()?;
	tracing::debug!(%start, "subscribe requested");

	let sub = state.log.subscribe(start).await?;

	let stream = futures::stream::unfold(sub, |mut sub| async move {
		let op = sub.next().await?;
		let mut line = match serde_json::to_vec(&op) {
			Ok(line) => line,
			Err(e) => {
				tracing::error!(error = %e, "failed to encode op for subscriber");
				return None;
			}
		};
		line.push(b'\n');
		Some((Ok::<_, std::convert::Infallible>(Bytes::from(line)), sub))
	});

	Response::builder()
		.status(StatusCode::OK)
		.header(header::CONTENT_TYPE, "application/json")
		.header("X-Content-Type-Options", "nosniff")
		.body(Body::from_stream(stream))
		.map_err(|e| ApiError(Error::Validation(e.to_string())))
}
