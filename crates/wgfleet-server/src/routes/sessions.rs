// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Session telemetry handlers. Primary nodes only.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use wgfleet_core::{Error, PeerStats};

use crate::error::ApiError;
use crate::AppState;

/// POST /api/v1/receive-stats - gateways post their per-peer counters.
pub async fn receive_stats(
	State(state): State<AppState>,
	Json(dump): Json<Vec<PeerStats>>,
) -> Result<Response, ApiError> {
	let Some(sessions) = &state.sessions else {
		return Ok(StatusCode::NOT_FOUND.into_response());
	};
	sessions.receive_peer_stats(dump).await?;
	Ok(StatusCode::OK.into_response())
}

#[derive(Deserialize)]
pub struct FindSessionsParams {
	pkey: String,
}

/// GET /api/v1/sessions/find?pkey=... - active plus recent sessions.
pub async fn find_sessions(
	State(state): State<AppState>,
	Query(params): Query<FindSessionsParams>,
) -> Result<Response, ApiError> {
	let Some(sessions) = &state.sessions else {
		return Ok(StatusCode::NOT_FOUND.into_response());
	};
	if params.pkey.is_empty() {
		return Err(ApiError(Error::Validation("no 'pkey' argument".into())));
	}
	let found = sessions.find_by_public_key(&params.pkey).await?;
	Ok(Json(found).into_response())
}
