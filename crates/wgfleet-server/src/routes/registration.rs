// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Peer self-registration handler. Primary nodes only.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use wgfleet_core::RegisterPeerRequest;

use crate::error::ApiError;
use crate::AppState;

/// POST /api/v1/register-peer
pub async fn register_peer(
	State(state): State<AppState>,
	Json(req): Json<RegisterPeerRequest>,
) -> Result<Response, ApiError> {
	let Some(registration) = &state.registration else {
		return Ok(StatusCode::NOT_FOUND.into_response());
	};
	let peer = registration.register_new_peer(&req).await?;
	Ok(Json(peer).into_response())
}
