// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Per-type CRUD handlers. The path names the entity type; bodies and
//! find results carry bare payloads, without the `{type, data}` envelope.

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

use wgfleet_core::{codec, Entity, EntityKind, Error};

use crate::error::ApiError;
use crate::AppState;

fn parse_kind(kind: &str) -> Result<EntityKind, ApiError> {
	EntityKind::from_name(kind).ok_or_else(|| ApiError(Error::UnknownType(kind.to_string())))
}

fn parse_entity(kind: EntityKind, payload: serde_json::Value) -> Result<Entity, ApiError> {
	let entity = codec::entity_from_payload(kind, payload)
		.map_err(|e| Error::Validation(e.to_string()))?;
	entity.validate()?;
	Ok(entity)
}

/// POST /api/v1/{type}/create
pub async fn create(
	State(state): State<AppState>,
	Path(kind): Path<String>,
	Json(payload): Json<serde_json::Value>,
) -> Result<StatusCode, ApiError> {
	let entity = parse_entity(parse_kind(&kind)?, payload)?;
	tracing::info!(kind = %kind, key = entity.primary_key(), "create");
	state.writer.create(entity).await?;
	Ok(StatusCode::OK)
}

/// POST /api/v1/{type}/update
pub async fn update(
	State(state): State<AppState>,
	Path(kind): Path<String>,
	Json(payload): Json<serde_json::Value>,
) -> Result<StatusCode, ApiError> {
	let entity = parse_entity(parse_kind(&kind)?, payload)?;
	tracing::info!(kind = %kind, key = entity.primary_key(), "update");
	state.writer.update(entity).await?;
	Ok(StatusCode::OK)
}

/// POST /api/v1/{type}/delete
pub async fn delete(
	State(state): State<AppState>,
	Path(kind): Path<String>,
	Json(payload): Json<serde_json::Value>,
) -> Result<StatusCode, ApiError> {
	let entity = parse_entity(parse_kind(&kind)?, payload)?;
	tracing::info!(kind = %kind, key = entity.primary_key(), "delete");
	state.writer.delete(entity).await?;
	Ok(StatusCode::OK)
}

/// GET /api/v1/{type}/find?field=value... - equality filters, conjunctive.
pub async fn find(
	State(state): State<AppState>,
	Path(kind): Path<String>,
	Query(filter): Query<BTreeMap<String, String>>,
) -> Result<Json<Vec<serde_json::Value>>, ApiError> {
	let kind = parse_kind(&kind)?;
	let entities = state.log.find(kind, &filter).await?;
	let payloads = entities
		.iter()
		.map(codec::entity_payload)
		.collect::<Result<Vec<_>, _>>()?;
	Ok(Json(payloads))
}
