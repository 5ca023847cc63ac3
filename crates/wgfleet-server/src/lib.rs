// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! The wgfleet datastore server.
//!
//! One binary serves both node roles: the primary (accepts writes,
//! originates log ops, runs expiry) and the mirror (follows a primary's log,
//! serves the same read API, rejects writes).

pub mod config;
pub mod error;
pub mod jobs;
pub mod registration;
pub mod routes;
pub mod sessions;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use wgfleet_log::{CrudLog, EntityWriter};

use crate::registration::RegistrationService;
use crate::sessions::SessionManager;

#[derive(Clone)]
pub struct AppState {
	pub log: Arc<CrudLog>,
	pub writer: Arc<dyn EntityWriter>,
	/// Peer self-registration; primary nodes only.
	pub registration: Option<Arc<RegistrationService>>,
	/// Session telemetry; primary nodes only.
	pub sessions: Option<Arc<SessionManager>>,
}

pub fn create_router(state: AppState) -> Router {
	Router::new()
		.route("/api/v1/log/snapshot", get(routes::log::snapshot))
		.route("/api/v1/log/subscribe", get(routes::log::subscribe))
		.route("/api/v1/register-peer", post(routes::registration::register_peer))
		.route("/api/v1/receive-stats", post(routes::sessions::receive_stats))
		.route("/api/v1/sessions/find", get(routes::sessions::find_sessions))
		.route("/api/v1/{kind}/create", post(routes::crud::create))
		.route("/api/v1/{kind}/update", post(routes::crud::update))
		.route("/api/v1/{kind}/delete", post(routes::crud::delete))
		.route("/api/v1/{kind}/find", get(routes::crud::find))
		.with_state(state)
}
