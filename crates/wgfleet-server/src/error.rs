// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! The HTTP error envelope.
//!
//! Domain errors become `400 {"code", "message"}` with their registered
//! code, so clients can rebuild the original error; anything else is an
//! opaque 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use wgfleet_core::Error;

#[derive(Debug)]
pub struct ApiError(pub Error);

#[derive(Serialize)]
struct ErrorBody {
	code: String,
	message: String,
}

impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		ApiError(err)
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let err = self.0;
		match err.code() {
			Some(code) => {
				tracing::debug!(code, error = %err, "request failed");
				(
					StatusCode::BAD_REQUEST,
					Json(ErrorBody {
						code: code.to_string(),
						message: err.to_string(),
					}),
				)
					.into_response()
			}
			None => {
				tracing::error!(error = %err, "internal error");
				(
					StatusCode::INTERNAL_SERVER_ERROR,
					Json(ErrorBody {
						code: "internal".to_string(),
						message: err.to_string(),
					}),
				)
					.into_response()
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn domain_errors_are_bad_requests() {
		let resp = ApiError(Error::Horizon).into_response();
		assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

		let resp = ApiError(Error::ReadOnly).into_response();
		assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
	}

	#[test]
	fn storage_errors_are_internal() {
		let resp = ApiError(Error::Storage(sqlx::Error::PoolClosed)).into_response();
		assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
	}
}
