// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP client with consistent User-Agent header.

use reqwest::{Client, ClientBuilder};

/// Creates a new HTTP client with the standard wgfleet User-Agent header.
pub fn new_client() -> Client {
	builder().build().expect("failed to build HTTP client")
}

/// Creates a new HTTP client builder with the standard User-Agent header.
///
/// Use this when you need to customize the client (e.g., set timeout).
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

/// Returns the standard wgfleet User-Agent string.
pub fn user_agent() -> String {
	format!("wgfleet/{}", env!("CARGO_PKG_VERSION"))
}

/// Joins a base URL and path fragments, normalizing slashes.
pub fn join_url(base: &str, path: &str) -> String {
	format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn user_agent_has_correct_format() {
		let ua = user_agent();
		assert!(ua.starts_with("wgfleet/"));
	}

	#[test]
	fn join_url_normalizes_slashes() {
		assert_eq!(join_url("http://x:1/", "/api/v1/log"), "http://x:1/api/v1/log");
		assert_eq!(join_url("http://x:1", "api/v1/log"), "http://x:1/api/v1/log");
	}
}
