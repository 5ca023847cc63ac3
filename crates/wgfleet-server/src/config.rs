// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Server configuration: built-in defaults overridden by `WGFLEET_*`
//! environment variables, overridden in turn by CLI flags.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("invalid value for {key}: {message}")]
	InvalidValue { key: String, message: String },
}

/// Retention is deployment-configurable up to this many days.
pub const MAX_LOG_RETENTION_DAYS: u32 = 120;

#[derive(Debug, Clone)]
pub struct ServerConfig {
	pub http: HttpConfig,
	pub database: DatabaseConfig,
	pub log: LogConfig,
	pub replication: ReplicationConfig,
	pub jobs: JobsConfig,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
	pub host: String,
	pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
	pub url: String,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
	pub retention_days: u32,
}

#[derive(Debug, Clone)]
pub struct ReplicationConfig {
	/// When set, this node follows the given primary and is read-only.
	pub log_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct JobsConfig {
	pub expire_interval_secs: u64,
	pub trim_interval_secs: u64,
}

impl ServerConfig {
	/// Get the socket address string for binding.
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.http.host, self.http.port)
	}

	pub fn is_primary(&self) -> bool {
		self.replication.log_url.is_none()
	}

	pub fn log_retention(&self) -> Duration {
		Duration::from_secs(u64::from(self.log.retention_days) * 24 * 60 * 60)
	}
}

/// Load configuration from the environment over built-in defaults.
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	let config = ServerConfig {
		http: HttpConfig {
			host: env_string("WGFLEET_HTTP_HOST", "0.0.0.0"),
			port: env_parse("WGFLEET_HTTP_PORT", 5005)?,
		},
		database: DatabaseConfig {
			url: env_string("WGFLEET_DATABASE_URL", "sqlite://wgfleet.db"),
		},
		log: LogConfig {
			retention_days: env_parse("WGFLEET_LOG_RETENTION_DAYS", 7)?,
		},
		replication: ReplicationConfig {
			log_url: std::env::var("WGFLEET_LOG_URL").ok().filter(|v| !v.is_empty()),
		},
		jobs: JobsConfig {
			expire_interval_secs: env_parse("WGFLEET_EXPIRE_INTERVAL_SECS", 1800)?,
			trim_interval_secs: env_parse("WGFLEET_TRIM_INTERVAL_SECS", 3600)?,
		},
	};

	validate(&config)?;
	Ok(config)
}

fn validate(config: &ServerConfig) -> Result<(), ConfigError> {
	if config.log.retention_days == 0 || config.log.retention_days > MAX_LOG_RETENTION_DAYS {
		return Err(ConfigError::InvalidValue {
			key: "WGFLEET_LOG_RETENTION_DAYS".into(),
			message: format!("must be between 1 and {MAX_LOG_RETENTION_DAYS} days"),
		});
	}
	Ok(())
}

fn env_string(key: &str, default: &str) -> String {
	std::env::var(key).ok().filter(|v| !v.is_empty()).unwrap_or_else(|| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
	T::Err: std::fmt::Display,
{
	match std::env::var(key) {
		Ok(v) if !v.is_empty() => v.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
			key: key.to_string(),
			message: e.to_string(),
		}),
		_ => Ok(default),
	}
}
