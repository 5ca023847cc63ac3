// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared harness for the end-to-end scenarios: real servers on ephemeral
//! ports, follower processes, and a kill-switch proxy for transport-failure
//! injection.

// Each integration test binary compiles its own copy of this module and
// uses a different subset of it.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use wgfleet_client::RemoteLogSource;
use wgfleet_core::{Entity, Interface, Peer, Sequence};
use wgfleet_log::{CrudLog, EntityWriter, LogWriter, ReadOnlyWriter};
use wgfleet_server::registration::RegistrationService;
use wgfleet_server::sessions::SessionManager;
use wgfleet_server::{create_router, AppState};

pub struct TestServer {
	pub url: String,
	pub log: Arc<CrudLog>,
	pub writer: Arc<dyn EntityWriter>,
	tasks: Vec<JoinHandle<()>>,
}

impl TestServer {
	pub fn abort(&self) {
		for task in &self.tasks {
			task.abort();
		}
	}
}

impl Drop for TestServer {
	fn drop(&mut self) {
		self.abort();
	}
}

async fn spawn_server(database_url: &str, log_url: Option<String>) -> TestServer {
	let pool = wgfleet_db::open_pool(database_url).await.expect("failed to open pool");
	let log = Arc::new(CrudLog::new(pool.clone()));

	let primary = log_url.is_none();
	let writer: Arc<dyn EntityWriter> = if primary {
		Arc::new(LogWriter::new(Arc::clone(&log)))
	} else {
		Arc::new(ReadOnlyWriter)
	};

	let state = AppState {
		log: Arc::clone(&log),
		writer: Arc::clone(&writer),
		registration: primary
			.then(|| Arc::new(RegistrationService::new(pool.clone(), Arc::clone(&writer)))),
		sessions: primary.then(|| Arc::new(SessionManager::new(pool.clone()))),
	};

	let listener = TcpListener::bind("127.0.0.1:0").await.expect("failed to bind");
	let addr = listener.local_addr().expect("no local addr");
	let app = create_router(state);
	let mut tasks = vec![tokio::spawn(async move {
		let _ = axum::serve(listener, app).await;
	})];

	if let Some(url) = log_url {
		let log = Arc::clone(&log);
		tasks.push(tokio::spawn(async move {
			let source = RemoteLogSource::new(url, wgfleet_client::http::new_client());
			let err = wgfleet_log::follow(&source, &*log).await;
			panic!("follower stopped: {err}");
		}));
	}

	TestServer {
		url: format!("http://{addr}"),
		log,
		writer,
		tasks,
	}
}

/// A primary datastore on an in-memory database.
pub async fn spawn_primary() -> TestServer {
	spawn_server("sqlite::memory:", None).await
}

/// A read-only mirror following `primary_url`.
pub async fn spawn_follower(primary_url: &str) -> TestServer {
	spawn_server("sqlite::memory:", Some(primary_url.to_string())).await
}

pub async fn wait_for_sequence(log: &CrudLog, seq: Sequence) {
	tokio::time::timeout(Duration::from_secs(10), async {
		loop {
			if log.latest_sequence().await.unwrap() >= seq {
				return;
			}
			tokio::time::sleep(Duration::from_millis(10)).await;
		}
	})
	.await
	.unwrap_or_else(|_| panic!("timed out waiting for sequence {seq}"));
}

pub fn interface_entity(name: &str, port: u16, ip: &str) -> Entity {
	Entity::Interface(Interface {
		name: name.into(),
		port,
		ip: Some(ip.parse().unwrap()),
		..Default::default()
	})
}

pub fn peer_entity(pk: &str, interface: &str, ip: &str) -> Entity {
	Entity::Peer(Peer {
		public_key: pk.into(),
		interface: interface.into(),
		ip: Some(ip.parse().unwrap()),
		..Default::default()
	})
}

/// A TCP proxy with a kill switch: disabling it severs every live
/// connection and refuses new ones, which looks exactly like the upstream
/// server dying mid-stream.
pub struct TestProxy {
	pub url: String,
	enabled: tokio::sync::watch::Sender<bool>,
	task: JoinHandle<()>,
}

impl TestProxy {
	pub async fn spawn(upstream: String) -> TestProxy {
		let upstream = upstream.trim_start_matches("http://").to_string();
		let listener = TcpListener::bind("127.0.0.1:0").await.expect("failed to bind proxy");
		let addr = listener.local_addr().expect("no local addr");
		let (enabled, rx) = tokio::sync::watch::channel(true);

		let task = tokio::spawn(async move {
			loop {
				let Ok((mut inbound, _)) = listener.accept().await else {
					return;
				};
				if !*rx.borrow() {
					// Upstream is "down": refuse by closing immediately.
					continue;
				}
				let upstream = upstream.clone();
				let mut rx = rx.clone();
				tokio::spawn(async move {
					let Ok(mut outbound) = tokio::net::TcpStream::connect(&upstream).await else {
						return;
					};
					tokio::select! {
						_ = tokio::io::copy_bidirectional(&mut inbound, &mut outbound) => {}
						_ = rx.wait_for(|enabled| !enabled) => {}
					}
				});
			}
		});

		TestProxy {
			url: format!("http://{addr}"),
			enabled,
			task,
		}
	}

	pub fn set_enabled(&self, enabled: bool) {
		let _ = self.enabled.send(enabled);
	}
}

impl Drop for TestProxy {
	fn drop(&mut self) {
		self.task.abort();
	}
}
