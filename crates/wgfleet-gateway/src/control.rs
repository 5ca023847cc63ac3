// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Kernel-side device control.
//!
//! [`SysWgControl`] drives the system tools (`ip`, `wg`, `iptables`): a
//! WireGuard device per interface, a `wg-<name>-in`/`wg-<name>-out`
//! iptables chain pair hooked into FORWARD, outbound SMTP dropped on both
//! directions.

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::process::Command;

use wgfleet_core::{Error, Interface, Peer, PeerStats, Result};

const MTU: &str = "1420";
const PERSISTENT_KEEPALIVE_SECS: &str = "10";

#[async_trait]
pub trait WgControl: Send + Sync {
	/// Create (or recreate) the device for `interface` and bring it up.
	async fn start_interface(&self, interface: &Interface) -> Result<()>;

	/// Tear the device and its firewall chains down.
	async fn stop_interface(&self, name: &str) -> Result<()>;

	/// Add or update one peer on the device.
	async fn set_peer(&self, interface: &str, peer: &Peer) -> Result<()>;

	/// Remove one peer from the device.
	async fn remove_peer(&self, interface: &str, public_key: &str) -> Result<()>;

	/// Replace the device's entire peer set.
	async fn replace_peers(&self, interface: &str, peers: &[Peer]) -> Result<()>;

	/// Per-peer counters from the device.
	async fn collect_stats(&self, interface: &str) -> Result<Vec<PeerStats>>;
}

#[derive(Default)]
pub struct SysWgControl;

impl SysWgControl {
	pub fn new() -> Self {
		Self
	}

	fn chains(name: &str) -> (String, String) {
		(format!("wg-{name}-in"), format!("wg-{name}-out"))
	}

	/// `wg set` only reads private keys from a file.
	async fn write_key_file(&self, name: &str, key: &str) -> Result<PathBuf> {
		let path = std::env::temp_dir().join(format!("wgfleet-{name}.key"));
		tokio::fs::write(&path, key)
			.await
			.map_err(|e| Error::Command(format!("writing key file: {e}")))?;
		tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
			.await
			.map_err(|e| Error::Command(format!("chmod key file: {e}")))?;
		Ok(path)
	}
}

#[async_trait]
impl WgControl for SysWgControl {
	async fn start_interface(&self, interface: &Interface) -> Result<()> {
		let name = interface.name.as_str();
		let (chain_in, chain_out) = Self::chains(name);

		// Leftovers from a previous run, if any.
		run_ignore(&["ip", "link", "set", name, "down"]).await;
		run_ignore(&["ip", "link", "del", "dev", name]).await;
		run_ignore(&["iptables", "-N", &chain_in]).await;
		run_ignore(&["iptables", "-N", &chain_out]).await;
		run_ignore(&["iptables", "-D", "FORWARD", "-i", name, "-j", &chain_in]).await;
		run_ignore(&["iptables", "-D", "FORWARD", "-o", name, "-j", &chain_out]).await;

		run(&["ip", "link", "add", "dev", name, "type", "wireguard"]).await?;

		let key_file = self.write_key_file(name, &interface.private_key).await?;
		let key_path = key_file.to_string_lossy().into_owned();
		let port = interface.port.to_string();
		let fwmark = interface.fwmark.to_string();
		let mut wg_args: Vec<&str> =
			vec!["wg", "set", name, "private-key", &key_path, "listen-port", &port];
		if interface.fwmark > 0 {
			wg_args.push("fwmark");
			wg_args.push(&fwmark);
		}
		let result = run(&wg_args).await;
		let _ = tokio::fs::remove_file(&key_file).await;
		result?;

		if let Some(ip) = interface.ip {
			run(&["ip", "address", "add", "dev", name, &ip.to_string()]).await?;
		}
		if let Some(ip6) = interface.ip6 {
			run(&["ip", "address", "add", "dev", name, &ip6.to_string()]).await?;
		}
		run(&["ip", "link", "set", "mtu", MTU, "dev", name]).await?;

		run(&["iptables", "-F", &chain_in]).await?;
		run(&["iptables", "-F", &chain_out]).await?;
		run(&["iptables", "-A", &chain_out, "-p", "tcp", "--dport", "25", "-j", "DROP"]).await?;
		run(&["iptables", "-A", &chain_out, "-j", "ACCEPT"]).await?;
		run(&["iptables", "-A", &chain_in, "-p", "tcp", "--dport", "25", "-j", "DROP"]).await?;
		run(&["iptables", "-A", &chain_in, "-j", "ACCEPT"]).await?;
		run(&["iptables", "-A", "FORWARD", "-i", name, "-j", &chain_in]).await?;
		run(&["iptables", "-A", "FORWARD", "-o", name, "-j", &chain_out]).await?;

		run(&["ip", "link", "set", name, "up"]).await?;
		Ok(())
	}

	async fn stop_interface(&self, name: &str) -> Result<()> {
		let (chain_in, chain_out) = Self::chains(name);
		run(&["ip", "link", "set", name, "down"]).await?;
		run(&["ip", "link", "del", "dev", name]).await?;

		run(&["iptables", "-D", "FORWARD", "-i", name, "-j", &chain_in]).await?;
		run(&["iptables", "-D", "FORWARD", "-o", name, "-j", &chain_out]).await?;
		run(&["iptables", "-F", &chain_in]).await?;
		run(&["iptables", "-F", &chain_out]).await?;
		run(&["iptables", "-X", &chain_in]).await?;
		run(&["iptables", "-X", &chain_out]).await?;
		Ok(())
	}

	async fn set_peer(&self, interface: &str, peer: &Peer) -> Result<()> {
		let mut allowed = Vec::new();
		if let Some(ip) = peer.ip {
			allowed.push(ip.to_string());
		}
		if let Some(ip6) = peer.ip6 {
			allowed.push(ip6.to_string());
		}
		if allowed.is_empty() {
			return Err(Error::Command(format!(
				"no IPs configured for peer {}",
				peer.public_key
			)));
		}

		run(&[
			"wg",
			"set",
			interface,
			"peer",
			&peer.public_key,
			"persistent-keepalive",
			PERSISTENT_KEEPALIVE_SECS,
			"allowed-ips",
			&allowed.join(","),
		])
		.await?;
		Ok(())
	}

	async fn remove_peer(&self, interface: &str, public_key: &str) -> Result<()> {
		run(&["wg", "set", interface, "peer", public_key, "remove"]).await?;
		Ok(())
	}

	async fn replace_peers(&self, interface: &str, peers: &[Peer]) -> Result<()> {
		let current = run(&["wg", "show", interface, "peers"]).await?;
		for public_key in current.split_whitespace() {
			self.remove_peer(interface, public_key).await?;
		}
		for peer in peers {
			self.set_peer(interface, peer).await?;
		}
		Ok(())
	}

	async fn collect_stats(&self, interface: &str) -> Result<Vec<PeerStats>> {
		let dump = run(&["wg", "show", interface, "dump"]).await?;
		// First line describes the interface itself; peer lines follow as
		// pubkey, psk, endpoint, allowed-ips, latest-handshake, rx, tx,
		// keepalive.
		let mut out = Vec::new();
		for line in dump.lines().skip(1) {
			let fields: Vec<&str> = line.split('\t').collect();
			if fields.len() < 7 {
				continue;
			}
			let handshake: i64 = fields[4].parse().unwrap_or(0);
			out.push(PeerStats {
				public_key: fields[0].to_string(),
				last_handshake_time: (handshake > 0)
					.then(|| DateTime::<Utc>::from_timestamp(handshake, 0))
					.flatten(),
				rx_bytes: fields[5].parse().unwrap_or(0),
				tx_bytes: fields[6].parse().unwrap_or(0),
				endpoint: match fields[2] {
					"(none)" => String::new(),
					endpoint => endpoint.rsplit_once(':').map(|(host, _)| host).unwrap_or(endpoint)
						.trim_matches(['[', ']'])
						.to_string(),
				},
			});
		}
		Ok(out)
	}
}

async fn run(args: &[&str]) -> Result<String> {
	tracing::debug!(command = args.join(" "), "running command");
	let output = Command::new(args[0])
		.args(&args[1..])
		.output()
		.await
		.map_err(|e| Error::Command(format!("{}: {e}", args[0])))?;
	if !output.status.success() {
		return Err(Error::Command(format!(
			"{} failed: {}",
			args.join(" "),
			String::from_utf8_lossy(&output.stderr).trim()
		)));
	}
	Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

async fn run_ignore(args: &[&str]) {
	if let Err(e) = run(args).await {
		tracing::debug!(error = %e, "ignoring command failure");
	}
}

/// An in-memory device table standing in for the kernel in tests.
#[cfg(test)]
pub(crate) mod testing {
	use super::*;
	use std::collections::HashMap;
	use std::sync::Mutex;

	#[derive(Default)]
	pub struct MockState {
		pub interfaces: HashMap<String, Interface>,
		pub peers: HashMap<String, HashMap<String, Peer>>,
	}

	#[derive(Default)]
	pub struct MockWgControl {
		pub state: Mutex<MockState>,
	}

	impl MockWgControl {
		pub fn interface_names(&self) -> Vec<String> {
			let state = self.state.lock().unwrap();
			let mut names: Vec<String> = state.interfaces.keys().cloned().collect();
			names.sort();
			names
		}

		pub fn peers_of(&self, interface: &str) -> Vec<Peer> {
			let state = self.state.lock().unwrap();
			let mut peers: Vec<Peer> = state
				.peers
				.get(interface)
				.map(|m| m.values().cloned().collect())
				.unwrap_or_default();
			peers.sort_by(|a, b| a.public_key.cmp(&b.public_key));
			peers
		}
	}

	#[async_trait]
	impl WgControl for MockWgControl {
		async fn start_interface(&self, interface: &Interface) -> Result<()> {
			let mut state = self.state.lock().unwrap();
			state.interfaces.insert(interface.name.clone(), interface.clone());
			state.peers.entry(interface.name.clone()).or_default();
			Ok(())
		}

		async fn stop_interface(&self, name: &str) -> Result<()> {
			let mut state = self.state.lock().unwrap();
			state.interfaces.remove(name);
			state.peers.remove(name);
			Ok(())
		}

		async fn set_peer(&self, interface: &str, peer: &Peer) -> Result<()> {
			let mut state = self.state.lock().unwrap();
			if !state.interfaces.contains_key(interface) {
				return Err(Error::Command(format!("no such device {interface}")));
			}
			state
				.peers
				.entry(interface.to_string())
				.or_default()
				.insert(peer.public_key.clone(), peer.clone());
			Ok(())
		}

		async fn remove_peer(&self, interface: &str, public_key: &str) -> Result<()> {
			let mut state = self.state.lock().unwrap();
			let removed = state
				.peers
				.get_mut(interface)
				.and_then(|peers| peers.remove(public_key));
			if removed.is_none() {
				return Err(Error::Command(format!(
					"no peer {public_key} on {interface}"
				)));
			}
			Ok(())
		}

		async fn replace_peers(&self, interface: &str, peers: &[Peer]) -> Result<()> {
			let mut state = self.state.lock().unwrap();
			if !state.interfaces.contains_key(interface) {
				return Err(Error::Command(format!("no such device {interface}")));
			}
			state.peers.insert(
				interface.to_string(),
				peers
					.iter()
					.map(|p| (p.public_key.clone(), p.clone()))
					.collect(),
			);
			Ok(())
		}

		async fn collect_stats(&self, interface: &str) -> Result<Vec<PeerStats>> {
			let state = self.state.lock().unwrap();
			Ok(state
				.peers
				.get(interface)
				.map(|peers| {
					peers
						.keys()
						.map(|pk| PeerStats {
							public_key: pk.clone(),
							last_handshake_time: None,
							rx_bytes: 0,
							tx_bytes: 0,
							endpoint: String::new(),
						})
						.collect()
				})
				.unwrap_or_default())
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn chain_names() {
		let (chain_in, chain_out) = SysWgControl::chains("wg0");
		assert_eq!(chain_in, "wg-wg0-in");
		assert_eq!(chain_out, "wg-wg0-out");
	}
}
