// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! CIDR address values.
//!
//! Addresses travel as strings (`10.4.0.1/24`, `fd00::1/64`) in JSON and in
//! the SQLite TEXT columns. The address part is kept verbatim rather than
//! masked to the network base: interface definitions carry the gateway's own
//! host address inside the range, and peer allocation starts right after it.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cidr {
	addr: IpAddr,
	prefix: u8,
}

impl Cidr {
	pub fn new(addr: IpAddr, prefix: u8) -> Result<Self, Error> {
		let max = match addr {
			IpAddr::V4(_) => 32,
			IpAddr::V6(_) => 128,
		};
		if prefix > max {
			return Err(Error::Validation(format!(
				"prefix /{prefix} out of range for {addr}"
			)));
		}
		Ok(Self { addr, prefix })
	}

	/// A single-host route (`/32` or `/128`) for the given address.
	pub fn host(addr: IpAddr) -> Self {
		let prefix = match addr {
			IpAddr::V4(_) => 32,
			IpAddr::V6(_) => 128,
		};
		Self { addr, prefix }
	}

	pub fn addr(&self) -> IpAddr {
		self.addr
	}

	pub fn prefix(&self) -> u8 {
		self.prefix
	}

	pub fn is_ipv4(&self) -> bool {
		self.addr.is_ipv4()
	}

	/// True when `addr` falls inside this range.
	pub fn contains(&self, addr: IpAddr) -> bool {
		match (self.addr, addr) {
			(IpAddr::V4(net), IpAddr::V4(ip)) => {
				let shift = 32 - u32::from(self.prefix);
				mask_v4(net.to_bits(), shift) == mask_v4(ip.to_bits(), shift)
			}
			(IpAddr::V6(net), IpAddr::V6(ip)) => {
				let shift = 128 - u32::from(self.prefix);
				mask_v6(net.to_bits(), shift) == mask_v6(ip.to_bits(), shift)
			}
			_ => false,
		}
	}

	/// Iterates host addresses after this CIDR's own address, staying inside
	/// the range. Used by peer registration to scan for a free address.
	pub fn hosts_after(&self) -> HostIter {
		HostIter {
			range: *self,
			current: self.addr,
		}
	}
}

fn mask_v4(bits: u32, shift: u32) -> u32 {
	bits.checked_shr(shift).unwrap_or(0)
}

fn mask_v6(bits: u128, shift: u32) -> u128 {
	bits.checked_shr(shift).unwrap_or(0)
}

fn increment(addr: IpAddr) -> IpAddr {
	match addr {
		IpAddr::V4(ip) => IpAddr::V4(Ipv4Addr::from_bits(ip.to_bits().wrapping_add(1))),
		IpAddr::V6(ip) => IpAddr::V6(Ipv6Addr::from_bits(ip.to_bits().wrapping_add(1))),
	}
}

pub struct HostIter {
	range: Cidr,
	current: IpAddr,
}

impl Iterator for HostIter {
	type Item = IpAddr;

	fn next(&mut self) -> Option<IpAddr> {
		let next = increment(self.current);
		if !self.range.contains(next) {
			return None;
		}
		self.current = next;
		Some(next)
	}
}

impl fmt::Display for Cidr {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.addr, self.prefix)
	}
}

impl FromStr for Cidr {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let (addr, prefix) = s
			.split_once('/')
			.ok_or_else(|| Error::Validation(format!("invalid CIDR: {s:?}")))?;
		let addr: IpAddr = addr
			.parse()
			.map_err(|_| Error::Validation(format!("invalid CIDR address: {s:?}")))?;
		let prefix: u8 = prefix
			.parse()
			.map_err(|_| Error::Validation(format!("invalid CIDR prefix: {s:?}")))?;
		Cidr::new(addr, prefix)
	}
}

impl Serialize for Cidr {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}

impl<'de> Deserialize<'de> for Cidr {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let s = String::deserialize(deserializer)?;
		s.parse().map_err(de::Error::custom)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parse_and_display() {
		let c: Cidr = "10.4.0.1/24".parse().unwrap();
		assert_eq!(c.addr(), "10.4.0.1".parse::<IpAddr>().unwrap());
		assert_eq!(c.prefix(), 24);
		assert_eq!(c.to_string(), "10.4.0.1/24");

		let c6: Cidr = "fd00::1/64".parse().unwrap();
		assert!(!c6.is_ipv4());
		assert_eq!(c6.to_string(), "fd00::1/64");
	}

	#[test]
	fn rejects_garbage() {
		assert!("10.0.0.1".parse::<Cidr>().is_err());
		assert!("10.0.0.1/33".parse::<Cidr>().is_err());
		assert!("banana/24".parse::<Cidr>().is_err());
	}

	#[test]
	fn contains() {
		let c: Cidr = "10.4.0.1/24".parse().unwrap();
		assert!(c.contains("10.4.0.200".parse().unwrap()));
		assert!(!c.contains("10.4.1.1".parse().unwrap()));
		assert!(!c.contains("fd00::1".parse().unwrap()));
	}

	#[test]
	fn hosts_after_starts_past_own_address() {
		let c: Cidr = "10.4.0.1/30".parse().unwrap();
		let hosts: Vec<IpAddr> = c.hosts_after().collect();
		assert_eq!(
			hosts,
			vec![
				"10.4.0.2".parse::<IpAddr>().unwrap(),
				"10.4.0.3".parse::<IpAddr>().unwrap(),
			]
		);
	}

	#[test]
	fn json_string_form() {
		let c: Cidr = "10.0.0.5/32".parse().unwrap();
		assert_eq!(serde_json::to_string(&c).unwrap(), r#""10.0.0.5/32""#);
		let back: Cidr = serde_json::from_str(r#""10.0.0.5/32""#).unwrap();
		assert_eq!(back, c);
	}
}
