// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! The VPN gateway node: a log follower whose sink is the kernel's
//! WireGuard state instead of a SQL mirror.

pub mod control;
pub mod sink;
pub mod stats;

pub use control::{SysWgControl, WgControl};
pub use sink::WgSink;
pub use stats::{spawn_stats_loop, RemoteStatsSink, StatsSink};
