// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Exponential backoff with jitter for the follower's retry loops.
//!
//! Network outages between nodes are expected, so there is no elapsed-time
//! give-up: delays grow to the cap and stay there until `reset`.

use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone)]
pub struct Backoff {
	initial: Duration,
	max: Duration,
	randomization: f64,
	attempt: u32,
}

impl Default for Backoff {
	fn default() -> Self {
		Self {
			initial: Duration::from_millis(200),
			max: Duration::from_secs(60),
			randomization: 0.2,
			attempt: 0,
		}
	}
}

impl Backoff {
	pub fn new(initial: Duration, max: Duration, randomization: f64) -> Self {
		Self {
			initial,
			max,
			randomization,
			attempt: 0,
		}
	}

	/// The next delay: `initial * 2^attempt`, capped, with +/- randomization.
	pub fn next_delay(&mut self) -> Duration {
		let factor = 2u64.saturating_pow(self.attempt.min(16));
		self.attempt = self.attempt.saturating_add(1);

		let base = self.initial.as_millis() as u64;
		let delay_ms = base.saturating_mul(factor).min(self.max.as_millis() as u64);

		let jitter = rand::thread_rng().gen_range(-self.randomization..=self.randomization);
		let jittered = (delay_ms as f64 * (1.0 + jitter)).max(0.0) as u64;
		Duration::from_millis(jittered)
	}

	/// Back to the initial delay, after the connection makes progress.
	pub fn reset(&mut self) {
		self.attempt = 0;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn grows_exponentially_to_the_cap() {
		let mut b = Backoff::new(Duration::from_millis(200), Duration::from_secs(60), 0.0);
		assert_eq!(b.next_delay(), Duration::from_millis(200));
		assert_eq!(b.next_delay(), Duration::from_millis(400));
		assert_eq!(b.next_delay(), Duration::from_millis(800));
		for _ in 0..20 {
			b.next_delay();
		}
		assert_eq!(b.next_delay(), Duration::from_secs(60));
	}

	#[test]
	fn reset_starts_over() {
		let mut b = Backoff::new(Duration::from_millis(200), Duration::from_secs(60), 0.0);
		b.next_delay();
		b.next_delay();
		b.reset();
		assert_eq!(b.next_delay(), Duration::from_millis(200));
	}

	#[test]
	fn jitter_stays_within_bounds() {
		let mut b = Backoff::default();
		for _ in 0..100 {
			b.reset();
			let d = b.next_delay().as_millis() as i64;
			assert!((160..=240).contains(&d), "delay {d}ms outside +/-20% of 200ms");
		}
	}
}
