// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Delay policy for credential re-validation.
//!
//! While the key checks out, re-checks slow down (doubling, 60..=300 s).
//! While it fails, they speed back up but stay bounded (x1.5 floored,
//! 15..=120 s).

use std::time::Duration;

/// Delay used on (re)start.
pub const INITIAL_DELAY_SECS: u64 = 15;

const SUCCESS_MIN_SECS: u64 = 60;
const SUCCESS_MAX_SECS: u64 = 300;
const FAILURE_MIN_SECS: u64 = 15;
const FAILURE_MAX_SECS: u64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevalidationBackoff {
	next_delay_secs: u64,
}

impl RevalidationBackoff {
	pub fn new() -> Self {
		Self {
			next_delay_secs: INITIAL_DELAY_SECS,
		}
	}

	pub fn reset(&mut self) {
		self.next_delay_secs = INITIAL_DELAY_SECS;
	}

	pub fn next_delay_secs(&self) -> u64 {
		self.next_delay_secs
	}

	pub fn next_delay(&self) -> Duration {
		Duration::from_secs(self.next_delay_secs)
	}

	pub fn on_success(&mut self) -> Duration {
		self.next_delay_secs = self
			.next_delay_secs
			.saturating_mul(2)
			.clamp(SUCCESS_MIN_SECS, SUCCESS_MAX_SECS);
		self.next_delay()
	}

	pub fn on_failure(&mut self) -> Duration {
		// floor(d * 1.5) in integer arithmetic
		self.next_delay_secs = (self.next_delay_secs.saturating_mul(3) / 2)
			.clamp(FAILURE_MIN_SECS, FAILURE_MAX_SECS);
		self.next_delay()
	}

	/// Applies the outcome of one validation and returns the next delay.
	pub fn record(&mut self, ok: bool) -> Duration {
		if ok {
			self.on_success()
		} else {
			self.on_failure()
		}
	}
}

impl Default for RevalidationBackoff {
	fn default() -> Self {
		Self::new()
	}
}
