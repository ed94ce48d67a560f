// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wall-clock abstraction so freshness and expiry can be tested without waiting.

use std::fmt::Debug;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync + Debug {
	fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
	now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
	pub fn new(start: DateTime<Utc>) -> Self {
		Self {
			now: Arc::new(Mutex::new(start)),
		}
	}

	pub fn set(&self, to: DateTime<Utc>) {
		*self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
	}

	pub fn advance(&self, by: Duration) {
		let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
		*now += by;
	}

	/// Advances by a (possibly fractional) number of seconds.
	pub fn advance_secs(&self, secs: f64) {
		self.advance(Duration::microseconds((secs * 1_000_000.0) as i64));
	}
}

impl Clock for ManualClock {
	fn now(&self) -> DateTime<Utc> {
		*self.now.lock().unwrap_or_else(|e| e.into_inner())
	}
}
