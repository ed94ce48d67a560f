// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Health signals and the readiness reconciler.
//!
//! Two signals decide whether a job may be submitted:
//!
//! - [`ServerHealth`], pushed by the service over `/ws/health`. It reports
//!   whether the service's own key works and how old that check is.
//! - [`UserHealth`], the outcome of the last check of the user's own key.
//!
//! Either one, if fresh and ok, is enough. [`reconcile`] is a pure function of
//! both snapshots and the current time; callers run it on every read instead
//! of caching the result, because the two signals update independently and
//! ages grow with the clock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reason::ReasonCode;
use crate::wire::HealthReport;

/// Maximum age, in seconds, at which a signal is still trusted.
pub const FRESHNESS_WINDOW_SECS: f64 = 300.0;

/// Returns true when `age_secs` is inside the freshness window (inclusive).
///
/// NaN and infinite ages are never fresh.
pub fn is_within_window(age_secs: f64) -> bool {
	age_secs <= FRESHNESS_WINDOW_SECS
}

fn seconds_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
	match (later - earlier).num_microseconds() {
		Some(us) => (us as f64 / 1_000_000.0).max(0.0),
		None => f64::INFINITY,
	}
}

/// Result of checking one candidate credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
	pub ok: bool,
	pub reason: ReasonCode,
}

impl ValidationOutcome {
	pub fn new(ok: bool, reason: ReasonCode) -> Self {
		Self { ok, reason }
	}

	pub fn missing() -> Self {
		Self::new(false, ReasonCode::Missing)
	}

	pub fn unreachable() -> Self {
		Self::new(false, ReasonCode::Unreachable)
	}

	pub fn invalid() -> Self {
		Self::new(false, ReasonCode::Invalid)
	}
}

/// Health as last pushed by the service.
///
/// The reported age is taken as-is at receipt. Afterwards it keeps growing
/// with the local clock, so a silent health stream cannot keep an old "ok"
/// alive forever.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerHealth {
	pub ok: bool,
	pub present: bool,
	reported_age_secs: f64,
	received_at: Option<DateTime<Utc>>,
}

impl ServerHealth {
	/// No report received yet.
	pub fn unknown() -> Self {
		Self {
			ok: false,
			present: false,
			reported_age_secs: f64::INFINITY,
			received_at: None,
		}
	}

	pub fn new(ok: bool, present: bool, reported_age_secs: f64, received_at: DateTime<Utc>) -> Self {
		let reported_age_secs = if reported_age_secs.is_nan() {
			f64::INFINITY
		} else {
			reported_age_secs.max(0.0)
		};
		Self {
			ok,
			present,
			reported_age_secs,
			received_at: Some(received_at),
		}
	}

	pub fn from_report(report: &HealthReport, received_at: DateTime<Utc>) -> Self {
		Self::new(
			report.openai_reachable,
			report.api_key_present,
			report.age_seconds,
			received_at,
		)
	}

	pub fn age_at(&self, now: DateTime<Utc>) -> f64 {
		match self.received_at {
			Some(received_at) => self.reported_age_secs + seconds_between(received_at, now),
			None => f64::INFINITY,
		}
	}

	pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
		self.present && self.ok && is_within_window(self.age_at(now))
	}
}

impl Default for ServerHealth {
	fn default() -> Self {
		Self::unknown()
	}
}

/// Health derived from validating the user's own credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserHealth {
	pub ok: bool,
	pub present: bool,
	pub reason: ReasonCode,
	pub checked_at: Option<DateTime<Utc>>,
}

impl UserHealth {
	/// The reset state used whenever the credential is edited or cleared.
	pub fn missing() -> Self {
		Self {
			ok: false,
			present: false,
			reason: ReasonCode::Missing,
			checked_at: None,
		}
	}

	pub fn from_outcome(outcome: &ValidationOutcome, checked_at: DateTime<Utc>) -> Self {
		let present = outcome.reason != ReasonCode::Missing;
		Self {
			ok: outcome.ok && present,
			present,
			reason: outcome.reason.clone(),
			checked_at: Some(checked_at),
		}
	}

	/// Seconds since the last check; infinite when nothing is configured.
	pub fn age_at(&self, now: DateTime<Utc>) -> f64 {
		match (self.present, self.checked_at) {
			(true, Some(checked_at)) => seconds_between(checked_at, now),
			_ => f64::INFINITY,
		}
	}

	pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
		self.present && self.ok && is_within_window(self.age_at(now))
	}
}

impl Default for UserHealth {
	fn default() -> Self {
		Self::missing()
	}
}

/// The merged view of both signals at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CombinedHealth {
	pub ok: bool,
	pub present: bool,
	pub age_seconds: f64,
}

impl CombinedHealth {
	/// The job submission gate.
	pub fn is_ready(&self) -> bool {
		self.ok && self.present && is_within_window(self.age_seconds)
	}
}

/// Merges both signals as of `now`.
pub fn reconcile(server: &ServerHealth, user: &UserHealth, now: DateTime<Utc>) -> CombinedHealth {
	CombinedHealth {
		ok: server.is_fresh(now) || user.is_fresh(now),
		present: server.present || user.present,
		age_seconds: server.age_at(now).min(user.age_at(now)),
	}
}
