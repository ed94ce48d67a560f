// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Self-rescheduling credential revalidation.
//!
//! The scheduler holds a single deadline rather than a running timer task;
//! whoever owns it sleeps until [`RevalidationScheduler::deadline`] and then
//! calls [`RevalidationScheduler::tick`]. Stopping clears the deadline, so no
//! further tick can fire.

use std::time::Duration;

use docxlate_core::{Clock, RevalidationBackoff, UserHealth};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::credentials::CredentialStore;
use crate::validator::CredentialValidator;

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
	/// Nothing stored; the loop has ended.
	Stopped,
	Validated { user: UserHealth, next_delay: Duration },
}

#[derive(Debug, Default)]
pub struct RevalidationScheduler {
	backoff: RevalidationBackoff,
	deadline: Option<Instant>,
}

impl RevalidationScheduler {
	pub fn new() -> Self {
		Self::default()
	}

	/// (Re)starts the loop with the first tick due immediately.
	pub fn start(&mut self) {
		if self.deadline.is_some() {
			debug!("Restarting revalidation; pending tick dropped");
		}
		self.backoff.reset();
		self.deadline = Some(Instant::now());
	}

	pub fn stop(&mut self) {
		if self.deadline.take().is_some() {
			info!("Revalidation stopped");
		}
	}

	pub fn is_running(&self) -> bool {
		self.deadline.is_some()
	}

	pub fn deadline(&self) -> Option<Instant> {
		self.deadline
	}

	/// Delay the next successful or failed tick will start from.
	pub fn next_delay(&self) -> Duration {
		self.backoff.next_delay()
	}

	/// Runs one revalidation step and schedules the next one.
	pub async fn tick(
		&mut self,
		store: &dyn CredentialStore,
		validator: &CredentialValidator,
		clock: &dyn Clock,
	) -> TickOutcome {
		let credential = match store.load().await {
			Ok(Some(credential)) => credential,
			Ok(None) => {
				self.stop();
				return TickOutcome::Stopped;
			}
			Err(e) => {
				warn!(error = %e, "Could not read stored credential");
				self.stop();
				return TickOutcome::Stopped;
			}
		};

		let outcome = validator.validate(&credential).await;
		let user = UserHealth::from_outcome(&outcome, clock.now());
		let next_delay = self.backoff.record(outcome.ok);
		self.deadline = Some(Instant::now() + next_delay);

		debug!(
			ok = outcome.ok,
			reason = %outcome.reason,
			next_delay_secs = next_delay.as_secs(),
			"Revalidation tick"
		);
		TickOutcome::Validated { user, next_delay }
	}
}
