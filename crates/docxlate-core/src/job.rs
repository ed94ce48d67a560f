// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Lifecycle of a single translation job as seen from the client.
//!
//! ```text
//! submitted ──► processing ──┬─► completed
//!                  ▲   │      ├─► error
//!                  └───┘      └─► cancelled
//! ```
//!
//! [`JobTracker::apply`] consumes one progress frame at a time and tells the
//! caller whether the stream should now be closed. Once terminal, the tracker
//! ignores everything else; a late `completed` after a local cancel cannot
//! bring the job back.

use serde::Serialize;

use crate::wire::ProgressMessage;

/// Shown when a submission is refused by the readiness gate.
pub const STATUS_NOT_WORKING: &str = "API not working. Check your API key.";
/// Shown when the upload request fails.
pub const STATUS_ERROR_STARTING: &str = "Error starting job";
/// Shown when the progress stream fails at the transport level.
pub const STATUS_CONNECTION_ERROR: &str = "Connection error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
	Submitted,
	Processing,
	Completed,
	Error,
	Cancelled,
}

impl JobState {
	pub fn is_terminal(self) -> bool {
		matches!(self, JobState::Completed | JobState::Error | JobState::Cancelled)
	}

	pub fn as_str(self) -> &'static str {
		match self {
			JobState::Submitted => "submitted",
			JobState::Processing => "processing",
			JobState::Completed => "completed",
			JobState::Error => "error",
			JobState::Cancelled => "cancelled",
		}
	}
}

/// What the owner of the stream should do after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerAction {
	/// Keep reading.
	Continue,
	/// The job reached a terminal state; close the stream.
	Close,
	/// The job was already terminal; the message was dropped.
	Ignored,
}

/// Render-ready snapshot of a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobView {
	pub job_id: String,
	pub state: JobState,
	pub progress_percent: f64,
	pub elapsed_seconds: f64,
	pub avg_quality: Option<f64>,
	pub download_url: Option<String>,
	pub status: String,
	pub cancel_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct JobTracker {
	job_id: String,
	state: JobState,
	progress_percent: f64,
	elapsed_seconds: f64,
	avg_quality: Option<f64>,
	download_url: Option<String>,
	error_message: Option<String>,
	status: String,
}

fn clamp_percent(value: f64) -> Option<f64> {
	if value.is_nan() {
		None
	} else {
		Some(value.clamp(0.0, 100.0))
	}
}

impl JobTracker {
	pub fn new(job_id: impl Into<String>) -> Self {
		Self {
			job_id: job_id.into(),
			state: JobState::Submitted,
			progress_percent: 0.0,
			elapsed_seconds: 0.0,
			avg_quality: None,
			download_url: None,
			error_message: None,
			status: "Job submitted".to_string(),
		}
	}

	pub fn job_id(&self) -> &str {
		&self.job_id
	}

	pub fn state(&self) -> JobState {
		self.state
	}

	pub fn is_terminal(&self) -> bool {
		self.state.is_terminal()
	}

	pub fn can_cancel(&self) -> bool {
		!self.is_terminal()
	}

	pub fn error_message(&self) -> Option<&str> {
		self.error_message.as_deref()
	}

	pub fn apply(&mut self, message: &ProgressMessage) -> TrackerAction {
		if self.is_terminal() {
			return TrackerAction::Ignored;
		}

		match message {
			ProgressMessage::Progress(update) => {
				self.state = JobState::Processing;
				if let Some(percent) = update.progress.and_then(clamp_percent) {
					self.progress_percent = percent;
				}
				if let Some(elapsed) = update.elapsed_seconds {
					self.elapsed_seconds = elapsed.max(0.0);
				}
				if update.avg_quality.is_some() {
					self.avg_quality = update.avg_quality;
				}
				self.status = format!("Processing… {:.0}%", self.progress_percent);
				TrackerAction::Continue
			}
			ProgressMessage::Completed(done) => {
				self.state = JobState::Completed;
				self.progress_percent = 100.0;
				if let Some(elapsed) = done.elapsed_seconds {
					self.elapsed_seconds = elapsed.max(0.0);
				}
				if done.avg_quality.is_some() {
					self.avg_quality = done.avg_quality;
				}
				self.download_url = done.download_url.clone();
				self.status = "Completed".to_string();
				TrackerAction::Close
			}
			ProgressMessage::Error(err) => {
				self.state = JobState::Error;
				self.error_message = err.message.clone();
				self.status = match &err.message {
					Some(message) => format!("Error: {message}"),
					None => "Error".to_string(),
				};
				TrackerAction::Close
			}
			ProgressMessage::Cancelled(cancelled) => {
				if let Some(elapsed) = cancelled.elapsed_seconds {
					self.elapsed_seconds = elapsed.max(0.0);
				}
				self.mark_cancelled()
			}
		}
	}

	/// Local cancel accepted by the service; does not wait for the stream.
	pub fn force_cancelled(&mut self) -> TrackerAction {
		if self.is_terminal() {
			return TrackerAction::Ignored;
		}
		self.mark_cancelled()
	}

	fn mark_cancelled(&mut self) -> TrackerAction {
		self.state = JobState::Cancelled;
		self.download_url = None;
		self.status = "Cancelled".to_string();
		TrackerAction::Close
	}

	/// Transport failure on the progress stream. Status only; no transition.
	pub fn on_stream_error(&mut self) {
		if !self.is_terminal() {
			self.status = STATUS_CONNECTION_ERROR.to_string();
		}
	}

	pub fn view(&self) -> JobView {
		JobView {
			job_id: self.job_id.clone(),
			state: self.state,
			progress_percent: self.progress_percent,
			elapsed_seconds: self.elapsed_seconds,
			avg_quality: self.avg_quality,
			download_url: self.download_url.clone(),
			status: self.status.clone(),
			cancel_enabled: self.can_cancel(),
		}
	}
}
