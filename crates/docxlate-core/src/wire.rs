// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Frames pushed by the service over its two WebSocket channels.
//!
//! # Channels
//!
//! - `/ws/health` sends [`HealthStreamMessage::Health`] every few seconds for
//!   as long as the connection is open.
//! - `/ws/progress/{job_id}` sends [`ProgressMessage`]s for one job and is
//!   closed after a terminal message.
//!
//! ```
//! use docxlate_core::ProgressMessage;
//!
//! let msg = ProgressMessage::parse(r#"{"type":"progress","progress":40.0,"elapsed_seconds":3.5}"#).unwrap();
//! assert_eq!(msg.kind(), "progress");
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HealthStreamMessage {
	Health(HealthReport),
}

impl HealthStreamMessage {
	pub fn parse(text: &str) -> Result<Self> {
		serde_json::from_str(text).map_err(|e| CoreError::MalformedMessage(e.to_string()))
	}
}

/// The service's view of its own upstream key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
	pub openai_reachable: bool,
	pub api_key_present: bool,
	pub age_seconds: f64,
	/// Unix seconds of the server's last check.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub checked_at: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressMessage {
	Progress(ProgressUpdate),
	Completed(CompletedUpdate),
	Error(ErrorUpdate),
	Cancelled(CancelledUpdate),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
	#[serde(default)]
	pub progress: Option<f64>,
	#[serde(default)]
	pub elapsed_seconds: Option<f64>,
	#[serde(default)]
	pub avg_quality: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletedUpdate {
	#[serde(default)]
	pub progress: Option<f64>,
	#[serde(default)]
	pub elapsed_seconds: Option<f64>,
	#[serde(default)]
	pub avg_quality: Option<f64>,
	#[serde(default)]
	pub download_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorUpdate {
	#[serde(default)]
	pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CancelledUpdate {
	#[serde(default)]
	pub elapsed_seconds: Option<f64>,
}

/// Untagged `{"error": "..."}` frame the service sends for unknown jobs.
#[derive(Deserialize)]
struct BareError {
	error: String,
}

impl ProgressMessage {
	pub fn parse(text: &str) -> Result<Self> {
		match serde_json::from_str::<ProgressMessage>(text) {
			Ok(message) => Ok(message),
			Err(tagged_err) => match serde_json::from_str::<BareError>(text) {
				Ok(bare) => Ok(ProgressMessage::Error(ErrorUpdate {
					message: Some(bare.error),
				})),
				Err(_) => Err(CoreError::MalformedMessage(tagged_err.to_string())),
			},
		}
	}

	pub fn kind(&self) -> &'static str {
		match self {
			ProgressMessage::Progress(_) => "progress",
			ProgressMessage::Completed(_) => "completed",
			ProgressMessage::Error(_) => "error",
			ProgressMessage::Cancelled(_) => "cancelled",
		}
	}

	pub fn progress(progress: f64, elapsed_seconds: f64) -> Self {
		ProgressMessage::Progress(ProgressUpdate {
			progress: Some(progress),
			elapsed_seconds: Some(elapsed_seconds),
			avg_quality: None,
		})
	}

	pub fn completed(download_url: Option<&str>, elapsed_seconds: f64) -> Self {
		ProgressMessage::Completed(CompletedUpdate {
			progress: Some(100.0),
			elapsed_seconds: Some(elapsed_seconds),
			avg_quality: None,
			download_url: download_url.map(str::to_string),
		})
	}
}
