// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the docxlate translation client.
//!
//! This crate holds everything that can be decided without touching the
//! network: it is used by the async SDK (`docxlate-client`) and is small
//! enough to test exhaustively.
//!
//! # Overview
//!
//! - [`SecretString`] keeps API keys out of logs
//! - [`ReasonCode`] and [`ValidationOutcome`] describe credential checks
//! - [`ServerHealth`], [`UserHealth`] and [`reconcile`] produce the readiness gate
//! - [`RevalidationBackoff`] drives the credential re-check timer
//! - [`JobTracker`] consumes progress messages for one translation job
//! - [`ProgressMessage`] and [`HealthStreamMessage`] are the push-stream frames
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use docxlate_core::{reconcile, ReasonCode, ServerHealth, UserHealth, ValidationOutcome};
//!
//! let now = Utc::now();
//! let server = ServerHealth::unknown();
//! let user = UserHealth::from_outcome(&ValidationOutcome::new(true, ReasonCode::Ok), now);
//!
//! let combined = reconcile(&server, &user, now);
//! assert!(combined.is_ready());
//! ```

pub mod backoff;
pub mod clock;
pub mod error;
pub mod health;
pub mod job;
pub mod reason;
pub mod secret;
pub mod terms;
pub mod wire;

pub use backoff::{RevalidationBackoff, INITIAL_DELAY_SECS};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CoreError, Result};
pub use health::{
	is_within_window, reconcile, CombinedHealth, ServerHealth, UserHealth, ValidationOutcome,
	FRESHNESS_WINDOW_SECS,
};
pub use job::{
	JobState, JobTracker, JobView, TrackerAction, STATUS_CONNECTION_ERROR, STATUS_ERROR_STARTING,
	STATUS_NOT_WORKING,
};
pub use reason::ReasonCode;
pub use secret::{SecretString, REDACTED};
pub use terms::{join_retain_terms, parse_retain_terms};
pub use wire::{
	CancelledUpdate, CompletedUpdate, ErrorUpdate, HealthReport, HealthStreamMessage,
	ProgressMessage, ProgressUpdate,
};
