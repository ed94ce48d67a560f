// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Async client SDK for the docxlate translation service.
//!
//! # Overview
//!
//! - [`ClientConfig`] resolves defaults, the TOML file, `DOCXLATE_*` variables and CLI overrides
//! - [`CredentialStore`] keeps the user's API key in a single scoped, expiring slot
//! - [`CredentialValidator`] checks a key against the service
//! - [`RevalidationScheduler`] re-checks the stored key with backoff
//! - [`Session`] ties it together: health stream, readiness gate, job upload,
//!   progress tracking and cancellation
//!
//! # Example
//!
//! ```no_run
//! use docxlate_client::{ClientConfig, ConfigLayer, JobRequest, Session};
//!
//! # async fn example() -> docxlate_client::Result<()> {
//! let config = ClientConfig::load(None, ConfigLayer::default())?;
//! let (handle, _task) = Session::from_config(&config)?.start();
//!
//! let ready = handle.wait_for(|status| status.ready).await?;
//! println!("{}", ready.key_status);
//!
//! let job_id = handle
//! 	.submit_job(JobRequest {
//! 		path: "report.docx".into(),
//! 		target_language: "German".to_string(),
//! 		retain_terms: "Acme, Widget".to_string(),
//! 	})
//! 	.await?;
//! println!("started {job_id}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod credentials;
pub mod error;
pub mod http;
pub mod scheduler;
pub mod session;
pub mod stream;
pub mod validator;

pub use config::{ClientConfig, ConfigLayer};
pub use credentials::{
	migrate_legacy, CredentialScope, CredentialStore, FileCredentialStore, MemoryCredentialStore,
	MigrationOutcome, SameSite,
};
pub use error::{ClientError, ConfigError, CredentialError, Result};
pub use http::{ApiClient, JobApi, JobStatusResponse, KeyCheckTransport, TranslateRequest};
pub use scheduler::{RevalidationScheduler, TickOutcome};
pub use session::{
	AppState, JobRequest, Session, SessionCommand, SessionHandle, SessionParts, StatusSnapshot,
};
pub use stream::{ReconnectPolicy, StreamConnector, StreamItem, Subscription, WsConnector};
pub use validator::CredentialValidator;
