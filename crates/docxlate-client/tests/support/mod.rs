// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Fakes for driving a `Session` without a server.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use docxlate_client::{
	ClientError, CredentialStore, CredentialValidator, JobApi, KeyCheckTransport,
	MemoryCredentialStore, Result, Session, SessionParts, StreamConnector, StreamItem,
	Subscription, TranslateRequest,
};
use docxlate_core::{ManualClock, SecretString};
use tokio::sync::mpsc;

/// Key check that answers `ok` or `invalid` and counts calls.
#[derive(Debug)]
pub struct MockKeyCheck {
	pub calls: AtomicUsize,
	pub ok: AtomicBool,
}

impl MockKeyCheck {
	pub fn new(ok: bool) -> Arc<Self> {
		Arc::new(Self {
			calls: AtomicUsize::new(0),
			ok: AtomicBool::new(ok),
		})
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl KeyCheckTransport for MockKeyCheck {
	async fn check_key(&self, _key: &SecretString) -> Result<String> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		if self.ok.load(Ordering::SeqCst) {
			Ok(r#"{"ok":true,"reason":"ok"}"#.to_string())
		} else {
			Ok(r#"{"ok":false,"reason":"invalid"}"#.to_string())
		}
	}
}

/// What an upload carried.
#[derive(Debug, Clone)]
pub struct RecordedUpload {
	pub file_name: String,
	pub target_language: String,
	pub retain_terms: Option<String>,
	pub api_key: Option<String>,
}

/// Job endpoints that hand out `job-1`, `job-2`, ...
#[derive(Debug, Default)]
pub struct MockJobs {
	pub uploads: Mutex<Vec<RecordedUpload>>,
	pub cancels: Mutex<Vec<String>>,
	pub fail_uploads: AtomicBool,
}

impl MockJobs {
	pub fn upload_count(&self) -> usize {
		self.uploads.lock().unwrap().len()
	}
}

#[async_trait]
impl JobApi for MockJobs {
	async fn start_translation(&self, request: TranslateRequest) -> Result<String> {
		if self.fail_uploads.load(Ordering::SeqCst) {
			return Err(ClientError::Server {
				status: 500,
				message: "boom".to_string(),
			});
		}
		let mut uploads = self.uploads.lock().unwrap();
		uploads.push(RecordedUpload {
			file_name: request.file_name,
			target_language: request.target_language,
			retain_terms: request.retain_terms,
			api_key: request.api_key.map(|key| key.expose().to_string()),
		});
		Ok(format!("job-{}", uploads.len()))
	}

	async fn cancel_job(&self, job_id: &str) -> Result<()> {
		self.cancels.lock().unwrap().push(job_id.to_string());
		Ok(())
	}
}

/// Connector that keeps the sending half of every subscription it opens.
#[derive(Debug, Default)]
pub struct MockConnector {
	pub senders: Mutex<HashMap<String, mpsc::Sender<StreamItem>>>,
	pub refuse_health: AtomicBool,
	pub health_attempts: AtomicUsize,
}

impl MockConnector {
	pub fn sender(&self, path: &str) -> Option<mpsc::Sender<StreamItem>> {
		self.senders.lock().unwrap().get(path).cloned()
	}
}

#[async_trait]
impl StreamConnector for MockConnector {
	async fn subscribe(&self, path: &str) -> Result<Subscription> {
		if path == "ws/health" {
			self.health_attempts.fetch_add(1, Ordering::SeqCst);
			if self.refuse_health.load(Ordering::SeqCst) {
				return Err(ClientError::WebSocket("connection refused".to_string()));
			}
		}
		let (tx, subscription) = Subscription::channel(16);
		self.senders.lock().unwrap().insert(path.to_string(), tx);
		Ok(subscription)
	}
}

pub struct Harness {
	pub store: Arc<MemoryCredentialStore>,
	pub key_check: Arc<MockKeyCheck>,
	pub jobs: Arc<MockJobs>,
	pub connector: Arc<MockConnector>,
	pub clock: ManualClock,
}

impl Harness {
	pub fn new() -> Self {
		let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap());
		Self {
			store: Arc::new(MemoryCredentialStore::with_clock(Arc::new(clock.clone()))),
			key_check: MockKeyCheck::new(true),
			jobs: Arc::new(MockJobs::default()),
			connector: Arc::new(MockConnector::default()),
			clock,
		}
	}

	pub fn session(&self) -> Session {
		self.session_with_legacy(None)
	}

	pub fn session_with_legacy(&self, legacy_credential_file: Option<PathBuf>) -> Session {
		let store: Arc<dyn CredentialStore> = self.store.clone();
		Session::new(SessionParts {
			store,
			validator: CredentialValidator::new(self.key_check.clone()),
			jobs: self.jobs.clone(),
			connector: self.connector.clone(),
			clock: Arc::new(self.clock.clone()),
			credential_ttl_days: 30,
			legacy_credential_file,
		})
	}

	pub async fn store_key(&self, key: &str) {
		self.store.save(&SecretString::new(key), 30).await.unwrap();
	}
}

pub fn health_frame(ok: bool, present: bool, age: f64) -> StreamItem {
	StreamItem::Message(
		serde_json::json!({
			"type": "health",
			"openai_reachable": ok,
			"api_key_present": present,
			"age_seconds": age,
		})
		.to_string(),
	)
}

pub fn progress_frame(progress: f64, elapsed: f64) -> StreamItem {
	StreamItem::Message(
		serde_json::json!({"type": "progress", "progress": progress, "elapsed_seconds": elapsed})
			.to_string(),
	)
}

pub fn completed_frame(download_url: &str, elapsed: f64) -> StreamItem {
	StreamItem::Message(
		serde_json::json!({
			"type": "completed",
			"progress": 100.0,
			"elapsed_seconds": elapsed,
			"download_url": download_url,
		})
		.to_string(),
	)
}

/// Writes a throwaway document and returns its directory guard and path.
pub fn docx_file() -> (tempfile::TempDir, std::path::PathBuf) {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("report.docx");
	std::fs::write(&path, b"PK\x03\x04fake").unwrap();
	(dir, path)
}
