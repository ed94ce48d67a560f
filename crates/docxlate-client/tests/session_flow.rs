// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! End-to-end session behaviour against in-memory fakes.

mod support;

use std::sync::atomic::Ordering;
use std::time::Duration;

use docxlate_client::{ClientError, CredentialStore, JobRequest, MigrationOutcome, StreamItem};
use docxlate_core::{Clock, JobState, ReasonCode, SecretString, STATUS_ERROR_STARTING, STATUS_NOT_WORKING};

use support::{completed_frame, docx_file, health_frame, progress_frame, Harness};

fn request(path: std::path::PathBuf) -> JobRequest {
	JobRequest {
		path,
		target_language: "German".to_string(),
		retain_terms: "Acme, Widget\nGadget".to_string(),
	}
}

/// **Test: Readiness gate**
///
/// With no fresh health signal, submission is refused and nothing is uploaded.
#[tokio::test]
async fn test_submit_refused_when_not_ready() {
	let harness = Harness::new();
	let mut session = harness.session();
	let (_dir, path) = docx_file();

	let result = session.submit_job(request(path)).await;

	assert!(matches!(result, Err(ClientError::NotReady)));
	assert_eq!(harness.jobs.upload_count(), 0);
	assert_eq!(session.snapshot().status_line, STATUS_NOT_WORKING);
}

/// **Test: Stale server signal**
///
/// A server report older than the freshness window does not open the gate.
#[tokio::test]
async fn test_submit_refused_when_server_signal_stale() {
	let harness = Harness::new();
	let mut session = harness.session();
	session.on_health_item(Some(health_frame(true, true, 250.0)));
	assert!(session.snapshot().ready);

	harness.clock.advance_secs(60.0);
	let (_dir, path) = docx_file();
	assert!(matches!(
		session.submit_job(request(path)).await,
		Err(ClientError::NotReady)
	));
	assert_eq!(harness.jobs.upload_count(), 0);
}

/// **Test: Progress then completion**
///
/// `progress(40)` then `completed("/x")` ends at 100 % with the download
/// visible, the stream closed and cancel disabled.
#[tokio::test]
async fn test_progress_then_completed() {
	let harness = Harness::new();
	let mut session = harness.session();
	session.on_health_item(Some(health_frame(true, true, 0.0)));
	let (_dir, path) = docx_file();

	let job_id = session.submit_job(request(path)).await.unwrap();
	assert_eq!(job_id, "job-1");
	assert!(session.has_progress_stream());
	assert!(harness.connector.sender("ws/progress/job-1").is_some());

	let upload = harness.jobs.uploads.lock().unwrap()[0].clone();
	assert_eq!(upload.file_name, "report.docx");
	assert_eq!(upload.target_language, "German");
	assert_eq!(upload.retain_terms.as_deref(), Some("Acme\nWidget\nGadget"));
	assert_eq!(upload.api_key, None);

	session.on_progress_item(Some(progress_frame(40.0, 3.0)));
	let job = session.snapshot().job.unwrap();
	assert_eq!(job.state, JobState::Processing);
	assert_eq!(job.progress_percent, 40.0);
	assert!(job.cancel_enabled);

	session.on_progress_item(Some(completed_frame("/x", 8.5)));
	let snapshot = session.snapshot();
	let job = snapshot.job.unwrap();
	assert_eq!(job.state, JobState::Completed);
	assert_eq!(job.progress_percent, 100.0);
	assert_eq!(job.elapsed_seconds, 8.5);
	assert_eq!(job.download_url.as_deref(), Some("/x"));
	assert!(!job.cancel_enabled);
	assert!(!session.has_progress_stream());
	assert_eq!(snapshot.status_line, "Completed");
}

/// **Test: Optimistic cancel**
///
/// Cancel marks the job cancelled at once; a late `completed` is ignored.
#[tokio::test]
async fn test_cancel_ignores_late_completion() {
	let harness = Harness::new();
	let mut session = harness.session();
	session.on_health_item(Some(health_frame(true, true, 0.0)));
	let (_dir, path) = docx_file();
	session.submit_job(request(path)).await.unwrap();
	session.on_progress_item(Some(progress_frame(55.0, 4.0)));

	session.cancel_job().await.unwrap();

	assert_eq!(*harness.jobs.cancels.lock().unwrap(), vec!["job-1".to_string()]);
	assert!(!session.has_progress_stream());
	let job = session.snapshot().job.unwrap();
	assert_eq!(job.state, JobState::Cancelled);
	assert_eq!(job.download_url, None);
	assert!(!job.cancel_enabled);

	session.on_progress_item(Some(completed_frame("/x", 9.0)));
	let job = session.snapshot().job.unwrap();
	assert_eq!(job.state, JobState::Cancelled);
	assert_eq!(job.download_url, None);

	assert!(matches!(
		session.cancel_job().await,
		Err(ClientError::NoActiveJob)
	));
	assert_eq!(harness.jobs.cancels.lock().unwrap().len(), 1);
}

/// **Test: Stream failure**
///
/// A transport error shows a connection error without ending the job.
#[tokio::test]
async fn test_stream_error_keeps_job_state() {
	let harness = Harness::new();
	let mut session = harness.session();
	session.on_health_item(Some(health_frame(true, true, 0.0)));
	let (_dir, path) = docx_file();
	session.submit_job(request(path)).await.unwrap();
	session.on_progress_item(Some(progress_frame(20.0, 1.0)));

	session.on_progress_item(Some(StreamItem::Error("reset by peer".to_string())));

	let snapshot = session.snapshot();
	assert_eq!(snapshot.status_line, "Connection error");
	assert_eq!(snapshot.job.unwrap().state, JobState::Processing);
	assert!(!session.has_progress_stream());
}

/// **Test: New submission supersedes the old one**
#[tokio::test]
async fn test_second_submission_replaces_first() {
	let harness = Harness::new();
	let mut session = harness.session();
	session.on_health_item(Some(health_frame(true, true, 0.0)));
	let (_dir, path) = docx_file();
	session.submit_job(request(path.clone())).await.unwrap();
	let first = harness.connector.sender("ws/progress/job-1").unwrap();

	let job_id = session.submit_job(request(path)).await.unwrap();

	assert_eq!(job_id, "job-2");
	assert!(first.is_closed());
	assert_eq!(session.snapshot().job.unwrap().job_id, "job-2");
}

/// **Test: Upload failure**
#[tokio::test]
async fn test_upload_failure_reports_error_starting() {
	let harness = Harness::new();
	harness.jobs.fail_uploads.store(true, Ordering::SeqCst);
	let mut session = harness.session();
	session.on_health_item(Some(health_frame(true, true, 0.0)));
	let (_dir, path) = docx_file();

	assert!(session.submit_job(request(path)).await.is_err());
	let snapshot = session.snapshot();
	assert_eq!(snapshot.status_line, STATUS_ERROR_STARTING);
	assert!(snapshot.job.is_none());
	assert!(!session.has_progress_stream());
}

/// **Test: Fresh user key is attached**
///
/// A validated key opens the gate on its own and rides along with the upload.
#[tokio::test]
async fn test_fresh_user_key_is_sent_with_upload() {
	let harness = Harness::new();
	let mut session = harness.session();

	let outcome = session
		.submit_credential(SecretString::new("  sk-user  "))
		.await
		.unwrap();
	assert!(outcome.ok);
	assert_eq!(harness.key_check.calls(), 1);
	assert!(session.scheduler_running());
	assert!(session.snapshot().ready);

	let (_dir, path) = docx_file();
	session.submit_job(request(path)).await.unwrap();
	let upload = harness.jobs.uploads.lock().unwrap()[0].clone();
	assert_eq!(upload.api_key.as_deref(), Some("sk-user"));
}

/// **Test: Invalid key**
#[tokio::test]
async fn test_invalid_key_keeps_gate_closed() {
	let harness = Harness::new();
	harness.key_check.ok.store(false, Ordering::SeqCst);
	let mut session = harness.session();

	let outcome = session.submit_credential(SecretString::new("sk-bad")).await.unwrap();

	assert!(!outcome.ok);
	assert_eq!(outcome.reason, ReasonCode::Invalid);
	let snapshot = session.snapshot();
	assert!(!snapshot.ready);
	assert!(snapshot.health.present);
	assert_eq!(snapshot.key_status, "API key is invalid");
}

/// **Test: Blank key**
#[tokio::test]
async fn test_blank_key_is_missing_without_network() {
	let harness = Harness::new();
	let mut session = harness.session();

	let outcome = session.submit_credential(SecretString::new("   ")).await.unwrap();

	assert_eq!(outcome.reason, ReasonCode::Missing);
	assert_eq!(harness.key_check.calls(), 0);
	assert!(!harness.store.exists().await.unwrap());
	assert!(!session.scheduler_running());
}

/// **Test: Clearing stops revalidation**
#[tokio::test]
async fn test_clear_stops_scheduler_and_resets_user_signal() {
	let harness = Harness::new();
	let mut session = harness.session();
	session.submit_credential(SecretString::new("sk-user")).await.unwrap();

	session.clear_credential().await.unwrap();

	assert!(!session.scheduler_running());
	assert!(!harness.store.exists().await.unwrap());
	let snapshot = session.snapshot();
	assert_eq!(snapshot.user_reason, ReasonCode::Missing);
	assert!(!snapshot.ready);
	assert_eq!(session.state().user().age_at(harness.clock.now()), f64::INFINITY);
}

/// **Test: Editing distrusts the stored key**
#[tokio::test]
async fn test_edit_stops_scheduler_but_keeps_store() {
	let harness = Harness::new();
	let mut session = harness.session();
	session.submit_credential(SecretString::new("sk-user")).await.unwrap();

	session.edit_credential();

	assert!(!session.scheduler_running());
	assert!(harness.store.exists().await.unwrap());
	assert!(!session.snapshot().ready);
}

/// **Test: Startup**
///
/// A stored key starts revalidation and the health stream is subscribed.
#[tokio::test]
async fn test_startup_with_stored_key() {
	let harness = Harness::new();
	harness.store_key("sk-user").await;
	let mut session = harness.session();

	session.startup().await;

	assert!(session.scheduler_running());
	assert!(session.has_health_stream());
	assert!(harness.connector.sender("ws/health").is_some());
}

/// **Test: Startup moves a legacy key into the store**
///
/// The plain-text file is erased and revalidation starts for the moved key.
#[tokio::test]
async fn test_startup_migrates_legacy_key() {
	let harness = Harness::new();
	let dir = tempfile::tempdir().unwrap();
	let legacy = dir.path().join(".docxlate_api_key");
	std::fs::write(&legacy, "sk-legacy\n").unwrap();
	let mut session = harness.session_with_legacy(Some(legacy.clone()));

	session.startup().await;

	assert_eq!(harness.store.load().await.unwrap().unwrap().expose(), "sk-legacy");
	assert!(!legacy.exists());
	assert!(session.scheduler_running());
}

/// **Test: Clearing after migration leaves no key anywhere**
#[tokio::test]
async fn test_clear_after_legacy_migration_removes_key() {
	let harness = Harness::new();
	let dir = tempfile::tempdir().unwrap();
	let legacy = dir.path().join(".docxlate_api_key");
	std::fs::write(&legacy, "sk-legacy").unwrap();
	let mut session = harness.session_with_legacy(Some(legacy.clone()));

	let outcome = session.migrate_legacy_credential().await.unwrap();
	assert_eq!(outcome, MigrationOutcome::Migrated);
	session.clear_credential().await.unwrap();

	assert!(harness.store.load().await.unwrap().is_none());
	assert!(!legacy.exists());
	assert_eq!(
		session.migrate_legacy_credential().await.unwrap(),
		MigrationOutcome::NoLegacy
	);
}

/// **Test: Health frames that do not parse are dropped**
#[tokio::test]
async fn test_malformed_health_frame_is_ignored() {
	let harness = Harness::new();
	let mut session = harness.session();
	session.on_health_item(Some(health_frame(true, true, 0.0)));

	session.on_health_item(Some(StreamItem::Message("{\"type\":\"nope\"}".to_string())));

	assert!(session.snapshot().ready);
}

/// **Test: Revalidation runs on its own timer**
///
/// The first tick is immediate, the second follows 60 s after a success, and
/// clearing the key stops further checks.
#[tokio::test(start_paused = true)]
async fn test_run_loop_revalidates_with_backoff() {
	let harness = Harness::new();
	harness.store_key("sk-user").await;
	let (handle, task) = harness.session().start();

	tokio::time::sleep(Duration::from_secs(1)).await;
	assert_eq!(harness.key_check.calls(), 1);

	tokio::time::sleep(Duration::from_secs(60)).await;
	assert_eq!(harness.key_check.calls(), 2);

	handle.clear_credential().await.unwrap();
	tokio::time::sleep(Duration::from_secs(3600)).await;
	assert_eq!(harness.key_check.calls(), 2);
	assert!(!handle.status().scheduler_running);

	handle.shutdown().await.unwrap();
	task.await.unwrap();
}

/// **Test: Health stream reconnects with backoff**
#[tokio::test(start_paused = true)]
async fn test_run_loop_reconnects_health_stream() {
	let harness = Harness::new();
	harness.connector.refuse_health.store(true, Ordering::SeqCst);
	let (handle, task) = harness.session().start();

	// attempts at 0, +1, +2, +4 seconds
	tokio::time::sleep(Duration::from_millis(7500)).await;
	assert_eq!(harness.connector.health_attempts.load(Ordering::SeqCst), 4);

	harness.connector.refuse_health.store(false, Ordering::SeqCst);
	tokio::time::sleep(Duration::from_secs(9)).await;
	assert!(handle.status().health_connected);

	let sender = harness.connector.sender("ws/health").unwrap();
	sender.send(health_frame(true, true, 0.0)).await.unwrap();
	let snapshot = handle.wait_for(|status| status.ready).await.unwrap();
	assert!(snapshot.health.ok);

	handle.shutdown().await.unwrap();
	task.await.unwrap();
}
