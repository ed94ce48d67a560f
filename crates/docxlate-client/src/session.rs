// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session coordinator.
//!
//! A [`Session`] owns the application state and every component that writes
//! to it. It is driven by a single task ([`Session::run`]) that waits on the
//! command channel, the health stream, the current progress stream, the
//! revalidation deadline and the health reconnect deadline. Readiness is
//! recomputed from the current snapshots on every publish and before every
//! job submission.

use std::path::PathBuf;
use std::sync::Arc;

use docxlate_core::{
	join_retain_terms, reconcile, Clock, CombinedHealth, HealthStreamMessage, JobTracker, JobView,
	ProgressMessage, ReasonCode, SecretString, ServerHealth, SystemClock, TrackerAction, UserHealth,
	ValidationOutcome, STATUS_ERROR_STARTING, STATUS_NOT_WORKING,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::config::ClientConfig;
use crate::credentials::{
	migrate_legacy, CredentialScope, CredentialStore, FileCredentialStore, MigrationOutcome,
};
use crate::error::{ClientError, Result};
use crate::http::{ApiClient, JobApi, TranslateRequest};
use crate::scheduler::{RevalidationScheduler, TickOutcome};
use crate::stream::{ReconnectPolicy, StreamConnector, StreamItem, Subscription, WsConnector};
use crate::validator::CredentialValidator;

const HEALTH_PATH: &str = "ws/health";
const COMMAND_BUFFER: usize = 32;

fn progress_path(job_id: &str) -> String {
	format!("ws/progress/{job_id}")
}

/// Health signals and the current job. Each signal is replaced whole.
#[derive(Debug, Clone, Default)]
pub struct AppState {
	server: ServerHealth,
	user: UserHealth,
	job: Option<JobTracker>,
}

impl AppState {
	pub fn server(&self) -> &ServerHealth {
		&self.server
	}

	pub fn user(&self) -> &UserHealth {
		&self.user
	}

	/// The latest job, terminal or not.
	pub fn job(&self) -> Option<&JobTracker> {
		self.job.as_ref()
	}

	/// The latest job while it can still change.
	pub fn active_job(&self) -> Option<&JobTracker> {
		self.job.as_ref().filter(|job| !job.is_terminal())
	}

	pub fn set_server(&mut self, server: ServerHealth) {
		self.server = server;
	}

	pub fn set_user(&mut self, user: UserHealth) {
		self.user = user;
	}

	pub fn combined(&self, now: DateTime<Utc>) -> CombinedHealth {
		reconcile(&self.server, &self.user, now)
	}

	fn job_mut(&mut self) -> Option<&mut JobTracker> {
		self.job.as_mut()
	}

	fn replace_job(&mut self, job: Option<JobTracker>) {
		self.job = job;
	}
}

/// What the UI layer renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
	pub health: CombinedHealth,
	pub ready: bool,
	pub key_status: String,
	pub user_reason: ReasonCode,
	pub job: Option<JobView>,
	pub status_line: String,
	pub scheduler_running: bool,
	pub health_connected: bool,
}

/// A document to translate.
#[derive(Debug, Clone)]
pub struct JobRequest {
	pub path: PathBuf,
	pub target_language: String,
	/// Free text; terms separated by newlines or commas.
	pub retain_terms: String,
}

/// Everything a [`Session`] needs from the outside world.
pub struct SessionParts {
	pub store: Arc<dyn CredentialStore>,
	pub validator: CredentialValidator,
	pub jobs: Arc<dyn JobApi>,
	pub connector: Arc<dyn StreamConnector>,
	pub clock: Arc<dyn Clock>,
	pub credential_ttl_days: u32,
	pub legacy_credential_file: Option<PathBuf>,
}

pub struct Session {
	store: Arc<dyn CredentialStore>,
	validator: CredentialValidator,
	jobs: Arc<dyn JobApi>,
	connector: Arc<dyn StreamConnector>,
	clock: Arc<dyn Clock>,
	credential_ttl_days: u32,
	legacy_credential_file: Option<PathBuf>,

	state: AppState,
	scheduler: RevalidationScheduler,
	health: Option<Subscription>,
	health_failures: u32,
	health_retry_at: Option<Instant>,
	reconnect: ReconnectPolicy,
	progress: Option<Subscription>,
	status_line: String,
	status_tx: watch::Sender<StatusSnapshot>,
}

impl Session {
	pub fn new(parts: SessionParts) -> Self {
		let SessionParts {
			store,
			validator,
			jobs,
			connector,
			clock,
			credential_ttl_days,
			legacy_credential_file,
		} = parts;

		let state = AppState::default();
		let initial = StatusSnapshot {
			health: state.combined(clock.now()),
			ready: false,
			key_status: state.user().reason.user_message().to_string(),
			user_reason: state.user().reason.clone(),
			job: None,
			status_line: String::new(),
			scheduler_running: false,
			health_connected: false,
		};
		let (status_tx, _) = watch::channel(initial);

		Self {
			store,
			validator,
			jobs,
			connector,
			clock,
			credential_ttl_days,
			legacy_credential_file,
			state,
			scheduler: RevalidationScheduler::new(),
			health: None,
			health_failures: 0,
			health_retry_at: None,
			reconnect: ReconnectPolicy::default(),
			progress: None,
			status_line: String::new(),
			status_tx,
		}
	}

	/// Wires the HTTP, WebSocket and file-backed components for `config`.
	pub fn from_config(config: &ClientConfig) -> Result<Self> {
		let api = ApiClient::new(config)?;
		let store = FileCredentialStore::new(
			&config.credential_file,
			CredentialScope::for_service(&config.base_url),
		);
		Ok(Self::new(SessionParts {
			store: Arc::new(store),
			validator: CredentialValidator::new(Arc::new(api.clone())),
			jobs: Arc::new(api.clone()),
			connector: Arc::new(WsConnector::new(api)),
			clock: Arc::new(SystemClock),
			credential_ttl_days: config.credential_ttl_days,
			legacy_credential_file: config.legacy_credential_file.clone(),
		}))
	}

	pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
		self.reconnect = policy;
		self
	}

	pub fn state(&self) -> &AppState {
		&self.state
	}

	pub fn scheduler_running(&self) -> bool {
		self.scheduler.is_running()
	}

	pub fn has_progress_stream(&self) -> bool {
		self.progress.is_some()
	}

	pub fn has_health_stream(&self) -> bool {
		self.health.is_some()
	}

	pub fn subscribe_status(&self) -> watch::Receiver<StatusSnapshot> {
		self.status_tx.subscribe()
	}

	pub fn snapshot(&self) -> StatusSnapshot {
		let health = self.state.combined(self.clock.now());
		StatusSnapshot {
			health,
			ready: health.is_ready(),
			key_status: self.state.user().reason.user_message().to_string(),
			user_reason: self.state.user().reason.clone(),
			job: self.state.job().map(JobTracker::view),
			status_line: self.status_line.clone(),
			scheduler_running: self.scheduler.is_running(),
			health_connected: self.health.is_some(),
		}
	}

	fn publish(&self) {
		self.status_tx.send_replace(self.snapshot());
	}

	fn sync_job_status(&mut self) {
		if let Some(job) = self.state.job() {
			self.status_line = job.view().status;
		}
	}

	/// Moves a key from the configured legacy file into the store.
	///
	/// Returns `NoLegacy` when no legacy file is configured.
	pub async fn migrate_legacy_credential(&mut self) -> Result<MigrationOutcome> {
		let Some(legacy) = self.legacy_credential_file.clone() else {
			return Ok(MigrationOutcome::NoLegacy);
		};
		Ok(migrate_legacy(self.store.as_ref(), &legacy, self.credential_ttl_days).await?)
	}

	/// Migrates a legacy key, starts revalidation if a key is stored and
	/// connects the health stream.
	pub async fn startup(&mut self) {
		if let Err(e) = self.migrate_legacy_credential().await {
			warn!(error = %e, "Legacy credential migration failed");
		}

		match self.store.exists().await {
			Ok(true) => self.scheduler.start(),
			Ok(false) => debug!("No stored credential"),
			Err(e) => warn!(error = %e, "Could not read stored credential"),
		}

		self.connect_health().await;
		self.publish();
	}

	async fn connect_health(&mut self) {
		match self.connector.subscribe(HEALTH_PATH).await {
			Ok(subscription) => {
				self.health = Some(subscription);
				self.health_retry_at = None;
			}
			Err(e) => {
				warn!(error = %e, "Health stream unavailable");
				self.schedule_health_retry();
			}
		}
	}

	fn schedule_health_retry(&mut self) {
		self.health_failures = self.health_failures.saturating_add(1);
		let delay = self.reconnect.delay_for(self.health_failures);
		debug!(
			delay_ms = delay.as_millis() as u64,
			attempts = self.health_failures,
			"Reconnecting health stream"
		);
		self.health_retry_at = Some(Instant::now() + delay);
	}

	/// Handles one item (or the end) of the health stream.
	pub fn on_health_item(&mut self, item: Option<StreamItem>) {
		match item {
			Some(StreamItem::Message(text)) => match HealthStreamMessage::parse(&text) {
				Ok(HealthStreamMessage::Health(report)) => {
					self.health_failures = 0;
					let server = ServerHealth::from_report(&report, self.clock.now());
					debug!(ok = server.ok, present = server.present, "Server health");
					self.state.set_server(server);
				}
				Err(e) => debug!(error = %e, "Ignoring health frame"),
			},
			Some(StreamItem::Error(e)) => {
				warn!(error = %e, "Health stream failed");
				self.drop_health();
			}
			None => {
				debug!("Health stream ended");
				self.drop_health();
			}
		}
		self.publish();
	}

	fn drop_health(&mut self) {
		if let Some(mut subscription) = self.health.take() {
			subscription.close();
		}
		self.schedule_health_retry();
	}

	/// Stores `value` and validates it immediately, restarting revalidation.
	///
	/// A blank value is reported as missing without saving or validating.
	#[instrument(skip(self, value))]
	pub async fn submit_credential(&mut self, value: SecretString) -> Result<ValidationOutcome> {
		if value.is_blank() {
			self.scheduler.stop();
			self.state.set_user(UserHealth::missing());
			self.publish();
			return Ok(ValidationOutcome::missing());
		}

		self.store.save(&value.trimmed(), self.credential_ttl_days).await?;
		self.scheduler.start();
		let outcome = match self.run_scheduler_tick().await {
			Some(user) => ValidationOutcome::new(user.ok, user.reason),
			None => ValidationOutcome::missing(),
		};
		info!(ok = outcome.ok, reason = %outcome.reason, "Credential submitted");
		Ok(outcome)
	}

	/// The user started editing the key: the stored value is no longer
	/// trusted until it is submitted again.
	pub fn edit_credential(&mut self) {
		self.scheduler.stop();
		self.state.set_user(UserHealth::missing());
		self.publish();
	}

	pub async fn clear_credential(&mut self) -> Result<()> {
		self.scheduler.stop();
		self.state.set_user(UserHealth::missing());
		let result = self.store.delete().await;
		self.publish();
		result?;
		info!("Credential cleared");
		Ok(())
	}

	/// Runs one revalidation tick. Returns the new user signal, or `None` if
	/// the loop stopped because nothing is stored.
	pub async fn run_scheduler_tick(&mut self) -> Option<UserHealth> {
		let outcome = self
			.scheduler
			.tick(self.store.as_ref(), &self.validator, self.clock.as_ref())
			.await;
		let user = match outcome {
			TickOutcome::Stopped => {
				self.state.set_user(UserHealth::missing());
				None
			}
			TickOutcome::Validated { user, .. } => {
				self.state.set_user(user.clone());
				Some(user)
			}
		};
		self.publish();
		user
	}

	/// Uploads a document and subscribes to its progress.
	///
	/// Refused without any network call unless combined health is ready.
	#[instrument(skip(self, request), fields(path = %request.path.display()))]
	pub async fn submit_job(&mut self, request: JobRequest) -> Result<String> {
		let now = self.clock.now();
		if !self.state.combined(now).is_ready() {
			self.status_line = STATUS_NOT_WORKING.to_string();
			self.publish();
			return Err(ClientError::NotReady);
		}

		self.close_progress();
		self.state.replace_job(None);
		self.status_line = "Uploading…".to_string();
		self.publish();

		let result = self.upload(&request, now).await;
		let job_id = match result {
			Ok(job_id) => job_id,
			Err(e) => {
				warn!(error = %e, "Job submission failed");
				self.status_line = STATUS_ERROR_STARTING.to_string();
				self.publish();
				return Err(e);
			}
		};

		info!(job_id = %job_id, "Job started");
		self.state.replace_job(Some(JobTracker::new(job_id.clone())));
		match self.connector.subscribe(&progress_path(&job_id)).await {
			Ok(subscription) => self.progress = Some(subscription),
			Err(e) => {
				warn!(job_id = %job_id, error = %e, "Progress stream unavailable");
				if let Some(job) = self.state.job_mut() {
					job.on_stream_error();
				}
			}
		}
		self.sync_job_status();
		self.publish();
		Ok(job_id)
	}

	async fn upload(&self, request: &JobRequest, now: DateTime<Utc>) -> Result<String> {
		let bytes = tokio::fs::read(&request.path).await?;
		let file_name = request
			.path
			.file_name()
			.map(|name| name.to_string_lossy().into_owned())
			.unwrap_or_else(|| "document.docx".to_string());

		let api_key = if self.state.user().is_fresh(now) {
			self.store.load().await?
		} else {
			None
		};

		self.jobs
			.start_translation(TranslateRequest {
				file_name,
				bytes,
				target_language: request.target_language.clone(),
				retain_terms: join_retain_terms(&request.retain_terms),
				api_key,
			})
			.await
	}

	/// Handles one item (or the end) of the progress stream.
	pub fn on_progress_item(&mut self, item: Option<StreamItem>) {
		match item {
			Some(StreamItem::Message(text)) => match ProgressMessage::parse(&text) {
				Ok(message) => {
					let action = match self.state.job_mut() {
						Some(job) => job.apply(&message),
						None => TrackerAction::Ignored,
					};
					debug!(kind = message.kind(), ?action, "Progress message");
					if action == TrackerAction::Close {
						self.close_progress();
					}
				}
				Err(e) => debug!(error = %e, "Ignoring progress frame"),
			},
			Some(StreamItem::Error(e)) => {
				warn!(error = %e, "Progress stream failed");
				self.on_progress_lost();
			}
			None => {
				debug!("Progress stream ended");
				self.on_progress_lost();
			}
		}
		self.sync_job_status();
		self.publish();
	}

	fn on_progress_lost(&mut self) {
		if let Some(job) = self.state.job_mut() {
			job.on_stream_error();
		}
		self.close_progress();
	}

	fn close_progress(&mut self) {
		if let Some(mut subscription) = self.progress.take() {
			subscription.close();
		}
	}

	/// Cancels the running job. On acceptance the job is marked cancelled
	/// at once and its stream closed.
	pub async fn cancel_job(&mut self) -> Result<()> {
		let job_id = match self.state.active_job() {
			Some(job) => job.job_id().to_string(),
			None => return Err(ClientError::NoActiveJob),
		};

		if let Err(e) = self.jobs.cancel_job(&job_id).await {
			warn!(job_id = %job_id, error = %e, "Cancel request failed");
			return Err(e);
		}

		if let Some(job) = self.state.job_mut() {
			job.force_cancelled();
		}
		self.close_progress();
		info!(job_id = %job_id, "Job cancelled");
		self.sync_job_status();
		self.publish();
		Ok(())
	}

	async fn handle(&mut self, command: SessionCommand) {
		match command {
			SessionCommand::SubmitCredential { value, reply } => {
				let _ = reply.send(self.submit_credential(value).await);
			}
			SessionCommand::EditCredential { reply } => {
				self.edit_credential();
				let _ = reply.send(());
			}
			SessionCommand::ClearCredential { reply } => {
				let _ = reply.send(self.clear_credential().await);
			}
			SessionCommand::SubmitJob { request, reply } => {
				let _ = reply.send(self.submit_job(request).await);
			}
			SessionCommand::CancelJob { reply } => {
				let _ = reply.send(self.cancel_job().await);
			}
			SessionCommand::Shutdown { .. } => {}
		}
	}

	/// Drives the session until shutdown or until every handle is dropped.
	pub async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) {
		self.startup().await;

		loop {
			let revalidate_at = self.scheduler.deadline();
			let reconnect_at = self.health_retry_at;

			tokio::select! {
				command = commands.recv() => match command {
					Some(SessionCommand::Shutdown { reply }) => {
						self.shutdown();
						let _ = reply.send(());
						break;
					}
					Some(command) => self.handle(command).await,
					None => {
						self.shutdown();
						break;
					}
				},
				item = next_item(self.health.as_mut()) => self.on_health_item(item),
				item = next_item(self.progress.as_mut()) => self.on_progress_item(item),
				_ = sleep_until(revalidate_at) => {
					self.run_scheduler_tick().await;
				}
				_ = sleep_until(reconnect_at) => {
					self.health_retry_at = None;
					self.connect_health().await;
					self.publish();
				}
			}
		}
	}

	fn shutdown(&mut self) {
		self.scheduler.stop();
		self.close_progress();
		if let Some(mut subscription) = self.health.take() {
			subscription.close();
		}
		self.health_retry_at = None;
		self.publish();
		info!("Session stopped");
	}

	/// Spawns [`Session::run`] and returns a handle to it.
	pub fn start(self) -> (SessionHandle, JoinHandle<()>) {
		let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
		let status = self.subscribe_status();
		let task = tokio::spawn(self.run(rx));
		(SessionHandle { commands: tx, status }, task)
	}
}

async fn next_item(subscription: Option<&mut Subscription>) -> Option<StreamItem> {
	match subscription {
		Some(subscription) => subscription.next().await,
		None => std::future::pending().await,
	}
}

async fn sleep_until(deadline: Option<Instant>) {
	match deadline {
		Some(deadline) => tokio::time::sleep_until(deadline).await,
		None => std::future::pending().await,
	}
}

#[derive(Debug)]
pub enum SessionCommand {
	SubmitCredential {
		value: SecretString,
		reply: oneshot::Sender<Result<ValidationOutcome>>,
	},
	EditCredential {
		reply: oneshot::Sender<()>,
	},
	ClearCredential {
		reply: oneshot::Sender<Result<()>>,
	},
	SubmitJob {
		request: JobRequest,
		reply: oneshot::Sender<Result<String>>,
	},
	CancelJob {
		reply: oneshot::Sender<Result<()>>,
	},
	Shutdown {
		reply: oneshot::Sender<()>,
	},
}

/// Cloneable front door to a running [`Session`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
	commands: mpsc::Sender<SessionCommand>,
	status: watch::Receiver<StatusSnapshot>,
}

impl SessionHandle {
	async fn request<T>(
		&self,
		make: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
	) -> Result<T> {
		let (tx, rx) = oneshot::channel();
		self.commands
			.send(make(tx))
			.await
			.map_err(|_| ClientError::SessionClosed)?;
		rx.await.map_err(|_| ClientError::SessionClosed)
	}

	pub async fn submit_credential(&self, value: SecretString) -> Result<ValidationOutcome> {
		self.request(|reply| SessionCommand::SubmitCredential { value, reply })
			.await?
	}

	pub async fn edit_credential(&self) -> Result<()> {
		self.request(|reply| SessionCommand::EditCredential { reply }).await
	}

	pub async fn clear_credential(&self) -> Result<()> {
		self.request(|reply| SessionCommand::ClearCredential { reply })
			.await?
	}

	pub async fn submit_job(&self, request: JobRequest) -> Result<String> {
		self.request(|reply| SessionCommand::SubmitJob { request, reply })
			.await?
	}

	pub async fn cancel_job(&self) -> Result<()> {
		self.request(|reply| SessionCommand::CancelJob { reply }).await?
	}

	pub async fn shutdown(&self) -> Result<()> {
		self.request(|reply| SessionCommand::Shutdown { reply }).await
	}

	pub fn status(&self) -> StatusSnapshot {
		self.status.borrow().clone()
	}

	pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
		self.status.clone()
	}

	/// Waits until a published snapshot satisfies `predicate`.
	pub async fn wait_for(
		&self,
		predicate: impl FnMut(&StatusSnapshot) -> bool,
	) -> Result<StatusSnapshot> {
		let mut status = self.status.clone();
		let snapshot = status
			.wait_for(predicate)
			.await
			.map_err(|_| ClientError::SessionClosed)?;
		Ok(snapshot.clone())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use docxlate_core::ManualClock;

	#[test]
	fn app_state_starts_unready() {
		let state = AppState::default();
		let combined = state.combined(Utc::now());
		assert!(!combined.is_ready());
		assert!(state.active_job().is_none());
		assert_eq!(state.user().reason, ReasonCode::Missing);
	}

	#[test]
	fn app_state_active_job_excludes_terminal() {
		let mut state = AppState::default();
		state.replace_job(Some(JobTracker::new("j-1")));
		assert!(state.active_job().is_some());
		if let Some(job) = state.job_mut() {
			job.force_cancelled();
		}
		assert!(state.active_job().is_none());
		assert!(state.job().is_some());
	}

	#[test]
	fn server_signal_ages_with_clock() {
		let clock = ManualClock::new(Utc::now());
		let mut state = AppState::default();
		state.set_server(ServerHealth::new(true, true, 200.0, clock.now()));
		assert!(state.combined(clock.now()).is_ready());
		clock.advance_secs(101.0);
		assert!(!state.combined(clock.now()).is_ready());
	}

	#[test]
	fn progress_path_is_scoped_to_job() {
		assert_eq!(progress_path("abc"), "ws/progress/abc");
	}
}
