// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Storage for the user's API key.
//!
//! There is exactly one slot. A saved key carries an absolute expiry and the
//! scope it may be sent to: the service's URL path, same-site only, and
//! TLS-only when the service itself is `https`. Expired keys read as absent.

use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use docxlate_core::{Clock, SecretString, SystemClock};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::CredentialError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
	Strict,
}

/// Where a stored key may be sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialScope {
	pub path: String,
	pub same_site: SameSite,
	pub secure: bool,
}

impl CredentialScope {
	pub fn for_service(base_url: &Url) -> Self {
		Self {
			path: base_url.path().to_string(),
			same_site: SameSite::Strict,
			secure: base_url.scheme() == "https",
		}
	}

	/// Whether a key saved under `self` may be sent to a service with scope
	/// `target`. Secure keys never go over plain transport, and the target
	/// path must sit under the saved path.
	pub fn permits(&self, target: &CredentialScope) -> bool {
		if self.secure && !target.secure {
			return false;
		}
		target.path.starts_with(&self.path)
	}
}

impl Default for CredentialScope {
	fn default() -> Self {
		Self {
			path: "/".to_string(),
			same_site: SameSite::Strict,
			secure: false,
		}
	}
}

/// On-disk record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedCredential {
	pub value: String,
	pub expires_at: DateTime<Utc>,
	pub scope: CredentialScope,
}

/// The single credential slot.
#[async_trait]
pub trait CredentialStore: Send + Sync + Debug {
	/// Returns the stored key, or `None` if absent, blank or expired.
	async fn load(&self) -> Result<Option<SecretString>, CredentialError>;

	/// Stores `value` with an expiry `ttl_days` from now, replacing any previous key.
	async fn save(&self, value: &SecretString, ttl_days: u32) -> Result<(), CredentialError>;

	/// Removes the key. Removing an absent key is not an error.
	async fn delete(&self) -> Result<(), CredentialError>;

	async fn exists(&self) -> Result<bool, CredentialError> {
		Ok(self.load().await?.is_some())
	}
}

fn expiry_from(now: DateTime<Utc>, ttl_days: u32) -> DateTime<Utc> {
	now + Duration::days(i64::from(ttl_days))
}

fn reject_blank(value: &SecretString) -> Result<(), CredentialError> {
	if value.is_blank() {
		return Err(CredentialError::InvalidFormat(
			"credential must not be blank".to_string(),
		));
	}
	Ok(())
}

/// JSON file store with 0600 permissions on Unix.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
	path: PathBuf,
	scope: CredentialScope,
	clock: Arc<dyn Clock>,
}

impl FileCredentialStore {
	pub fn new(path: impl Into<PathBuf>, scope: CredentialScope) -> Self {
		Self::with_clock(path, scope, Arc::new(SystemClock))
	}

	pub fn with_clock(path: impl Into<PathBuf>, scope: CredentialScope, clock: Arc<dyn Clock>) -> Self {
		Self {
			path: path.into(),
			scope,
			clock,
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub async fn read_record(&self) -> Result<Option<PersistedCredential>, CredentialError> {
		match fs::read_to_string(&self.path).await {
			Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(e.into()),
		}
	}

	async fn write_record(&self, record: &PersistedCredential) -> Result<(), CredentialError> {
		if let Some(parent) = self.path.parent() {
			fs::create_dir_all(parent).await?;
		}

		let contents = serde_json::to_string_pretty(record)?;

		let temp_path = self.path.with_extension("tmp");
		let mut options = fs::OpenOptions::new();
		options.write(true).create(true).truncate(true);
		#[cfg(unix)]
		options.mode(0o600);
		let mut file = options.open(&temp_path).await?;

		// A leftover temp file keeps its old mode; tighten it before writing.
		#[cfg(unix)]
		{
			use std::os::unix::fs::PermissionsExt;
			let perms = std::fs::Permissions::from_mode(0o600);
			if let Err(e) = file.set_permissions(perms).await {
				warn!(path = ?temp_path, error = %e, "Failed to set file permissions to 0600");
			}
		}

		file.write_all(contents.as_bytes()).await?;
		file.sync_all().await?;
		drop(file);

		fs::rename(&temp_path, &self.path).await?;
		debug!(path = ?self.path, "Credential written");
		Ok(())
	}
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
	async fn load(&self) -> Result<Option<SecretString>, CredentialError> {
		let Some(record) = self.read_record().await? else {
			return Ok(None);
		};

		if record.expires_at <= self.clock.now() {
			info!(expired_at = %record.expires_at, "Stored credential expired");
			self.delete().await?;
			return Ok(None);
		}

		if !record.scope.permits(&self.scope) {
			debug!(
				stored_path = %record.scope.path,
				stored_secure = record.scope.secure,
				"Stored credential is out of scope for this service"
			);
			return Ok(None);
		}

		let value = SecretString::new(record.value);
		if value.is_blank() {
			return Ok(None);
		}
		Ok(Some(value))
	}

	async fn save(&self, value: &SecretString, ttl_days: u32) -> Result<(), CredentialError> {
		reject_blank(value)?;
		let record = PersistedCredential {
			value: value.expose().trim().to_string(),
			expires_at: expiry_from(self.clock.now(), ttl_days),
			scope: self.scope.clone(),
		};
		self.write_record(&record).await
	}

	async fn delete(&self) -> Result<(), CredentialError> {
		match fs::remove_file(&self.path).await {
			Ok(()) => {
				debug!(path = ?self.path, "Credential removed");
				Ok(())
			}
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(e.into()),
		}
	}
}

/// In-memory store for tests.
#[derive(Debug)]
pub struct MemoryCredentialStore {
	slot: tokio::sync::RwLock<Option<(SecretString, DateTime<Utc>)>>,
	clock: Arc<dyn Clock>,
}

impl MemoryCredentialStore {
	pub fn new() -> Self {
		Self::with_clock(Arc::new(SystemClock))
	}

	pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
		Self {
			slot: tokio::sync::RwLock::new(None),
			clock,
		}
	}
}

impl Default for MemoryCredentialStore {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
	async fn load(&self) -> Result<Option<SecretString>, CredentialError> {
		let mut slot = self.slot.write().await;
		if let Some((_, expires_at)) = slot.as_ref() {
			if *expires_at <= self.clock.now() {
				*slot = None;
			}
		}
		Ok(slot.as_ref().map(|(value, _)| value.clone()))
	}

	async fn save(&self, value: &SecretString, ttl_days: u32) -> Result<(), CredentialError> {
		reject_blank(value)?;
		let mut slot = self.slot.write().await;
		*slot = Some((value.trimmed(), expiry_from(self.clock.now(), ttl_days)));
		Ok(())
	}

	async fn delete(&self) -> Result<(), CredentialError> {
		*self.slot.write().await = None;
		Ok(())
	}
}

/// What [`migrate_legacy`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
	NoLegacy,
	/// Legacy key moved into the store.
	Migrated,
	/// Store already had a key; legacy copy erased.
	Discarded,
}

/// Moves a key from the old unscoped plain-text file into `store`.
///
/// The legacy file is always erased when present. An existing key in `store`
/// is never overwritten.
pub async fn migrate_legacy(
	store: &dyn CredentialStore,
	legacy_path: &Path,
	ttl_days: u32,
) -> Result<MigrationOutcome, CredentialError> {
	let raw = match fs::read_to_string(legacy_path).await {
		Ok(raw) => raw,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(MigrationOutcome::NoLegacy),
		Err(e) => return Err(e.into()),
	};
	let legacy = SecretString::new(raw);

	let outcome = if store.exists().await? || legacy.is_blank() {
		MigrationOutcome::Discarded
	} else {
		store.save(&legacy, ttl_days).await?;
		MigrationOutcome::Migrated
	};

	fs::remove_file(legacy_path).await?;
	info!(path = %legacy_path.display(), outcome = ?outcome, "Legacy credential handled");
	Ok(outcome)
}
