// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Redacting wrapper for the user's API key.
//!
//! The key travels through logs, status snapshots and error paths. Wrapping it
//! means `Debug`, `Display` and `tracing` fields always print [`REDACTED`], and
//! the bytes are zeroed when the wrapper is dropped. Reading the value needs an
//! explicit [`SecretString::expose`] call.
//!
//! ```
//! use docxlate_core::SecretString;
//!
//! let key = SecretString::new("sk-live-123");
//! assert_eq!(format!("{key}"), "[REDACTED]");
//! assert_eq!(key.expose(), "sk-live-123");
//! ```

use std::fmt;

use zeroize::Zeroize;

/// Placeholder printed instead of secret material.
pub const REDACTED: &str = "[REDACTED]";

/// An API key or other secret string.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct SecretString {
	inner: String,
}

impl SecretString {
	pub fn new(inner: impl Into<String>) -> Self {
		Self {
			inner: inner.into(),
		}
	}

	/// Explicitly access the secret value.
	pub fn expose(&self) -> &str {
		&self.inner
	}

	/// Returns true when the value is empty or whitespace only.
	pub fn is_blank(&self) -> bool {
		self.inner.trim().is_empty()
	}

	/// Returns a copy with surrounding whitespace removed.
	pub fn trimmed(&self) -> Self {
		Self::new(self.inner.trim())
	}
}

impl Clone for SecretString {
	fn clone(&self) -> Self {
		Self::new(self.inner.clone())
	}
}

impl fmt::Debug for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("SecretString").field(&REDACTED).finish()
	}
}

impl fmt::Display for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl PartialEq for SecretString {
	fn eq(&self, other: &Self) -> bool {
		self.inner == other.inner
	}
}

impl Eq for SecretString {}

impl From<String> for SecretString {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}

impl From<&str> for SecretString {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}
