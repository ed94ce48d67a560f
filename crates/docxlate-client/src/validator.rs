// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Remote credential check.
//!
//! Never persists anything and never fails: every transport or protocol
//! problem is folded into a [`ValidationOutcome`].

use std::sync::Arc;

use docxlate_core::{ReasonCode, SecretString, ValidationOutcome};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::http::KeyCheckTransport;

#[derive(Debug, Deserialize)]
struct ValidateResponse {
	ok: bool,
	#[serde(default)]
	reason: Option<String>,
}

#[derive(Clone)]
pub struct CredentialValidator {
	transport: Arc<dyn KeyCheckTransport>,
}

impl std::fmt::Debug for CredentialValidator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CredentialValidator").finish_non_exhaustive()
	}
}

impl CredentialValidator {
	pub fn new(transport: Arc<dyn KeyCheckTransport>) -> Self {
		Self { transport }
	}

	pub async fn validate(&self, candidate: &SecretString) -> ValidationOutcome {
		if candidate.is_blank() {
			return ValidationOutcome::missing();
		}

		let body = match self.transport.check_key(&candidate.trimmed()).await {
			Ok(body) => body,
			Err(e) => {
				warn!(error = %e, "Key validation request failed");
				return ValidationOutcome::unreachable();
			}
		};

		let outcome = parse_outcome(&body);
		debug!(ok = outcome.ok, reason = %outcome.reason, "Key validated");
		outcome
	}
}

/// Interprets a `validate_key` body. Anything unparseable is `invalid`.
pub fn parse_outcome(body: &str) -> ValidationOutcome {
	match serde_json::from_str::<ValidateResponse>(body) {
		Ok(response) => {
			let reason = match response.reason.as_deref().map(str::trim) {
				Some(reason) if !reason.is_empty() => ReasonCode::parse(reason),
				_ if response.ok => ReasonCode::Ok,
				_ => ReasonCode::Invalid,
			};
			ValidationOutcome::new(response.ok, reason)
		}
		Err(e) => {
			debug!(error = %e, "Malformed validation response");
			ValidationOutcome::invalid()
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::{ClientError, Result};
	use async_trait::async_trait;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Mutex;

	#[derive(Default)]
	struct CountingTransport {
		calls: AtomicUsize,
		seen: Mutex<Vec<String>>,
		reply: Option<String>,
	}

	#[async_trait]
	impl KeyCheckTransport for CountingTransport {
		async fn check_key(&self, key: &SecretString) -> Result<String> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			self.seen.lock().unwrap().push(key.expose().to_string());
			self.reply.clone().ok_or_else(|| ClientError::Server {
				status: 502,
				message: "bad gateway".to_string(),
			})
		}
	}

	fn validator_with(reply: Option<&str>) -> (CredentialValidator, Arc<CountingTransport>) {
		let transport = Arc::new(CountingTransport {
			reply: reply.map(str::to_string),
			..Default::default()
		});
		(CredentialValidator::new(transport.clone()), transport)
	}

	#[tokio::test]
	async fn blank_candidate_is_missing_without_network() {
		let (validator, transport) = validator_with(Some(r#"{"ok":true}"#));
		for candidate in ["", "   ", "\n\t"] {
			let outcome = validator.validate(&SecretString::new(candidate)).await;
			assert_eq!(outcome, ValidationOutcome::missing());
		}
		assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn transport_failure_is_unreachable() {
		let (validator, transport) = validator_with(None);
		let outcome = validator.validate(&SecretString::new("sk-x")).await;
		assert_eq!(outcome, ValidationOutcome::unreachable());
		assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn sends_trimmed_key() {
		let (validator, transport) = validator_with(Some(r#"{"ok":true,"reason":"ok"}"#));
		validator.validate(&SecretString::new("  sk-x \n")).await;
		assert_eq!(*transport.seen.lock().unwrap(), vec!["sk-x".to_string()]);
	}

	#[tokio::test]
	async fn passes_remote_reason_through() {
		let (validator, _) = validator_with(Some(r#"{"ok":false,"reason":"exhausted"}"#));
		let outcome = validator.validate(&SecretString::new("sk-x")).await;
		assert!(!outcome.ok);
		assert_eq!(outcome.reason, ReasonCode::Exhausted);
	}

	#[test]
	fn malformed_body_is_invalid() {
		assert_eq!(parse_outcome("<html>oops</html>"), ValidationOutcome::invalid());
		assert_eq!(parse_outcome(""), ValidationOutcome::invalid());
		assert_eq!(parse_outcome(r#"{"reason":"ok"}"#), ValidationOutcome::invalid());
	}

	#[test]
	fn absent_reason_follows_ok_flag() {
		assert_eq!(parse_outcome(r#"{"ok":true}"#).reason, ReasonCode::Ok);
		assert_eq!(parse_outcome(r#"{"ok":false}"#).reason, ReasonCode::Invalid);
		assert_eq!(
			parse_outcome(r#"{"ok":false,"reason":"rate_limited"}"#).reason,
			ReasonCode::Other("rate_limited".to_string())
		);
	}
}
