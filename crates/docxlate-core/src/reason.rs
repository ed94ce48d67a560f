// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Credential validation reason codes and their user-facing messages.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a credential check came out the way it did.
///
/// Serialized as the lowercase wire string. Reasons the client does not know
/// are kept verbatim in [`ReasonCode::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReasonCode {
	Ok,
	/// No credential supplied.
	Missing,
	/// Rejected by the remote check, or the check answered with garbage.
	Invalid,
	Expired,
	/// Quota used up.
	Exhausted,
	/// Network or transport failure reaching the validator.
	Unreachable,
	Other(String),
}

impl ReasonCode {
	pub fn parse(raw: &str) -> Self {
		match raw.trim().to_ascii_lowercase().as_str() {
			"ok" => ReasonCode::Ok,
			"missing" | "missing_key" => ReasonCode::Missing,
			"invalid" => ReasonCode::Invalid,
			"expired" => ReasonCode::Expired,
			"exhausted" => ReasonCode::Exhausted,
			"unreachable" => ReasonCode::Unreachable,
			_ => ReasonCode::Other(raw.to_string()),
		}
	}

	pub fn as_str(&self) -> &str {
		match self {
			ReasonCode::Ok => "ok",
			ReasonCode::Missing => "missing",
			ReasonCode::Invalid => "invalid",
			ReasonCode::Expired => "expired",
			ReasonCode::Exhausted => "exhausted",
			ReasonCode::Unreachable => "unreachable",
			ReasonCode::Other(raw) => raw,
		}
	}

	/// Fixed message shown to the user for this reason.
	pub fn user_message(&self) -> &'static str {
		match self {
			ReasonCode::Ok => "API key is valid",
			ReasonCode::Missing => "API key is missing",
			ReasonCode::Invalid => "API key is invalid",
			ReasonCode::Expired => "API key has expired",
			ReasonCode::Exhausted => "API key quota is exhausted",
			ReasonCode::Unreachable => "Key validation service is unreachable",
			ReasonCode::Other(_) => "API key could not be verified",
		}
	}
}

impl From<String> for ReasonCode {
	fn from(raw: String) -> Self {
		ReasonCode::parse(&raw)
	}
}

impl From<ReasonCode> for String {
	fn from(reason: ReasonCode) -> Self {
		reason.as_str().to_string()
	}
}

impl fmt::Display for ReasonCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
