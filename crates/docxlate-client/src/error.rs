// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the client SDK.

use std::path::PathBuf;

/// Errors from talking to the service or driving a session.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
	#[error("HTTP request failed: {0}")]
	Http(#[from] reqwest::Error),

	#[error("server returned {status}: {message}")]
	Server { status: u16, message: String },

	#[error("WebSocket error: {0}")]
	WebSocket(String),

	#[error("invalid URL: {0}")]
	Url(#[from] url::ParseError),

	#[error("failed to parse response: {0}")]
	Parse(String),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Credential(#[from] CredentialError),

	#[error(transparent)]
	Config(#[from] ConfigError),

	/// The readiness gate refused a submission.
	#[error("service is not ready to accept jobs")]
	NotReady,

	#[error("no job is running")]
	NoActiveJob,

	#[error("session has shut down")]
	SessionClosed,
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
	fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
		ClientError::WebSocket(err.to_string())
	}
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors from the credential slot.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
	#[error("IO error: {0}")]
	Io(String),

	#[error("Serialization error: {0}")]
	Serde(String),

	#[error("Invalid credential format: {0}")]
	InvalidFormat(String),
}

impl From<std::io::Error> for CredentialError {
	fn from(err: std::io::Error) -> Self {
		CredentialError::Io(err.to_string())
	}
}

impl From<serde_json::Error> for CredentialError {
	fn from(err: serde_json::Error) -> Self {
		CredentialError::Serde(err.to_string())
	}
}

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("I/O error reading {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("TOML parse error in {path}: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("Invalid value for {field}: {message}")]
	InvalidValue { field: String, message: String },

	#[error("Could not determine {0} directory")]
	DirNotFound(&'static str),
}

impl ConfigError {
	pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
		Self::InvalidValue {
			field: field.into(),
			message: message.into(),
		}
	}
}
