// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client configuration.
//!
//! Values are resolved from layers, lowest precedence first:
//!
//! 1. built-in defaults
//! 2. TOML file (`$XDG_CONFIG_HOME/docxlate/config.toml`, or an explicit path)
//! 3. `DOCXLATE_*` environment variables
//! 4. command-line overrides
//!
//! ```toml
//! base_url = "https://translate.example.com/"
//! credential_ttl_days = 30
//! request_timeout_secs = 60
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/";
pub const DEFAULT_CREDENTIAL_TTL_DAYS: u32 = 30;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

const ENV_BASE_URL: &str = "DOCXLATE_BASE_URL";
const ENV_CREDENTIAL_FILE: &str = "DOCXLATE_CREDENTIAL_FILE";
const ENV_LEGACY_CREDENTIAL_FILE: &str = "DOCXLATE_LEGACY_CREDENTIAL_FILE";
const ENV_REQUEST_TIMEOUT_SECS: &str = "DOCXLATE_REQUEST_TIMEOUT_SECS";

/// One partial source of configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigLayer {
	pub base_url: Option<String>,
	pub credential_file: Option<PathBuf>,
	pub legacy_credential_file: Option<PathBuf>,
	pub credential_ttl_days: Option<u32>,
	pub request_timeout_secs: Option<u64>,
}

impl ConfigLayer {
	/// Reads a TOML layer. A missing file is an empty layer.
	pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
		let contents = match std::fs::read_to_string(path) {
			Ok(contents) => contents,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				debug!(path = %path.display(), "no config file");
				return Ok(Self::default());
			}
			Err(source) => {
				return Err(ConfigError::Io {
					path: path.to_path_buf(),
					source,
				})
			}
		};

		toml::from_str(&contents).map_err(|source| ConfigError::TomlParse {
			path: path.to_path_buf(),
			source,
		})
	}

	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_vars(std::env::vars())
	}

	/// Builds a layer from `DOCXLATE_*` variables; other keys are ignored.
	pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
	where
		I: IntoIterator<Item = (K, V)>,
		K: AsRef<str>,
		V: Into<String>,
	{
		let mut layer = Self::default();
		for (key, value) in vars {
			let value: String = value.into();
			match key.as_ref() {
				ENV_BASE_URL => layer.base_url = Some(value),
				ENV_CREDENTIAL_FILE => layer.credential_file = Some(PathBuf::from(value)),
				ENV_LEGACY_CREDENTIAL_FILE => {
					layer.legacy_credential_file = Some(PathBuf::from(value))
				}
				ENV_REQUEST_TIMEOUT_SECS => {
					let secs = value
						.trim()
						.parse()
						.map_err(|_| ConfigError::invalid_value(ENV_REQUEST_TIMEOUT_SECS, value.clone()))?;
					layer.request_timeout_secs = Some(secs);
				}
				_ => {}
			}
		}
		Ok(layer)
	}

	/// Overlays `other` on top of `self`; set fields in `other` win.
	pub fn merge(&mut self, other: ConfigLayer) {
		if other.base_url.is_some() {
			self.base_url = other.base_url;
		}
		if other.credential_file.is_some() {
			self.credential_file = other.credential_file;
		}
		if other.legacy_credential_file.is_some() {
			self.legacy_credential_file = other.legacy_credential_file;
		}
		if other.credential_ttl_days.is_some() {
			self.credential_ttl_days = other.credential_ttl_days;
		}
		if other.request_timeout_secs.is_some() {
			self.request_timeout_secs = other.request_timeout_secs;
		}
	}
}

/// Fully resolved client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
	/// Service root; always ends with `/` so endpoint joins stay under it.
	pub base_url: Url,
	pub credential_file: PathBuf,
	/// Pre-scoped plain-text key file migrated on startup.
	pub legacy_credential_file: Option<PathBuf>,
	pub credential_ttl_days: u32,
	pub request_timeout: Duration,
}

impl ClientConfig {
	/// Loads file, environment and CLI layers over the defaults.
	pub fn load(config_file: Option<&Path>, cli: ConfigLayer) -> Result<Self, ConfigError> {
		let mut layer = match config_file {
			Some(path) => ConfigLayer::from_file(path)?,
			None => ConfigLayer::from_file(&default_config_file()?)?,
		};
		layer.merge(ConfigLayer::from_env()?);
		layer.merge(cli);
		Self::resolve(layer)
	}

	/// Fills unset fields from defaults and validates.
	pub fn resolve(layer: ConfigLayer) -> Result<Self, ConfigError> {
		let base_url = parse_base_url(layer.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL))?;

		let credential_file = match layer.credential_file {
			Some(path) => path,
			None => default_credential_file()?,
		};
		let legacy_credential_file = layer
			.legacy_credential_file
			.or_else(default_legacy_credential_file);

		let credential_ttl_days = layer
			.credential_ttl_days
			.unwrap_or(DEFAULT_CREDENTIAL_TTL_DAYS);
		if credential_ttl_days == 0 {
			return Err(ConfigError::invalid_value(
				"credential_ttl_days",
				"must be at least 1",
			));
		}

		let timeout_secs = layer
			.request_timeout_secs
			.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
		if timeout_secs == 0 {
			return Err(ConfigError::invalid_value(
				"request_timeout_secs",
				"must be at least 1",
			));
		}

		Ok(Self {
			base_url,
			credential_file,
			legacy_credential_file,
			credential_ttl_days,
			request_timeout: Duration::from_secs(timeout_secs),
		})
	}

	/// True when the service is reached over TLS.
	pub fn is_secure(&self) -> bool {
		self.base_url.scheme() == "https"
	}
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
	let mut url =
		Url::parse(raw.trim()).map_err(|e| ConfigError::invalid_value("base_url", e.to_string()))?;
	if !matches!(url.scheme(), "http" | "https") {
		return Err(ConfigError::invalid_value(
			"base_url",
			format!("unsupported scheme '{}'", url.scheme()),
		));
	}
	if !url.path().ends_with('/') {
		let path = format!("{}/", url.path());
		url.set_path(&path);
	}
	Ok(url)
}

pub fn default_config_file() -> Result<PathBuf, ConfigError> {
	let dir = dirs::config_dir().ok_or(ConfigError::DirNotFound("config"))?;
	Ok(dir.join("docxlate").join("config.toml"))
}

pub fn default_credential_file() -> Result<PathBuf, ConfigError> {
	let dir = dirs::data_dir().ok_or(ConfigError::DirNotFound("data"))?;
	Ok(dir.join("docxlate").join("credential.json"))
}

fn default_legacy_credential_file() -> Option<PathBuf> {
	dirs::home_dir().map(|home| home.join(".docxlate_api_key"))
}
