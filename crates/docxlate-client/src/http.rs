// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP access to the translation service.

use std::path::Path;

use async_trait::async_trait;
use docxlate_core::SecretString;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, ClientBuilder, Response};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

/// Returns the standard User-Agent string.
///
/// Format: `docxlate/{version}/{os}-{arch}`
pub fn user_agent() -> String {
	format!(
		"docxlate/{}/{}-{}",
		env!("CARGO_PKG_VERSION"),
		std::env::consts::OS,
		std::env::consts::ARCH
	)
}

/// Creates a new HTTP client builder with the standard User-Agent header.
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

/// Everything needed to start one translation job.
#[derive(Debug, Clone)]
pub struct TranslateRequest {
	pub file_name: String,
	pub bytes: Vec<u8>,
	pub target_language: String,
	/// Newline-joined terms to keep untranslated.
	pub retain_terms: Option<String>,
	/// Sent only when the user's own key is currently fresh.
	pub api_key: Option<SecretString>,
}

#[derive(Debug, Clone, Deserialize)]
struct StartJobResponse {
	job_id: String,
}

/// Body of `GET /api/status/{job_id}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobStatusResponse {
	pub job_id: String,
	pub status: String,
	#[serde(default)]
	pub progress: f64,
	#[serde(default)]
	pub avg_quality: Option<f64>,
	#[serde(default)]
	pub elapsed_seconds: f64,
}

/// Remote credential check.
#[async_trait]
pub trait KeyCheckTransport: Send + Sync {
	/// Posts the key and returns the raw response body.
	async fn check_key(&self, key: &SecretString) -> Result<String>;
}

/// Job endpoints used by the session.
#[async_trait]
pub trait JobApi: Send + Sync {
	/// Uploads the document and returns the job id.
	async fn start_translation(&self, request: TranslateRequest) -> Result<String>;

	async fn cancel_job(&self, job_id: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct ApiClient {
	base_url: Url,
	http: Client,
}

impl ApiClient {
	pub fn new(config: &ClientConfig) -> Result<Self> {
		let http = builder().timeout(config.request_timeout).build()?;
		Ok(Self {
			base_url: config.base_url.clone(),
			http,
		})
	}

	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	pub fn endpoint(&self, path: &str) -> Result<Url> {
		Ok(self.base_url.join(path.trim_start_matches('/'))?)
	}

	/// Push-channel URL for `path`, with `http`/`https` switched to `ws`/`wss`.
	pub fn stream_url(&self, path: &str) -> Result<Url> {
		let mut url = self.endpoint(path)?;
		let scheme = match url.scheme() {
			"http" => "ws",
			"https" => "wss",
			other => other,
		}
		.to_string();
		url.set_scheme(&scheme)
			.map_err(|_| ClientError::WebSocket(format!("cannot use scheme {scheme} for {url}")))?;
		Ok(url)
	}

	#[instrument(skip(self, key))]
	pub async fn validate_key(&self, key: &SecretString) -> Result<String> {
		let url = self.endpoint("api/validate_key")?;
		let response = self
			.http
			.post(url)
			.form(&[("api_key", key.expose())])
			.send()
			.await?;
		let response = check_status(response).await?;
		Ok(response.text().await?)
	}

	#[instrument(skip(self, request), fields(file = %request.file_name, lang = %request.target_language))]
	pub async fn start_translation(&self, request: TranslateRequest) -> Result<String> {
		let url = self.endpoint("api/translate")?;
		let with_key = request.api_key.is_some();

		let file = Part::bytes(request.bytes).file_name(request.file_name);
		let mut form = Form::new()
			.part("file", file)
			.text("target_language", request.target_language);
		if let Some(terms) = request.retain_terms {
			form = form.text("retain_terms", terms);
		}
		if let Some(key) = request.api_key {
			form = form.text("api_key", key.expose().to_string());
		}

		let response = self.http.post(url).multipart(form).send().await?;
		let response = check_status(response).await?;
		let body: StartJobResponse = response
			.json()
			.await
			.map_err(|e| ClientError::Parse(e.to_string()))?;
		debug!(job_id = %body.job_id, with_key, "Translation job started");
		Ok(body.job_id)
	}

	#[instrument(skip(self))]
	pub async fn cancel_job(&self, job_id: &str) -> Result<()> {
		let url = self.endpoint(&format!("api/cancel/{job_id}"))?;
		let response = self.http.post(url).send().await?;
		check_status(response).await?;
		Ok(())
	}

	#[instrument(skip(self))]
	pub async fn status(&self, job_id: &str) -> Result<JobStatusResponse> {
		let url = self.endpoint(&format!("api/status/{job_id}"))?;
		let response = self.http.get(url).send().await?;
		let response = check_status(response).await?;
		response
			.json()
			.await
			.map_err(|e| ClientError::Parse(e.to_string()))
	}

	/// Streams a finished document to `dest`. `reference` is either a
	/// service-relative path (as sent in `completed`) or an absolute URL.
	/// Returns the number of bytes written.
	#[instrument(skip(self, dest), fields(dest = %dest.display()))]
	pub async fn download(&self, reference: &str, dest: &Path) -> Result<u64> {
		let url = match Url::parse(reference) {
			Ok(url) => url,
			Err(_) => self.endpoint(reference)?,
		};
		let mut response = check_status(self.http.get(url).send().await?).await?;

		let mut file = tokio::fs::File::create(dest).await?;
		let mut written = 0u64;
		while let Some(chunk) = response.chunk().await? {
			file.write_all(&chunk).await?;
			written += chunk.len() as u64;
		}
		file.flush().await?;
		debug!(bytes = written, "Download finished");
		Ok(written)
	}
}

async fn check_status(response: Response) -> Result<Response> {
	if response.status().is_success() {
		return Ok(response);
	}
	let status = response.status().as_u16();
	let message = response.text().await.unwrap_or_default();
	Err(ClientError::Server { status, message })
}

#[async_trait]
impl KeyCheckTransport for ApiClient {
	async fn check_key(&self, key: &SecretString) -> Result<String> {
		self.validate_key(key).await
	}
}

#[async_trait]
impl JobApi for ApiClient {
	async fn start_translation(&self, request: TranslateRequest) -> Result<String> {
		ApiClient::start_translation(self, request).await
	}

	async fn cancel_job(&self, job_id: &str) -> Result<()> {
		ApiClient::cancel_job(self, job_id).await
	}
}
