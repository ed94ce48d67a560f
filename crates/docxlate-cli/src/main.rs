// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use docxlate_client::{
	ApiClient, ClientConfig, ClientError, ConfigLayer, JobRequest, Session, SessionHandle,
	StatusSnapshot,
};
use docxlate_core::{JobState, SecretString};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// docxlate - translate Word documents through a docxlate server
#[derive(Parser, Debug)]
#[command(name = "docxlate", version, about, long_about = None)]
struct Args {
	/// Path to custom configuration file
	#[arg(short, long)]
	config: Option<PathBuf>,

	/// Translation service URL (overrides config and DOCXLATE_BASE_URL)
	#[arg(long)]
	base_url: Option<String>,

	/// Where the API key is stored (overrides config)
	#[arg(long)]
	credential_file: Option<PathBuf>,

	/// Output logs as JSON
	#[arg(long)]
	json_logs: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Manage the stored API key
	Key {
		#[command(subcommand)]
		command: KeyCommand,
	},
	/// Show combined service health
	Health {
		/// Seconds to wait for a health report
		#[arg(long, default_value = "5")]
		wait: u64,
	},
	/// Translate a .docx document
	Translate {
		/// Document to translate
		file: PathBuf,

		/// Target language
		#[arg(short, long, default_value = "English")]
		lang: String,

		/// Terms to keep untranslated, separated by commas or newlines
		#[arg(short, long, default_value = "")]
		retain_terms: String,

		/// Where to write the translated document
		#[arg(short, long)]
		output: Option<PathBuf>,

		/// Seconds to wait for the service to become ready
		#[arg(long, default_value = "10")]
		wait_ready: u64,
	},
	/// Cancel a running job
	Cancel { job_id: String },
	/// Show the server-side status of a job
	Status { job_id: String },
}

#[derive(Subcommand, Debug)]
enum KeyCommand {
	/// Validate and store an API key (read from stdin when not given)
	Set {
		#[arg(long, env = "DOCXLATE_API_KEY", hide_env_values = true)]
		value: Option<String>,
	},
	/// Remove the stored API key
	Clear,
	/// Re-validate the stored API key
	Check,
}

fn init_tracing(json: bool) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	if json {
		tracing_subscriber::registry()
			.with(filter)
			.with(fmt::layer().json().with_writer(std::io::stderr))
			.init();
	} else {
		tracing_subscriber::registry()
			.with(filter)
			.with(fmt::layer().compact().with_writer(std::io::stderr))
			.init();
	}
}

fn main() -> Result<()> {
	let args = Args::parse();
	init_tracing(args.json_logs);

	let runtime = tokio::runtime::Builder::new_current_thread()
		.enable_all()
		.build()
		.context("failed to start async runtime")?;
	runtime.block_on(run(args))
}

async fn run(args: Args) -> Result<()> {
	let overrides = ConfigLayer {
		base_url: args.base_url.clone(),
		credential_file: args.credential_file.clone(),
		..Default::default()
	};
	let config =
		ClientConfig::load(args.config.as_deref(), overrides).context("failed to load configuration")?;
	info!(base_url = %config.base_url, "docxlate");

	match args.command {
		Command::Key { command } => run_key(&config, command).await,
		Command::Health { wait } => run_health(&config, Duration::from_secs(wait)).await,
		Command::Translate {
			file,
			lang,
			retain_terms,
			output,
			wait_ready,
		} => {
			let output = output.unwrap_or_else(|| default_output(&file, &lang));
			let request = JobRequest {
				path: file,
				target_language: lang,
				retain_terms,
			};
			run_translate(&config, request, &output, Duration::from_secs(wait_ready)).await
		}
		Command::Cancel { job_id } => {
			let api = ApiClient::new(&config)?;
			api.cancel_job(&job_id).await.context("cancel request failed")?;
			println!("Cancelled {job_id}");
			Ok(())
		}
		Command::Status { job_id } => {
			let api = ApiClient::new(&config)?;
			let status = api.status(&job_id).await.context("status request failed")?;
			println!(
				"{}: {} {:.0}% ({:.1}s)",
				status.job_id, status.status, status.progress, status.elapsed_seconds
			);
			if let Some(quality) = status.avg_quality {
				println!("average quality: {quality:.2}");
			}
			Ok(())
		}
	}
}

async fn run_key(config: &ClientConfig, command: KeyCommand) -> Result<()> {
	let mut session = Session::from_config(config)?;
	session
		.migrate_legacy_credential()
		.await
		.context("failed to migrate legacy API key")?;
	match command {
		KeyCommand::Set { value } => {
			let value = match value {
				Some(value) => value,
				None => read_key_from_stdin()?,
			};
			let outcome = session.submit_credential(SecretString::new(value)).await?;
			println!("{}", outcome.reason.user_message());
			if !outcome.ok {
				bail!("API key was not accepted");
			}
		}
		KeyCommand::Clear => {
			session.clear_credential().await?;
			println!("API key removed");
		}
		KeyCommand::Check => match session.run_scheduler_tick().await {
			Some(user) => println!("{}", user.reason.user_message()),
			None => println!("No API key stored"),
		},
	}
	Ok(())
}

fn read_key_from_stdin() -> Result<String> {
	let mut line = String::new();
	std::io::stdin()
		.lock()
		.read_line(&mut line)
		.context("failed to read API key from stdin")?;
	Ok(line)
}

async fn run_health(config: &ClientConfig, wait: Duration) -> Result<()> {
	let (handle, task) = Session::from_config(config)?.start();
	let snapshot = match tokio::time::timeout(wait, handle.wait_for(|status| status.ready)).await {
		Ok(snapshot) => snapshot?,
		Err(_) => handle.status(),
	};
	println!("{}", serde_json::to_string_pretty(&snapshot)?);
	handle.shutdown().await?;
	task.await?;
	Ok(())
}

async fn run_translate(
	config: &ClientConfig,
	request: JobRequest,
	output: &Path,
	wait_ready: Duration,
) -> Result<()> {
	let (handle, task) = Session::from_config(config)?.start();
	let result = translate(config, &handle, request, output, wait_ready).await;
	handle.shutdown().await?;
	task.await?;
	result
}

async fn translate(
	config: &ClientConfig,
	handle: &SessionHandle,
	request: JobRequest,
	output: &Path,
	wait_ready: Duration,
) -> Result<()> {
	if tokio::time::timeout(wait_ready, handle.wait_for(|status| status.ready))
		.await
		.is_err()
	{
		warn!("Service did not report ready in time");
	}

	let job_id = match handle.submit_job(request).await {
		Ok(job_id) => job_id,
		Err(ClientError::NotReady) => bail!("{}", handle.status().status_line),
		Err(e) => return Err(e).context("failed to start translation"),
	};
	println!("Started job {job_id}");

	let mut updates = handle.subscribe();
	let mut last_line = String::new();
	let finished = loop {
		let snapshot = updates.borrow_and_update().clone();
		if snapshot.status_line != last_line {
			eprintln!("{}", snapshot.status_line);
			last_line = snapshot.status_line.clone();
		}
		if is_finished(&snapshot) {
			break snapshot;
		}

		tokio::select! {
			changed = updates.changed() => changed.context("session stopped")?,
			_ = tokio::signal::ctrl_c() => {
				info!(job_id = %job_id, "Interrupted; cancelling job");
				ignore_finished_job(handle.cancel_job().await).context("cancel request failed")?;
			}
		}
	};

	let Some(job) = finished.job else {
		bail!("job disappeared");
	};
	match job.state {
		JobState::Completed => {
			let reference = job
				.download_url
				.unwrap_or_else(|| format!("api/download/{job_id}"));
			let api = ApiClient::new(config)?;
			let bytes = api
				.download(&reference, output)
				.await
				.context("download failed")?;
			if let Some(quality) = job.avg_quality {
				println!("Average quality: {quality:.2}");
			}
			println!(
				"Saved {} ({bytes} bytes, {:.1}s)",
				output.display(),
				job.elapsed_seconds
			);
			Ok(())
		}
		JobState::Cancelled => bail!("job {job_id} was cancelled"),
		_ => bail!("{}", job.status),
	}
}

/// A job that finished before the cancel arrived is not an error.
fn ignore_finished_job(result: docxlate_client::Result<()>) -> docxlate_client::Result<()> {
	match result {
		Err(ClientError::NoActiveJob) => {
			info!("Job already finished; nothing to cancel");
			Ok(())
		}
		other => other,
	}
}

fn is_finished(snapshot: &StatusSnapshot) -> bool {
	snapshot
		.job
		.as_ref()
		.map(|job| job.state.is_terminal())
		.unwrap_or(false)
}

fn default_output(input: &Path, lang: &str) -> PathBuf {
	let stem = input
		.file_stem()
		.map(|stem| stem.to_string_lossy().into_owned())
		.unwrap_or_else(|| "document".to_string());
	let suffix: String = lang
		.chars()
		.filter(|c| c.is_alphanumeric())
		.collect::<String>()
		.to_lowercase();
	input.with_file_name(format!("{stem}.{suffix}.docx"))
}
