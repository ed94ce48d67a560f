// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Push-channel subscriptions.
//!
//! A [`Subscription`] is a cancellable handle that yields text frames and
//! transport errors in arrival order. Parsing the frames is left to the
//! consumer so the job tracker and health reconciler stay transport-agnostic.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::http::ApiClient;

const SUBSCRIPTION_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem {
	/// One text frame.
	Message(String),
	/// Transport failure. The subscription ends after this.
	Error(String),
}

/// Handle to one live push channel.
///
/// `next` returns `None` once the channel has ended or been closed.
#[derive(Debug)]
pub struct Subscription {
	rx: Option<mpsc::Receiver<StreamItem>>,
	task: Option<JoinHandle<()>>,
}

impl Subscription {
	/// Creates a subscription fed by the returned sender.
	pub fn channel(buffer: usize) -> (mpsc::Sender<StreamItem>, Self) {
		let (tx, rx) = mpsc::channel(buffer);
		(
			tx,
			Self {
				rx: Some(rx),
				task: None,
			},
		)
	}

	fn with_task(rx: mpsc::Receiver<StreamItem>, task: JoinHandle<()>) -> Self {
		Self {
			rx: Some(rx),
			task: Some(task),
		}
	}

	pub async fn next(&mut self) -> Option<StreamItem> {
		match self.rx.as_mut() {
			Some(rx) => rx.recv().await,
			None => None,
		}
	}

	/// Stops delivery. Safe to call any number of times.
	pub fn close(&mut self) {
		if let Some(mut rx) = self.rx.take() {
			rx.close();
		}
		if let Some(task) = self.task.take() {
			task.abort();
		}
	}

	pub fn is_closed(&self) -> bool {
		self.rx.is_none()
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		self.close();
	}
}

/// Opens push channels by service-relative path.
#[async_trait]
pub trait StreamConnector: Send + Sync {
	async fn subscribe(&self, path: &str) -> Result<Subscription>;
}

/// WebSocket connector rooted at the service base URL.
#[derive(Debug, Clone)]
pub struct WsConnector {
	api: ApiClient,
}

impl WsConnector {
	pub fn new(api: ApiClient) -> Self {
		Self { api }
	}
}

#[async_trait]
impl StreamConnector for WsConnector {
	async fn subscribe(&self, path: &str) -> Result<Subscription> {
		let url = self.api.stream_url(path)?;
		let (ws_stream, _) = connect_async(url.as_str()).await?;
		info!(url = %url, "Push channel connected");

		let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
		let (_write, mut read) = ws_stream.split();

		let task = tokio::spawn(async move {
			while let Some(frame) = read.next().await {
				let item = match frame {
					Ok(Message::Text(text)) => StreamItem::Message(text),
					Ok(Message::Binary(data)) => match String::from_utf8(data) {
						Ok(text) => StreamItem::Message(text),
						Err(_) => {
							debug!("Ignoring non-UTF-8 binary frame");
							continue;
						}
					},
					Ok(Message::Close(frame)) => {
						debug!(?frame, "Push channel closed by server");
						break;
					}
					Ok(_) => continue,
					Err(e) => {
						warn!(error = %e, "Push channel error");
						let _ = tx.send(StreamItem::Error(e.to_string())).await;
						break;
					}
				};
				if tx.send(item).await.is_err() {
					break;
				}
			}
		});

		Ok(Subscription::with_task(rx, task))
	}
}

/// Capped exponential delay between reconnect attempts.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
	pub base_delay: Duration,
	pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
	fn default() -> Self {
		Self {
			base_delay: Duration::from_secs(1),
			max_delay: Duration::from_secs(30),
		}
	}
}

impl ReconnectPolicy {
	/// Delay before the next attempt after `consecutive_failures` failures (at least 1).
	pub fn delay_for(&self, consecutive_failures: u32) -> Duration {
		let exponent = consecutive_failures.saturating_sub(1).min(10);
		let factor = 2u64.saturating_pow(exponent);
		let delay_ms = (self.base_delay.as_millis() as u64).saturating_mul(factor);
		Duration::from_millis(delay_ms.min(self.max_delay.as_millis() as u64))
	}
}
