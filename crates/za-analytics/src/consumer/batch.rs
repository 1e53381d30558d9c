// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Buffered delivery for the analytics SDK.
//!
//! Records are appended to an in-memory buffer and sent as JSON arrays. A
//! flush happens inline when the buffer reaches `max_batch_size`, or when the
//! caller asks for one. Failed deliveries keep their records buffered; the
//! consumer never retries on its own, so calling [`Consumer::flush`] again is
//! the retry.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use za_analytics_core::Payload;

use super::{Consumer, Lifecycle};
use crate::config::{
	validate_batch_size, validate_buffer_size, validate_timeout_ms, ConsumerConfig,
	DEFAULT_BATCH_SIZE, DEFAULT_MAX_BUFFER_SIZE, DEFAULT_TIMEOUT_MS,
};
use crate::error::{AnalyticsError, Result};
use crate::transport::{HttpTransport, Transport};

/// Configuration for the batch buffer.
#[derive(Debug, Clone)]
pub struct BatchConfig {
	/// Number of buffered records that triggers a flush.
	pub max_batch_size: usize,
	/// Maximum number of records held while deliveries keep failing.
	pub max_buffer_size: usize,
	/// Deadline for each transport call.
	pub timeout: Duration,
}

impl Default for BatchConfig {
	fn default() -> Self {
		Self {
			max_batch_size: DEFAULT_BATCH_SIZE,
			max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
			timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
		}
	}
}

impl BatchConfig {
	pub fn validate(&self) -> Result<()> {
		validate_batch_size(self.max_batch_size)?;
		validate_buffer_size(self.max_buffer_size, self.max_batch_size)?;
		validate_timeout_ms(self.timeout.as_millis() as u64)
	}
}

impl From<&ConsumerConfig> for BatchConfig {
	fn from(config: &ConsumerConfig) -> Self {
		Self {
			max_batch_size: config.batch_size,
			max_buffer_size: config.effective_max_buffer_size(),
			timeout: config.timeout(),
		}
	}
}

/// A consumer that buffers records and delivers them in batches.
///
/// The buffer lock is held from the append through any flush it triggers, so
/// concurrent callers can never both observe the threshold and double-send.
pub struct BatchConsumer {
	config: BatchConfig,
	transport: Arc<dyn Transport>,
	buffer: Mutex<Vec<Payload>>,
	lifecycle: Lifecycle,
}

impl BatchConsumer {
	/// Creates a consumer posting batches to `endpoint`.
	///
	/// The buffer bound defaults to the larger of 1000 and `batch_size`.
	pub fn new(endpoint: &str, batch_size: usize, timeout_ms: u64) -> Result<Self> {
		let mut config = ConsumerConfig::new(endpoint);
		config.batch_size = batch_size;
		config.timeout_ms = timeout_ms;
		Self::from_config(&config)
	}

	/// Creates an HTTP-backed consumer from loaded settings.
	pub fn from_config(config: &ConsumerConfig) -> Result<Self> {
		config.validate()?;
		let transport = HttpTransport::new(&config.endpoint, config.timeout())?;
		info!(
			endpoint = %transport.endpoint(),
			batch_size = config.batch_size,
			timeout_ms = config.timeout_ms,
			"Created batch analytics consumer"
		);
		Self::with_transport(BatchConfig::from(config), Arc::new(transport))
	}

	/// Creates a consumer over any transport.
	pub fn with_transport(config: BatchConfig, transport: Arc<dyn Transport>) -> Result<Self> {
		config.validate()?;
		Ok(Self {
			config,
			transport,
			buffer: Mutex::new(Vec::new()),
			lifecycle: Lifecycle::default(),
		})
	}

	pub fn config(&self) -> &BatchConfig {
		&self.config
	}

	/// Returns the number of records waiting for delivery.
	pub async fn buffered_len(&self) -> usize {
		self.buffer.lock().await.len()
	}

	/// Returns a copy of the records waiting for delivery, oldest first.
	pub async fn buffered(&self) -> Vec<Payload> {
		self.buffer.lock().await.clone()
	}

	/// Drops every buffered record without sending it. Returns how many were
	/// dropped.
	pub async fn reset(&self) -> usize {
		let mut buffer = self.buffer.lock().await;
		let dropped = buffer.len();
		buffer.clear();
		if dropped > 0 {
			warn!(dropped, "Discarded buffered analytics records");
		}
		dropped
	}

	/// Sends the whole buffer as one batch, oldest first.
	///
	/// The buffer is cleared only once the transport acknowledges the batch;
	/// on failure it is left exactly as it was.
	async fn flush_locked(&self, buffer: &mut Vec<Payload>) -> Result<()> {
		if buffer.is_empty() {
			return Ok(());
		}

		debug!(count = buffer.len(), "Flushing analytics batch");
		let body = serde_json::to_string(buffer.as_slice())?;
		if let Err(e) = self.transport.send(body, self.config.timeout).await {
			error!(error = %e, pending = buffer.len(), "Failed to flush analytics batch");
			return Err(e);
		}
		buffer.clear();
		Ok(())
	}
}

#[async_trait::async_trait]
impl Consumer for BatchConsumer {
	async fn accept_payload(&self, payload: Payload) -> Result<()> {
		let mut buffer = self.buffer.lock().await;
		self.lifecycle.check_open()?;

		if buffer.len() >= self.config.max_buffer_size {
			if let Err(e) = self.flush_locked(&mut buffer).await {
				warn!(
					capacity = self.config.max_buffer_size,
					kind = %payload.kind(),
					error = %e,
					"Rejected analytics record, buffer is full"
				);
				return Err(match e {
					AnalyticsError::ClientShutdown => AnalyticsError::ClientShutdown,
					source => AnalyticsError::BufferFull {
						capacity: self.config.max_buffer_size,
						source: Box::new(source),
					},
				});
			}
		}

		buffer.push(payload);

		if buffer.len() >= self.config.max_batch_size {
			self.flush_locked(&mut buffer).await?;
		}
		Ok(())
	}

	async fn flush(&self) -> Result<()> {
		let mut buffer = self.buffer.lock().await;
		self.lifecycle.check_open()?;
		self.flush_locked(&mut buffer).await
	}

	async fn close(&self) -> Result<()> {
		if !self.lifecycle.begin_close() {
			return Ok(());
		}

		let (flushed, pending) = {
			let mut buffer = self.buffer.lock().await;
			let result = self.flush_locked(&mut buffer).await;
			(result, buffer.len())
		};
		let released = self.transport.close().await;

		match flushed {
			Ok(()) => {
				info!("Batch analytics consumer closed");
				released
			}
			Err(e) => {
				error!(
					error = %e,
					pending,
					"Closed batch analytics consumer with undelivered records"
				);
				Err(e)
			}
		}
	}
}
