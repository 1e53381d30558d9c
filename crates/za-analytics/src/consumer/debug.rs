// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{info, warn};
use za_analytics_core::Payload;

use super::{Consumer, Lifecycle};
use crate::config::validate_timeout_ms;
use crate::error::Result;
use crate::transport::{HttpTransport, Transport};

/// A consumer for integration testing.
///
/// Each record is logged and sent on its own. With `write_data` off the
/// request is marked dry-run, so the server validates it without storing
/// it. Every payload handled is also kept in memory and can be read back
/// with [`DebugConsumer::history`].
pub struct DebugConsumer {
	transport: Arc<dyn Transport>,
	timeout: Duration,
	history: Mutex<Vec<Payload>>,
	lifecycle: Lifecycle,
}

impl DebugConsumer {
	pub fn new(endpoint: &str, write_data: bool, timeout_ms: u64) -> Result<Self> {
		validate_timeout_ms(timeout_ms)?;
		let timeout = Duration::from_millis(timeout_ms);
		let transport = HttpTransport::new(endpoint, timeout)?.dry_run(!write_data);
		info!(
			endpoint = %transport.endpoint(),
			write_data,
			"Created debug analytics consumer"
		);
		Ok(Self::with_transport(Arc::new(transport), timeout))
	}

	pub fn with_transport(transport: Arc<dyn Transport>, timeout: Duration) -> Self {
		Self {
			transport,
			timeout,
			history: Mutex::new(Vec::new()),
			lifecycle: Lifecycle::default(),
		}
	}

	/// Payloads handled so far, oldest first, including ones whose delivery
	/// failed.
	pub fn history(&self) -> Vec<Payload> {
		self.history
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.clone()
	}
}

#[async_trait::async_trait]
impl Consumer for DebugConsumer {
	async fn accept_payload(&self, payload: Payload) -> Result<()> {
		self.lifecycle.check_open()?;
		let body = serde_json::to_string(&payload)?;
		info!(kind = %payload.kind(), payload = %body, "Debug analytics record");

		self.history
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.push(payload);

		if let Err(e) = self.transport.send(body, self.timeout).await {
			warn!(error = %e, "Debug analytics record was rejected");
			return Err(e);
		}
		Ok(())
	}

	async fn flush(&self) -> Result<()> {
		self.lifecycle.check_open()
	}

	async fn close(&self) -> Result<()> {
		if !self.lifecycle.begin_close() {
			return Ok(());
		}
		self.transport.close().await
	}
}
