// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};
use za_analytics_core::Payload;

use super::{Consumer, Lifecycle};
use crate::config::validate_timeout_ms;
use crate::error::Result;
use crate::transport::{HttpTransport, Transport};

/// Sends every record on its own, on the caller's task.
pub struct DefaultConsumer {
	transport: Arc<dyn Transport>,
	timeout: Duration,
	lifecycle: Lifecycle,
}

impl DefaultConsumer {
	/// Creates a consumer posting to `endpoint`.
	pub fn new(endpoint: &str, timeout_ms: u64) -> Result<Self> {
		validate_timeout_ms(timeout_ms)?;
		let timeout = Duration::from_millis(timeout_ms);
		let transport = HttpTransport::new(endpoint, timeout)?;
		info!(endpoint = %transport.endpoint(), timeout_ms, "Created default analytics consumer");
		Ok(Self::with_transport(Arc::new(transport), timeout))
	}

	/// Creates a consumer over any transport.
	pub fn with_transport(transport: Arc<dyn Transport>, timeout: Duration) -> Self {
		Self {
			transport,
			timeout,
			lifecycle: Lifecycle::default(),
		}
	}
}

#[async_trait::async_trait]
impl Consumer for DefaultConsumer {
	async fn accept_payload(&self, payload: Payload) -> Result<()> {
		self.lifecycle.check_open()?;
		let kind = payload.kind();
		let body = serde_json::to_string(&payload)?;
		self.transport.send(body, self.timeout).await?;
		debug!(kind = %kind, "Delivered analytics record");
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

#[cfg(test)]
mod tests {
	use super::*;
	use crate::consumer::test_support::{item, record};
	use crate::error::AnalyticsError;
	use crate::transport::mock::MockTransport;

	fn consumer() -> (Arc<MockTransport>, DefaultConsumer) {
		let transport = Arc::new(MockTransport::new());
		let consumer = DefaultConsumer::with_transport(transport.clone(), Duration::from_secs(1));
		(transport, consumer)
	}

	#[tokio::test]
	async fn test_each_record_is_sent_immediately() {
		let (transport, consumer) = consumer();

		consumer.accept(record("one")).await.unwrap();
		consumer.accept_item(item("42")).await.unwrap();

		assert_eq!(transport.call_count(), 2);
		let sent = transport.sent_records();
		assert!(matches!(&sent[0], Payload::Event(r) if r.event.as_deref() == Some("one")));
		assert!(matches!(&sent[1], Payload::Item(i) if i.item_id == "42"));
	}

	#[tokio::test]
	async fn test_transport_error_is_returned() {
		let (transport, consumer) = consumer();
		transport.set_should_fail(true);

		let err = consumer.accept(record("one")).await.unwrap_err();
		assert!(matches!(err, AnalyticsError::ServerError { status: 503, .. }));
	}

	#[tokio::test]
	async fn test_flush_is_noop() {
		let (transport, consumer) = consumer();
		consumer.flush().await.unwrap();
		consumer.flush().await.unwrap();
		assert_eq!(transport.call_count(), 0);
	}

	#[tokio::test]
	async fn test_close_releases_transport_once() {
		let (transport, consumer) = consumer();
		consumer.close().await.unwrap();
		consumer.close().await.unwrap();
		assert_eq!(
			transport.close_calls.load(std::sync::atomic::Ordering::SeqCst),
			1
		);

		let err = consumer.accept(record("late")).await.unwrap_err();
		assert!(matches!(err, AnalyticsError::ClientShutdown));
		assert!(matches!(
			consumer.flush().await,
			Err(AnalyticsError::ClientShutdown)
		));
		assert_eq!(transport.call_count(), 0);
	}

	#[test]
	fn test_new_validates_configuration() {
		assert!(DefaultConsumer::new("http://localhost:8106/sa", 0).is_err());
		assert!(DefaultConsumer::new("localhost:8106", 1000).is_err());
		assert!(DefaultConsumer::new("http://localhost:8106/sa", 1000).is_ok());
	}
}
