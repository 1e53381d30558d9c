// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Delivery of serialized payloads to the collection endpoint.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode, Url};
use tracing::{debug, error, warn};

use crate::config::{parse_endpoint, validate_timeout_ms};
use crate::error::{AnalyticsError, Result};

/// Header asking the server to validate a payload without storing it.
pub const DRY_RUN_HEADER: &str = "Dry-Run";

/// Sends one serialized record or batch.
///
/// Implementations must be safe to call from several tasks at once.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
	/// Delivers `body`, failing if no acknowledgement arrives within `timeout`.
	async fn send(&self, body: String, timeout: Duration) -> Result<()>;

	/// Releases any held resources. Later `send` calls may fail.
	async fn close(&self) -> Result<()> {
		Ok(())
	}
}

/// HTTP transport that POSTs JSON bodies to a fixed endpoint.
pub struct HttpTransport {
	client: Client,
	endpoint: Url,
	dry_run: bool,
	closed: AtomicBool,
}

impl HttpTransport {
	/// Creates a transport for `endpoint`.
	///
	/// # Errors
	///
	/// Returns a configuration error if the endpoint is not an absolute
	/// http(s) URL, the timeout is zero, or the HTTP client cannot be built.
	pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
		let endpoint = parse_endpoint(endpoint)?;
		validate_timeout_ms(timeout.as_millis() as u64)?;
		let client = za_common_http::client_with_timeout(timeout)
			.map_err(|e| AnalyticsError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;

		Ok(Self {
			client,
			endpoint,
			dry_run: false,
			closed: AtomicBool::new(false),
		})
	}

	/// Marks every request with the dry-run header.
	pub fn dry_run(mut self, dry_run: bool) -> Self {
		self.dry_run = dry_run;
		self
	}

	pub fn endpoint(&self) -> &Url {
		&self.endpoint
	}

	pub fn is_dry_run(&self) -> bool {
		self.dry_run
	}
}

impl std::fmt::Debug for HttpTransport {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("HttpTransport")
			.field("endpoint", &self.endpoint.as_str())
			.field("dry_run", &self.dry_run)
			.field("closed", &self.closed.load(Ordering::SeqCst))
			.finish()
	}
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
	async fn send(&self, body: String, timeout: Duration) -> Result<()> {
		if self.closed.load(Ordering::SeqCst) {
			return Err(AnalyticsError::ClientShutdown);
		}

		debug!(
			url = %self.endpoint,
			bytes = body.len(),
			dry_run = self.dry_run,
			"Sending analytics payload"
		);

		let mut request = self
			.client
			.post(self.endpoint.clone())
			.header(CONTENT_TYPE, "application/json")
			.body(body);
		if self.dry_run {
			request = request.header(DRY_RUN_HEADER, "true");
		}

		let response = match tokio::time::timeout(timeout, request.send()).await {
			Ok(result) => result?,
			Err(_) => {
				warn!(
					timeout_ms = timeout.as_millis() as u64,
					"Analytics request timed out"
				);
				return Err(AnalyticsError::Timeout(timeout));
			}
		};

		if response.status() == StatusCode::TOO_MANY_REQUESTS {
			let retry_after = response
				.headers()
				.get("Retry-After")
				.and_then(|v| v.to_str().ok())
				.and_then(|s| s.parse().ok());
			warn!(retry_after_secs = ?retry_after, "Analytics request rate limited");
			return Err(AnalyticsError::RateLimited {
				retry_after_secs: retry_after,
			});
		}

		if !response.status().is_success() {
			let status = response.status().as_u16();
			let message = response.text().await.unwrap_or_default();
			error!(status, message = %message, "Failed to deliver analytics payload");
			return Err(AnalyticsError::ServerError { status, message });
		}

		Ok(())
	}

	async fn close(&self) -> Result<()> {
		if !self.closed.swap(true, Ordering::SeqCst) {
			debug!(url = %self.endpoint, "Closed HTTP transport");
		}
		Ok(())
	}
}


#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::ErrorKind;
	use wiremock::matchers::{body_string, header, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};
	use za_common_http::RetryableError;

	const TIMEOUT: Duration = Duration::from_secs(5);

	#[test]
	fn test_new_rejects_bad_endpoint() {
		let err = HttpTransport::new("ftp://example.com/sa", TIMEOUT).unwrap_err();
		assert!(matches!(err, AnalyticsError::InvalidEndpoint { .. }));

		let err = HttpTransport::new("not a url", TIMEOUT).unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Configuration);
	}

	#[test]
	fn test_new_rejects_zero_timeout() {
		let err = HttpTransport::new("http://localhost/sa", Duration::ZERO).unwrap_err();
		assert!(matches!(err, AnalyticsError::InvalidConfig(_)));
	}

	#[tokio::test]
	async fn test_send_posts_json_body() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/sa"))
			.and(header("content-type", "application/json"))
			.and(body_string(r#"[{"a":1}]"#))
			.respond_with(ResponseTemplate::new(200))
			.expect(1)
			.mount(&server)
			.await;

		let transport = HttpTransport::new(&format!("{}/sa", server.uri()), TIMEOUT).unwrap();
		transport
			.send(r#"[{"a":1}]"#.to_string(), TIMEOUT)
			.await
			.unwrap();
	}

	#[tokio::test]
	async fn test_requests_carry_sdk_user_agent() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(header("user-agent", za_common_http::user_agent()))
			.respond_with(ResponseTemplate::new(200))
			.expect(1)
			.mount(&server)
			.await;

		let transport = HttpTransport::new(&server.uri(), TIMEOUT).unwrap();
		transport.send("[]".to_string(), TIMEOUT).await.unwrap();
	}

	#[tokio::test]
	async fn test_dry_run_sets_header() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(header(DRY_RUN_HEADER, "true"))
			.respond_with(ResponseTemplate::new(200))
			.expect(1)
			.mount(&server)
			.await;

		let transport = HttpTransport::new(&server.uri(), TIMEOUT)
			.unwrap()
			.dry_run(true);
		assert!(transport.is_dry_run());
		transport.send("{}".to_string(), TIMEOUT).await.unwrap();
	}

	#[tokio::test]
	async fn test_server_error_maps_status_and_body() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(500).set_body_string("boom"))
			.mount(&server)
			.await;

		let transport = HttpTransport::new(&server.uri(), TIMEOUT).unwrap();
		let err = transport.send("{}".to_string(), TIMEOUT).await.unwrap_err();
		match &err {
			AnalyticsError::ServerError { status, message } => {
				assert_eq!(*status, 500);
				assert_eq!(message, "boom");
			}
			other => panic!("unexpected error: {other}"),
		}
		assert!(err.is_retryable());
	}

	#[tokio::test]
	async fn test_client_error_is_not_retryable() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(400))
			.mount(&server)
			.await;

		let transport = HttpTransport::new(&server.uri(), TIMEOUT).unwrap();
		let err = transport.send("{}".to_string(), TIMEOUT).await.unwrap_err();
		assert!(!err.is_retryable());
		assert_eq!(err.kind(), ErrorKind::Transport);
	}

	#[tokio::test]
	async fn test_rate_limited_reads_retry_after() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
			.mount(&server)
			.await;

		let transport = HttpTransport::new(&server.uri(), TIMEOUT).unwrap();
		let err = transport.send("{}".to_string(), TIMEOUT).await.unwrap_err();
		assert!(matches!(
			err,
			AnalyticsError::RateLimited {
				retry_after_secs: Some(30)
			}
		));
	}

	#[tokio::test]
	async fn test_slow_server_times_out() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
			.mount(&server)
			.await;

		let timeout = Duration::from_millis(100);
		let transport = HttpTransport::new(&server.uri(), timeout).unwrap();
		let err = transport.send("{}".to_string(), timeout).await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Transport);
		assert!(err.is_retryable());
	}

	#[tokio::test]
	async fn test_send_after_close_is_rejected() {
		let transport = HttpTransport::new("http://127.0.0.1:9/sa", TIMEOUT).unwrap();
		transport.close().await.unwrap();
		transport.close().await.unwrap();
		let err = transport.send("{}".to_string(), TIMEOUT).await.unwrap_err();
		assert!(matches!(err, AnalyticsError::ClientShutdown));
	}
}
