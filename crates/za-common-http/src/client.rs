// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP client with consistent User-Agent header.

use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use tracing::debug;

const SDK_NAME: &str = "za-analytics-rust";
const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Creates a new HTTP client builder with the standard SDK User-Agent header.
///
/// Use this when you need to customize the client (e.g., set timeout).
///
/// # Example
/// ```ignore
/// let client = za_common_http::builder()
///     .timeout(Duration::from_secs(30))
///     .build()?;
/// ```
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

/// Builds a client whose every request is bounded by `timeout`.
///
/// Unlike a bare `Client::new()`, construction failures (for example a broken
/// TLS backend) are returned to the caller instead of panicking.
pub fn client_with_timeout(timeout: Duration) -> reqwest::Result<Client> {
	debug!(timeout_ms = timeout.as_millis() as u64, "Building HTTP client");
	builder().timeout(timeout).build()
}

/// Returns the standard SDK User-Agent string.
///
/// Format: `za-analytics-rust/{version} ({os}-{arch})`
pub fn user_agent() -> String {
	format!(
		"{SDK_NAME}/{SDK_VERSION} ({}-{})",
		std::env::consts::OS,
		std::env::consts::ARCH
	)
}
