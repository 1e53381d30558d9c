// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Consumer configuration.
//!
//! Settings can be built in code, parsed from TOML, or read from the
//! environment:
//!
//! ```toml
//! endpoint = "https://collect.example.com/a?project=default"
//! batch_size = 50
//! timeout_ms = 1000
//! max_buffer_size = 1000
//! project = "default"
//! time_free = false
//! ```
//!
//! | Variable | Field |
//! |----------|-------|
//! | `ZA_ENDPOINT` | `endpoint` (required) |
//! | `ZA_BATCH_SIZE` | `batch_size` |
//! | `ZA_TIMEOUT_MS` | `timeout_ms` |
//! | `ZA_MAX_BUFFER_SIZE` | `max_buffer_size` |
//! | `ZA_PROJECT` | `project` |
//! | `ZA_TIME_FREE` | `time_free` |

use std::str::FromStr;
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;

use crate::error::{AnalyticsError, Result};

pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 1000;

fn default_batch_size() -> usize {
	DEFAULT_BATCH_SIZE
}

fn default_timeout_ms() -> u64 {
	DEFAULT_TIMEOUT_MS
}

/// Settings for an HTTP-backed consumer and the client wrapping it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConsumerConfig {
	/// Collection endpoint, an absolute http(s) URL.
	pub endpoint: String,
	/// Number of buffered records that triggers a flush.
	#[serde(default = "default_batch_size")]
	pub batch_size: usize,
	/// Deadline for each transport call, in milliseconds.
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
	/// Upper bound on records held while deliveries keep failing.
	#[serde(default)]
	pub max_buffer_size: Option<usize>,
	/// Routing tag stamped on every record.
	#[serde(default)]
	pub project: Option<String>,
	/// Ask the server to skip time validation.
	#[serde(default)]
	pub time_free: bool,
}

impl ConsumerConfig {
	/// Configuration with defaults for everything except the endpoint.
	pub fn new(endpoint: impl Into<String>) -> Self {
		Self {
			endpoint: endpoint.into(),
			batch_size: DEFAULT_BATCH_SIZE,
			timeout_ms: DEFAULT_TIMEOUT_MS,
			max_buffer_size: None,
			project: None,
			time_free: false,
		}
	}

	/// Parses and validates a TOML document.
	pub fn from_toml_str(source: &str) -> Result<Self> {
		let config: Self =
			toml::from_str(source).map_err(|e| AnalyticsError::InvalidConfig(e.to_string()))?;
		config.validate()?;
		Ok(config)
	}

	/// Reads `ZA_*` environment variables and validates the result.
	pub fn from_env() -> Result<Self> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
		let endpoint = lookup("ZA_ENDPOINT")
			.filter(|v| !v.trim().is_empty())
			.ok_or_else(|| AnalyticsError::InvalidConfig("ZA_ENDPOINT is not set".to_string()))?;

		let mut config = Self::new(endpoint);
		if let Some(v) = lookup("ZA_BATCH_SIZE") {
			config.batch_size = parse_var("ZA_BATCH_SIZE", &v)?;
		}
		if let Some(v) = lookup("ZA_TIMEOUT_MS") {
			config.timeout_ms = parse_var("ZA_TIMEOUT_MS", &v)?;
		}
		if let Some(v) = lookup("ZA_MAX_BUFFER_SIZE") {
			config.max_buffer_size = Some(parse_var("ZA_MAX_BUFFER_SIZE", &v)?);
		}
		config.project = lookup("ZA_PROJECT").filter(|v| !v.is_empty());
		if let Some(v) = lookup("ZA_TIME_FREE") {
			config.time_free = parse_var("ZA_TIME_FREE", &v)?;
		}

		config.validate()?;
		Ok(config)
	}

	/// Checks every field, returning the first problem found.
	pub fn validate(&self) -> Result<()> {
		parse_endpoint(&self.endpoint)?;
		validate_batch_size(self.batch_size)?;
		validate_timeout_ms(self.timeout_ms)?;
		if let Some(max) = self.max_buffer_size {
			validate_buffer_size(max, self.batch_size)?;
		}
		Ok(())
	}

	pub fn timeout(&self) -> Duration {
		Duration::from_millis(self.timeout_ms)
	}

	/// Explicit buffer bound, or the default raised to at least one batch.
	pub fn effective_max_buffer_size(&self) -> usize {
		self.max_buffer_size
			.unwrap_or_else(|| DEFAULT_MAX_BUFFER_SIZE.max(self.batch_size))
	}
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T>
where
	T::Err: std::fmt::Display,
{
	value
		.trim()
		.parse()
		.map_err(|e| AnalyticsError::InvalidConfig(format!("{name}={value}: {e}")))
}

/// Parses an endpoint, accepting only absolute http(s) URLs with a host.
pub fn parse_endpoint(endpoint: &str) -> Result<Url> {
	let invalid = |reason: &str| AnalyticsError::InvalidEndpoint {
		endpoint: endpoint.to_string(),
		reason: reason.to_string(),
	};

	let url = Url::parse(endpoint.trim()).map_err(|e| invalid(&e.to_string()))?;
	if !matches!(url.scheme(), "http" | "https") {
		return Err(invalid("scheme must be http or https"));
	}
	if url.host_str().map_or(true, str::is_empty) {
		return Err(invalid("missing host"));
	}
	Ok(url)
}

pub(crate) fn validate_batch_size(batch_size: usize) -> Result<()> {
	if batch_size == 0 {
		return Err(AnalyticsError::InvalidConfig(
			"batch size must be positive".to_string(),
		));
	}
	Ok(())
}

pub(crate) fn validate_timeout_ms(timeout_ms: u64) -> Result<()> {
	if timeout_ms == 0 {
		return Err(AnalyticsError::InvalidConfig(
			"timeout must be positive".to_string(),
		));
	}
	Ok(())
}

pub(crate) fn validate_buffer_size(max_buffer_size: usize, batch_size: usize) -> Result<()> {
	if max_buffer_size < batch_size {
		return Err(AnalyticsError::InvalidConfig(format!(
			"max buffer size {max_buffer_size} is smaller than batch size {batch_size}"
		)));
	}
	Ok(())
}
