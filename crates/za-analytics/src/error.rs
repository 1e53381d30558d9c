// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the analytics SDK.

use std::time::Duration;

use thiserror::Error;
use za_analytics_core::{ConstraintError, ValidationError};
use za_common_http::{is_retryable_status, RetryableError};

/// Analytics SDK errors.
#[derive(Debug, Error)]
pub enum AnalyticsError {
	/// A property, event name or item type broke a naming or type rule.
	#[error("property validation failed: {0}")]
	Validation(#[from] ValidationError),

	/// A required identifier or argument is missing or out of bounds.
	#[error(transparent)]
	Constraint(#[from] ConstraintError),

	/// HTTP request failed.
	#[error("HTTP request failed: {0}")]
	RequestFailed(#[from] reqwest::Error),

	/// Server returned an error response.
	#[error("server error ({status}): {message}")]
	ServerError { status: u16, message: String },

	/// Rate limited by the server.
	#[error("rate limited, retry after {retry_after_secs:?} seconds")]
	RateLimited { retry_after_secs: Option<u64> },

	/// Transport call exceeded its deadline.
	#[error("transport timed out after {0:?}")]
	Timeout(Duration),

	/// A custom transport reported a failure.
	#[error("transport failed: {0}")]
	Transport(String),

	/// Writing to a log file failed.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// Endpoint is not an absolute http(s) URL.
	#[error("invalid endpoint `{endpoint}`: {reason}")]
	InvalidEndpoint { endpoint: String, reason: String },

	/// Some other configuration value is out of range or missing.
	#[error("invalid configuration: {0}")]
	InvalidConfig(String),

	/// Consumer or client has been closed.
	#[error("consumer has been closed")]
	ClientShutdown,

	/// Batch buffer is at capacity and the flush meant to drain it failed.
	#[error("buffer full: {capacity} records are waiting for delivery: {source}")]
	BufferFull {
		capacity: usize,
		#[source]
		source: Box<AnalyticsError>,
	},

	/// Serialization error.
	#[error("serialization error: {0}")]
	SerializationError(#[from] serde_json::Error),
}

/// Coarse classification of [`AnalyticsError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	/// Bad property key, value, type or timestamp.
	Validation,
	/// Empty or oversized identifier, missing properties, empty event name.
	Constraint,
	/// Network failure, timeout, non-success response, file write failure.
	Transport,
	/// Raised while constructing a consumer or client.
	Configuration,
	/// Closed consumer or full buffer.
	Lifecycle,
}

impl AnalyticsError {
	pub fn kind(&self) -> ErrorKind {
		match self {
			AnalyticsError::Validation(_) | AnalyticsError::SerializationError(_) => {
				ErrorKind::Validation
			}
			AnalyticsError::Constraint(_) => ErrorKind::Constraint,
			AnalyticsError::RequestFailed(_)
			| AnalyticsError::ServerError { .. }
			| AnalyticsError::RateLimited { .. }
			| AnalyticsError::Timeout(_)
			| AnalyticsError::Transport(_)
			| AnalyticsError::Io(_) => ErrorKind::Transport,
			AnalyticsError::InvalidEndpoint { .. } | AnalyticsError::InvalidConfig(_) => {
				ErrorKind::Configuration
			}
			AnalyticsError::ClientShutdown | AnalyticsError::BufferFull { .. } => {
				ErrorKind::Lifecycle
			}
		}
	}
}

impl RetryableError for AnalyticsError {
	fn is_retryable(&self) -> bool {
		match self {
			AnalyticsError::RequestFailed(e) => e.is_retryable(),
			AnalyticsError::ServerError { status, .. } => is_retryable_status(*status),
			AnalyticsError::RateLimited { .. } | AnalyticsError::Timeout(_) => true,
			AnalyticsError::BufferFull { source, .. } => source.is_retryable(),
			_ => false,
		}
	}
}

/// Result type alias for analytics operations.
pub type Result<T> = std::result::Result<T, AnalyticsError>;
