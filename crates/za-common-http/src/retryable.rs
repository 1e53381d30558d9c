// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Classification of transient failures.
//!
//! The SDK never retries on its own. Callers that want retry policy inspect
//! [`RetryableError::is_retryable`] and re-invoke `flush` themselves.

/// An error that knows whether repeating the failed operation may succeed.
pub trait RetryableError {
	/// Returns true if the operation that produced this error may succeed
	/// when attempted again without changes.
	fn is_retryable(&self) -> bool;
}

impl RetryableError for reqwest::Error {
	fn is_retryable(&self) -> bool {
		if self.is_timeout() || self.is_connect() {
			return true;
		}
		match self.status() {
			Some(status) => is_retryable_status(status.as_u16()),
			None => self.is_request(),
		}
	}
}

/// HTTP statuses worth retrying: request timeout, rate limiting, and
/// gateway/server failures.
pub fn is_retryable_status(status: u16) -> bool {
	matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}
