// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP utilities for the ZA analytics SDK.
//!
//! This crate provides:
//! - A pre-configured HTTP client builder with a consistent User-Agent header
//! - The [`RetryableError`] trait used to classify transient failures

mod client;
mod retryable;

pub use client::{builder, client_with_timeout, user_agent};
pub use retryable::{is_retryable_status, RetryableError};
