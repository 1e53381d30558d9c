// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Rust SDK for ZA event tracking.
//!
//! Application code calls the [`AnalyticsClient`] to track events, update
//! user profiles and maintain catalogue items. Each call is turned into a
//! normalized record and handed to a [`Consumer`], which delivers it.
//!
//! # Overview
//!
//! - [`AnalyticsClient`] merges [`SuperProperties`], stamps library metadata,
//!   resolves `$time` and validates everything before a record is built
//! - [`BatchConsumer`] buffers records and sends them in batches, keeping
//!   them buffered when delivery fails
//! - [`DefaultConsumer`] and [`DebugConsumer`] send each record on its own
//! - [`LoggingConsumer`] and [`ConcurrentLoggingConsumer`] write JSON lines to
//!   dated local files
//! - [`ConsumerConfig`] loads consumer settings from TOML or `ZA_*`
//!   environment variables
//!
//! Nothing is retried automatically. A failed delivery is returned to the
//! caller, and calling `flush` again is the retry. [`AnalyticsError`]
//! implements [`za_common_http::RetryableError`] to tell transient failures
//! apart.

pub mod builder;
pub mod client;
pub mod config;
pub mod consumer;
pub mod error;
pub mod super_properties;
pub mod transport;

pub use builder::{RecordBuilder, SIGNUP_EVENT};
pub use client::{AnalyticsClient, AnalyticsClientBuilder};
pub use config::{
	parse_endpoint, ConsumerConfig, DEFAULT_BATCH_SIZE, DEFAULT_MAX_BUFFER_SIZE, DEFAULT_TIMEOUT_MS,
};
pub use consumer::{
	BatchConfig, BatchConsumer, ConcurrentLoggingConsumer, Consumer, DebugConsumer,
	DefaultConsumer, LoggingConsumer, Rotation, SharedConsumer,
};
pub use error::{AnalyticsError, ErrorKind, Result};
pub use super_properties::SuperProperties;
pub use transport::{HttpTransport, Transport, DRY_RUN_HEADER};

pub use za_analytics_core::{
	call_site, CallSite, ConstraintError, IdType, ItemRecord, LibraryInfo, Payload, Properties,
	Record, RecordKind, ValidationError, LIB_NAME, LIB_VERSION,
};
