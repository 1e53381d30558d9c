// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Sinks that deliver finished records.
//!
//! | Consumer | Delivery |
//! |----------|----------|
//! | [`DefaultConsumer`] | one transport call per record |
//! | [`BatchConsumer`] | buffered, flushed at a size threshold or on demand |
//! | [`DebugConsumer`] | one call per record, optionally dry-run, keeps history |
//! | [`LoggingConsumer`] | JSON lines in a dated local file |
//! | [`ConcurrentLoggingConsumer`] | as above, one append per line for shared files |
//!
//! Every consumer refuses work with [`AnalyticsError::ClientShutdown`] once
//! closed, and a second `close` succeeds without doing anything.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use za_analytics_core::{ItemRecord, Payload, Record};

use crate::error::{AnalyticsError, Result};

mod batch;
mod debug;
mod default;
mod logging;

pub use batch::{BatchConfig, BatchConsumer};
pub use debug::DebugConsumer;
pub use default::DefaultConsumer;
pub use logging::{ConcurrentLoggingConsumer, LoggingConsumer, Rotation};

/// A sink for finished records.
#[async_trait::async_trait]
pub trait Consumer: Send + Sync {
	/// Accepts one record or item record.
	async fn accept_payload(&self, payload: Payload) -> Result<()>;

	/// Delivers anything held back. A no-op for consumers that do not buffer.
	async fn flush(&self) -> Result<()>;

	/// Flushes, then releases resources. Release happens even if the flush
	/// fails; the flush error is still returned.
	async fn close(&self) -> Result<()>;

	async fn accept(&self, record: Record) -> Result<()> {
		self.accept_payload(Payload::Event(record)).await
	}

	async fn accept_item(&self, item: ItemRecord) -> Result<()> {
		self.accept_payload(Payload::Item(item)).await
	}
}

/// A consumer shared between clients.
pub type SharedConsumer = Arc<dyn Consumer>;

/// Open/closed flag shared by the consumer implementations.
#[derive(Debug, Default)]
pub(crate) struct Lifecycle {
	closed: AtomicBool,
}

impl Lifecycle {
	pub(crate) fn check_open(&self) -> Result<()> {
		if self.closed.load(Ordering::SeqCst) {
			return Err(AnalyticsError::ClientShutdown);
		}
		Ok(())
	}

	/// Marks the consumer closed. Returns false if it already was.
	pub(crate) fn begin_close(&self) -> bool {
		!self.closed.swap(true, Ordering::SeqCst)
	}
}

#[cfg(test)]
pub(crate) mod test_support {
	use za_analytics_core::{IdType, ItemRecord, Properties, Record, RecordKind};

	use crate::builder::RecordBuilder;
	use crate::super_properties::SuperProperties;

	pub(crate) fn record(event: &str) -> Record {
		let store = SuperProperties::new();
		RecordBuilder::new(&store)
			.track("test_user", event, Some(&Properties::new().insert("n", 1)), false)
			.unwrap()
	}

	pub(crate) fn signup() -> Record {
		let store = SuperProperties::new();
		RecordBuilder::new(&store)
			.track_signup("u", "anon", IdType::LoginId, IdType::DeviceId)
			.unwrap()
	}

	pub(crate) fn item(id: &str) -> ItemRecord {
		let store = SuperProperties::new();
		RecordBuilder::new(&store)
			.item(RecordKind::ItemSet, "book", id, Some(&Properties::new().insert("title", "t")))
			.unwrap()
	}
}
