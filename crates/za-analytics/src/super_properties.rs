// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Super properties: entries merged into every outgoing record.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;
use za_analytics_core::{normalize, Properties, RecordKind, ValidationError, TIME_KEY};

/// A shared, synchronized store of super properties.
///
/// Cloning the store yields another handle to the same entries, so handing
/// one store to several clients makes registrations visible to all of them.
/// Clients built without an explicit store get a private one.
#[derive(Debug, Clone, Default)]
pub struct SuperProperties {
	inner: Arc<RwLock<Properties>>,
}

impl SuperProperties {
	pub fn new() -> Self {
		Self::default()
	}

	/// Merges `properties` into the store; incoming keys overwrite existing
	/// ones.
	///
	/// Entries are validated first and nothing is merged if any of them is
	/// rejected, so a bad registration cannot poison every later record.
	/// `$time` is per-record and is refused with
	/// [`ValidationError::ReservedKey`].
	pub fn register(&self, properties: &Properties) -> Result<(), ValidationError> {
		if properties.contains_key(TIME_KEY) {
			return Err(ValidationError::ReservedKey {
				key: TIME_KEY.to_string(),
			});
		}
		let checked = normalize(RecordKind::Track, properties)?;
		let mut store = self.inner.write().unwrap_or_else(PoisonError::into_inner);
		store.extend_from(&checked);
		debug!(registered = checked.len(), total = store.len(), "Registered super properties");
		Ok(())
	}

	/// Removes every entry.
	pub fn clear(&self) {
		self.inner
			.write()
			.unwrap_or_else(PoisonError::into_inner)
			.clear();
	}

	/// Removes one entry; absent keys are ignored.
	pub fn unregister(&self, key: &str) {
		self.inner
			.write()
			.unwrap_or_else(PoisonError::into_inner)
			.remove(key);
	}

	/// Returns an owned copy of the current entries.
	pub fn snapshot(&self) -> Properties {
		self.inner
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.clone()
	}

	pub fn len(&self) -> usize {
		self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
