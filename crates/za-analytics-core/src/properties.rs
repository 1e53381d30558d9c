// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Owned property mapping attached to records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Format used for timestamp-typed property values.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// A mapping of property names to values.
///
/// Every record owns its own `Properties`. Cloning is a deep copy, so a
/// mapping handed to the client is never aliased by the record built from it.
///
/// # Example
///
/// ```
/// use za_analytics_core::Properties;
///
/// let props = Properties::new()
///     .insert("ProductId", "1234562")
///     .insert("price", 99.99)
///     .insert("IsAddedToFav", true)
///     .insert("tags", vec!["a", "b"]);
/// assert_eq!(props.len(), 4);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties {
	inner: Map<String, Value>,
}

impl Properties {
	/// Creates an empty mapping.
	pub fn new() -> Self {
		Self { inner: Map::new() }
	}

	/// Inserts a key-value pair, builder style.
	///
	/// Values are not checked here; the normalizer rejects unsupported
	/// types when the record is built.
	pub fn insert<K, V>(mut self, key: K, value: V) -> Self
	where
		K: Into<String>,
		V: Into<Value>,
	{
		self.inner.insert(key.into(), value.into());
		self
	}

	/// Inserts a key-value pair in place, returning the previous value.
	pub fn set<K, V>(&mut self, key: K, value: V) -> Option<Value>
	where
		K: Into<String>,
		V: Into<Value>,
	{
		self.inner.insert(key.into(), value.into())
	}

	/// Inserts a timestamp-typed value, formatted with [`TIMESTAMP_FORMAT`].
	pub fn insert_time(self, key: impl Into<String>, time: DateTime<Utc>) -> Self {
		let formatted = time.format(TIMESTAMP_FORMAT).to_string();
		self.insert(key, formatted)
	}

	/// Returns a new mapping holding `base` overlaid with `self`.
	///
	/// Keys present in both keep the value from `self`. Neither input is
	/// modified.
	pub fn layered_over(&self, base: &Properties) -> Properties {
		let mut merged = base.clone();
		for (k, v) in &self.inner {
			merged.inner.insert(k.clone(), v.clone());
		}
		merged
	}

	/// Copies every entry of `other` into `self`, overwriting on conflict.
	pub fn extend_from(&mut self, other: &Properties) {
		for (k, v) in &other.inner {
			self.inner.insert(k.clone(), v.clone());
		}
	}

	/// Removes a key, returning its value if present.
	pub fn remove(&mut self, key: &str) -> Option<Value> {
		self.inner.remove(key)
	}

	/// Removes every entry.
	pub fn clear(&mut self) {
		self.inner.clear();
	}

	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}

	pub fn len(&self) -> usize {
		self.inner.len()
	}

	pub fn get(&self, key: &str) -> Option<&Value> {
		self.inner.get(key)
	}

	pub fn contains_key(&self, key: &str) -> bool {
		self.inner.contains_key(key)
	}

	/// Iterates over entries in key order.
	pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
		self.inner.iter()
	}

	/// Converts the mapping into a JSON object value.
	pub fn into_value(self) -> Value {
		Value::Object(self.inner)
	}
}

impl From<Properties> for Value {
	fn from(props: Properties) -> Self {
		props.into_value()
	}
}

impl From<Map<String, Value>> for Properties {
	fn from(map: Map<String, Value>) -> Self {
		Self { inner: map }
	}
}

impl TryFrom<Value> for Properties {
	type Error = Value;

	/// Accepts only JSON objects; anything else is handed back unchanged.
	fn try_from(value: Value) -> Result<Self, Self::Error> {
		match value {
			Value::Object(map) => Ok(Self { inner: map }),
			other => Err(other),
		}
	}
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Properties {
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		let inner = iter
			.into_iter()
			.map(|(k, v)| (k.into(), v.into()))
			.collect();
		Self { inner }
	}
}
