// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Record types delivered to consumers.
//!
//! A [`Record`] describes an event or a profile mutation for one subject; an
//! [`ItemRecord`] describes a mutation of a catalogue item. Both serialize to
//! the JSON shape the collection endpoint expects, and a batch is a JSON array
//! of [`Payload`]s.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::properties::Properties;

/// Library name reported in `$lib`.
pub const LIB_NAME: &str = "Rust";
/// Library version reported in `$lib_version`.
pub const LIB_VERSION: &str = env!("CARGO_PKG_VERSION");
/// Invocation method reported in `$lib_method`.
pub const LIB_METHOD: &str = "code";

/// The kind of mutation a record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
	Track,
	TrackSignup,
	ProfileSet,
	ProfileSetOnce,
	ProfileIncrement,
	ProfileAppend,
	ProfileUnset,
	ProfileDelete,
	ItemSet,
	ItemDelete,
}

impl RecordKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			RecordKind::Track => "track",
			RecordKind::TrackSignup => "track_signup",
			RecordKind::ProfileSet => "profile_set",
			RecordKind::ProfileSetOnce => "profile_set_once",
			RecordKind::ProfileIncrement => "profile_increment",
			RecordKind::ProfileAppend => "profile_append",
			RecordKind::ProfileUnset => "profile_unset",
			RecordKind::ProfileDelete => "profile_delete",
			RecordKind::ItemSet => "item_set",
			RecordKind::ItemDelete => "item_delete",
		}
	}

	/// True for kinds that carry an event name.
	pub fn is_event(&self) -> bool {
		matches!(self, RecordKind::Track | RecordKind::TrackSignup)
	}

	pub fn is_profile(&self) -> bool {
		matches!(
			self,
			RecordKind::ProfileSet
				| RecordKind::ProfileSetOnce
				| RecordKind::ProfileIncrement
				| RecordKind::ProfileAppend
				| RecordKind::ProfileUnset
				| RecordKind::ProfileDelete
		)
	}

	pub fn is_item(&self) -> bool {
		matches!(self, RecordKind::ItemSet | RecordKind::ItemDelete)
	}
}

impl std::fmt::Display for RecordKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// How a subject identifier was obtained, reported as
/// `$distinctIdType` / `$originalIdType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdType {
	DeviceId,
	LoginId,
	Mobile,
	UnionId,
	OpenId,
	ExternalId,
}

impl IdType {
	/// Numeric code understood by the collection endpoint.
	pub fn code(&self) -> u8 {
		match self {
			IdType::DeviceId => 0,
			IdType::LoginId => 1,
			IdType::Mobile => 2,
			IdType::UnionId => 3,
			IdType::OpenId => 4,
			IdType::ExternalId => 5,
		}
	}
}

impl From<IdType> for Value {
	fn from(id_type: IdType) -> Self {
		Value::from(id_type.code())
	}
}

/// Where in the calling application a record was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
	pub function: String,
	pub file: String,
	pub line: u32,
}

impl CallSite {
	pub fn new(function: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
		Self {
			function: function.into(),
			file: file.into(),
			line,
		}
	}

	/// Renders the `$lib_detail` string: `##function##file##line`.
	pub fn detail(&self) -> String {
		format!("##{}##{}##{}", self.function, self.file, self.line)
	}
}

/// Library metadata stamped on every record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryInfo {
	#[serde(rename = "$lib")]
	pub lib: String,
	#[serde(rename = "$lib_version")]
	pub lib_version: String,
	#[serde(rename = "$lib_method")]
	pub lib_method: String,
	#[serde(rename = "$lib_detail", default, skip_serializing_if = "Option::is_none")]
	pub lib_detail: Option<String>,
}

impl LibraryInfo {
	/// Library info for this SDK, with call-site detail when one is known.
	pub fn current(call_site: Option<&CallSite>) -> Self {
		Self {
			lib: LIB_NAME.to_string(),
			lib_version: LIB_VERSION.to_string(),
			lib_method: LIB_METHOD.to_string(),
			lib_detail: call_site.map(CallSite::detail),
		}
	}
}

fn is_false(value: &bool) -> bool {
	!*value
}

/// An event or profile record for one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
	#[serde(rename = "type")]
	pub kind: RecordKind,
	/// Epoch milliseconds.
	pub time: i64,
	pub distinct_id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub original_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub event: Option<String>,
	pub properties: Properties,
	pub lib: LibraryInfo,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub project: Option<String>,
	#[serde(default, skip_serializing_if = "is_false")]
	pub time_free: bool,
}

impl Record {
	/// True when the record was flagged with `$is_login_id`.
	pub fn is_login_id(&self) -> bool {
		matches!(self.properties.get("$is_login_id"), Some(Value::Bool(true)))
	}
}

/// A mutation of a catalogue item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
	#[serde(rename = "type")]
	pub kind: RecordKind,
	pub item_type: String,
	pub item_id: String,
	/// Epoch milliseconds.
	pub time: i64,
	pub properties: Properties,
	pub lib: LibraryInfo,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub project: Option<String>,
}

/// Anything a consumer can deliver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
	Item(ItemRecord),
	Event(Record),
}

impl Payload {
	pub fn kind(&self) -> RecordKind {
		match self {
			Payload::Event(record) => record.kind,
			Payload::Item(item) => item.kind,
		}
	}
}

impl From<Record> for Payload {
	fn from(record: Record) -> Self {
		Payload::Event(record)
	}
}

impl From<ItemRecord> for Payload {
	fn from(item: ItemRecord) -> Self {
		Payload::Item(item)
	}
}
