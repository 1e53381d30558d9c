// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the ZA analytics SDK.
//!
//! This crate holds everything that is pure data or pure logic:
//!
//! - [`Record`] and [`ItemRecord`], the units handed to a consumer
//! - [`Properties`], the owned name/value mapping attached to every record
//! - [`normalize`], the property normalizer that enforces key and value rules
//! - identifier checks for distinct IDs, origin IDs, event names and items
//!
//! Nothing here performs I/O. The client SDK in `za-analytics` builds on
//! these types and adds consumers and transports.

pub mod error;
pub mod normalize;
pub mod properties;
pub mod record;

pub use error::{ConstraintError, ValidationError};
pub use normalize::{
	extract_time, normalize, parse_time, validate_distinct_id, validate_event_name,
	validate_item_id, validate_item_type, validate_key, validate_origin_id, MAX_ID_LENGTH,
	MAX_KEY_LENGTH, MAX_STRING_VALUE_LENGTH, TIME_KEY,
};
pub use properties::{Properties, TIMESTAMP_FORMAT};
pub use record::{
	CallSite, IdType, ItemRecord, LibraryInfo, Payload, Record, RecordKind, LIB_METHOD, LIB_NAME,
	LIB_VERSION,
};

/// Captures the current function path, file and line as a [`CallSite`].
///
/// ```
/// let site = za_analytics_core::call_site!();
/// assert!(site.line > 0);
/// ```
#[macro_export]
macro_rules! call_site {
	() => {
		$crate::CallSite::new(module_path!(), file!(), line!())
	};
}
