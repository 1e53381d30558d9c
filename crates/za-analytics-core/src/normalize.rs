// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Property normalization and identifier checks.
//!
//! [`normalize`] takes a caller's mapping and returns a checked copy, or the
//! first rule it breaks:
//!
//! | Rule | Limit |
//! |------|-------|
//! | key pattern | optional leading `$`, then `[A-Za-z_][A-Za-z0-9_]*` |
//! | key length | [`MAX_KEY_LENGTH`] characters |
//! | reserved keys | record field names, case-insensitive |
//! | value types | string, bool, number, list of strings, object (items only) |
//! | string length | [`MAX_STRING_VALUE_LENGTH`] characters |
//!
//! `$time` is special: it is validated as a timestamp and never survives
//! into the normalized output, because it becomes the record's `time` field.

use chrono::{DateTime, NaiveDateTime};
use serde_json::Value;

use crate::error::{ConstraintError, ValidationError};
use crate::properties::{Properties, TIMESTAMP_FORMAT};
use crate::record::RecordKind;

/// Maximum length of a distinct ID, original ID or item ID.
pub const MAX_ID_LENGTH: usize = 255;
/// Maximum length of a property key.
pub const MAX_KEY_LENGTH: usize = 100;
/// Maximum length of a string value or list element.
pub const MAX_STRING_VALUE_LENGTH: usize = 8192;
/// Property carrying a caller-supplied event time.
pub const TIME_KEY: &str = "$time";

const RESERVED_KEYS: &[&str] = &[
	"distinct_id",
	"original_id",
	"time",
	"properties",
	"id",
	"first_id",
	"second_id",
	"users",
	"events",
	"event",
	"user_id",
	"date",
	"datetime",
];

fn is_identifier(name: &str) -> bool {
	let body = name.strip_prefix('$').unwrap_or(name);
	let mut chars = body.chars();
	match chars.next() {
		Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
		_ => return false,
	}
	chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Checks a property key against the naming rules.
pub fn validate_key(key: &str) -> Result<(), ValidationError> {
	if key.is_empty() {
		return Err(ValidationError::EmptyKey);
	}
	if key.chars().count() > MAX_KEY_LENGTH {
		return Err(ValidationError::KeyTooLong {
			key: key.to_string(),
			max: MAX_KEY_LENGTH,
		});
	}
	if !is_identifier(key) {
		return Err(ValidationError::InvalidKey {
			key: key.to_string(),
		});
	}
	if RESERVED_KEYS.iter().any(|r| r.eq_ignore_ascii_case(key)) {
		return Err(ValidationError::ReservedKey {
			key: key.to_string(),
		});
	}
	Ok(())
}

/// Checks an event name against the naming rules. Emptiness is checked by the
/// caller, since it is a constraint rather than a naming failure.
pub fn validate_event_name(name: &str) -> Result<(), ValidationError> {
	if name.chars().count() > MAX_KEY_LENGTH || !is_identifier(name) {
		return Err(ValidationError::InvalidEventName {
			name: name.to_string(),
		});
	}
	Ok(())
}

fn check_id_length(id: &str) -> bool {
	id.chars().count() <= MAX_ID_LENGTH
}

pub fn validate_distinct_id(distinct_id: &str) -> Result<(), ConstraintError> {
	if distinct_id.is_empty() {
		return Err(ConstraintError::EmptyDistinctId);
	}
	if !check_id_length(distinct_id) {
		return Err(ConstraintError::DistinctIdTooLong { max: MAX_ID_LENGTH });
	}
	Ok(())
}

pub fn validate_origin_id(origin_id: &str) -> Result<(), ConstraintError> {
	if origin_id.is_empty() {
		return Err(ConstraintError::InvalidOriginId(
			"property [original_id] must not be empty".to_string(),
		));
	}
	if !check_id_length(origin_id) {
		return Err(ConstraintError::InvalidOriginId(format!(
			"the max length of property [original_id] is {MAX_ID_LENGTH}"
		)));
	}
	Ok(())
}

pub fn validate_item_id(item_id: &str) -> Result<(), ConstraintError> {
	if item_id.is_empty() {
		return Err(ConstraintError::InvalidItemId(
			"property [item_id] must not be empty".to_string(),
		));
	}
	if !check_id_length(item_id) {
		return Err(ConstraintError::InvalidItemId(format!(
			"the max length of property [item_id] is {MAX_ID_LENGTH}"
		)));
	}
	Ok(())
}

/// Item types follow the property key pattern once known to be non-empty.
pub fn validate_item_type(item_type: &str) -> Result<(), ValidationError> {
	if item_type.chars().count() > MAX_KEY_LENGTH || !is_identifier(item_type) {
		return Err(ValidationError::InvalidItemType {
			item_type: item_type.to_string(),
		});
	}
	Ok(())
}

/// Interprets a `$time` value as epoch milliseconds.
///
/// Accepts a positive integer (already milliseconds), an RFC 3339 string, or
/// a string in [`TIMESTAMP_FORMAT`] read as UTC.
pub fn parse_time(value: &Value) -> Option<i64> {
	match value {
		Value::Number(n) => n.as_i64().filter(|ms| *ms > 0),
		Value::String(s) => DateTime::parse_from_rfc3339(s)
			.map(|t| t.timestamp_millis())
			.or_else(|_| {
				NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
					.map(|t| t.and_utc().timestamp_millis())
			})
			.ok(),
		_ => None,
	}
}

/// Removes `$time` from `properties` and returns it as epoch milliseconds.
///
/// Returns `Ok(None)` when the key is absent. An unparseable value is an
/// error; the key is removed either way so it never reaches a record.
pub fn extract_time(properties: &mut Properties) -> Result<Option<i64>, ValidationError> {
	let Some(value) = properties.remove(TIME_KEY) else {
		return Ok(None);
	};
	parse_time(&value)
		.map(Some)
		.ok_or_else(|| ValidationError::InvalidTime {
			value: value.to_string(),
		})
}

fn value_type_name(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "bool",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "array",
		Value::Object(_) => "object",
	}
}

fn check_string(key: &str, s: &str) -> Result<(), ValidationError> {
	if s.chars().count() > MAX_STRING_VALUE_LENGTH {
		return Err(ValidationError::ValueTooLong {
			key: key.to_string(),
			max: MAX_STRING_VALUE_LENGTH,
		});
	}
	Ok(())
}

fn check_value(kind: RecordKind, key: &str, value: &Value, nested: bool) -> Result<(), ValidationError> {
	match value {
		Value::Bool(_) | Value::Number(_) => Ok(()),
		Value::String(s) => check_string(key, s),
		Value::Array(items) => {
			for item in items {
				match item {
					Value::String(s) => check_string(key, s)?,
					_ => {
						return Err(ValidationError::InvalidList {
							key: key.to_string(),
						})
					}
				}
			}
			Ok(())
		}
		Value::Object(map) if kind == RecordKind::ItemSet && !nested => {
			for (inner_key, inner_value) in map {
				validate_key(inner_key)?;
				check_value(kind, inner_key, inner_value, true)?;
			}
			Ok(())
		}
		Value::Null | Value::Object(_) => Err(ValidationError::UnsupportedValue {
			key: key.to_string(),
			found: value_type_name(value),
		}),
	}
}

/// Validates `properties` for a record of `kind` and returns a checked copy.
///
/// The input is never modified. A `$time` entry is validated and left out of
/// the result.
pub fn normalize(kind: RecordKind, properties: &Properties) -> Result<Properties, ValidationError> {
	let mut normalized = Properties::new();
	for (key, value) in properties.iter() {
		if key == TIME_KEY {
			if parse_time(value).is_none() {
				return Err(ValidationError::InvalidTime {
					value: value.to_string(),
				});
			}
			continue;
		}
		validate_key(key)?;
		check_value(kind, key, value, false)?;
		normalized.set(key.clone(), value.clone());
	}
	Ok(normalized)
}
