// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for record construction.

use thiserror::Error;

/// A property mapping, event name or item type failed a naming or type rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
	/// Property key is the empty string.
	#[error("property key must not be empty")]
	EmptyKey,

	/// Property key does not match the identifier pattern.
	#[error("property key `{key}` is not a valid identifier")]
	InvalidKey { key: String },

	/// Property key is longer than the allowed maximum.
	#[error("property key `{key}` exceeds {max} characters")]
	KeyTooLong { key: String, max: usize },

	/// Property key collides with a reserved record field.
	#[error("property key `{key}` is reserved")]
	ReservedKey { key: String },

	/// Property value has a type outside the allowed set.
	#[error("property `{key}` has unsupported value type {found}")]
	UnsupportedValue { key: String, found: &'static str },

	/// String value (or list element) is longer than the allowed maximum.
	#[error("property `{key}` value exceeds {max} characters")]
	ValueTooLong { key: String, max: usize },

	/// List value contains something other than strings.
	#[error("property `{key}` must be a list of strings")]
	InvalidList { key: String },

	/// `$time` is present but is not a usable timestamp.
	#[error("property `$time` is not a valid timestamp: {value}")]
	InvalidTime { value: String },

	/// Event name does not match the identifier pattern.
	#[error("event name `{name}` is not a valid identifier")]
	InvalidEventName { name: String },

	/// Item type does not match the identifier pattern.
	#[error("item type `{item_type}` is not a valid identifier")]
	InvalidItemType { item_type: String },
}

impl ValidationError {
	/// The property key this error refers to, if any.
	pub fn key(&self) -> Option<&str> {
		match self {
			ValidationError::InvalidKey { key }
			| ValidationError::KeyTooLong { key, .. }
			| ValidationError::ReservedKey { key }
			| ValidationError::UnsupportedValue { key, .. }
			| ValidationError::ValueTooLong { key, .. }
			| ValidationError::InvalidList { key } => Some(key),
			ValidationError::InvalidTime { .. } => Some(crate::TIME_KEY),
			_ => None,
		}
	}
}

/// A required identifier or argument is missing or out of bounds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstraintError {
	/// Track-style record without an event name.
	#[error("missing event name")]
	EmptyEventName,

	/// Distinct ID is empty.
	#[error("property [distinct_id] must not be empty")]
	EmptyDistinctId,

	/// Distinct ID exceeds the maximum length.
	#[error("the max length of property [distinct_id] is {max}")]
	DistinctIdTooLong { max: usize },

	/// Origin ID for sign-up linking is empty or too long.
	#[error("invalid original_id: {0}")]
	InvalidOriginId(String),

	/// A profile operation was called without a properties mapping.
	#[error("properties must not be nil for {operation}")]
	NilProperties { operation: &'static str },

	/// Item type is empty.
	#[error("property [item_type] must not be empty")]
	EmptyItemType,

	/// Item ID is empty or too long.
	#[error("invalid item_id: {0}")]
	InvalidItemId(String),
}
