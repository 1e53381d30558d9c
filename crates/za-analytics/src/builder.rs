// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Record assembly.
//!
//! [`RecordBuilder`] turns caller input into a normalized [`Record`] or
//! [`ItemRecord`]. It copies caller properties, layers them over a snapshot of
//! the super properties, stamps library metadata, resolves the event time and
//! runs the normalizer. The only shared state it touches is the
//! [`SuperProperties`] store, and only to read it.

use chrono::Utc;
use tracing::warn;
use za_analytics_core::{
	extract_time, normalize, validate_distinct_id, validate_event_name, validate_item_id,
	validate_item_type, validate_origin_id, CallSite, ConstraintError, IdType, ItemRecord,
	LibraryInfo, Properties, Record, RecordKind, LIB_NAME, LIB_VERSION,
};

use crate::error::Result;
use crate::super_properties::SuperProperties;

/// Event name used for sign-up linking.
pub const SIGNUP_EVENT: &str = "$SignUp";

const IS_LOGIN_ID_KEY: &str = "$is_login_id";
const DISTINCT_ID_TYPE_KEY: &str = "$distinctIdType";
const ORIGINAL_ID_TYPE_KEY: &str = "$originalIdType";

fn now_ms() -> i64 {
	Utc::now().timestamp_millis()
}

/// Builds records for one client configuration.
#[derive(Debug, Clone, Copy)]
pub struct RecordBuilder<'a> {
	super_properties: &'a SuperProperties,
	project: Option<&'a str>,
	time_free: bool,
	call_site: Option<&'a CallSite>,
}

impl<'a> RecordBuilder<'a> {
	pub fn new(super_properties: &'a SuperProperties) -> Self {
		Self {
			super_properties,
			project: None,
			time_free: false,
			call_site: None,
		}
	}

	/// Sets the routing tag stamped on every record.
	pub fn project(mut self, project: Option<&'a str>) -> Self {
		self.project = project;
		self
	}

	pub fn time_free(mut self, time_free: bool) -> Self {
		self.time_free = time_free;
		self
	}

	/// Sets the call site reported in `$lib_detail`.
	pub fn call_site(mut self, call_site: Option<&'a CallSite>) -> Self {
		self.call_site = call_site;
		self
	}

	/// Builds a `track` record.
	///
	/// `None` properties are treated as an empty mapping.
	pub fn track(
		&self,
		distinct_id: &str,
		event: &str,
		properties: Option<&Properties>,
		is_login_id: bool,
	) -> Result<Record> {
		if event.is_empty() {
			return Err(ConstraintError::EmptyEventName.into());
		}
		validate_event_name(event)?;
		validate_distinct_id(distinct_id)?;

		let mut props = self.with_super_properties(properties);
		stamp_library(&mut props);

		self.finish(
			RecordKind::Track,
			distinct_id,
			None,
			Some(event),
			props,
			is_login_id,
		)
	}

	/// Builds a `track_signup` record linking `origin_id` to `distinct_id`.
	pub fn track_signup(
		&self,
		distinct_id: &str,
		origin_id: &str,
		distinct_id_type: IdType,
		origin_id_type: IdType,
	) -> Result<Record> {
		validate_origin_id(origin_id)?;
		validate_distinct_id(distinct_id)?;

		let mut props = self.super_properties.snapshot();
		stamp_library(&mut props);
		props.set(DISTINCT_ID_TYPE_KEY, distinct_id_type);
		props.set(ORIGINAL_ID_TYPE_KEY, origin_id_type);

		self.finish(
			RecordKind::TrackSignup,
			distinct_id,
			Some(origin_id),
			Some(SIGNUP_EVENT),
			props,
			false,
		)
	}

	/// Builds one of the profile mutations that require a properties mapping.
	///
	/// `distinct_id_type` is only recorded for [`RecordKind::ProfileSet`].
	pub fn profile(
		&self,
		kind: RecordKind,
		distinct_id: &str,
		properties: Option<&Properties>,
		is_login_id: bool,
		distinct_id_type: Option<IdType>,
	) -> Result<Record> {
		debug_assert!(kind.is_profile() && kind != RecordKind::ProfileDelete);

		let properties = properties.ok_or(ConstraintError::NilProperties {
			operation: kind.as_str(),
		})?;
		validate_distinct_id(distinct_id)?;

		let mut props = self.with_super_properties(Some(properties));
		if let (RecordKind::ProfileSet, Some(id_type)) = (kind, distinct_id_type) {
			props.set(DISTINCT_ID_TYPE_KEY, id_type);
		}

		self.finish(kind, distinct_id, None, None, props, is_login_id)
	}

	/// Builds a `profile_delete` record, which carries no caller properties.
	pub fn profile_delete(&self, distinct_id: &str, is_login_id: bool) -> Result<Record> {
		validate_distinct_id(distinct_id)?;
		self.finish(
			RecordKind::ProfileDelete,
			distinct_id,
			None,
			None,
			Properties::new(),
			is_login_id,
		)
	}

	/// Builds an `item_set` or `item_delete` record.
	///
	/// Properties are ignored for deletes.
	pub fn item(
		&self,
		kind: RecordKind,
		item_type: &str,
		item_id: &str,
		properties: Option<&Properties>,
	) -> Result<ItemRecord> {
		debug_assert!(kind.is_item());

		if item_type.is_empty() {
			return Err(ConstraintError::EmptyItemType.into());
		}
		validate_item_type(item_type)?;
		validate_item_id(item_id)?;

		let mut props = match (kind, properties) {
			(RecordKind::ItemSet, Some(p)) => p.clone(),
			_ => Properties::new(),
		};
		let time = self.resolve_time(&mut props)?;

		Ok(ItemRecord {
			kind,
			item_type: item_type.to_string(),
			item_id: item_id.to_string(),
			time,
			properties: normalize(kind, &props)?,
			lib: LibraryInfo::current(self.call_site),
			project: self.project.map(str::to_string),
		})
	}

	/// Copies caller properties on top of the current super properties.
	fn with_super_properties(&self, properties: Option<&Properties>) -> Properties {
		let base = self.super_properties.snapshot();
		match properties {
			Some(own) => own.layered_over(&base),
			None => base,
		}
	}

	fn resolve_time(&self, props: &mut Properties) -> Result<i64> {
		match extract_time(props) {
			Ok(time) => Ok(time.unwrap_or_else(now_ms)),
			Err(e) => {
				warn!(error = %e, "Rejecting record with invalid $time");
				Err(e.into())
			}
		}
	}

	fn finish(
		&self,
		kind: RecordKind,
		distinct_id: &str,
		original_id: Option<&str>,
		event: Option<&str>,
		mut props: Properties,
		is_login_id: bool,
	) -> Result<Record> {
		let time = self.resolve_time(&mut props)?;
		if is_login_id {
			props.set(IS_LOGIN_ID_KEY, true);
		}

		Ok(Record {
			kind,
			time,
			distinct_id: distinct_id.to_string(),
			original_id: original_id.map(str::to_string),
			event: event.map(str::to_string),
			properties: normalize(kind, &props)?,
			lib: LibraryInfo::current(self.call_site),
			project: self.project.map(str::to_string),
			time_free: self.time_free,
		})
	}
}

fn stamp_library(props: &mut Properties) {
	props.set("$lib", LIB_NAME);
	props.set("$lib_version", LIB_VERSION);
}
