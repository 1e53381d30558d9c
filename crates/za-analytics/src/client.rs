// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Analytics client: the caller-facing tracking API.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};
use za_analytics_core::{CallSite, IdType, Properties, RecordKind, LIB_VERSION};

use crate::builder::RecordBuilder;
use crate::config::ConsumerConfig;
use crate::consumer::{BatchConsumer, Consumer, SharedConsumer};
use crate::error::{AnalyticsError, Result};
use crate::super_properties::SuperProperties;

/// Builder for constructing an [`AnalyticsClient`].
#[derive(Default)]
pub struct AnalyticsClientBuilder {
	consumer: Option<SharedConsumer>,
	project: Option<String>,
	time_free: bool,
	super_properties: Option<SuperProperties>,
}

impl AnalyticsClientBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the consumer records are delivered to. Required.
	pub fn consumer(mut self, consumer: impl Consumer + 'static) -> Self {
		self.consumer = Some(Arc::new(consumer));
		self
	}

	/// Sets a consumer that is also used elsewhere.
	pub fn shared_consumer(mut self, consumer: SharedConsumer) -> Self {
		self.consumer = Some(consumer);
		self
	}

	/// Sets the project every record is routed to.
	pub fn project(mut self, project: impl Into<String>) -> Self {
		self.project = Some(project.into());
		self
	}

	/// Asks the server to skip time validation for every record.
	pub fn time_free(mut self, time_free: bool) -> Self {
		self.time_free = time_free;
		self
	}

	/// Shares a super-properties store with other clients.
	///
	/// Without one, the client gets its own empty store.
	pub fn super_properties(mut self, store: SuperProperties) -> Self {
		self.super_properties = Some(store);
		self
	}

	pub fn build(self) -> Result<AnalyticsClient> {
		let consumer = self
			.consumer
			.ok_or_else(|| AnalyticsError::InvalidConfig("a consumer is required".to_string()))?;

		info!(
			project = self.project.as_deref().unwrap_or_default(),
			time_free = self.time_free,
			sdk_version = LIB_VERSION,
			"Analytics client initialized"
		);

		Ok(AnalyticsClient {
			inner: Arc::new(ClientInner {
				consumer,
				project: self.project,
				time_free: self.time_free,
				super_properties: self.super_properties.unwrap_or_default(),
				closed: AtomicBool::new(false),
			}),
			call_site: None,
		})
	}
}

struct ClientInner {
	consumer: SharedConsumer,
	project: Option<String>,
	time_free: bool,
	super_properties: SuperProperties,
	closed: AtomicBool,
}

/// Client for tracking events, profiles and items.
///
/// Cloning is cheap; clones share the consumer, the super properties and the
/// closed state.
///
/// # Example
///
/// ```no_run
/// use za_analytics::{AnalyticsClient, BatchConsumer, Properties};
///
/// # async fn run() -> za_analytics::Result<()> {
/// let consumer = BatchConsumer::new("https://collect.example.com/sa?project=default", 50, 1000)?;
/// let client = AnalyticsClient::builder()
///     .consumer(consumer)
///     .project("default")
///     .build()?;
///
/// let props = Properties::new().insert("price", 12).insert("name", "apple");
/// client.track("12345", "ViewProduct", Some(&props), true).await?;
/// client.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AnalyticsClient {
	inner: Arc<ClientInner>,
	call_site: Option<CallSite>,
}

impl AnalyticsClient {
	pub fn builder() -> AnalyticsClientBuilder {
		AnalyticsClientBuilder::new()
	}

	/// Creates a client over a [`BatchConsumer`] built from `config`.
	pub fn from_config(config: &ConsumerConfig) -> Result<Self> {
		let mut builder = Self::builder()
			.consumer(BatchConsumer::from_config(config)?)
			.time_free(config.time_free);
		if let Some(project) = &config.project {
			builder = builder.project(project.clone());
		}
		builder.build()
	}

	/// Returns a handle that reports `call_site` in `$lib_detail`.
	///
	/// Usually called as `client.at(call_site!())`.
	pub fn at(&self, call_site: CallSite) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
			call_site: Some(call_site),
		}
	}

	/// The super-properties store this client reads from.
	pub fn super_properties(&self) -> &SuperProperties {
		&self.inner.super_properties
	}

	fn records(&self) -> RecordBuilder<'_> {
		RecordBuilder::new(&self.inner.super_properties)
			.project(self.inner.project.as_deref())
			.time_free(self.inner.time_free)
			.call_site(self.call_site.as_ref())
	}

	fn check_closed(&self) -> Result<()> {
		if self.inner.closed.load(Ordering::SeqCst) {
			return Err(AnalyticsError::ClientShutdown);
		}
		Ok(())
	}

	/// Tracks an event. `None` properties are treated as empty.
	pub async fn track(
		&self,
		distinct_id: &str,
		event: &str,
		properties: Option<&Properties>,
		is_login_id: bool,
	) -> Result<()> {
		self.check_closed()?;
		let record = self
			.records()
			.track(distinct_id, event, properties, is_login_id)?;
		debug!(event = %event, distinct_id = %distinct_id, "Tracking event");
		self.inner.consumer.accept(record).await
	}

	/// Links `origin_id` (typically an anonymous ID) to `distinct_id`.
	pub async fn track_signup(
		&self,
		distinct_id: &str,
		origin_id: &str,
		distinct_id_type: IdType,
		origin_id_type: IdType,
	) -> Result<()> {
		self.check_closed()?;
		let record =
			self.records()
				.track_signup(distinct_id, origin_id, distinct_id_type, origin_id_type)?;
		self.inner.consumer.accept(record).await
	}

	async fn profile(
		&self,
		kind: RecordKind,
		distinct_id: &str,
		properties: Option<&Properties>,
		is_login_id: bool,
		distinct_id_type: Option<IdType>,
	) -> Result<()> {
		self.check_closed()?;
		let record =
			self.records()
				.profile(kind, distinct_id, properties, is_login_id, distinct_id_type)?;
		self.inner.consumer.accept(record).await
	}

	/// Sets profile properties, overwriting existing values.
	pub async fn profile_set(
		&self,
		distinct_id: &str,
		distinct_id_type: IdType,
		properties: Option<&Properties>,
		is_login_id: bool,
	) -> Result<()> {
		self.profile(
			RecordKind::ProfileSet,
			distinct_id,
			properties,
			is_login_id,
			Some(distinct_id_type),
		)
		.await
	}

	/// Sets profile properties that have no value yet.
	pub async fn profile_set_once(
		&self,
		distinct_id: &str,
		properties: Option<&Properties>,
		is_login_id: bool,
	) -> Result<()> {
		self.profile(RecordKind::ProfileSetOnce, distinct_id, properties, is_login_id, None)
			.await
	}

	/// Adds numeric deltas to profile properties.
	pub async fn profile_increment(
		&self,
		distinct_id: &str,
		properties: Option<&Properties>,
		is_login_id: bool,
	) -> Result<()> {
		self.profile(RecordKind::ProfileIncrement, distinct_id, properties, is_login_id, None)
			.await
	}

	/// Appends to list-valued profile properties.
	pub async fn profile_append(
		&self,
		distinct_id: &str,
		properties: Option<&Properties>,
		is_login_id: bool,
	) -> Result<()> {
		self.profile(RecordKind::ProfileAppend, distinct_id, properties, is_login_id, None)
			.await
	}

	/// Removes the named profile properties.
	pub async fn profile_unset(
		&self,
		distinct_id: &str,
		properties: Option<&Properties>,
		is_login_id: bool,
	) -> Result<()> {
		self.profile(RecordKind::ProfileUnset, distinct_id, properties, is_login_id, None)
			.await
	}

	/// Deletes the whole profile.
	pub async fn profile_delete(&self, distinct_id: &str, is_login_id: bool) -> Result<()> {
		self.check_closed()?;
		let record = self.records().profile_delete(distinct_id, is_login_id)?;
		self.inner.consumer.accept(record).await
	}

	/// Sets properties on a catalogue item.
	pub async fn item_set(
		&self,
		item_type: &str,
		item_id: &str,
		properties: Option<&Properties>,
	) -> Result<()> {
		self.check_closed()?;
		let item = self
			.records()
			.item(RecordKind::ItemSet, item_type, item_id, properties)?;
		self.inner.consumer.accept_item(item).await
	}

	/// Deletes a catalogue item.
	pub async fn item_delete(&self, item_type: &str, item_id: &str) -> Result<()> {
		self.check_closed()?;
		let item = self
			.records()
			.item(RecordKind::ItemDelete, item_type, item_id, None)?;
		self.inner.consumer.accept_item(item).await
	}

	/// Merges `properties` into the super properties.
	pub fn register_super_properties(&self, properties: &Properties) -> Result<()> {
		Ok(self.inner.super_properties.register(properties)?)
	}

	pub fn clear_super_properties(&self) {
		self.inner.super_properties.clear();
	}

	/// Removes one super property; absent keys are ignored.
	pub fn unregister_super_property(&self, key: &str) {
		self.inner.super_properties.unregister(key);
	}

	/// Delivers anything the consumer holds back.
	pub async fn flush(&self) -> Result<()> {
		self.check_closed()?;
		self.inner.consumer.flush().await
	}

	/// Flushes and closes the consumer. Later calls fail with
	/// [`AnalyticsError::ClientShutdown`]; closing twice is a no-op.
	pub async fn close(&self) -> Result<()> {
		if self.inner.closed.swap(true, Ordering::SeqCst) {
			return Ok(());
		}
		info!("Shutting down analytics client");
		self.inner.consumer.close().await
	}

	pub fn is_closed(&self) -> bool {
		self.inner.closed.load(Ordering::SeqCst)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::consumer::DebugConsumer;
	use crate::transport::mock::MockTransport;
	use serde_json::Value;
	use std::time::Duration;
	use za_analytics_core::{call_site, ConstraintError, Payload, LIB_NAME};

	fn capture() -> (Arc<MockTransport>, Arc<DebugConsumer>) {
		let transport = Arc::new(MockTransport::new());
		let consumer = Arc::new(DebugConsumer::with_transport(
			transport.clone(),
			Duration::from_secs(1),
		));
		(transport, consumer)
	}

	fn client(consumer: Arc<DebugConsumer>) -> AnalyticsClient {
		AnalyticsClient::builder()
			.shared_consumer(consumer)
			.project("default")
			.build()
			.unwrap()
	}

	fn only_record(consumer: &DebugConsumer) -> za_analytics_core::Record {
		match consumer.history().pop() {
			Some(Payload::Event(record)) => record,
			other => panic!("expected one event record, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn test_login_scenario() {
		let (_, consumer) = capture();
		let client = client(consumer.clone());

		client
			.register_super_properties(&Properties::new().insert("app_version", "2.1"))
			.unwrap();
		client
			.track(
				"user1",
				"Login",
				Some(&Properties::new().insert("method", "password")),
				true,
			)
			.await
			.unwrap();

		let record = only_record(&consumer);
		let props = &record.properties;
		assert_eq!(props.get("app_version"), Some(&Value::from("2.1")));
		assert_eq!(props.get("method"), Some(&Value::from("password")));
		assert_eq!(props.get("$is_login_id"), Some(&Value::Bool(true)));
		assert_eq!(props.get("$lib"), Some(&Value::from(LIB_NAME)));
		assert!(props.contains_key("$lib_version"));
		assert!(!props.contains_key("$time"));
		assert_eq!(record.project.as_deref(), Some("default"));
	}

	#[tokio::test]
	async fn test_missing_event_name_never_reaches_transport() {
		let (transport, consumer) = capture();
		let client = client(consumer.clone());

		let err = client.track("user1", "", None, false).await.unwrap_err();
		assert_eq!(err.to_string(), "missing event name");
		assert_eq!(transport.call_count(), 0);
		assert!(consumer.history().is_empty());
	}

	#[tokio::test]
	async fn test_profile_calls_require_properties() {
		let (_, consumer) = capture();
		let client = client(consumer.clone());

		let err = client
			.profile_set_once("u", None, false)
			.await
			.unwrap_err();
		assert!(matches!(
			err,
			AnalyticsError::Constraint(ConstraintError::NilProperties {
				operation: "profile_set_once"
			})
		));

		client.profile_delete("u", true).await.unwrap();
		let record = only_record(&consumer);
		assert_eq!(record.kind, RecordKind::ProfileDelete);
	}

	#[tokio::test]
	async fn test_every_operation_reaches_consumer() {
		let (transport, consumer) = capture();
		let client = client(consumer.clone());
		let props = Properties::new().insert("level", 1);
		let list = Properties::new().insert("tags", vec!["a"]);

		client.track("u", "Open", None, false).await.unwrap();
		client
			.track_signup("u", "anon", IdType::LoginId, IdType::DeviceId)
			.await
			.unwrap();
		client
			.profile_set("u", IdType::LoginId, Some(&props), true)
			.await
			.unwrap();
		client.profile_set_once("u", Some(&props), false).await.unwrap();
		client.profile_increment("u", Some(&props), false).await.unwrap();
		client.profile_append("u", Some(&list), false).await.unwrap();
		client.profile_unset("u", Some(&props), false).await.unwrap();
		client.profile_delete("u", false).await.unwrap();
		client.item_set("book", "1", Some(&props)).await.unwrap();
		client.item_delete("book", "1").await.unwrap();

		let kinds: Vec<RecordKind> = consumer.history().iter().map(Payload::kind).collect();
		assert_eq!(
			kinds,
			vec![
				RecordKind::Track,
				RecordKind::TrackSignup,
				RecordKind::ProfileSet,
				RecordKind::ProfileSetOnce,
				RecordKind::ProfileIncrement,
				RecordKind::ProfileAppend,
				RecordKind::ProfileUnset,
				RecordKind::ProfileDelete,
				RecordKind::ItemSet,
				RecordKind::ItemDelete,
			]
		);
		assert_eq!(transport.call_count(), 10);
	}

	#[tokio::test]
	async fn test_clients_can_share_super_properties() {
		let store = SuperProperties::new();
		let (_, first_consumer) = capture();
		let (_, second_consumer) = capture();
		let first = AnalyticsClient::builder()
			.shared_consumer(first_consumer)
			.super_properties(store.clone())
			.build()
			.unwrap();
		let second = AnalyticsClient::builder()
			.shared_consumer(second_consumer.clone())
			.super_properties(store)
			.build()
			.unwrap();

		first
			.register_super_properties(&Properties::new().insert("channel", "web"))
			.unwrap();
		second.track("u", "Open", None, false).await.unwrap();
		assert_eq!(
			only_record(&second_consumer).properties.get("channel"),
			Some(&Value::from("web"))
		);

		first.unregister_super_property("channel");
		assert!(second.super_properties().is_empty());
		first.clear_super_properties();
	}

	#[tokio::test]
	async fn test_separate_clients_have_separate_stores() {
		let (_, a) = capture();
		let (_, b) = capture();
		let first = client(a);
		let second = client(b);
		first
			.register_super_properties(&Properties::new().insert("k", 1))
			.unwrap();
		assert!(second.super_properties().is_empty());
	}

	#[tokio::test]
	async fn test_call_site_feeds_lib_detail() {
		let (_, consumer) = capture();
		let client = client(consumer.clone());

		client
			.at(call_site!())
			.track("u", "Open", None, false)
			.await
			.unwrap();
		let detail = only_record(&consumer).lib.lib_detail.unwrap();
		assert!(detail.starts_with("##"));
		assert!(detail.contains("client.rs"));

		client.track("u", "Open", None, false).await.unwrap();
		assert!(only_record(&consumer).lib.lib_detail.is_none());
	}

	#[tokio::test]
	async fn test_close_shuts_down_client_and_consumer() {
		let (transport, consumer) = capture();
		let client = client(consumer);
		let clone = client.clone();

		client.close().await.unwrap();
		client.close().await.unwrap();

		assert!(clone.is_closed());
		assert!(transport.closed.load(Ordering::SeqCst));
		assert!(matches!(
			clone.track("u", "Open", None, false).await,
			Err(AnalyticsError::ClientShutdown)
		));
		assert!(matches!(clone.flush().await, Err(AnalyticsError::ClientShutdown)));
	}

	#[test]
	fn test_builder_requires_consumer() {
		let err = AnalyticsClient::builder().project("p").build().err().unwrap();
		assert!(matches!(err, AnalyticsError::InvalidConfig(_)));
	}

	#[test]
	fn test_from_config_validates() {
		let config = ConsumerConfig::new("not-a-url");
		assert!(AnalyticsClient::from_config(&config).is_err());

		let mut config = ConsumerConfig::new("https://collect.example.com/sa");
		config.project = Some("shop".to_string());
		config.time_free = true;
		let client = AnalyticsClient::from_config(&config).unwrap();
		assert!(!client.is_closed());
	}
}
