// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Consumers that write records to local files as JSON lines.
//!
//! Files are named after the configured path plus the current period,
//! `events.log.2025-01-31` for daily rotation or `events.log.2025-01-31-09` for
//! hourly rotation. A new period simply starts a new file; old files are left
//! for an external collector.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tracing::{debug, info};
use za_analytics_core::Payload;

use super::{Consumer, Lifecycle};
use crate::error::{AnalyticsError, Result};

/// How often the output file changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
	Daily,
	Hourly,
}

impl Rotation {
	pub fn from_hourly(rotate_hourly: bool) -> Self {
		if rotate_hourly {
			Rotation::Hourly
		} else {
			Rotation::Daily
		}
	}

	fn suffix_format(&self) -> &'static str {
		match self {
			Rotation::Daily => "%Y-%m-%d",
			Rotation::Hourly => "%Y-%m-%d-%H",
		}
	}
}

/// Returns the file that records written at `now` belong to.
pub(crate) fn file_for(base: &Path, rotation: Rotation, now: DateTime<Local>) -> PathBuf {
	let mut name = OsString::from(base.as_os_str());
	name.push(".");
	name.push(now.format(rotation.suffix_format()).to_string());
	PathBuf::from(name)
}

fn check_base_path(base: &Path) -> Result<()> {
	if base.file_name().is_none() {
		return Err(AnalyticsError::InvalidConfig(format!(
			"log path `{}` does not name a file",
			base.display()
		)));
	}
	if let Some(parent) = base.parent() {
		if !parent.as_os_str().is_empty() && !parent.is_dir() {
			return Err(AnalyticsError::InvalidConfig(format!(
				"log directory `{}` does not exist",
				parent.display()
			)));
		}
	}
	Ok(())
}

async fn open_append(path: &Path) -> Result<File> {
	Ok(OpenOptions::new()
		.create(true)
		.append(true)
		.open(path)
		.await?)
}

fn encode_line(payload: &Payload) -> Result<String> {
	let mut line = serde_json::to_string(payload)?;
	line.push('\n');
	Ok(line)
}

struct OpenLog {
	path: PathBuf,
	writer: BufWriter<File>,
}

/// Appends records to a dated file through a write buffer.
///
/// Output reaches the file when the buffer fills, on [`Consumer::flush`], on
/// rotation, and on [`Consumer::close`].
pub struct LoggingConsumer {
	base: PathBuf,
	rotation: Rotation,
	file: Mutex<Option<OpenLog>>,
	lifecycle: Lifecycle,
}

impl LoggingConsumer {
	pub fn new(path: impl Into<PathBuf>, rotate_hourly: bool) -> Result<Self> {
		let base = path.into();
		check_base_path(&base)?;
		let rotation = Rotation::from_hourly(rotate_hourly);
		info!(path = %base.display(), ?rotation, "Created logging analytics consumer");
		Ok(Self {
			base,
			rotation,
			file: Mutex::new(None),
			lifecycle: Lifecycle::default(),
		})
	}

	pub fn rotation(&self) -> Rotation {
		self.rotation
	}

	/// Writes `payload` to the file for the period containing `now`.
	///
	/// The previous period's writer is flushed in place before it is replaced,
	/// so a failed flush leaves its pending lines buffered.
	async fn append_at(&self, payload: &Payload, now: DateTime<Local>) -> Result<()> {
		let line = encode_line(payload)?;
		let mut file = self.file.lock().await;
		self.lifecycle.check_open()?;

		let path = file_for(&self.base, self.rotation, now);
		let stale = file.as_ref().map_or(true, |open| open.path != path);
		if stale {
			if let Some(previous) = file.as_mut() {
				previous.writer.flush().await?;
			}
			debug!(path = %path.display(), "Opening analytics log file");
			*file = Some(OpenLog {
				writer: BufWriter::new(open_append(&path).await?),
				path,
			});
		}

		if let Some(open) = file.as_mut() {
			open.writer.write_all(line.as_bytes()).await?;
		}
		Ok(())
	}
}

#[async_trait::async_trait]
impl Consumer for LoggingConsumer {
	async fn accept_payload(&self, payload: Payload) -> Result<()> {
		self.append_at(&payload, Local::now()).await
	}

	async fn flush(&self) -> Result<()> {
		let mut file = self.file.lock().await;
		self.lifecycle.check_open()?;
		if let Some(open) = file.as_mut() {
			open.writer.flush().await?;
		}
		Ok(())
	}

	async fn close(&self) -> Result<()> {
		if !self.lifecycle.begin_close() {
			return Ok(());
		}
		let mut file = self.file.lock().await;
		if let Some(open) = file.as_mut() {
			open.writer.flush().await?;
			info!(path = %open.path.display(), "Logging analytics consumer closed");
		}
		*file = None;
		Ok(())
	}
}

/// Appends each record with a single write to a dated file.
///
/// Nothing is buffered in memory: every line is written in one append-mode
/// write while holding an in-process lock, so several processes can share
/// the same file without interleaving partial lines.
pub struct ConcurrentLoggingConsumer {
	base: PathBuf,
	rotation: Rotation,
	write_lock: Mutex<()>,
	lifecycle: Lifecycle,
}

impl ConcurrentLoggingConsumer {
	pub fn new(path: impl Into<PathBuf>, rotate_hourly: bool) -> Result<Self> {
		let base = path.into();
		check_base_path(&base)?;
		let rotation = Rotation::from_hourly(rotate_hourly);
		info!(
			path = %base.display(),
			?rotation,
			"Created concurrent logging analytics consumer"
		);
		Ok(Self {
			base,
			rotation,
			write_lock: Mutex::new(()),
			lifecycle: Lifecycle::default(),
		})
	}

	pub fn rotation(&self) -> Rotation {
		self.rotation
	}
}

#[async_trait::async_trait]
impl Consumer for ConcurrentLoggingConsumer {
	async fn accept_payload(&self, payload: Payload) -> Result<()> {
		let line = encode_line(&payload)?;
		let _guard = self.write_lock.lock().await;
		self.lifecycle.check_open()?;

		let path = file_for(&self.base, self.rotation, Local::now());
		let mut file = open_append(&path).await?;
		file.write_all(line.as_bytes()).await?;
		file.flush().await?;
		Ok(())
	}

	async fn flush(&self) -> Result<()> {
		self.lifecycle.check_open()
	}

	async fn close(&self) -> Result<()> {
		let _guard = self.write_lock.lock().await;
		if self.lifecycle.begin_close() {
			info!(path = %self.base.display(), "Concurrent logging analytics consumer closed");
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::consumer::test_support::{item, record};
	use chrono::TimeZone;
	use std::sync::Arc;

	fn log_files(dir: &Path) -> Vec<PathBuf> {
		let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
			.unwrap()
			.map(|entry| entry.unwrap().path())
			.collect();
		files.sort();
		files
	}

	fn read_lines(path: &Path) -> Vec<Payload> {
		std::fs::read_to_string(path)
			.unwrap()
			.lines()
			.map(|line| serde_json::from_str(line).unwrap())
			.collect()
	}

	#[test]
	fn test_file_naming_per_rotation() {
		let now = Local.with_ymd_and_hms(2025, 1, 31, 9, 15, 0).unwrap();
		let base = Path::new("/var/log/za/events.log");

		assert_eq!(
			file_for(base, Rotation::Daily, now),
			PathBuf::from("/var/log/za/events.log.2025-01-31")
		);
		assert_eq!(
			file_for(base, Rotation::Hourly, now),
			PathBuf::from("/var/log/za/events.log.2025-01-31-09")
		);
	}

	#[test]
	fn test_rotation_from_flag() {
		assert_eq!(Rotation::from_hourly(true), Rotation::Hourly);
		assert_eq!(Rotation::from_hourly(false), Rotation::Daily);
	}

	#[test]
	fn test_missing_directory_is_configuration_error() {
		let dir = tempfile::tempdir().unwrap();
		let missing = dir.path().join("nope").join("events.log");
		assert!(matches!(
			LoggingConsumer::new(&missing, false),
			Err(AnalyticsError::InvalidConfig(_))
		));
		assert!(matches!(
			ConcurrentLoggingConsumer::new(&missing, true),
			Err(AnalyticsError::InvalidConfig(_))
		));
		assert!(LoggingConsumer::new("/", false).is_err());
	}

	#[tokio::test]
	async fn test_logging_consumer_buffers_until_flush() {
		let dir = tempfile::tempdir().unwrap();
		let consumer = LoggingConsumer::new(dir.path().join("events.log"), false).unwrap();

		consumer.accept(record("a")).await.unwrap();
		consumer.accept_item(item("9")).await.unwrap();

		let files = log_files(dir.path());
		assert_eq!(files.len(), 1);
		assert!(files[0]
			.file_name()
			.unwrap()
			.to_string_lossy()
			.starts_with("events.log."));
		assert_eq!(std::fs::read_to_string(&files[0]).unwrap(), "");

		consumer.flush().await.unwrap();
		let lines = read_lines(&files[0]);
		assert_eq!(lines.len(), 2);
		assert!(matches!(&lines[1], Payload::Item(i) if i.item_id == "9"));
	}

	#[tokio::test]
	async fn test_rotation_flushes_previous_period() {
		let dir = tempfile::tempdir().unwrap();
		let base = dir.path().join("events.log");
		let consumer = LoggingConsumer::new(&base, false).unwrap();
		let day_one = Local.with_ymd_and_hms(2025, 3, 1, 23, 59, 0).unwrap();
		let day_two = Local.with_ymd_and_hms(2025, 3, 2, 0, 1, 0).unwrap();

		consumer.append_at(&Payload::Event(record("a")), day_one).await.unwrap();
		consumer.append_at(&Payload::Event(record("b")), day_one).await.unwrap();
		consumer.append_at(&Payload::Event(record("c")), day_two).await.unwrap();

		let first = file_for(&base, Rotation::Daily, day_one);
		let second = file_for(&base, Rotation::Daily, day_two);
		assert_eq!(read_lines(&first).len(), 2);
		assert_eq!(std::fs::read_to_string(&second).unwrap(), "");

		consumer.flush().await.unwrap();
		let lines = read_lines(&second);
		assert_eq!(lines.len(), 1);
		assert!(matches!(&lines[0], Payload::Event(r) if r.event.as_deref() == Some("c")));
		assert_eq!(log_files(dir.path()), vec![first, second]);
	}

	#[tokio::test]
	async fn test_logging_consumer_close_flushes() {
		let dir = tempfile::tempdir().unwrap();
		let consumer = LoggingConsumer::new(dir.path().join("events.log"), true).unwrap();

		consumer.accept(record("a")).await.unwrap();
		consumer.close().await.unwrap();
		consumer.close().await.unwrap();

		let files = log_files(dir.path());
		assert_eq!(read_lines(&files[0]).len(), 1);
		assert!(matches!(
			consumer.accept(record("b")).await,
			Err(AnalyticsError::ClientShutdown)
		));
		assert!(matches!(
			consumer.flush().await,
			Err(AnalyticsError::ClientShutdown)
		));
	}

	#[tokio::test]
	async fn test_logging_consumer_appends_to_existing_file() {
		let dir = tempfile::tempdir().unwrap();
		let base = dir.path().join("events.log");

		let first = LoggingConsumer::new(&base, false).unwrap();
		first.accept(record("a")).await.unwrap();
		first.close().await.unwrap();

		let second = LoggingConsumer::new(&base, false).unwrap();
		second.accept(record("b")).await.unwrap();
		second.close().await.unwrap();

		let files = log_files(dir.path());
		let names: Vec<Option<String>> = files
			.iter()
			.flat_map(|f| read_lines(f))
			.map(|p| match p {
				Payload::Event(r) => r.event,
				Payload::Item(_) => None,
			})
			.collect();
		assert_eq!(names, vec![Some("a".to_string()), Some("b".to_string())]);
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn test_concurrent_writers_produce_whole_lines() {
		let dir = tempfile::tempdir().unwrap();
		let consumer =
			Arc::new(ConcurrentLoggingConsumer::new(dir.path().join("events.log"), false).unwrap());

		let handles: Vec<_> = (0..8)
			.map(|task| {
				let consumer = consumer.clone();
				tokio::spawn(async move {
					for i in 0..25 {
						consumer
							.accept(record(&format!("t{task}_{i}")))
							.await
							.unwrap();
					}
				})
			})
			.collect();
		for handle in handles {
			handle.await.unwrap();
		}
		consumer.flush().await.unwrap();

		let lines: usize = log_files(dir.path())
			.iter()
			.map(|f| read_lines(f).len())
			.sum();
		assert_eq!(lines, 200);
	}

	#[tokio::test]
	async fn test_concurrent_consumer_writes_through_and_closes() {
		let dir = tempfile::tempdir().unwrap();
		let consumer = ConcurrentLoggingConsumer::new(dir.path().join("events.log"), true).unwrap();
		assert_eq!(consumer.rotation(), Rotation::Hourly);

		consumer.accept(record("a")).await.unwrap();
		let files = log_files(dir.path());
		assert_eq!(read_lines(&files[0]).len(), 1);

		consumer.close().await.unwrap();
		consumer.close().await.unwrap();
		assert!(matches!(
			consumer.accept(record("b")).await,
			Err(AnalyticsError::ClientShutdown)
		));
	}
}
