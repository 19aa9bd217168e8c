//! Types for modeling audit log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;

/// How severe a log entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
	/// Routine bookkeeping (logins, linking).
	Info,

	/// Moderation actions (punishments, pardons, rollbacks).
	Moderation,

	/// Something degraded but recoverable.
	Warn,

	/// Something failed.
	Error,
}

/// A persisted audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
	/// The entry's id.
	pub id: i64,

	/// When the entry was written.
	#[serde(with = "chrono::serde::ts_milliseconds")]
	#[schema(value_type = i64)]
	pub created: DateTime<Utc>,

	/// How severe the entry is.
	pub level: LogLevel,

	/// Who produced the entry: a staff name, or `system`.
	pub source: String,

	/// The human-readable description.
	pub message: String,

	/// Structured context (punishment ids, target players, counts).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub metadata: Option<JsonValue>,
}

/// A log entry that has not been persisted yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLogEntry {
	/// How severe the entry is.
	pub level: LogLevel,

	/// Who produced the entry: a staff name, or `system`.
	pub source: String,

	/// The human-readable description.
	pub message: String,

	/// Structured context (punishment ids, target players, counts).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub metadata: Option<JsonValue>,
}
