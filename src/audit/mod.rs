//! The audit log and the rollback engine.
//!
//! Moderation-relevant events are persisted to the tenant's `logs` collection so staff can
//! audit them from the panel; operator-facing diagnostics go through `tracing` instead.

use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use crate::database::Datastore;
use crate::State;

mod models;
pub use models::{LogEntry, LogLevel, NewLogEntry};

mod store;
pub mod rollback;
pub mod handlers;

/// Returns an [`axum::Router`] for the audit routes on the panel surface.
pub fn panel_router(state: State) -> Router {
	Router::new()
		.route(
			"/audit/punishment/:id/rollback",
			post(handlers::rollback_single),
		)
		.route("/audit/punishments/bulk-rollback", post(handlers::bulk_rollback))
		.route(
			"/audit/staff/:username/rollback-date-range",
			post(handlers::staff_rollback),
		)
		.route("/logs", get(handlers::logs))
		.route("/stats", get(handlers::stats))
		.route("/activity/recent", get(handlers::recent_activity))
		.with_state(state)
}

/// Appends an entry to the tenant's audit log.
///
/// Best effort: a failed write is reported through `tracing` and otherwise swallowed, because
/// no moderation action should fail on account of its log line.
pub(crate) async fn record<S, M>(
	db: &Datastore,
	level: LogLevel,
	source: S,
	message: M,
	metadata: Option<JsonValue>,
	now: DateTime<Utc>,
) where
	S: Into<String>,
	M: Into<String>,
{
	let entry = NewLogEntry {
		level,
		source: source.into(),
		message: message.into(),
		metadata,
	};

	if let Err(error) = db.append_log(&entry, now).await {
		tracing::error! {
			%error,
			message = %entry.message,
			"failed to write audit log entry",
		};
	}
}
