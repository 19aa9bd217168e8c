//! Datastore operations on the `logs` collection.

use chrono::{DateTime, TimeZone, Utc};

use crate::audit::{LogEntry, NewLogEntry};
use crate::database::Datastore;
use crate::Result;

impl Datastore {
	/// Appends a log entry. Returns its id.
	pub async fn append_log(&self, entry: &NewLogEntry, now: DateTime<Utc>) -> Result<i64> {
		let result = sqlx::query("INSERT INTO logs (created, doc) VALUES (?, ?)")
			.bind(now.timestamp_millis())
			.bind(Self::encode(entry)?)
			.execute(self.pool())
			.await?;

		Ok(result.last_insert_rowid())
	}

	/// Fetches the most recent log entries, newest first.
	pub async fn list_logs(&self, limit: i64) -> Result<Vec<LogEntry>> {
		let rows = sqlx::query_as::<_, (i64, i64, String)>(
			"SELECT id, created, doc FROM logs ORDER BY created DESC, id DESC LIMIT ?",
		)
		.bind(limit)
		.fetch_all(self.pool())
		.await?;

		rows.iter().map(|row| decode_row(row)).collect()
	}

	/// Fetches every log entry written at or after `since`, newest first.
	pub async fn logs_since(&self, since: DateTime<Utc>) -> Result<Vec<LogEntry>> {
		let rows = sqlx::query_as::<_, (i64, i64, String)>(
			"SELECT id, created, doc FROM logs WHERE created >= ? ORDER BY created DESC, id DESC",
		)
		.bind(since.timestamp_millis())
		.fetch_all(self.pool())
		.await?;

		rows.iter().map(|row| decode_row(row)).collect()
	}
}

/// Assembles a [`LogEntry`] from its table row.
fn decode_row((id, created, doc): &(i64, i64, String)) -> Result<LogEntry> {
	let entry = Datastore::decode::<NewLogEntry>(doc)?;
	let created = Utc
		.timestamp_millis_opt(*created)
		.single()
		.unwrap_or_else(Utc::now);

	Ok(LogEntry {
		id: *id,
		created,
		level: entry.level,
		source: entry.source,
		message: entry.message,
		metadata: entry.metadata,
	})
}
