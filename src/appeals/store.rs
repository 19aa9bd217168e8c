//! Datastore operations on the `tickets` collection.

use chrono::{DateTime, Utc};

use crate::appeals::{Ticket, TicketType};
use crate::database::{Collection, Datastore};
use crate::{Error, Result};

impl Datastore {
	/// Fetches a ticket by id.
	pub async fn get_ticket(&self, id: &str) -> Result<Option<Ticket>> {
		self.load(Collection::Tickets, id).await
	}

	/// Inserts a new ticket. Fails if the id is already taken.
	pub async fn insert_ticket(&self, ticket: &Ticket) -> Result<()> {
		self.insert(Collection::Tickets, &ticket.id.0, ticket).await
	}

	/// Applies `mutate` to a ticket document and saves it back.
	pub async fn update_ticket<F, R>(&self, id: &str, mutate: F) -> Result<R>
	where
		F: FnMut(&mut Ticket) -> Result<R>,
	{
		self.update(Collection::Tickets, id, mutate).await
	}

	/// Fetches the appeal ticket for the given punishment, if one exists.
	///
	/// At most one appeal may ever exist per punishment.
	pub async fn find_appeal_for_punishment(
		&self,
		punishment_id: &str,
	) -> Result<Option<Ticket>> {
		let raw = sqlx::query_scalar::<_, String>(
			"SELECT doc FROM tickets \
			 WHERE json_extract(doc, '$.type') = 'appeal' \
			 AND json_extract(doc, '$.data.punishmentId') = ?",
		)
		.bind(punishment_id)
		.fetch_optional(self.pool())
		.await?;

		raw.as_deref().map(Self::decode).transpose()
	}

	/// Fetches the most recent tickets, newest first, optionally filtered by type.
	pub async fn list_tickets(
		&self,
		kind: Option<TicketType>,
		limit: i64,
	) -> Result<Vec<Ticket>> {
		let rows = match kind {
			Some(kind) => {
				let kind = serde_json::to_value(kind)?;
				let kind = kind.as_str().ok_or_else(|| Error::invalid("ticket type"))?.to_owned();

				sqlx::query_scalar::<_, String>(
					"SELECT doc FROM tickets WHERE json_extract(doc, '$.type') = ? \
					 ORDER BY json_extract(doc, '$.created') DESC LIMIT ?",
				)
				.bind(kind)
				.bind(limit)
				.fetch_all(self.pool())
				.await?
			}
			None => {
				sqlx::query_scalar::<_, String>(
					"SELECT doc FROM tickets \
					 ORDER BY json_extract(doc, '$.created') DESC LIMIT ?",
				)
				.bind(limit)
				.fetch_all(self.pool())
				.await?
			}
		};

		rows.iter().map(|raw| Self::decode(raw)).collect()
	}

	/// Fetches every ticket created at or after `since`, newest first.
	pub async fn tickets_since(&self, since: DateTime<Utc>) -> Result<Vec<Ticket>> {
		let rows = sqlx::query_scalar::<_, String>(
			"SELECT doc FROM tickets WHERE json_extract(doc, '$.created') >= ? \
			 ORDER BY json_extract(doc, '$.created') DESC",
		)
		.bind(since.timestamp_millis())
		.fetch_all(self.pool())
		.await?;

		rows.iter().map(|raw| Self::decode(raw)).collect()
	}

	/// Counts the tickets that are not in a terminal status.
	pub async fn count_open_tickets(&self) -> Result<u64> {
		let count = sqlx::query_scalar::<_, i64>(
			"SELECT COUNT(*) FROM tickets WHERE json_extract(doc, '$.status') \
			 IN ('Open', 'Under Review', 'Pending Player Response')",
		)
		.fetch_one(self.pool())
		.await?;

		Ok(count.unsigned_abs())
	}
}
