//! Per-tenant document storage.
//!
//! Every tenant owns an isolated SQLite database in which each collection is a two-column table:
//! a primary key and a JSON document (plus a `version` counter backing optimistic concurrency).
//! The datastore never interprets documents itself beyond [canonicalising legacy
//! shapes](legacy); typed operations live next to their models (see e.g.
//! [`crate::players::store`]).

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::{Error, Result};

pub(crate) mod legacy;

/// Embedded schema migrations, applied whenever a tenant datastore is opened.
pub static MIGRATOR: Migrator = sqlx::migrate!("./database/migrations");

/// How often a compare-and-swap save is retried before giving up.
///
/// Contention on a single player aggregate is rare (one game server, a handful of panel users),
/// so a small bound is plenty.
const MAX_SAVE_ATTEMPTS: u32 = 4;

/// A handle to one tenant's document store.
#[derive(Debug, Clone)]
pub struct Datastore {
	/// The underlying connection pool.
	pool: SqlitePool,
}

/// The document collections of a tenant datastore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Collection {
	#[allow(clippy::missing_docs_in_private_items)]
	Players,

	#[allow(clippy::missing_docs_in_private_items)]
	Tickets,

	#[allow(clippy::missing_docs_in_private_items)]
	Staff,

	#[allow(clippy::missing_docs_in_private_items)]
	Settings,

	#[allow(clippy::missing_docs_in_private_items)]
	Sessions,
}

impl Collection {
	/// The table backing this collection.
	pub(crate) const fn table(self) -> &'static str {
		match self {
			Self::Players => "players",
			Self::Tickets => "tickets",
			Self::Staff => "staff",
			Self::Settings => "settings",
			Self::Sessions => "sessions",
		}
	}

	/// The primary key column of the backing table.
	pub(crate) const fn key_column(self) -> &'static str {
		match self {
			Self::Players => "minecraft_uuid",
			Self::Tickets => "id",
			Self::Staff => "username",
			Self::Settings => "id",
			Self::Sessions => "id",
		}
	}

	/// What to call a single document of this collection in error messages.
	pub(crate) const fn singular(self) -> &'static str {
		match self {
			Self::Players => "player",
			Self::Tickets => "ticket",
			Self::Staff => "staff member",
			Self::Settings => "settings",
			Self::Sessions => "session",
		}
	}
}

impl Datastore {
	/// Opens (and migrates) the datastore at `path`, creating it if necessary.
	pub async fn open(path: &Path) -> Result<Self> {
		let options = SqliteConnectOptions::new()
			.filename(path)
			.create_if_missing(true)
			.journal_mode(SqliteJournalMode::Wal);

		let pool = SqlitePoolOptions::new()
			.max_connections(8)
			.connect_with(options)
			.await
			.map_err(|err| Error::tenant_unavailable().context(err))?;

		MIGRATOR
			.run(&pool)
			.await
			.map_err(|err| Error::tenant_unavailable().context(err))?;

		Ok(Self { pool })
	}

	/// Opens an in-memory datastore.
	///
	/// A single connection is used so every query observes the same database.
	pub async fn in_memory() -> Result<Self> {
		let pool = SqlitePoolOptions::new()
			.max_connections(1)
			.connect("sqlite::memory:")
			.await
			.map_err(|err| Error::tenant_unavailable().context(err))?;

		MIGRATOR
			.run(&pool)
			.await
			.map_err(|err| Error::tenant_unavailable().context(err))?;

		Ok(Self { pool })
	}

	/// The underlying connection pool, for collection-specific queries.
	pub(crate) const fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	/// Decodes a raw document, canonicalising legacy shapes first.
	pub(crate) fn decode<T>(raw: &str) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let mut value = serde_json::from_str::<serde_json::Value>(raw)?;
		legacy::canonicalize_data_maps(&mut value);
		Ok(serde_json::from_value(value)?)
	}

	/// Encodes a document into its canonical JSON form.
	pub(crate) fn encode<T>(doc: &T) -> Result<String>
	where
		T: Serialize,
	{
		Ok(serde_json::to_string(doc)?)
	}

	/// Fetches a single raw document and its version.
	pub(crate) async fn load_versioned(
		&self,
		collection: Collection,
		id: &str,
	) -> Result<Option<(String, i64)>> {
		let query = format!(
			"SELECT doc, version FROM {} WHERE {} = ?",
			collection.table(),
			collection.key_column(),
		);

		let row = sqlx::query_as::<_, (String, i64)>(&query)
			.bind(id)
			.fetch_optional(&self.pool)
			.await?;

		Ok(row)
	}

	/// Fetches and decodes a single document.
	pub(crate) async fn load<T>(&self, collection: Collection, id: &str) -> Result<Option<T>>
	where
		T: DeserializeOwned,
	{
		self.load_versioned(collection, id)
			.await?
			.map(|(raw, _)| Self::decode(&raw))
			.transpose()
	}

	/// Inserts a new document.
	///
	/// Fails if a document with the same id already exists.
	pub(crate) async fn insert<T>(&self, collection: Collection, id: &str, doc: &T) -> Result<()>
	where
		T: Serialize,
	{
		let query = format!(
			"INSERT INTO {} ({}, doc, version) VALUES (?, ?, 0)",
			collection.table(),
			collection.key_column(),
		);

		sqlx::query(&query)
			.bind(id)
			.bind(Self::encode(doc)?)
			.execute(&self.pool)
			.await?;

		Ok(())
	}

	/// Inserts or replaces a document unconditionally.
	pub(crate) async fn upsert<T>(&self, collection: Collection, id: &str, doc: &T) -> Result<()>
	where
		T: Serialize,
	{
		let query = format!(
			"INSERT INTO {table} ({key}, doc, version) VALUES (?, ?, 0) \
			 ON CONFLICT ({key}) DO UPDATE SET doc = excluded.doc, version = version + 1",
			table = collection.table(),
			key = collection.key_column(),
		);

		sqlx::query(&query)
			.bind(id)
			.bind(Self::encode(doc)?)
			.execute(&self.pool)
			.await?;

		Ok(())
	}

	/// Attempts a compare-and-swap save of a document.
	///
	/// Returns `false` if the stored version no longer matches `expected_version`.
	pub(crate) async fn try_save(
		&self,
		collection: Collection,
		id: &str,
		doc: &str,
		expected_version: i64,
	) -> Result<bool> {
		let query = format!(
			"UPDATE {} SET doc = ?, version = version + 1 WHERE {} = ? AND version = ?",
			collection.table(),
			collection.key_column(),
		);

		let result = sqlx::query(&query)
			.bind(doc)
			.bind(id)
			.bind(expected_version)
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected() == 1)
	}

	/// Loads a document, applies `mutate` to it, and saves it back.
	///
	/// The save is optimistic; on a version conflict the whole cycle is retried with a fresh
	/// copy of the document, up to [`MAX_SAVE_ATTEMPTS`] times. `mutate` must therefore be
	/// prepared to run more than once and must not have side effects beyond the document.
	pub(crate) async fn update<T, F, R>(
		&self,
		collection: Collection,
		id: &str,
		mut mutate: F,
	) -> Result<R>
	where
		T: DeserializeOwned + Serialize,
		F: FnMut(&mut T) -> Result<R>,
	{
		for _ in 0..MAX_SAVE_ATTEMPTS {
			let Some((raw, version)) = self.load_versioned(collection, id).await? else {
				return Err(Error::not_found(collection.singular()));
			};

			let mut doc = Self::decode::<T>(&raw)?;
			let result = mutate(&mut doc)?;
			let encoded = Self::encode(&doc)?;

			if self.try_save(collection, id, &encoded, version).await? {
				return Ok(result);
			}
		}

		Err(Error::save_conflict())
	}

	/// Deletes a document. Returns whether anything was deleted.
	pub(crate) async fn delete(&self, collection: Collection, id: &str) -> Result<bool> {
		let query = format!(
			"DELETE FROM {} WHERE {} = ?",
			collection.table(),
			collection.key_column(),
		);

		let result = sqlx::query(&query).bind(id).execute(&self.pool).await?;

		Ok(result.rows_affected() == 1)
	}
}

#[cfg(test)]
mod tests {
	use serde::{Deserialize, Serialize};

	use super::{Collection, Datastore};
	use crate::Result;

	#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
	struct Doc {
		name: String,
		count: u32,
	}

	#[tokio::test]
	async fn compare_and_swap_survives_a_full_update_cycle() -> Result<()> {
		let store = Datastore::in_memory().await?;
		let doc = Doc {
			name: "warden".to_owned(),
			count: 0,
		};

		store.insert(Collection::Sessions, "doc-1", &doc).await?;

		let count = store
			.update::<Doc, _, _>(Collection::Sessions, "doc-1", |doc| {
				doc.count += 1;
				Ok(doc.count)
			})
			.await?;

		assert_eq!(count, 1);

		let reloaded = store
			.load::<Doc>(Collection::Sessions, "doc-1")
			.await?
			.expect("document exists");

		assert_eq!(reloaded.count, 1);

		Ok(())
	}

	#[tokio::test]
	async fn stale_saves_are_rejected() -> Result<()> {
		let store = Datastore::in_memory().await?;
		let doc = Doc {
			name: "warden".to_owned(),
			count: 0,
		};

		store.insert(Collection::Sessions, "doc-1", &doc).await?;

		let encoded = Datastore::encode(&doc)?;

		assert!(store.try_save(Collection::Sessions, "doc-1", &encoded, 0).await?);
		assert!(!store.try_save(Collection::Sessions, "doc-1", &encoded, 0).await?);

		Ok(())
	}
}
