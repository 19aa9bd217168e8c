//! The tenant registry.
//!
//! Every request belongs to exactly one tenant ("server"). Game servers identify their tenant
//! with an API key; panel requests identify it through the `Host` header. The registry maps both
//! onto a tenant name and hands out the tenant's [`Datastore`], opening and caching the
//! underlying pool on first use.
//!
//! Cross-tenant reads are impossible by construction: a [`Datastore`] handle is scoped to one
//! database file and nothing else ever leaves this module.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tokio::sync::RwLock;

use crate::database::Datastore;
use crate::{Error, Result};

/// The registry of tenants and their datastores.
#[derive(Debug)]
pub struct Tenants {
	/// The master registry database (`registry.db` in the data directory).
	registry: SqlitePool,

	/// Where tenant databases live. `None` puts every tenant in memory (tests).
	data_dir: Option<PathBuf>,

	/// Datastores that have already been opened.
	pools: RwLock<HashMap<String, Datastore>>,
}

impl Tenants {
	/// Opens the tenant registry inside `data_dir`.
	pub async fn open(data_dir: &Path) -> Result<Self> {
		let options = SqliteConnectOptions::new()
			.filename(data_dir.join("registry.db"))
			.create_if_missing(true)
			.journal_mode(SqliteJournalMode::Wal);

		let registry = SqlitePoolOptions::new()
			.max_connections(4)
			.connect_with(options)
			.await
			.map_err(|err| Error::tenant_unavailable().context(err))?;

		Self::create_schema(&registry).await?;

		Ok(Self {
			registry,
			data_dir: Some(data_dir.to_owned()),
			pools: RwLock::new(HashMap::new()),
		})
	}

	/// Opens an in-memory registry whose tenant datastores are also in-memory.
	pub async fn in_memory() -> Result<Self> {
		let registry = SqlitePoolOptions::new()
			.max_connections(1)
			.connect("sqlite::memory:")
			.await
			.map_err(|err| Error::tenant_unavailable().context(err))?;

		Self::create_schema(&registry).await?;

		Ok(Self {
			registry,
			data_dir: None,
			pools: RwLock::new(HashMap::new()),
		})
	}

	/// Creates the registry schema.
	async fn create_schema(pool: &SqlitePool) -> Result<()> {
		sqlx::query(
			"CREATE TABLE IF NOT EXISTS tenants ( \
				name TEXT NOT NULL PRIMARY KEY, \
				api_key TEXT NOT NULL UNIQUE \
			)",
		)
		.execute(pool)
		.await?;

		Ok(())
	}

	/// Registers a new tenant.
	///
	/// Provisioning is an operator concern; the API itself only ever resolves tenants.
	pub async fn register(&self, name: &str, api_key: &str) -> Result<()> {
		if !is_valid_tenant_name(name) {
			return Err(Error::invalid("tenant name"));
		}

		sqlx::query("INSERT INTO tenants (name, api_key) VALUES (?, ?)")
			.bind(name)
			.bind(api_key)
			.execute(&self.registry)
			.await?;

		Ok(())
	}

	/// Resolves an API key to a tenant name.
	pub async fn resolve_api_key(&self, api_key: &str) -> Result<Option<String>> {
		let name = sqlx::query_scalar::<_, String>("SELECT name FROM tenants WHERE api_key = ?")
			.bind(api_key)
			.fetch_optional(&self.registry)
			.await
			.map_err(|err| Error::tenant_unavailable().context(err))?;

		Ok(name)
	}

	/// Resolves a panel `Host` header to a tenant name.
	///
	/// `myserver.<panel_domain>` resolves to `myserver`, if that tenant exists.
	pub async fn resolve_host(&self, host: &str, panel_domain: &str) -> Result<Option<String>> {
		let host = host.split(':').next().unwrap_or(host);

		let Some(subdomain) = host
			.strip_suffix(panel_domain)
			.and_then(|prefix| prefix.strip_suffix('.'))
		else {
			return Ok(None);
		};

		let name =
			sqlx::query_scalar::<_, String>("SELECT name FROM tenants WHERE name = ?")
				.bind(subdomain)
				.fetch_optional(&self.registry)
				.await
				.map_err(|err| Error::tenant_unavailable().context(err))?;

		Ok(name)
	}

	/// Returns the datastore of the given tenant, opening it if necessary.
	pub async fn datastore(&self, name: &str) -> Result<Datastore> {
		if let Some(datastore) = self.pools.read().await.get(name) {
			return Ok(datastore.clone());
		}

		if !is_valid_tenant_name(name) {
			return Err(Error::invalid("tenant name"));
		}

		let datastore = match &self.data_dir {
			Some(data_dir) => {
				let dir = data_dir.join("tenants");

				tokio::fs::create_dir_all(&dir)
					.await
					.map_err(|err| Error::tenant_unavailable().context(err))?;

				Datastore::open(&dir.join(format!("{name}.db"))).await?
			}
			None => Datastore::in_memory().await?,
		};

		let mut pools = self.pools.write().await;

		// Another task may have opened the same tenant in the meantime; keep the first
		// handle so both tasks share one pool.
		Ok(pools
			.entry(name.to_owned())
			.or_insert(datastore)
			.clone())
	}
}

/// Whether `name` is safe to embed in a file name.
fn is_valid_tenant_name(name: &str) -> bool {
	!name.is_empty()
		&& name.len() <= 64
		&& name
			.chars()
			.all(|char| char.is_ascii_alphanumeric() || char == '-' || char == '_')
}

#[cfg(test)]
mod tests {
	use super::Tenants;
	use crate::Result;

	#[tokio::test]
	async fn api_keys_resolve_to_tenant_names() -> Result<()> {
		let tenants = Tenants::in_memory().await?;

		tenants.register("lobby", "secret-key").await?;

		assert_eq!(
			tenants.resolve_api_key("secret-key").await?.as_deref(),
			Some("lobby")
		);
		assert_eq!(tenants.resolve_api_key("wrong-key").await?, None);

		Ok(())
	}

	#[tokio::test]
	async fn hosts_resolve_by_subdomain() -> Result<()> {
		let tenants = Tenants::in_memory().await?;

		tenants.register("lobby", "secret-key").await?;

		assert_eq!(
			tenants
				.resolve_host("lobby.warden.gg:443", "warden.gg")
				.await?
				.as_deref(),
			Some("lobby")
		);
		assert_eq!(
			tenants.resolve_host("other.warden.gg", "warden.gg").await?,
			None
		);
		assert_eq!(
			tenants.resolve_host("warden.gg", "warden.gg").await?,
			None
		);

		Ok(())
	}

	#[tokio::test]
	async fn datastores_are_cached_per_tenant() -> Result<()> {
		let tenants = Tenants::in_memory().await?;

		tenants.register("lobby", "secret-key").await?;

		let first = tenants.datastore("lobby").await?;
		let second = tenants.datastore("lobby").await?;

		sqlx::query("INSERT INTO sessions (id, doc) VALUES ('probe', '{}')")
			.execute(first.pool())
			.await?;

		// Same in-memory database behind both handles.
		let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sessions")
			.fetch_one(second.pool())
			.await?;

		assert_eq!(count, 1);

		Ok(())
	}
}
