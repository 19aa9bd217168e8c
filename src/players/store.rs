//! Datastore operations on the `players` collection.
//!
//! Saves deliberately skip any schema validation: legacy documents may be malformed in ways the
//! typed model tolerates (see [`crate::database::legacy`]), and the store must stay operational
//! on top of them.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite};
use uuid::Uuid;

use crate::database::{Collection, Datastore};
use crate::players::{IpEntry, IpInfo, Player, UsernameRecord};
use crate::{Error, Result};

/// Everything a login carries that the store needs to record.
#[derive(Debug, Clone)]
pub struct LoginRecord {
	/// The player's Minecraft UUID.
	pub minecraft_uuid: Uuid,

	/// The username the player logged in with.
	pub username: String,

	/// The address the player logged in from.
	pub ip_address: String,

	/// What is known about that address.
	pub ip_info: IpInfo,

	/// The hash of the player's current skin, if the game server reports one.
	pub skin_hash: Option<String>,

	/// The server the player logged in to.
	pub server_name: String,
}

/// What [`Datastore::upsert_on_login()`] observed while recording a login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
	/// The player record after the login was recorded.
	pub player: Player,

	/// Whether the login added a new entry to the username history.
	pub username_changed: bool,

	/// Whether the player's skin hash changed.
	pub skin_changed: bool,

	/// Whether the login came from an address not seen before for this player.
	pub new_ip: bool,
}

/// Flags produced by [`apply_login`].
#[derive(Debug, Clone, Copy, Default)]
struct LoginFlags {
	#[allow(clippy::missing_docs_in_private_items)]
	username_changed: bool,

	#[allow(clippy::missing_docs_in_private_items)]
	skin_changed: bool,

	#[allow(clippy::missing_docs_in_private_items)]
	new_ip: bool,
}

impl Datastore {
	/// Fetches a player by UUID.
	pub async fn get_player(&self, minecraft_uuid: Uuid) -> Result<Option<Player>> {
		self.load(Collection::Players, &minecraft_uuid.to_string())
			.await
	}

	/// Fetches a player by UUID, failing if they do not exist.
	pub async fn require_player(&self, minecraft_uuid: Uuid) -> Result<Player> {
		self.get_player(minecraft_uuid)
			.await?
			.ok_or_else(|| Error::not_found("player"))
	}

	/// Applies `mutate` to a player document and saves it back (compare-and-swap with
	/// retries).
	pub async fn update_player<F, R>(&self, minecraft_uuid: Uuid, mutate: F) -> Result<R>
	where
		F: FnMut(&mut Player) -> Result<R>,
	{
		self.update(Collection::Players, &minecraft_uuid.to_string(), mutate)
			.await
	}

	/// Fetches the player who most recently used `username` (case-insensitively).
	///
	/// "Most recently" is decided by `data.lastConnect` among all players who ever carried
	/// the name.
	pub async fn find_player_by_username(&self, username: &str) -> Result<Option<Player>> {
		let rows = sqlx::query_scalar::<_, String>(
			"SELECT doc FROM players WHERE EXISTS ( \
				SELECT 1 FROM json_each(players.doc, '$.usernames') AS names \
				WHERE lower(json_extract(names.value, '$.username')) = lower(?) \
			)",
		)
		.bind(username)
		.fetch_all(self.pool())
		.await?;

		let mut candidates = rows
			.iter()
			.map(|raw| Self::decode::<Player>(raw))
			.collect::<Result<Vec<_>>>()?;

		candidates.sort_by_key(|player| player.data.last_connect);

		Ok(candidates.pop())
	}

	/// Fetches the player who owns the punishment with the given id.
	pub async fn find_player_by_punishment_id(
		&self,
		punishment_id: &str,
	) -> Result<Option<Player>> {
		let raw = sqlx::query_scalar::<_, String>(
			"SELECT doc FROM players WHERE EXISTS ( \
				SELECT 1 FROM json_each(players.doc, '$.punishments') AS punishments \
				WHERE json_extract(punishments.value, '$.id') = ? \
			)",
		)
		.bind(punishment_id)
		.fetch_optional(self.pool())
		.await?;

		raw.as_deref().map(Self::decode).transpose()
	}

	/// Fetches every player (other than `exclude`) who shares at least one of `ips`.
	///
	/// Legacy documents keep their IP history under `ipList`; both spellings are probed.
	pub async fn find_players_by_ips(
		&self,
		ips: &[String],
		exclude: Uuid,
	) -> Result<Vec<Player>> {
		if ips.is_empty() {
			return Ok(Vec::new());
		}

		let mut query = QueryBuilder::<Sqlite>::new(
			"SELECT doc FROM players WHERE minecraft_uuid <> ",
		);

		query.push_bind(exclude.to_string());

		for path in ["$.ipAddresses", "$.ipList"] {
			query.push(if path == "$.ipAddresses" {
				" AND (EXISTS ("
			} else {
				" OR EXISTS ("
			});
			query.push("SELECT 1 FROM json_each(players.doc, ");
			query.push_bind(path);
			query.push(") AS ips WHERE json_extract(ips.value, '$.ipAddress') IN (");

			let mut separated = query.separated(", ");

			for ip in ips {
				separated.push_bind(ip);
			}

			query.push("))");
		}

		query.push(")");

		let rows = query
			.build_query_scalar::<String>()
			.fetch_all(self.pool())
			.await?;

		rows.iter().map(|raw| Self::decode(raw)).collect()
	}

	/// Fetches players for list views, most recently connected first.
	///
	/// `search` filters by username prefix (case-insensitively, against the whole username
	/// history).
	pub async fn search_players(
		&self,
		search: Option<&str>,
		limit: i64,
		offset: i64,
	) -> Result<Vec<Player>> {
		let rows = match search {
			Some(term) => {
				sqlx::query_scalar::<_, String>(
					"SELECT doc FROM players WHERE EXISTS ( \
						SELECT 1 FROM json_each(players.doc, '$.usernames') AS names \
						WHERE lower(json_extract(names.value, '$.username')) \
						LIKE lower(?) || '%' \
					) \
					ORDER BY json_extract(players.doc, '$.data.lastConnect') DESC \
					LIMIT ? OFFSET ?",
				)
				.bind(term)
				.bind(limit)
				.bind(offset)
				.fetch_all(self.pool())
				.await?
			}
			None => {
				sqlx::query_scalar::<_, String>(
					"SELECT doc FROM players \
					 ORDER BY json_extract(players.doc, '$.data.lastConnect') DESC \
					 LIMIT ? OFFSET ?",
				)
				.bind(limit)
				.bind(offset)
				.fetch_all(self.pool())
				.await?
			}
		};

		rows.iter().map(|raw| Self::decode(raw)).collect()
	}

	/// Fetches every player document of the tenant.
	pub async fn all_players(&self) -> Result<Vec<Player>> {
		let rows = sqlx::query_scalar::<_, String>("SELECT doc FROM players")
			.fetch_all(self.pool())
			.await?;

		rows.iter().map(|raw| Self::decode(raw)).collect()
	}

	/// Counts the tenant's players.
	pub async fn count_players(&self) -> Result<u64> {
		let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM players")
			.fetch_one(self.pool())
			.await?;

		Ok(count.unsigned_abs())
	}

	/// Records a login, creating the player if this is their first.
	///
	/// See `apply_login` for the individual bookkeeping steps.
	pub async fn upsert_on_login(
		&self,
		record: &LoginRecord,
		now: DateTime<Utc>,
	) -> Result<LoginOutcome> {
		let uuid = record.minecraft_uuid;

		if self.get_player(uuid).await?.is_none() {
			let mut player = Player::new(uuid, record.username.clone(), now);
			let flags = apply_login(&mut player, record, now);

			// A concurrent first login may have inserted the player in the meantime;
			// fall through to the update path in that case.
			if self
				.insert(Collection::Players, &uuid.to_string(), &player)
				.await
				.is_ok()
			{
				return Ok(LoginOutcome {
					player,
					username_changed: flags.username_changed,
					skin_changed: flags.skin_changed,
					new_ip: flags.new_ip,
				});
			}
		}

		self.update_player(uuid, |player| {
			let flags = apply_login(player, record, now);

			Ok(LoginOutcome {
				player: player.clone(),
				username_changed: flags.username_changed,
				skin_changed: flags.skin_changed,
				new_ip: flags.new_ip,
			})
		})
		.await
	}

	/// Records a disconnect: closes the session, accumulates playtime.
	pub async fn on_disconnect(&self, minecraft_uuid: Uuid, now: DateTime<Utc>) -> Result<Player> {
		self.update_player(minecraft_uuid, |player| {
			if let Some(start) = player.data.current_session_start.take() {
				let delta = (now - start).num_milliseconds().max(0);
				player.data.total_playtime += delta;
			}

			player.data.is_online = false;
			player.data.last_disconnect = Some(now);
			player.data.last_seen = Some(now);

			Ok(player.clone())
		})
		.await
	}
}

/// Applies a login to a player document.
fn apply_login(player: &mut Player, record: &LoginRecord, now: DateTime<Utc>) -> LoginFlags {
	let mut flags = LoginFlags::default();

	// New usernames are appended; a return to a previously used name is not a change.
	if !player.has_used_username(&record.username) {
		player.usernames.push(UsernameRecord {
			username: record.username.clone(),
			date: now,
		});

		flags.username_changed = player.usernames.len() > 1;
	}

	if let Some(skin_hash) = &record.skin_hash {
		flags.skin_changed = player
			.data
			.last_skin_hash
			.as_deref()
			.is_some_and(|previous| previous != skin_hash);

		player.data.last_skin_hash = Some(skin_hash.clone());
	}

	match player.ip_entry_mut(&record.ip_address) {
		Some(entry) => {
			entry.logins.push(now);
		}
		None => {
			player.ip_addresses.push(IpEntry::new(
				record.ip_address.clone(),
				record.ip_info.clone(),
				now,
			));

			flags.new_ip = true;
		}
	}

	// An online flag without a disconnect after the session start means the previous
	// session was never closed; fold what we know into the playtime counter.
	if let Some(previous) = player.data.current_session_start {
		let closed = player
			.data
			.last_disconnect
			.is_some_and(|disconnect| disconnect >= previous);

		if !closed {
			let last_seen = player.data.last_seen.unwrap_or(previous);
			let delta = (last_seen - previous).num_milliseconds().max(0);
			player.data.total_playtime += delta;
		}
	}

	player.data.is_online = true;
	player.data.current_session_start = Some(now);
	player.data.last_connect = Some(now);
	player.data.last_seen = Some(now);
	player.data.last_server = Some(record.server_name.clone());

	if player.data.first_join.is_none() {
		player.data.first_join = Some(now);
	}

	flags
}

#[cfg(test)]
mod tests {
	use chrono::{Duration, TimeZone, Utc};
	use uuid::Uuid;

	use super::{LoginRecord, Datastore};
	use crate::players::IpInfo;
	use crate::Result;

	fn record(uuid: Uuid, username: &str, ip: &str) -> LoginRecord {
		LoginRecord {
			minecraft_uuid: uuid,
			username: username.to_owned(),
			ip_address: ip.to_owned(),
			ip_info: IpInfo::default(),
			skin_hash: Some("skin-1".to_owned()),
			server_name: "lobby".to_owned(),
		}
	}

	#[tokio::test]
	async fn first_login_creates_the_player() -> Result<()> {
		let store = Datastore::in_memory().await?;
		let uuid = Uuid::new_v4();
		let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();

		let outcome = store.upsert_on_login(&record(uuid, "steve", "203.0.113.7"), now).await?;

		assert!(!outcome.username_changed);
		assert!(!outcome.skin_changed);
		assert!(outcome.new_ip);
		assert!(outcome.player.data.is_online);
		assert_eq!(outcome.player.data.first_join, Some(now));
		assert_eq!(outcome.player.usernames.len(), 1);

		Ok(())
	}

	#[tokio::test]
	async fn username_and_skin_changes_are_detected() -> Result<()> {
		let store = Datastore::in_memory().await?;
		let uuid = Uuid::new_v4();
		let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();

		store.upsert_on_login(&record(uuid, "steve", "203.0.113.7"), now).await?;

		let mut second = record(uuid, "alex", "203.0.113.7");
		second.skin_hash = Some("skin-2".to_owned());

		let outcome = store
			.upsert_on_login(&second, now + Duration::hours(1))
			.await?;

		assert!(outcome.username_changed);
		assert!(outcome.skin_changed);
		assert!(!outcome.new_ip);
		assert_eq!(outcome.player.usernames.len(), 2);

		// Returning to a previously used name is not a change.
		let outcome = store
			.upsert_on_login(&record(uuid, "steve", "203.0.113.7"), now + Duration::hours(2))
			.await?;

		assert!(!outcome.username_changed);

		Ok(())
	}

	#[tokio::test]
	async fn username_lookup_prefers_the_most_recent_owner() -> Result<()> {
		let store = Datastore::in_memory().await?;
		let old_owner = Uuid::new_v4();
		let new_owner = Uuid::new_v4();
		let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();

		store.upsert_on_login(&record(old_owner, "Notch", "203.0.113.7"), now).await?;
		store
			.upsert_on_login(&record(new_owner, "notch", "203.0.113.8"), now + Duration::days(1))
			.await?;

		let found = store
			.find_player_by_username("NOTCH")
			.await?
			.expect("player exists");

		assert_eq!(found.minecraft_uuid, new_owner);

		Ok(())
	}

	#[tokio::test]
	async fn disconnect_accumulates_playtime() -> Result<()> {
		let store = Datastore::in_memory().await?;
		let uuid = Uuid::new_v4();
		let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();

		store.upsert_on_login(&record(uuid, "steve", "203.0.113.7"), now).await?;

		let player = store.on_disconnect(uuid, now + Duration::minutes(30)).await?;

		assert!(!player.data.is_online);
		assert_eq!(player.data.total_playtime, 30 * 60 * 1_000);
		assert_eq!(player.data.current_session_start, None);

		Ok(())
	}

	#[tokio::test]
	async fn shared_ip_lookup_excludes_the_subject() -> Result<()> {
		let store = Datastore::in_memory().await?;
		let subject = Uuid::new_v4();
		let other = Uuid::new_v4();
		let stranger = Uuid::new_v4();
		let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();

		store.upsert_on_login(&record(subject, "steve", "203.0.113.7"), now).await?;
		store.upsert_on_login(&record(other, "alex", "203.0.113.7"), now).await?;
		store.upsert_on_login(&record(stranger, "herobrine", "198.51.100.1"), now).await?;

		let found = store
			.find_players_by_ips(&["203.0.113.7".to_owned()], subject)
			.await?;

		assert_eq!(found.len(), 1);
		assert_eq!(found.first().map(|player| player.minecraft_uuid), Some(other));

		Ok(())
	}
}
