//! Types for modeling players.
//!
//! The [`Player`] aggregate is the root of almost everything in a tenant datastore: it owns its
//! username history, IP history, notes, punishments and pending notifications. Players are
//! created on first login and never deleted.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::punishments::Punishment;

/// A note on a player or punishment.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Note {
	/// The note text.
	pub text: String,

	/// Who wrote the note.
	pub issuer_name: String,

	/// When the note was written.
	#[serde(with = "chrono::serde::ts_milliseconds")]
	#[schema(value_type = i64)]
	pub date: DateTime<Utc>,
}

/// One entry of a player's username history.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsernameRecord {
	/// The username.
	pub username: String,

	/// When the username was first seen.
	#[serde(with = "chrono::serde::ts_milliseconds")]
	#[schema(value_type = i64)]
	pub date: DateTime<Utc>,
}

/// What the IP information service knows about an address.
#[derive(Debug, Default, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct IpInfo {
	/// The country the address is located in.
	pub country: Option<String>,

	/// The region the address is located in.
	pub region: Option<String>,

	/// The autonomous system announcing the address.
	pub asn: Option<String>,

	/// Whether the address is a known proxy or VPN exit.
	pub proxy: bool,

	/// Whether the address belongs to a hosting provider.
	pub hosting: bool,
}

/// One entry of a player's IP history.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IpEntry {
	/// The address.
	pub ip_address: String,

	/// The country the address is located in, if known.
	#[serde(default)]
	pub country: Option<String>,

	/// The region the address is located in, if known.
	#[serde(default)]
	pub region: Option<String>,

	/// The autonomous system announcing the address, if known.
	#[serde(default)]
	pub asn: Option<String>,

	/// Whether the address is a known proxy or VPN exit.
	#[serde(default)]
	pub proxy: bool,

	/// Whether the address belongs to a hosting provider.
	#[serde(default)]
	pub hosting: bool,

	/// When the player first logged in from this address.
	#[serde(with = "chrono::serde::ts_milliseconds")]
	#[schema(value_type = i64)]
	pub first_login: DateTime<Utc>,

	/// Every login from this address.
	#[serde(default, with = "crate::serde::timestamps")]
	#[schema(value_type = Vec<i64>)]
	pub logins: Vec<DateTime<Utc>>,
}

impl IpEntry {
	/// Creates a new entry for a first login from `ip_address`.
	pub fn new(ip_address: String, info: IpInfo, now: DateTime<Utc>) -> Self {
		Self {
			ip_address,
			country: info.country,
			region: info.region,
			asn: info.asn,
			proxy: info.proxy,
			hosting: info.hosting,
			first_login: now,
			logins: vec![now],
		}
	}

	/// The most recent login from this address.
	pub fn last_login(&self) -> DateTime<Utc> {
		self.logins
			.iter()
			.max()
			.copied()
			.unwrap_or(self.first_login)
	}
}

/// A notification queued for delivery to a player.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
	/// The notification's id.
	pub id: Uuid,

	/// The message shown to the player.
	pub message: String,

	/// What kind of notification this is (e.g. `appeal_update`).
	#[serde(rename = "type")]
	pub kind: String,

	/// When the notification was enqueued.
	#[serde(with = "chrono::serde::ts_milliseconds")]
	#[schema(value_type = i64)]
	pub timestamp: DateTime<Utc>,
}

impl Notification {
	/// Creates a new notification.
	pub fn new<K, M>(kind: K, message: M, now: DateTime<Utc>) -> Self
	where
		K: Into<String>,
		M: Into<String>,
	{
		Self {
			id: Uuid::new_v4(),
			message: message.into(),
			kind: kind.into(),
			timestamp: now,
		}
	}
}

/// A pending notification as stored on the player.
///
/// Very old documents stored plain strings; those are dropped on the first drain.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum NotificationEntry {
	/// A structured notification.
	Full(Notification),

	/// A legacy plain-string notification.
	Legacy(String),
}

impl NotificationEntry {
	/// Returns the structured notification, discarding legacy strings.
	pub fn into_full(self) -> Option<Notification> {
		match self {
			Self::Full(notification) => Some(notification),
			Self::Legacy(_) => None,
		}
	}
}

/// The well-known keys of a player's `data` map, plus a spill bag for everything else.
#[derive(Debug, Default, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerData {
	/// When the player first joined.
	#[serde(with = "chrono::serde::ts_milliseconds_option", skip_serializing_if = "Option::is_none")]
	#[schema(value_type = Option<i64>)]
	pub first_join: Option<DateTime<Utc>>,

	/// When the player last connected.
	#[serde(with = "chrono::serde::ts_milliseconds_option", skip_serializing_if = "Option::is_none")]
	#[schema(value_type = Option<i64>)]
	pub last_connect: Option<DateTime<Utc>>,

	/// When the player last disconnected.
	#[serde(with = "chrono::serde::ts_milliseconds_option", skip_serializing_if = "Option::is_none")]
	#[schema(value_type = Option<i64>)]
	pub last_disconnect: Option<DateTime<Utc>>,

	/// When the player was last seen online by the sync protocol.
	#[serde(with = "chrono::serde::ts_milliseconds_option", skip_serializing_if = "Option::is_none")]
	#[schema(value_type = Option<i64>)]
	pub last_seen: Option<DateTime<Utc>>,

	/// The server the player last connected to.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub last_server: Option<String>,

	/// Whether the player is currently online.
	pub is_online: bool,

	/// When the current session started, if the player is online.
	#[serde(with = "chrono::serde::ts_milliseconds_option", skip_serializing_if = "Option::is_none")]
	#[schema(value_type = Option<i64>)]
	pub current_session_start: Option<DateTime<Utc>>,

	/// Total playtime in milliseconds.
	pub total_playtime: i64,

	/// The hash of the player's last seen skin.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub last_skin_hash: Option<String>,

	/// Accounts linked to this one by shared IP evidence. Symmetric by construction.
	#[serde(skip_serializing_if = "BTreeSet::is_empty")]
	pub linked_accounts: BTreeSet<Uuid>,

	/// When the linked account set last changed.
	#[serde(with = "chrono::serde::ts_milliseconds_option", skip_serializing_if = "Option::is_none")]
	#[schema(value_type = Option<i64>)]
	pub last_linked_account_update: Option<DateTime<Utc>>,

	/// Keys this core does not interpret.
	#[serde(flatten)]
	#[schema(value_type = Object)]
	pub rest: BTreeMap<String, JsonValue>,
}

/// A player aggregate.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Player {
	/// The player's Minecraft UUID.
	pub minecraft_uuid: Uuid,

	/// The player's username history, oldest first.
	#[serde(default)]
	pub usernames: Vec<UsernameRecord>,

	/// The player's IP history.
	///
	/// Old documents called this field `ipList`; reads accept both, writes always produce
	/// `ipAddresses`.
	#[serde(default, alias = "ipList")]
	pub ip_addresses: Vec<IpEntry>,

	/// Staff notes on the player.
	#[serde(default)]
	pub notes: Vec<Note>,

	/// The player's punishments, in creation order.
	#[serde(default)]
	pub punishments: Vec<Punishment>,

	/// Notifications awaiting delivery to the player.
	#[serde(default)]
	pub pending_notifications: Vec<NotificationEntry>,

	/// The player's key/value data.
	#[serde(default)]
	pub data: PlayerData,
}

impl Player {
	/// Creates a new player record for a first login.
	pub fn new(minecraft_uuid: Uuid, username: String, now: DateTime<Utc>) -> Self {
		Self {
			minecraft_uuid,
			usernames: vec![UsernameRecord {
				username,
				date: now,
			}],
			ip_addresses: Vec::new(),
			notes: Vec::new(),
			punishments: Vec::new(),
			pending_notifications: Vec::new(),
			data: PlayerData::default(),
		}
	}

	/// The player's current username (the most recently recorded one).
	pub fn current_username(&self) -> Option<&str> {
		self.usernames
			.last()
			.map(|record| record.username.as_str())
	}

	/// Whether the player has ever used `username` (case-insensitively).
	pub fn has_used_username(&self, username: &str) -> bool {
		self.usernames
			.iter()
			.any(|record| record.username.eq_ignore_ascii_case(username))
	}

	/// Looks up a punishment by id.
	pub fn punishment(&self, id: &str) -> Option<&Punishment> {
		self.punishments.iter().find(|punishment| punishment.id == *id)
	}

	/// Looks up a punishment by id, mutably.
	pub fn punishment_mut(&mut self, id: &str) -> Option<&mut Punishment> {
		self.punishments
			.iter_mut()
			.find(|punishment| punishment.id == *id)
	}

	/// Looks up the IP history entry for `ip_address`.
	pub fn ip_entry(&self, ip_address: &str) -> Option<&IpEntry> {
		self.ip_addresses
			.iter()
			.find(|entry| entry.ip_address == ip_address)
	}

	/// Looks up the IP history entry for `ip_address`, mutably.
	pub fn ip_entry_mut(&mut self, ip_address: &str) -> Option<&mut IpEntry> {
		self.ip_addresses
			.iter_mut()
			.find(|entry| entry.ip_address == ip_address)
	}

	/// Appends a notification to the pending queue.
	pub fn enqueue_notification(&mut self, notification: Notification) {
		self.pending_notifications
			.push(NotificationEntry::Full(notification));
	}

	/// Drains the pending notification queue.
	///
	/// Returns all structured notifications and clears the queue; legacy plain-string
	/// entries are dropped in the process.
	pub fn drain_notifications(&mut self) -> Vec<Notification> {
		std::mem::take(&mut self.pending_notifications)
			.into_iter()
			.filter_map(NotificationEntry::into_full)
			.collect()
	}

	/// Removes the notifications with the given ids from the pending queue.
	///
	/// Legacy plain-string entries cannot be addressed by id and are dropped wholesale, as
	/// part of the migration away from them.
	pub fn acknowledge_notifications(&mut self, ids: &BTreeSet<Uuid>) {
		self.pending_notifications.retain(|entry| match entry {
			NotificationEntry::Full(notification) => !ids.contains(&notification.id),
			NotificationEntry::Legacy(_) => false,
		});
	}
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeSet;

	use chrono::{TimeZone, Utc};
	use serde_json::json;

	use super::{Notification, NotificationEntry, Player};

	fn player() -> Player {
		Player::new(
			uuid::Uuid::new_v4(),
			"steve".to_owned(),
			Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
		)
	}

	#[test]
	fn drain_clears_the_queue_and_drops_legacy_strings() {
		let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
		let mut player = player();

		player
			.pending_notifications
			.push(NotificationEntry::Legacy("you were muted".to_owned()));
		player.enqueue_notification(Notification::new("appeal_update", "appeal accepted", now));

		let drained = player.drain_notifications();

		assert_eq!(drained.len(), 1);
		assert_eq!(drained.first().map(|note| note.kind.as_str()), Some("appeal_update"));
		assert!(player.pending_notifications.is_empty());
	}

	#[test]
	fn acknowledging_a_subset_keeps_the_rest() {
		let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
		let mut player = player();

		let first = Notification::new("warning", "first", now);
		let second = Notification::new("warning", "second", now);
		let first_id = first.id;

		player.enqueue_notification(first);
		player.enqueue_notification(second);

		player.acknowledge_notifications(&BTreeSet::from([first_id]));

		assert_eq!(player.pending_notifications.len(), 1);
	}

	#[test]
	fn legacy_ip_list_field_is_accepted_on_read() {
		let player = serde_json::from_value::<Player>(json!({
			"minecraftUuid": "c5b9b380-752a-4b9f-a2a4-0a9f2b6c1a11",
			"ipList": [{
				"ipAddress": "203.0.113.7",
				"firstLogin": 1_700_000_000_000_i64,
				"logins": [1_700_000_000_000_i64],
			}],
		}))
		.expect("legacy document parses");

		assert_eq!(player.ip_addresses.len(), 1);

		let out = serde_json::to_value(&player).expect("serializes");

		assert!(out.get("ipAddresses").is_some());
		assert!(out.get("ipList").is_none());
	}

	#[test]
	fn username_changes_are_detected_by_history_membership() {
		let mut player = player();

		assert!(player.has_used_username("STEVE"));
		assert!(!player.has_used_username("alex"));

		player.usernames.push(super::UsernameRecord {
			username: "alex".to_owned(),
			date: Utc.timestamp_millis_opt(1_700_000_100_000).unwrap(),
		});

		assert_eq!(player.current_username(), Some("alex"));
	}
}
