//! Wire types for the game-server sync protocol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::players::{IpInfo, Notification};
use crate::punishments::{Modification, PunishmentId};
use crate::settings::PunishmentKind;

/// Request payload for `POST /player/login`.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
	/// The player's Minecraft UUID.
	pub minecraft_uuid: Uuid,

	/// The username the player logged in with.
	pub username: String,

	/// The address the player logged in from.
	pub ip_address: String,

	/// The hash of the player's current skin, if the game server computed one.
	#[serde(default)]
	pub skin_hash: Option<String>,

	/// IP information the game server already has; skips the external lookup.
	#[serde(default)]
	pub ip_info: Option<IpInfo>,

	/// Which server of the network the player joined.
	#[serde(default)]
	pub server_name: Option<String>,
}

/// A punishment as sent to the game server.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WirePunishment {
	/// The punishment's id.
	pub id: PunishmentId,

	/// What the game server should enforce.
	#[serde(rename = "type")]
	pub kind: PunishmentKind,

	/// The punishment's type ordinal.
	pub ordinal: u32,

	/// Whether the punishment has been started (acknowledged) already.
	pub started: bool,

	/// When the punishment expires. For unstarted punishments this is computed as if they
	/// started now; display only.
	#[serde(default, with = "chrono::serde::ts_milliseconds_option")]
	#[schema(value_type = Option<i64>)]
	pub expiration: Option<DateTime<Utc>>,

	/// The text shown to the player.
	pub description: String,
}

/// Response payload for `POST /player/login`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
	/// Always `200`.
	pub status: u16,

	/// The punishments the game server should enforce for this player.
	pub active_punishments: Vec<WirePunishment>,

	/// Notifications to deliver to the player. Drained: they will not be sent again.
	pub pending_notifications: Vec<Notification>,
}

/// Request payload for `POST /player/disconnect`.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectRequest {
	/// The player's Minecraft UUID.
	pub minecraft_uuid: Uuid,
}

/// One online player in a sync request.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OnlinePlayer {
	/// The player's Minecraft UUID.
	pub uuid: Uuid,

	/// The player's username, if the game server includes it.
	#[serde(default)]
	pub username: Option<String>,
}

/// Request payload for `POST /sync`.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
	/// Everyone currently online on the game server.
	#[serde(default)]
	pub online_players: Vec<OnlinePlayer>,

	/// When the game server last synced successfully.
	#[serde(default, with = "chrono::serde::ts_milliseconds_option")]
	#[schema(value_type = Option<i64>)]
	pub last_sync_timestamp: Option<DateTime<Utc>>,
}

/// The punishment selection for one online player.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncPlayer {
	/// The player's Minecraft UUID.
	pub uuid: Uuid,

	/// The punishments the game server should enforce.
	pub punishments: Vec<WirePunishment>,
}

/// A punishment that started since the last sync.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartedPunishment {
	/// The punished player.
	pub player_uuid: Uuid,

	/// When the punishment started.
	#[serde(with = "chrono::serde::ts_milliseconds")]
	#[schema(value_type = i64)]
	pub started: DateTime<Utc>,

	/// The punishment itself.
	#[serde(flatten)]
	pub punishment: WirePunishment,
}

/// A punishment with modifications issued since the last sync, flattened per punishment.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModifiedPunishment {
	/// The punished player.
	pub player_uuid: Uuid,

	/// The modified punishment.
	pub punishment_id: PunishmentId,

	/// The modifications issued since the last sync, in `issued` order.
	pub modifications: Vec<Modification>,

	/// Whether the punishment is still effectively active.
	pub effective_active: bool,

	/// When the punishment now effectively expires.
	#[serde(default, with = "chrono::serde::ts_milliseconds_option")]
	#[schema(value_type = Option<i64>)]
	pub effective_expiry: Option<DateTime<Utc>>,
}

/// Pending notifications for one online player.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerNotifications {
	/// The player's Minecraft UUID.
	pub uuid: Uuid,

	/// The notifications to deliver.
	pub notifications: Vec<Notification>,
}

/// Tenant statistics included in every sync response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncStats {
	/// How many players the tenant has ever seen.
	pub total_players: u64,

	/// How many players are online right now.
	pub online_players: u64,

	/// How many bans are currently active.
	pub active_bans: u64,

	/// How many mutes are currently active.
	pub active_mutes: u64,
}

/// The server status block of a sync response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
	/// When this sync was processed.
	#[serde(with = "chrono::serde::ts_milliseconds")]
	#[schema(value_type = i64)]
	pub last_sync: DateTime<Utc>,
}

/// Response payload for `POST /sync`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
	/// Always `200`.
	pub status: u16,

	/// Per-player punishment selections.
	pub players: Vec<SyncPlayer>,

	/// Punishments that started since the last sync, across the whole tenant.
	pub recently_started_punishments: Vec<StartedPunishment>,

	/// Punishments modified since the last sync, across the whole tenant.
	pub recently_modified_punishments: Vec<ModifiedPunishment>,

	/// Notifications for online players. Drained: they will not be sent again.
	pub player_notifications: Vec<PlayerNotifications>,

	/// Tenant statistics.
	pub stats: SyncStats,

	/// The server status block.
	pub server_status: ServerStatus,
}

/// Request payload for `POST /punishment/acknowledge`.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AcknowledgeRequest {
	/// The executed punishment.
	pub punishment_id: PunishmentId,

	/// The player it was executed on.
	pub player_uuid: Uuid,

	/// When the game server executed it.
	#[serde(default, with = "chrono::serde::ts_milliseconds_option")]
	#[schema(value_type = Option<i64>)]
	pub executed_at: Option<DateTime<Utc>>,

	/// Whether execution succeeded.
	pub success: bool,

	/// The error, if execution failed.
	#[serde(default)]
	pub error_message: Option<String>,
}

/// Response payload for `POST /punishment/acknowledge`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AcknowledgeResponse {
	/// Always `200`.
	pub status: u16,

	/// The punishment after the acknowledgement was applied.
	pub punishment: WirePunishment,
}

/// Request payload for `POST /notification/acknowledge`.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationAcknowledgeRequest {
	/// The player whose notifications were delivered.
	pub player_uuid: Uuid,

	/// The delivered notification ids.
	#[serde(default)]
	pub notification_ids: Vec<Uuid>,
}

/// A bare `{status}` response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
	/// The HTTP status, mirrored into the body.
	pub status: u16,
}

impl StatusResponse {
	/// A `200` response body.
	pub const OK: Self = Self { status: 200 };
}
