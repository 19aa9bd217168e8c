//! HTTP handler for `POST /sync`.

use std::collections::HashSet;

use axum::Json;
use chrono::{Duration, Utc};
use itertools::Itertools;
use uuid::Uuid;

use crate::auth::Tenant;
use crate::settings::PunishmentKind;
use crate::sync::selection::{self, KICK_LOGIN_WINDOW_MS};
use crate::sync::{
	ModifiedPunishment, PlayerNotifications, ServerStatus, StartedPunishment, SyncPlayer,
	SyncRequest, SyncResponse, SyncStats,
};
use crate::{Result, State};

/// The periodic sync: presence flags, punishment selections, deltas and notifications.
///
/// Game servers call this every few seconds; everything they need to enforce arrives through
/// here or through `/player/login`.
#[tracing::instrument(skip(state, tenant, request), fields(server = %tenant.server_name, online = request.online_players.len()))]
#[utoipa::path(
  post,
  path = "/sync",
  tag = "Sync",
  security(("API Key" = [])),
  request_body = SyncRequest,
  responses(
    (status = 200, body = SyncResponse),
    (status = 401, description = "missing or invalid API key"),
    (status = 503, description = "tenant datastore unavailable"),
  ),
)]
pub async fn sync(
	state: State,
	tenant: Tenant,
	Json(request): Json<SyncRequest>,
) -> Result<Json<SyncResponse>> {
	let now = Utc::now();
	let since = request
		.last_sync_timestamp
		.unwrap_or_else(|| now - Duration::milliseconds(KICK_LOGIN_WINDOW_MS));

	let registry = state
		.punishment_types
		.get(&tenant.server_name, &tenant.db)
		.await;

	let online: HashSet<Uuid> = request
		.online_players
		.iter()
		.map(|player| player.uuid)
		.collect();

	let players = tenant.db.all_players().await?;

	// Presence: everyone the game server did not list goes offline (with lastSeen), the
	// listed set goes (or stays) online. Only players whose flags actually change are
	// written back, except that online players always refresh lastSeen so crash recovery
	// can account their playtime.
	for player in &players {
		let is_online = online.contains(&player.minecraft_uuid);

		if !is_online && !player.data.is_online {
			continue;
		}

		let result = tenant
			.db
			.update_player(player.minecraft_uuid, |player| {
				player.data.is_online = online.contains(&player.minecraft_uuid);
				player.data.last_seen = Some(now);

				Ok(())
			})
			.await;

		if let Err(error) = result {
			tracing::warn! {
				player = %player.minecraft_uuid,
				%error,
				"failed to update presence during sync",
			};
		}
	}

	// Per-player selections for the online set.
	let sync_players = players
		.iter()
		.filter(|player| online.contains(&player.minecraft_uuid))
		.map(|player| SyncPlayer {
			uuid: player.minecraft_uuid,
			punishments: selection::select_punishments(player, &registry, since, now)
				.into_iter()
				.map(|punishment| selection::to_wire(punishment, &registry, now))
				.collect(),
		})
		.filter(|player| !player.punishments.is_empty())
		.collect_vec();

	// Tenant-wide deltas since the last sync.
	let mut recently_started = Vec::new();
	let mut recently_modified = Vec::new();

	for player in &players {
		for punishment in &player.punishments {
			if let Some(started) = punishment.started {
				if started >= since {
					recently_started.push(StartedPunishment {
						player_uuid: player.minecraft_uuid,
						started,
						punishment: selection::to_wire(punishment, &registry, now),
					});
				}
			}

			let recent_modifications = punishment
				.modifications
				.iter()
				.filter(|modification| modification.issued >= since)
				.cloned()
				.sorted_by_key(|modification| modification.issued)
				.collect_vec();

			if !recent_modifications.is_empty() {
				let effective = punishment.effective_state(now);

				recently_modified.push(ModifiedPunishment {
					player_uuid: player.minecraft_uuid,
					punishment_id: punishment.id.clone(),
					modifications: recent_modifications,
					effective_active: effective.active,
					effective_expiry: effective.expiry,
				});
			}
		}
	}

	// Drain pending notifications for everyone online.
	let mut player_notifications = Vec::new();

	for player in &players {
		if !online.contains(&player.minecraft_uuid) {
			continue;
		}

		if player.pending_notifications.is_empty() {
			continue;
		}

		let drained = tenant
			.db
			.update_player(player.minecraft_uuid, |player| {
				Ok(player.drain_notifications())
			})
			.await;

		match drained {
			Ok(notifications) if !notifications.is_empty() => {
				player_notifications.push(PlayerNotifications {
					uuid: player.minecraft_uuid,
					notifications,
				});
			}
			Ok(_) => {}
			Err(error) => {
				tracing::warn! {
					player = %player.minecraft_uuid,
					%error,
					"failed to drain notifications during sync",
				};
			}
		}
	}

	let stats = SyncStats {
		total_players: players.len().try_into().unwrap_or(u64::MAX),
		online_players: online.len().try_into().unwrap_or(u64::MAX),
		active_bans: players
			.iter()
			.flat_map(|player| &player.punishments)
			.filter(|punishment| {
				registry.kind_of(punishment.type_ordinal) == PunishmentKind::Ban
					&& punishment.is_active(now)
			})
			.count()
			.try_into()
			.unwrap_or(u64::MAX),
		active_mutes: players
			.iter()
			.flat_map(|player| &player.punishments)
			.filter(|punishment| {
				registry.kind_of(punishment.type_ordinal) == PunishmentKind::Mute
					&& punishment.is_active(now)
			})
			.count()
			.try_into()
			.unwrap_or(u64::MAX),
	};

	Ok(Json(SyncResponse {
		status: 200,
		players: sync_players,
		recently_started_punishments: recently_started,
		recently_modified_punishments: recently_modified,
		player_notifications,
		stats,
		server_status: ServerStatus { last_sync: now },
	}))
}
