//! HTTP handlers for the player routes on the Minecraft surface.

use axum::extract::{Path, Query};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::Tenant;
use crate::players::{Note, Player};
use crate::punishments::status::{self, PlayerStatus};
use crate::settings::PunishmentKind;
use crate::sync::StatusResponse;
use crate::{Error, Result, State};

/// A full player profile: the aggregate plus its derived status.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProfile {
	/// The player record.
	#[serde(flatten)]
	pub player: Player,

	/// The player's derived status.
	pub status: PlayerStatus,
}

/// Query parameters for `GET /player`.
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct GetParams {
	/// The player's Minecraft UUID.
	pub minecraft_uuid: Uuid,
}

/// Fetch a full player profile by UUID.
#[tracing::instrument(skip(state, tenant), fields(server = %tenant.server_name))]
#[utoipa::path(
  get,
  path = "/player",
  tag = "Players",
  security(("API Key" = [])),
  params(GetParams),
  responses(
    (status = 200, body = PlayerProfile),
    (status = 401, description = "missing or invalid API key"),
    (status = 404, description = "no such player"),
  ),
)]
pub async fn get(
	state: State,
	tenant: Tenant,
	Query(GetParams { minecraft_uuid }): Query<GetParams>,
) -> Result<Json<PlayerProfile>> {
	let player = tenant.db.require_player(minecraft_uuid).await?;

	let registry = state
		.punishment_types
		.get(&tenant.server_name, &tenant.db)
		.await;

	let status = status::calculate(&player, &registry, Utc::now());

	Ok(Json(PlayerProfile { player, status }))
}

/// Query parameters for `GET /player-name`.
#[derive(Debug, Deserialize, IntoParams)]
pub struct GetByNameParams {
	/// The username to look up (case-insensitive).
	pub username: String,
}

/// Fetch a full player profile by username.
///
/// If several players have carried the name, the one who connected most recently wins.
#[tracing::instrument(skip(state, tenant), fields(server = %tenant.server_name))]
#[utoipa::path(
  get,
  path = "/player-name",
  tag = "Players",
  security(("API Key" = [])),
  params(GetByNameParams),
  responses(
    (status = 200, body = PlayerProfile),
    (status = 401, description = "missing or invalid API key"),
    (status = 404, description = "no such player"),
  ),
)]
pub async fn get_by_name(
	state: State,
	tenant: Tenant,
	Query(GetByNameParams { username }): Query<GetByNameParams>,
) -> Result<Json<PlayerProfile>> {
	let player = tenant
		.db
		.find_player_by_username(&username)
		.await?
		.ok_or_else(|| Error::not_found("player"))?;

	let registry = state
		.punishment_types
		.get(&tenant.server_name, &tenant.db)
		.await;

	let status = status::calculate(&player, &registry, Utc::now());

	Ok(Json(PlayerProfile { player, status }))
}

/// One linked account in a linked-accounts response.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LinkedAccount {
	/// The linked account's Minecraft UUID.
	pub minecraft_uuid: Uuid,

	/// The linked account's current username, if the record still exists.
	pub username: Option<String>,

	/// How many bans are currently active on the linked account.
	pub active_bans: u64,

	/// How many mutes are currently active on the linked account.
	pub active_mutes: u64,
}

/// Fetch the accounts linked to a player.
#[tracing::instrument(skip(state, tenant), fields(server = %tenant.server_name))]
#[utoipa::path(
  get,
  path = "/player/{uuid}/linked-accounts",
  tag = "Players",
  security(("API Key" = [])),
  params(("uuid" = Uuid, Path, description = "the player's Minecraft UUID")),
  responses(
    (status = 200, body = Vec<LinkedAccount>),
    (status = 401, description = "missing or invalid API key"),
    (status = 404, description = "no such player"),
  ),
)]
pub async fn linked_accounts(
	state: State,
	tenant: Tenant,
	Path(uuid): Path<Uuid>,
) -> Result<Json<Vec<LinkedAccount>>> {
	let player = tenant.db.require_player(uuid).await?;
	let now = Utc::now();

	let registry = state
		.punishment_types
		.get(&tenant.server_name, &tenant.db)
		.await;

	let records = futures::future::try_join_all(
		player
			.data
			.linked_accounts
			.iter()
			.map(|linked_uuid| tenant.db.get_player(*linked_uuid)),
	)
	.await?;

	let mut linked = Vec::with_capacity(player.data.linked_accounts.len());

	for (linked_uuid, record) in player.data.linked_accounts.iter().zip(records) {
		let (username, active_bans, active_mutes) = match &record {
			Some(linked_player) => {
				let bans = linked_player
					.punishments
					.iter()
					.filter(|punishment| {
						registry.kind_of(punishment.type_ordinal) == PunishmentKind::Ban
							&& punishment.is_active(now)
					})
					.count();

				let mutes = linked_player
					.punishments
					.iter()
					.filter(|punishment| {
						registry.kind_of(punishment.type_ordinal) == PunishmentKind::Mute
							&& punishment.is_active(now)
					})
					.count();

				(
					linked_player.current_username().map(str::to_owned),
					bans.try_into().unwrap_or(u64::MAX),
					mutes.try_into().unwrap_or(u64::MAX),
				)
			}
			None => (None, 0, 0),
		};

		linked.push(LinkedAccount {
			minecraft_uuid: *linked_uuid,
			username,
			active_bans,
			active_mutes,
		});
	}

	Ok(Json(linked))
}

/// Request payload for adding a note from in-game.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewNote {
	/// The player to annotate.
	pub minecraft_uuid: Uuid,

	/// Who writes the note.
	pub issuer_name: String,

	/// The note text.
	pub text: String,
}

/// Add a note to a player from in-game.
#[tracing::instrument(skip(tenant, note), fields(server = %tenant.server_name, player = %note.minecraft_uuid))]
#[utoipa::path(
  post,
  path = "/player/note/create",
  tag = "Players",
  security(("API Key" = [])),
  request_body = NewNote,
  responses(
    (status = 200, body = StatusResponse),
    (status = 400, description = "empty note"),
    (status = 401, description = "missing or invalid API key"),
    (status = 404, description = "no such player"),
  ),
)]
pub async fn create_note(
	tenant: Tenant,
	Json(note): Json<NewNote>,
) -> Result<Json<StatusResponse>> {
	if note.text.trim().is_empty() {
		return Err(Error::invalid("text"));
	}

	let now = Utc::now();

	tenant
		.db
		.update_player(note.minecraft_uuid, |player| {
			player.notes.push(Note {
				text: note.text.clone(),
				issuer_name: note.issuer_name.clone(),
				date: now,
			});

			Ok(())
		})
		.await?;

	Ok(Json(StatusResponse::OK))
}
