//! HTTP handlers for the `/players` routes on the panel surface.

use axum::extract::{Path, Query};
use axum::Json;
use chrono::Utc;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::audit::{self, LogLevel};
use crate::auth::{Role, Session};
use crate::players::{Note, Player};
use crate::punishments::engine::{self, CreateDynamic, CreateManual};
use crate::punishments::status::{self, PlayerStatus};
use crate::punishments::{
	Evidence, Modification, ModificationType, Punishment, PunishmentId,
};
use crate::responses::Created;
use crate::settings::{OffenseLevel, Severity, FIRST_DYNAMIC_ORDINAL};
use crate::time::Millis;
use crate::{Error, Result, State};

/// A condensed player for list views.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSummary {
	/// The player's Minecraft UUID.
	pub minecraft_uuid: Uuid,

	/// The player's current username.
	pub username: Option<String>,

	/// Whether the player is currently online.
	pub is_online: bool,

	/// How many punishments the player has on record.
	pub punishment_count: usize,
}

impl From<&Player> for PlayerSummary {
	fn from(player: &Player) -> Self {
		Self {
			minecraft_uuid: player.minecraft_uuid,
			username: player.current_username().map(str::to_owned),
			is_online: player.data.is_online,
			punishment_count: player.punishments.len(),
		}
	}
}

/// Query parameters for `GET /players`.
#[derive(Debug, Deserialize, IntoParams)]
pub struct GetParams {
	/// Filter by username prefix (case-insensitive).
	#[serde(default)]
	pub search: Option<String>,

	/// Maximum number of results to return.
	#[serde(default = "GetParams::default_limit")]
	pub limit: i64,

	/// Pagination offset.
	#[serde(default)]
	pub offset: i64,
}

impl GetParams {
	/// The default result limit.
	const fn default_limit() -> i64 {
		50
	}
}

/// Fetch players, optionally filtered by a username prefix.
#[tracing::instrument(skip(session), fields(server = %session.server_name))]
#[utoipa::path(
  get,
  path = "/players",
  tag = "Players",
  params(GetParams),
  responses(
    (status = 200, body = Vec<PlayerSummary>),
    (status = 401, description = "not logged in"),
  ),
)]
pub async fn get_many(
	session: Session,
	Query(GetParams {
		search,
		limit,
		offset,
	}): Query<GetParams>,
) -> Result<Json<Vec<PlayerSummary>>> {
	let players = session
		.db
		.search_players(search.as_deref(), limit.clamp(1, 500), offset.max(0))
		.await?;

	if players.is_empty() {
		return Err(Error::no_content());
	}

	Ok(Json(players.iter().map(PlayerSummary::from).collect_vec()))
}

/// A full player profile: the aggregate plus its derived status.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PanelPlayerProfile {
	/// The player record.
	#[serde(flatten)]
	pub player: Player,

	/// The player's derived status.
	pub status: PlayerStatus,
}

/// Fetch a full player profile.
#[tracing::instrument(skip(state, session), fields(server = %session.server_name))]
#[utoipa::path(
  get,
  path = "/players/{uuid}",
  tag = "Players",
  params(("uuid" = Uuid, Path, description = "the player's Minecraft UUID")),
  responses(
    (status = 200, body = PanelPlayerProfile),
    (status = 401, description = "not logged in"),
    (status = 404, description = "no such player"),
  ),
)]
pub async fn get_single(
	state: State,
	session: Session,
	Path(uuid): Path<Uuid>,
) -> Result<Json<PanelPlayerProfile>> {
	let player = session.db.require_player(uuid).await?;

	let registry = state
		.punishment_types
		.get(&session.server_name, &session.db)
		.await;

	let status = status::calculate(&player, &registry, Utc::now());

	Ok(Json(PanelPlayerProfile { player, status }))
}

/// Request payload for issuing a punishment from the panel.
///
/// The ordinal decides whether the manual or the dynamic creation path runs.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PanelNewPunishment {
	/// The punishment type's ordinal.
	pub type_ordinal: u32,

	/// Why the player is punished; becomes the first note.
	pub reason: String,

	/// How long the punishment lasts (manual types only); omitted means permanent.
	#[serde(default)]
	pub duration: Option<Millis>,

	/// The severity (dynamic types only).
	#[serde(default)]
	pub severity: Option<Severity>,

	/// The offence tier to sentence at (dynamic types only).
	#[serde(default)]
	pub status: Option<OffenseLevel>,

	/// Initial evidence.
	#[serde(default)]
	pub evidence: Option<Evidence>,

	/// Whether the punishment propagates to linked accounts.
	#[serde(default)]
	pub alt_blocking: bool,

	/// Whether the player's stats are wiped when the punishment expires.
	#[serde(default)]
	pub wipe_after_expiry: bool,
}

/// Issue a punishment from the panel.
#[tracing::instrument(skip(state, session, request), fields(server = %session.server_name, player = %uuid))]
#[utoipa::path(
  post,
  path = "/players/{uuid}/punishments",
  tag = "Players",
  params(("uuid" = Uuid, Path, description = "the player's Minecraft UUID")),
  request_body = PanelNewPunishment,
  responses(
    (status = 201, body = Punishment),
    (status = 401, description = "not logged in"),
    (status = 403, description = "requires the Moderator role"),
    (status = 404, description = "no such player"),
    (status = 409, description = "the player already has an active mute"),
  ),
)]
pub async fn create_punishment(
	state: State,
	session: Session,
	Path(uuid): Path<Uuid>,
	Json(request): Json<PanelNewPunishment>,
) -> Result<Created<Json<Punishment>>> {
	session.require(Role::Moderator)?;

	let registry = state
		.punishment_types
		.get(&session.server_name, &session.db)
		.await;

	let issuer_name = session
		.staff
		.assigned_minecraft_username
		.clone()
		.unwrap_or_else(|| session.staff.username.clone());

	let now = Utc::now();

	let punishment = if request.type_ordinal < FIRST_DYNAMIC_ORDINAL {
		engine::create_manual(
			&session.db,
			&registry,
			uuid,
			CreateManual {
				issuer_name,
				type_ordinal: request.type_ordinal,
				reason: request.reason,
				duration: request.duration,
				evidence: request.evidence,
				alt_blocking: request.alt_blocking,
				wipe_after_expiry: request.wipe_after_expiry,
				attached_ticket_ids: Vec::new(),
			},
			now,
		)
		.await?
	} else {
		engine::create_dynamic(
			&session.db,
			&registry,
			uuid,
			CreateDynamic {
				issuer_name,
				type_ordinal: request.type_ordinal,
				reason: request.reason,
				severity: request.severity,
				status: request.status,
				evidence: request.evidence,
				alt_blocking: request.alt_blocking,
				wipe_after_expiry: request.wipe_after_expiry,
				attached_ticket_ids: Vec::new(),
			},
			now,
		)
		.await?
	};

	Ok(Created(Json(punishment)))
}

/// Request payload for adding a note from the panel.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PanelNewNote {
	/// The note text.
	pub text: String,
}

/// Add a note to a player.
#[tracing::instrument(skip(session, note), fields(server = %session.server_name, player = %uuid))]
#[utoipa::path(
  post,
  path = "/players/{uuid}/notes",
  tag = "Players",
  params(("uuid" = Uuid, Path, description = "the player's Minecraft UUID")),
  request_body = PanelNewNote,
  responses(
    (status = 201, body = Note),
    (status = 401, description = "not logged in"),
    (status = 403, description = "requires the Moderator role"),
    (status = 404, description = "no such player"),
  ),
)]
pub async fn create_note(
	session: Session,
	Path(uuid): Path<Uuid>,
	Json(note): Json<PanelNewNote>,
) -> Result<Created<Json<Note>>> {
	session.require(Role::Moderator)?;

	if note.text.trim().is_empty() {
		return Err(Error::invalid("text"));
	}

	let new_note = Note {
		text: note.text,
		issuer_name: session.staff.username.clone(),
		date: Utc::now(),
	};

	let saved = new_note.clone();

	session
		.db
		.update_player(uuid, move |player| {
			player.notes.push(new_note.clone());

			Ok(())
		})
		.await?;

	Ok(Created(Json(saved)))
}

/// Request payload for appending a modification to a punishment.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewModification {
	/// What kind of modification to append.
	#[serde(rename = "type")]
	pub kind: ModificationType,

	/// The new duration, for duration changes. `0` and `-1` mean permanent.
	#[serde(default)]
	pub effective_duration: Option<Millis>,

	/// Why the modification is made.
	#[serde(default, deserialize_with = "crate::serde::string::deserialize_empty_as_none")]
	pub reason: Option<String>,
}

/// Append a modification to a punishment.
///
/// Duration changes require `effectiveDuration`; pardons are rejected if the punishment
/// already carries one.
#[tracing::instrument(skip(session, request), fields(server = %session.server_name, player = %uuid))]
#[utoipa::path(
  post,
  path = "/players/{uuid}/punishments/{id}/modifications",
  tag = "Players",
  params(
    ("uuid" = Uuid, Path, description = "the player's Minecraft UUID"),
    ("id" = String, Path, description = "the punishment id"),
  ),
  request_body = NewModification,
  responses(
    (status = 201, body = Punishment),
    (status = 400, description = "a duration change without a duration"),
    (status = 401, description = "not logged in"),
    (status = 403, description = "requires the Moderator role"),
    (status = 404, description = "no such player or punishment"),
    (status = 409, description = "the punishment is already pardoned"),
  ),
)]
pub async fn add_modification(
	session: Session,
	Path((uuid, id)): Path<(Uuid, PunishmentId)>,
	Json(request): Json<NewModification>,
) -> Result<Created<Json<Punishment>>> {
	session.require(Role::Moderator)?;

	let needs_duration = matches!(
		request.kind,
		ModificationType::ManualDurationChange | ModificationType::AppealDurationChange
	);

	if needs_duration && request.effective_duration.is_none() {
		return Err(Error::invalid("effectiveDuration"));
	}

	let now = Utc::now();
	let staff_name = session.staff.username.clone();

	let punishment = session
		.db
		.update_player(uuid, |player| {
			let punishment = player
				.punishment_mut(&id)
				.ok_or_else(|| Error::not_found("punishment"))?;

			if request.kind.is_pardon() && punishment.is_pardoned() {
				return Err(Error::already_pardoned(punishment.id.clone()));
			}

			punishment.add_modification(Modification {
				kind: request.kind,
				issuer_name: staff_name.clone(),
				issued: now,
				effective_duration: request.effective_duration,
				reason: request.reason.clone(),
			});

			Ok(punishment.clone())
		})
		.await?;

	audit::record(
		&session.db,
		LogLevel::Moderation,
		session.staff.username.clone(),
		format!(
			"appended {kind:?} to punishment {id} of {uuid}",
			kind = request.kind,
			id = punishment.id,
		),
		Some(serde_json::json!({
			"punishmentId": punishment.id,
			"playerUuid": uuid,
			"effectiveDuration": request.effective_duration,
		})),
		now,
	)
	.await;

	Ok(Created(Json(punishment)))
}

/// Request payload for attaching evidence to a punishment.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewEvidence {
	/// The evidence to attach.
	pub evidence: Evidence,
}

/// Attach evidence to a punishment.
#[tracing::instrument(skip(session, request), fields(server = %session.server_name, player = %uuid))]
#[utoipa::path(
  post,
  path = "/players/{uuid}/punishments/{id}/evidence",
  tag = "Players",
  params(
    ("uuid" = Uuid, Path, description = "the player's Minecraft UUID"),
    ("id" = String, Path, description = "the punishment id"),
  ),
  request_body = NewEvidence,
  responses(
    (status = 201, body = Punishment),
    (status = 401, description = "not logged in"),
    (status = 403, description = "requires the Moderator role"),
    (status = 404, description = "no such player or punishment"),
  ),
)]
pub async fn add_evidence(
	session: Session,
	Path((uuid, id)): Path<(Uuid, PunishmentId)>,
	Json(request): Json<NewEvidence>,
) -> Result<Created<Json<Punishment>>> {
	session.require(Role::Moderator)?;

	let punishment = session
		.db
		.update_player(uuid, |player| {
			let punishment = player
				.punishment_mut(&id)
				.ok_or_else(|| Error::not_found("punishment"))?;

			punishment.evidence.push(request.evidence.clone());

			Ok(punishment.clone())
		})
		.await?;

	Ok(Created(Json(punishment)))
}
