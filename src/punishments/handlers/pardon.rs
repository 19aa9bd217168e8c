//! HTTP handlers for `POST /punishment/{id}/pardon` and `POST /player/pardon`.

use axum::extract::Path;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::Tenant;
use crate::punishments::{engine, Punishment, PunishmentId};
use crate::settings::PunishmentKind;
use crate::{Error, Result, State};

/// Request payload for pardoning a punishment by id.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PardonRequest {
	/// Who issues the pardon.
	pub issuer_name: String,

	/// The kind the caller believes the punishment to be; mismatches are rejected.
	#[serde(default)]
	pub expected_type: Option<PunishmentKind>,

	/// Why the punishment is pardoned.
	#[serde(default, deserialize_with = "crate::serde::string::deserialize_empty_as_none")]
	pub reason: Option<String>,
}

/// Response payload after a pardon.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PardonedPunishment {
	/// Always `200`.
	pub status: u16,

	/// The pardoned player.
	pub player_uuid: Uuid,

	/// The punishment after the pardon was applied.
	pub punishment: Punishment,
}

/// Pardon a punishment by id.
#[tracing::instrument(skip(state, tenant, request), fields(server = %tenant.server_name))]
#[utoipa::path(
  post,
  path = "/punishment/{id}/pardon",
  tag = "Punishments",
  security(("API Key" = [])),
  params(("id" = String, Path, description = "the punishment id")),
  request_body = PardonRequest,
  responses(
    (status = 200, body = PardonedPunishment),
    (status = 400, description = "the punishment is not of the expected kind"),
    (status = 401, description = "missing or invalid API key"),
    (status = 404, description = "no such punishment"),
    (status = 409, description = "the punishment is already pardoned"),
  ),
)]
pub async fn by_id(
	state: State,
	tenant: Tenant,
	Path(id): Path<PunishmentId>,
	Json(request): Json<PardonRequest>,
) -> Result<Json<PardonedPunishment>> {
	if request.issuer_name.trim().is_empty() {
		return Err(Error::invalid("issuerName"));
	}

	let registry = state
		.punishment_types
		.get(&tenant.server_name, &tenant.db)
		.await;

	let (player_uuid, punishment) = engine::pardon_by_id(
		&tenant.db,
		&registry,
		&id,
		request.expected_type,
		&request.issuer_name,
		request.reason,
		Utc::now(),
	)
	.await?;

	Ok(Json(PardonedPunishment {
		status: 200,
		player_uuid,
		punishment,
	}))
}

/// Request payload for pardoning by player name and kind.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PardonByNameRequest {
	/// The player whose punishment to pardon.
	pub username: String,

	/// Which kind of punishment to pardon.
	#[serde(rename = "type")]
	pub kind: PunishmentKind,

	/// Who issues the pardon.
	pub issuer_name: String,

	/// Why the punishment is pardoned.
	#[serde(default, deserialize_with = "crate::serde::string::deserialize_empty_as_none")]
	pub reason: Option<String>,
}

/// Pardon a player's single active punishment of the given kind.
#[tracing::instrument(skip(state, tenant, request), fields(server = %tenant.server_name, player = %request.username))]
#[utoipa::path(
  post,
  path = "/player/pardon",
  tag = "Punishments",
  security(("API Key" = [])),
  request_body = PardonByNameRequest,
  responses(
    (status = 200, body = PardonedPunishment),
    (status = 401, description = "missing or invalid API key"),
    (status = 404, description = "no such player, or no active punishment of that kind"),
    (status = 409, description = "the punishment is already pardoned"),
  ),
)]
pub async fn by_name(
	state: State,
	tenant: Tenant,
	Json(request): Json<PardonByNameRequest>,
) -> Result<Json<PardonedPunishment>> {
	if request.issuer_name.trim().is_empty() {
		return Err(Error::invalid("issuerName"));
	}

	let registry = state
		.punishment_types
		.get(&tenant.server_name, &tenant.db)
		.await;

	let (player_uuid, punishment) = engine::pardon_by_name(
		&tenant.db,
		&registry,
		&request.username,
		request.kind,
		&request.issuer_name,
		request.reason,
		Utc::now(),
	)
	.await?;

	Ok(Json(PardonedPunishment {
		status: 200,
		player_uuid,
		punishment,
	}))
}
