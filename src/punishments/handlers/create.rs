//! HTTP handlers for `POST /punishment/create` and `POST /punishment/dynamic`.

use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::Tenant;
use crate::punishments::engine::{self, CreateDynamic, CreateManual};
use crate::punishments::{Evidence, Punishment};
use crate::responses::Created;
use crate::settings::{OffenseLevel, Severity, TypeRegistry, FIRST_DYNAMIC_ORDINAL};
use crate::time::Millis;
use crate::{Error, Result, State};

/// Request payload for creating a manual punishment (ordinals `0`–`5`).
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewManualPunishment {
	/// The player to punish.
	pub minecraft_uuid: Uuid,

	/// Who issues the punishment.
	pub issuer_name: String,

	/// The manual type by name (`ban`, `mute`, `kick`, …). Alternative to `type_ordinal`.
	#[serde(rename = "type", default)]
	pub type_name: Option<String>,

	/// The manual type by ordinal. Alternative to `type`.
	#[serde(default)]
	pub type_ordinal: Option<u32>,

	/// Why the player is punished; becomes the first note.
	pub reason: String,

	/// How long the punishment lasts in milliseconds; omitted or `-1` means permanent.
	#[serde(default)]
	pub duration: Option<Millis>,

	/// Initial evidence.
	#[serde(default)]
	pub evidence: Option<Evidence>,

	/// Whether the punishment propagates to linked accounts.
	#[serde(default)]
	pub alt_blocking: bool,

	/// Whether the player's stats are wiped when the punishment expires.
	#[serde(default)]
	pub wipe_after_expiry: bool,

	/// Tickets to attach.
	#[serde(default)]
	pub attached_ticket_ids: Vec<String>,
}

/// Response payload after creating a punishment.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatedPunishment {
	/// Always `201`.
	pub status: u16,

	/// The new punishment.
	pub punishment: Punishment,
}

/// Create a manual punishment.
#[tracing::instrument(skip(state, tenant, request), fields(server = %tenant.server_name, player = %request.minecraft_uuid))]
#[utoipa::path(
  post,
  path = "/punishment/create",
  tag = "Punishments",
  security(("API Key" = [])),
  request_body = NewManualPunishment,
  responses(
    (status = 201, body = CreatedPunishment),
    (status = 400, description = "missing or unknown punishment type"),
    (status = 401, description = "missing or invalid API key"),
    (status = 404, description = "no such player"),
    (status = 409, description = "the player already has an active mute"),
  ),
)]
pub async fn manual(
	state: State,
	tenant: Tenant,
	Json(request): Json<NewManualPunishment>,
) -> Result<Created<Json<CreatedPunishment>>> {
	if request.issuer_name.trim().is_empty() {
		return Err(Error::invalid("issuerName"));
	}

	let registry = state
		.punishment_types
		.get(&tenant.server_name, &tenant.db)
		.await;

	let type_ordinal = match (request.type_ordinal, request.type_name.as_deref()) {
		(Some(ordinal), _) => ordinal,
		(None, Some(name)) => resolve_manual_ordinal(&registry, name)
			.ok_or_else(|| Error::invalid(format_args!("type `{name}`")))?,
		(None, None) => return Err(Error::invalid("type: provide `type` or `type_ordinal`")),
	};

	let punishment = engine::create_manual(
		&tenant.db,
		&registry,
		request.minecraft_uuid,
		CreateManual {
			issuer_name: request.issuer_name,
			type_ordinal,
			reason: request.reason,
			duration: request.duration,
			evidence: request.evidence,
			alt_blocking: request.alt_blocking,
			wipe_after_expiry: request.wipe_after_expiry,
			attached_ticket_ids: request.attached_ticket_ids,
		},
		Utc::now(),
	)
	.await?;

	Ok(Created(Json(CreatedPunishment {
		status: 201,
		punishment,
	})))
}

/// Request payload for creating a dynamic punishment (ordinals `≥ 6`).
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewDynamicPunishment {
	/// The player to punish.
	pub minecraft_uuid: Uuid,

	/// Who issues the punishment.
	pub issuer_name: String,

	/// The dynamic type's ordinal.
	pub type_ordinal: u32,

	/// Why the player is punished; becomes the first note.
	pub reason: String,

	/// The severity; defaults to `regular`.
	#[serde(default)]
	pub severity: Option<Severity>,

	/// The offence tier to sentence at; defaults to the player's derived tier.
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

	/// Tickets to attach.
	#[serde(default)]
	pub attached_ticket_ids: Vec<String>,
}

/// Create a dynamic punishment.
///
/// The stored duration, severity and offence status are derived here (see the punishment
/// engine); the game server only ever supplies the ordinal and, optionally, a severity.
#[tracing::instrument(skip(state, tenant, request), fields(server = %tenant.server_name, player = %request.minecraft_uuid))]
#[utoipa::path(
  post,
  path = "/punishment/dynamic",
  tag = "Punishments",
  security(("API Key" = [])),
  request_body = NewDynamicPunishment,
  responses(
    (status = 201, body = CreatedPunishment),
    (status = 400, description = "unknown ordinal or missing duration matrix"),
    (status = 401, description = "missing or invalid API key"),
    (status = 404, description = "no such player"),
    (status = 409, description = "the player already has an active mute"),
  ),
)]
pub async fn dynamic(
	state: State,
	tenant: Tenant,
	Json(request): Json<NewDynamicPunishment>,
) -> Result<Created<Json<CreatedPunishment>>> {
	if request.issuer_name.trim().is_empty() {
		return Err(Error::invalid("issuerName"));
	}

	if request.reason.trim().is_empty() {
		return Err(Error::invalid("reason"));
	}

	let registry = state
		.punishment_types
		.get(&tenant.server_name, &tenant.db)
		.await;

	let punishment = engine::create_dynamic(
		&tenant.db,
		&registry,
		request.minecraft_uuid,
		CreateDynamic {
			issuer_name: request.issuer_name,
			type_ordinal: request.type_ordinal,
			reason: request.reason,
			severity: request.severity,
			status: request.status,
			evidence: request.evidence,
			alt_blocking: request.alt_blocking,
			wipe_after_expiry: request.wipe_after_expiry,
			attached_ticket_ids: request.attached_ticket_ids,
		},
		Utc::now(),
	)
	.await?;

	Ok(Created(Json(CreatedPunishment {
		status: 201,
		punishment,
	})))
}

/// Resolves a manual type name (`ban`, `mute`, a configured display name) to its ordinal.
fn resolve_manual_ordinal(registry: &TypeRegistry, name: &str) -> Option<u32> {
	match name.to_lowercase().as_str() {
		"kick" => return Some(crate::settings::ORDINAL_KICK),
		"mute" => return Some(crate::settings::ORDINAL_MANUAL_MUTE),
		"ban" => return Some(crate::settings::ORDINAL_MANUAL_BAN),
		"blacklist" => return Some(crate::settings::ORDINAL_BLACKLIST),
		_ => {}
	}

	(0..FIRST_DYNAMIC_ORDINAL)
		.filter_map(|ordinal| registry.by_ordinal(ordinal))
		.find(|config| config.name.eq_ignore_ascii_case(name))
		.map(|config| config.ordinal)
}

#[cfg(test)]
mod tests {
	use super::resolve_manual_ordinal;
	use crate::settings::TypeRegistry;

	#[test]
	fn shorthand_and_display_names_resolve() {
		let registry = TypeRegistry::defaults();

		assert_eq!(resolve_manual_ordinal(&registry, "ban"), Some(2));
		assert_eq!(resolve_manual_ordinal(&registry, "Mute"), Some(1));
		assert_eq!(resolve_manual_ordinal(&registry, "security ban"), Some(3));
		assert_eq!(resolve_manual_ordinal(&registry, "Linked Ban"), Some(4));
		assert_eq!(resolve_manual_ordinal(&registry, "vaporize"), None);
	}
}
