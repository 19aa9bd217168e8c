//! The punishment engine.
//!
//! Creation (manual and dynamic), pardons, game-server acknowledgements and login-driven
//! auto-unbans all live here. Handlers and background jobs call into these functions; none of
//! them ever bypasses the aggregate-level compare-and-swap of the player store.

use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::audit::{self, LogLevel};
use crate::database::Datastore;
use crate::players::Note;
use crate::punishments::{
	Evidence, Modification, ModificationType, Punishment, PunishmentData, PunishmentId,
};
use crate::settings::{
	OffenseLevel, PunishmentKind, Severity, TypeRegistry, FIRST_DYNAMIC_ORDINAL,
};
use crate::time::Millis;
use crate::{Error, Result};

use super::status;

/// A request to create a manual punishment (ordinals `0`–`5`).
#[derive(Debug, Clone)]
pub struct CreateManual {
	/// Who issues the punishment.
	pub issuer_name: String,

	/// The manual ordinal.
	pub type_ordinal: u32,

	/// The reason; becomes the first note.
	pub reason: String,

	/// How long the punishment lasts. `None` and `-1` both mean permanent.
	pub duration: Option<Millis>,

	/// Initial evidence.
	pub evidence: Option<Evidence>,

	/// Whether the punishment propagates to linked accounts.
	pub alt_blocking: bool,

	/// Whether the player's stats are wiped when the punishment expires.
	pub wipe_after_expiry: bool,

	/// Tickets to attach.
	pub attached_ticket_ids: Vec<String>,
}

/// A request to create a dynamic punishment (ordinals `≥ 6`).
#[derive(Debug, Clone)]
pub struct CreateDynamic {
	/// Who issues the punishment.
	pub issuer_name: String,

	/// The dynamic ordinal.
	pub type_ordinal: u32,

	/// The reason; becomes the first note.
	pub reason: String,

	/// The severity; defaults to `regular`.
	pub severity: Option<Severity>,

	/// The offence tier to sentence at; defaults to the player's derived tier.
	pub status: Option<OffenseLevel>,

	/// Initial evidence.
	pub evidence: Option<Evidence>,

	/// Whether the punishment propagates to linked accounts.
	pub alt_blocking: bool,

	/// Whether the player's stats are wiped when the punishment expires.
	pub wipe_after_expiry: bool,

	/// Tickets to attach.
	pub attached_ticket_ids: Vec<String>,
}

/// Creates a manual punishment on `target`.
///
/// Fails with a conflict if a mute is requested while the player already has one that is (or
/// will become) active.
#[tracing::instrument(skip(db, registry, request), fields(ordinal = request.type_ordinal))]
pub async fn create_manual(
	db: &Datastore,
	registry: &TypeRegistry,
	target: Uuid,
	request: CreateManual,
	now: DateTime<Utc>,
) -> Result<Punishment> {
	if request.type_ordinal >= FIRST_DYNAMIC_ORDINAL {
		return Err(Error::invalid("ordinal: manual punishments use ordinals 0-5"));
	}

	if request.reason.trim().is_empty() {
		return Err(Error::invalid("reason"));
	}

	let mut punishment = new_punishment(
		&request.issuer_name,
		request.type_ordinal,
		&request.reason,
		request.evidence.clone(),
		request.attached_ticket_ids.clone(),
		now,
	);

	punishment.data.duration = Some(request.duration.unwrap_or(Millis::PERMANENT));

	if request.alt_blocking {
		punishment.data.alt_blocking = Some(true);
	}

	if request.wipe_after_expiry {
		punishment.data.wipe_after_expiry = Some(true);
	}

	let punishment = append_punishment(db, registry, target, punishment, now).await?;

	audit_creation(db, registry, target, &punishment, "manual", now).await;

	Ok(punishment)
}

/// Creates a dynamic punishment on `target`.
///
/// The duration is selected from the type's duration matrix using the requested severity
/// (default `regular`) and the requested offence tier (default: the player's derived tier for
/// the type's category). Severity, tier and the resulting duration are recorded in the
/// punishment's data; the tier is set once here and never updated afterwards.
#[tracing::instrument(skip(db, registry, request), fields(ordinal = request.type_ordinal))]
pub async fn create_dynamic(
	db: &Datastore,
	registry: &TypeRegistry,
	target: Uuid,
	request: CreateDynamic,
	now: DateTime<Utc>,
) -> Result<Punishment> {
	if request.type_ordinal < FIRST_DYNAMIC_ORDINAL {
		return Err(Error::invalid("ordinal: dynamic punishments use ordinals >= 6"));
	}

	let config = registry
		.by_ordinal(request.type_ordinal)
		.ok_or_else(|| Error::unknown_ordinal(request.type_ordinal))?;

	let player = db.require_player(target).await?;
	let player_status = status::calculate(&player, registry, now);

	let severity = request.severity.unwrap_or_default();
	let level = request
		.status
		.unwrap_or_else(|| player_status.relevant_tier(config.category));

	let duration = config
		.duration_for(severity, level)
		.ok_or_else(|| Error::invalid("punishment type: no duration configured"))?;

	let mut punishment = new_punishment(
		&request.issuer_name,
		request.type_ordinal,
		&request.reason,
		request.evidence.clone(),
		request.attached_ticket_ids.clone(),
		now,
	);

	punishment.data.duration = Some(duration);
	punishment.data.severity = Some(severity);
	punishment.data.status = Some(level);

	if request.alt_blocking && config.can_be_alt_blocking {
		punishment.data.alt_blocking = Some(true);
	}

	if request.wipe_after_expiry && config.can_be_stat_wiping {
		punishment.data.wipe_after_expiry = Some(true);
	}

	let punishment = append_punishment(db, registry, target, punishment, now).await?;

	audit_creation(db, registry, target, &punishment, "dynamic", now).await;

	Ok(punishment)
}

/// Pardons a punishment by id.
///
/// `expected_kind`, if given, must match the punishment's actual kind; this protects
/// `/punishment/{id}/pardon` callers that believe they are pardoning a ban from accidentally
/// pardoning a mute with a mistyped id.
#[tracing::instrument(skip(db, registry))]
pub async fn pardon_by_id(
	db: &Datastore,
	registry: &TypeRegistry,
	punishment_id: &PunishmentId,
	expected_kind: Option<PunishmentKind>,
	issuer_name: &str,
	reason: Option<String>,
	now: DateTime<Utc>,
) -> Result<(Uuid, Punishment)> {
	let player = db
		.find_player_by_punishment_id(punishment_id)
		.await?
		.ok_or_else(|| Error::not_found("punishment"))?;

	let target = player.minecraft_uuid;
	let punishment_id = punishment_id.clone();
	let issuer = issuer_name.to_owned();

	let punishment = db
		.update_player(target, move |player| {
			let punishment = player
				.punishment_mut(&punishment_id)
				.ok_or_else(|| Error::not_found("punishment"))?;

			if let Some(expected) = expected_kind {
				if registry.kind_of(punishment.type_ordinal) != expected {
					return Err(Error::invalid(format_args!(
						"punishment `{punishment_id}` is not a {expected}"
					)));
				}
			}

			apply_pardon(punishment, ModificationType::ManualPardon, &issuer, reason.clone(), now)?;

			Ok(punishment.clone())
		})
		.await?;

	audit_pardon(db, registry, target, &punishment, issuer_name, now).await;

	Ok((target, punishment))
}

/// Pardons a player's single active punishment of the given kind (by username).
#[tracing::instrument(skip(db, registry))]
pub async fn pardon_by_name(
	db: &Datastore,
	registry: &TypeRegistry,
	username: &str,
	kind: PunishmentKind,
	issuer_name: &str,
	reason: Option<String>,
	now: DateTime<Utc>,
) -> Result<(Uuid, Punishment)> {
	let player = db
		.find_player_by_username(username)
		.await?
		.ok_or_else(|| Error::not_found("player"))?;

	let target_id = player
		.punishments
		.iter()
		.filter(|punishment| registry.kind_of(punishment.type_ordinal) == kind)
		.filter(|punishment| punishment.is_active(now))
		.min_by_key(|punishment| punishment.issued)
		.map(|punishment| punishment.id.clone())
		.ok_or_else(|| Error::not_found(format_args!("active {kind}")))?;

	pardon_by_id(db, registry, &target_id, Some(kind), issuer_name, reason, now).await
}

/// What a game server reports after (attempting to) execute a punishment.
#[derive(Debug, Clone)]
pub struct Acknowledgement {
	/// The executed punishment.
	pub punishment_id: PunishmentId,

	/// The player it was executed on.
	pub player_uuid: Uuid,

	/// When the game server executed it.
	pub executed_at: Option<DateTime<Utc>>,

	/// Whether execution succeeded.
	pub success: bool,

	/// The error, if execution failed.
	pub error_message: Option<String>,
}

/// Applies a game-server acknowledgement.
///
/// On the first successful acknowledgement the punishment starts: `started` is set and the
/// expiry is derived from `started + duration`. Kicks complete immediately instead of
/// expiring. Repeated successful acknowledgements are no-ops; `started` is never changed once
/// set.
#[tracing::instrument(skip(db, registry))]
pub async fn acknowledge(
	db: &Datastore,
	registry: &TypeRegistry,
	ack: Acknowledgement,
	now: DateTime<Utc>,
) -> Result<Punishment> {
	let kind = {
		let player = db.require_player(ack.player_uuid).await?;
		let punishment = player
			.punishment(&ack.punishment_id)
			.ok_or_else(|| Error::not_found("punishment"))?;

		registry.kind_of(punishment.type_ordinal)
	};

	db.update_player(ack.player_uuid, move |player| {
		let punishment = player
			.punishment_mut(&ack.punishment_id)
			.ok_or_else(|| Error::not_found("punishment"))?;

		if !ack.success {
			punishment.data.execution_failed = Some(true);
			punishment.data.execution_error = ack.error_message.clone();
			punishment.data.execution_attempted_at = Some(now);

			return Ok(punishment.clone());
		}

		punishment.data.executed_on_server = Some(true);
		punishment.data.execution_failed = None;
		punishment.data.execution_error = None;

		// `started` is monotone: the first acknowledgement wins.
		if punishment.started.is_none() {
			let started = ack.executed_at.unwrap_or(now);
			punishment.started = Some(started);

			if kind == PunishmentKind::Kick {
				punishment.data.completed = Some(true);
				punishment.data.completed_at = Some(started);
				punishment.data.active = Some(false);
			} else {
				punishment.data.expires = punishment
					.data
					.duration
					.and_then(|duration| duration.expiry_from(started));
			}
		}

		Ok(punishment.clone())
	})
	.await
}

/// Voids "permanent until username/skin change" punishments after a login that changed either.
///
/// Returns the ids of the punishments that were voided.
#[tracing::instrument(skip(db, registry))]
pub async fn auto_unban_on_login(
	db: &Datastore,
	registry: &TypeRegistry,
	player_uuid: Uuid,
	username_changed: bool,
	skin_changed: bool,
	now: DateTime<Utc>,
) -> Result<Vec<PunishmentId>> {
	if !username_changed && !skin_changed {
		return Ok(Vec::new());
	}

	let username_ordinals = registry.permanent_until_username_change_ordinals();
	let skin_ordinals = registry.permanent_until_skin_change_ordinals();

	if username_ordinals.is_empty() && skin_ordinals.is_empty() {
		return Ok(Vec::new());
	}

	let voided = db
		.update_player(player_uuid, |player| {
			let mut voided = Vec::new();

			for punishment in &mut player.punishments {
				if punishment.started.is_none() || punishment.data.active == Some(false) {
					continue;
				}

				let matches = (username_changed
					&& username_ordinals.contains(&punishment.type_ordinal))
					|| (skin_changed && skin_ordinals.contains(&punishment.type_ordinal));

				if matches {
					punishment.data.active = Some(false);
					punishment.data.unbanned = Some(now);
					voided.push(punishment.id.clone());
				}
			}

			Ok(voided)
		})
		.await?;

	for punishment_id in &voided {
		audit::record(
			db,
			LogLevel::Moderation,
			"system",
			format!("automatically unbanned punishment {punishment_id} after identity change"),
			Some(json!({
				"punishmentId": punishment_id,
				"playerUuid": player_uuid,
				"usernameChanged": username_changed,
				"skinChanged": skin_changed,
			})),
			now,
		)
		.await;
	}

	Ok(voided)
}

/// Builds a fresh punishment record. The reason becomes the first note.
fn new_punishment(
	issuer_name: &str,
	type_ordinal: u32,
	reason: &str,
	evidence: Option<Evidence>,
	attached_ticket_ids: Vec<String>,
	now: DateTime<Utc>,
) -> Punishment {
	Punishment {
		id: PunishmentId::random(),
		issuer_name: issuer_name.to_owned(),
		issued: now,
		started: None,
		type_ordinal,
		modifications: Vec::new(),
		notes: vec![Note {
			text: reason.to_owned(),
			issuer_name: issuer_name.to_owned(),
			date: now,
		}],
		evidence: evidence.into_iter().collect(),
		attached_ticket_ids,
		data: PunishmentData::default(),
	}
}

/// Appends a punishment to the player aggregate, enforcing the single-active-mute invariant.
pub(crate) async fn append_punishment(
	db: &Datastore,
	registry: &TypeRegistry,
	target: Uuid,
	punishment: Punishment,
	now: DateTime<Utc>,
) -> Result<Punishment> {
	let is_mute = registry.kind_of(punishment.type_ordinal) == PunishmentKind::Mute;

	db.update_player(target, move |player| {
		if is_mute {
			let conflicting = player.punishments.iter().any(|existing| {
				registry.kind_of(existing.type_ordinal) == PunishmentKind::Mute
					&& (existing.is_active(now)
						|| (existing.started.is_none()
							&& existing.is_valid_for_execution(now)))
			});

			if conflicting {
				return Err(Error::mute_already_active());
			}
		}

		player.punishments.push(punishment.clone());

		Ok(punishment.clone())
	})
	.await
}

/// Appends a pardon modification and note, rejecting double pardons.
fn apply_pardon(
	punishment: &mut Punishment,
	kind: ModificationType,
	issuer_name: &str,
	reason: Option<String>,
	now: DateTime<Utc>,
) -> Result<()> {
	debug_assert!(kind.is_pardon(), "apply_pardon called with a non-pardon kind");

	if punishment.is_pardoned() {
		return Err(Error::already_pardoned(punishment.id.clone()));
	}

	let note = reason
		.clone()
		.unwrap_or_else(|| format!("Pardoned by {issuer_name}"));

	punishment.add_modification(Modification {
		kind,
		issuer_name: issuer_name.to_owned(),
		issued: now,
		effective_duration: None,
		reason,
	});

	punishment.notes.push(Note {
		text: note,
		issuer_name: issuer_name.to_owned(),
		date: now,
	});

	Ok(())
}

/// Applies an accepted appeal to the underlying punishment.
///
/// Idempotent: if the punishment already carries a pardon, only the appeal bookkeeping fields
/// are (re)written.
pub(crate) async fn apply_appeal_approval(
	db: &Datastore,
	target: Uuid,
	punishment_id: &PunishmentId,
	ticket_id: &str,
	outcome: &str,
	resolved_by: &str,
	now: DateTime<Utc>,
) -> Result<Punishment> {
	let punishment_id = punishment_id.clone();
	let ticket_id = ticket_id.to_owned();
	let outcome = outcome.to_owned();
	let resolved_by = resolved_by.to_owned();

	db.update_player(target, move |player| {
		let punishment = player
			.punishment_mut(&punishment_id)
			.ok_or_else(|| Error::not_found("punishment"))?;

		if !punishment.is_pardoned() {
			apply_pardon(
				punishment,
				ModificationType::AppealAccept,
				&resolved_by,
				Some(format!("Appeal {ticket_id} was {outcome}")),
				now,
			)?;
		}

		punishment.data.active = Some(false);
		punishment.data.appeal_outcome = Some(outcome.clone());
		punishment.data.appeal_ticket_id = Some(ticket_id.clone());

		Ok(punishment.clone())
	})
	.await
}

/// Writes the audit entry for a punishment creation, associating it with a staff record when
/// the issuer's Minecraft username maps to one.
async fn audit_creation(
	db: &Datastore,
	registry: &TypeRegistry,
	target: Uuid,
	punishment: &Punishment,
	flavor: &str,
	now: DateTime<Utc>,
) {
	let staff = db
		.find_staff_by_minecraft_username(&punishment.issuer_name)
		.await
		.ok()
		.flatten();

	let kind = registry.kind_of(punishment.type_ordinal);

	audit::record(
		db,
		LogLevel::Moderation,
		staff
			.as_ref()
			.map_or_else(|| punishment.issuer_name.clone(), |staff| staff.username.clone()),
		format!(
			"issued {flavor} {kind} {id} (ordinal {ordinal}) against {target}: {reason}",
			id = punishment.id,
			ordinal = punishment.type_ordinal,
			reason = punishment.reason().unwrap_or("no reason"),
		),
		Some(json!({
			"punishmentId": punishment.id,
			"playerUuid": target,
			"ordinal": punishment.type_ordinal,
			"duration": punishment.data.duration,
			"issuerName": punishment.issuer_name,
			"staff": staff.map(|staff| staff.username),
			"flavor": flavor,
		})),
		now,
	)
	.await;
}

/// Writes the audit entry for a pardon.
async fn audit_pardon(
	db: &Datastore,
	registry: &TypeRegistry,
	target: Uuid,
	punishment: &Punishment,
	issuer_name: &str,
	now: DateTime<Utc>,
) {
	let kind = registry.kind_of(punishment.type_ordinal);

	audit::record(
		db,
		LogLevel::Moderation,
		issuer_name.to_owned(),
		format!("pardoned {kind} {id} of {target}", id = punishment.id),
		Some(json!({
			"punishmentId": punishment.id,
			"playerUuid": target,
		})),
		now,
	)
	.await;
}
