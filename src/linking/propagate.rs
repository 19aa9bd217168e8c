//! Linked-ban propagation.
//!
//! When two accounts become linked, any active alt-blocking ban on one side is mirrored onto
//! the other as an ordinal-4 *linked ban*: unstarted (the game server acknowledges it like any
//! other punishment), carrying a back-reference to the source ban, and lasting for the source's
//! remaining duration. At most one linked ban ever exists per (target, source-ban) pair.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::audit::{self, LogLevel};
use crate::database::Datastore;
use crate::players::Note;
use crate::punishments::{Punishment, PunishmentData, PunishmentId};
use crate::settings::{PunishmentKind, TypeRegistry, ORDINAL_LINKED_BAN};
use crate::time::Millis;
use crate::Result;

/// The issuer name linked bans are created under.
const LINKED_BAN_ISSUER: &str = "System (Linked Ban)";

/// Mirrors `source`'s active alt-blocking bans onto `target`.
pub(crate) async fn propagate_linked_bans(
	db: &Datastore,
	registry: &TypeRegistry,
	source: Uuid,
	target: Uuid,
	now: DateTime<Utc>,
) -> Result<()> {
	let Some(source_player) = db.get_player(source).await? else {
		return Ok(());
	};

	let alt_blocking_bans = source_player
		.punishments
		.iter()
		.filter(|punishment| punishment.data.alt_blocking == Some(true))
		.filter(|punishment| registry.kind_of(punishment.type_ordinal) == PunishmentKind::Ban)
		.filter(|punishment| punishment.is_active(now))
		.collect::<Vec<_>>();

	if alt_blocking_bans.is_empty() {
		return Ok(());
	}

	for source_ban in alt_blocking_bans {
		let remaining = match source_ban.effective_state(now).expiry {
			Some(expiry) => Millis((expiry - now).num_milliseconds()),
			None => Millis::PERMANENT,
		};

		let linked_ban = new_linked_ban(&source_ban.id, remaining, now);
		let source_ban_id = source_ban.id.clone();

		let created = db
			.update_player(target, move |player| {
				// One linked ban per (target, source ban), ever.
				let exists = player.punishments.iter().any(|punishment| {
					punishment.data.linked_ban_id.as_ref() == Some(&source_ban_id)
				});

				if exists {
					return Ok(None);
				}

				player.punishments.push(linked_ban.clone());

				Ok(Some(linked_ban.id.clone()))
			})
			.await?;

		if let Some(created_id) = created {
			audit::record(
				db,
				LogLevel::Moderation,
				"system",
				format!(
					"created linked ban {created_id} on {target} from ban {source_id} of {source}",
					source_id = source_ban.id,
				),
				Some(serde_json::json!({
					"punishmentId": created_id,
					"linkedBanId": source_ban.id,
					"playerUuid": target,
					"sourcePlayerUuid": source,
				})),
				now,
			)
			.await;

			tracing::info! {
				%target,
				source_ban = %source_ban.id,
				"propagated linked ban",
			};
		}
	}

	Ok(())
}

/// Builds an unstarted linked ban mirroring `source_ban_id` for `duration`.
fn new_linked_ban(
	source_ban_id: &PunishmentId,
	duration: Millis,
	now: DateTime<Utc>,
) -> Punishment {
	Punishment {
		id: PunishmentId::random(),
		issuer_name: LINKED_BAN_ISSUER.to_owned(),
		issued: now,
		started: None,
		type_ordinal: ORDINAL_LINKED_BAN,
		modifications: Vec::new(),
		notes: vec![Note {
			text: format!("Linked to ban {source_ban_id}"),
			issuer_name: LINKED_BAN_ISSUER.to_owned(),
			date: now,
		}],
		evidence: Vec::new(),
		attached_ticket_ids: Vec::new(),
		data: PunishmentData {
			duration: Some(duration),
			linked_ban_id: Some(source_ban_id.clone()),
			severity: None,
			status: None,
			..Default::default()
		},
	}
}
