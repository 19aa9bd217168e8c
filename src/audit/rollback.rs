//! The rollback engine.
//!
//! A rollback operationally reverses a punishment: it appends a `MANUAL_PARDON` modification
//! with `effectiveDuration = 0` and stamps `data.rolledBack`. The stamp doubles as the
//! idempotence guard; rolling the same punishment back twice mutates the store once.
//!
//! Bulk rollbacks are sequences of these idempotent per-punishment operations. They are *not*
//! transactional: a cancelled bulk leaves a prefix applied, and per-player save failures are
//! logged and skipped without aborting the batch.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::audit::{self, LogLevel};
use crate::database::Datastore;
use crate::players::{Note, Player};
use crate::punishments::{Modification, ModificationType, Punishment, PunishmentId};
use crate::time::Millis;
use crate::{Error, Result};

/// The result of a bulk rollback.
#[derive(Debug, Default)]
pub struct RollbackSummary {
	/// The punishments that were actually rolled back.
	pub punishment_ids: Vec<PunishmentId>,

	/// How many players could not be saved. Their punishments are untouched.
	pub failed_players: u64,
}

/// Rolls back a single punishment.
#[tracing::instrument(skip(db))]
pub async fn rollback_single(
	db: &Datastore,
	punishment_id: &PunishmentId,
	performed_by: &str,
	reason: Option<String>,
	now: DateTime<Utc>,
) -> Result<(Uuid, Punishment)> {
	let player = db
		.find_player_by_punishment_id(punishment_id)
		.await?
		.ok_or_else(|| Error::not_found("punishment"))?;

	let target = player.minecraft_uuid;
	let punishment_id = punishment_id.clone();
	let performed_by_owned = performed_by.to_owned();

	let punishment = db
		.update_player(target, move |player| {
			let punishment = player
				.punishment_mut(&punishment_id)
				.ok_or_else(|| Error::not_found("punishment"))?;

			apply_rollback(punishment, &performed_by_owned, reason.clone(), now)?;

			Ok(punishment.clone())
		})
		.await?;

	audit::record(
		db,
		LogLevel::Moderation,
		performed_by.to_owned(),
		format!("rolled back punishment {id} of {target}", id = punishment.id),
		Some(json!({
			"punishmentId": punishment.id,
			"playerUuid": target,
		})),
		now,
	)
	.await;

	Ok((target, punishment))
}

/// Rolls back every punishment issued inside `[start, end]`, optionally restricted to one
/// issuer.
///
/// Individual players that fail to save are skipped; the summary records how many.
#[tracing::instrument(skip(db))]
pub async fn rollback_window(
	db: &Datastore,
	start: DateTime<Utc>,
	end: DateTime<Utc>,
	issuer_filter: Option<&str>,
	performed_by: &str,
	now: DateTime<Utc>,
) -> Result<RollbackSummary> {
	let players = db.all_players().await?;
	let mut summary = RollbackSummary::default();

	for player in players {
		let targets = eligible_punishments(&player, start, end, issuer_filter);

		if targets.is_empty() {
			continue;
		}

		let performed_by_owned = performed_by.to_owned();
		let targets_for_update = targets.clone();

		let result = db
			.update_player(player.minecraft_uuid, move |player| {
				let mut rolled_back = Vec::new();

				for punishment_id in &targets_for_update {
					let Some(punishment) = player.punishment_mut(punishment_id) else {
						continue;
					};

					// The guard re-runs inside the compare-and-swap cycle; a
					// concurrent rollback of the same punishment is a no-op here.
					if apply_rollback(punishment, &performed_by_owned, None, now).is_ok() {
						rolled_back.push(punishment.id.clone());
					}
				}

				Ok(rolled_back)
			})
			.await;

		match result {
			Ok(rolled_back) => summary.punishment_ids.extend(rolled_back),
			Err(error) => {
				summary.failed_players += 1;

				tracing::error! {
					player = %player.minecraft_uuid,
					%error,
					"failed to save player during bulk rollback, skipping",
				};
			}
		}
	}

	audit::record(
		db,
		LogLevel::Moderation,
		performed_by.to_owned(),
		format!(
			"bulk rollback reversed {count} punishment(s)",
			count = summary.punishment_ids.len(),
		),
		Some(json!({
			"start": start.timestamp_millis(),
			"end": end.timestamp_millis(),
			"issuer": issuer_filter,
			"count": summary.punishment_ids.len(),
			"punishmentIds": summary.punishment_ids,
			"failedPlayers": summary.failed_players,
		})),
		now,
	)
	.await;

	Ok(summary)
}

/// Maps a legacy `timeRange` token onto an explicit window ending at `now`.
pub fn window_from_token(token: &str, now: DateTime<Utc>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
	let start = match token {
		"1h" => now - Duration::hours(1),
		"6h" => now - Duration::hours(6),
		"24h" => now - Duration::hours(24),
		"7d" => now - Duration::days(7),
		"30d" => now - Duration::days(30),
		"all" => Utc.timestamp_millis_opt(0).single()?,
		_ => return None,
	};

	Some((start, now))
}

/// The punishments of `player` eligible for a windowed rollback.
fn eligible_punishments(
	player: &Player,
	start: DateTime<Utc>,
	end: DateTime<Utc>,
	issuer_filter: Option<&str>,
) -> Vec<PunishmentId> {
	player
		.punishments
		.iter()
		.filter(|punishment| punishment.data.rolled_back != Some(true))
		.filter(|punishment| punishment.issued >= start && punishment.issued <= end)
		.filter(|punishment| {
			issuer_filter.map_or(true, |issuer| punishment.issuer_name == issuer)
		})
		.map(|punishment| punishment.id.clone())
		.collect()
}

/// Stamps a punishment rolled-back and appends the reversing modification.
fn apply_rollback(
	punishment: &mut Punishment,
	performed_by: &str,
	reason: Option<String>,
	now: DateTime<Utc>,
) -> Result<()> {
	if punishment.data.rolled_back == Some(true) {
		return Err(Error::already_rolled_back(punishment.id.clone()));
	}

	punishment.data.rolled_back = Some(true);
	punishment.data.rollback_date = Some(now);
	punishment.data.rollback_by = Some(performed_by.to_owned());
	punishment.data.rollback_reason = reason.clone();

	punishment.add_modification(Modification {
		kind: ModificationType::ManualPardon,
		issuer_name: performed_by.to_owned(),
		issued: now,
		effective_duration: Some(Millis(0)),
		reason: reason.clone(),
	});

	punishment.notes.push(Note {
		text: reason.unwrap_or_else(|| format!("Rolled back by {performed_by}")),
		issuer_name: performed_by.to_owned(),
		date: now,
	});

	Ok(())
}

#[cfg(test)]
mod tests {
	use chrono::{Duration, TimeZone, Utc};

	use super::window_from_token;

	#[test]
	fn tokens_map_to_windows() {
		let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();

		assert_eq!(
			window_from_token("1h", now),
			Some((now - Duration::hours(1), now))
		);
		assert_eq!(
			window_from_token("30d", now),
			Some((now - Duration::days(30), now))
		);
		assert_eq!(
			window_from_token("all", now).map(|(start, _)| start.timestamp_millis()),
			Some(0)
		);
		assert_eq!(window_from_token("2w", now), None);
	}
}
