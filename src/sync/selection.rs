//! Punishment selection for login and sync responses.
//!
//! The game server only ever needs a small slice of a player's record: at most one ban and one
//! mute (preferring already-started ones), plus any recently issued kicks it has not carried
//! out yet.

use chrono::{DateTime, Utc};

use crate::players::Player;
use crate::punishments::Punishment;
use crate::settings::{PunishmentKind, TypeRegistry, ORDINAL_LINKED_BAN};
use crate::sync::WirePunishment;

/// How far back login responses look for unstarted kicks, in milliseconds.
pub const KICK_LOGIN_WINDOW_MS: i64 = 5 * 60 * 1_000;

/// Selects the punishments to send for one player.
///
/// - For bans and mutes: the started-active one if any, otherwise the earliest valid
///   unstarted one (by `issued`). At most one of each is ever sent.
/// - Kicks are one-shot: only unstarted ones issued at or after `kicks_since` are included.
pub fn select_punishments<'p>(
	player: &'p Player,
	registry: &TypeRegistry,
	kicks_since: DateTime<Utc>,
	now: DateTime<Utc>,
) -> Vec<&'p Punishment> {
	let mut selected = Vec::new();

	for kind in [PunishmentKind::Ban, PunishmentKind::Mute] {
		let of_kind = || {
			player
				.punishments
				.iter()
				.filter(move |punishment| registry.kind_of(punishment.type_ordinal) == kind)
		};

		let started_active = of_kind()
			.filter(|punishment| punishment.is_active(now))
			.min_by_key(|punishment| punishment.issued);

		match started_active {
			Some(punishment) => selected.push(punishment),
			None => {
				let pending = of_kind()
					.filter(|punishment| punishment.started.is_none())
					.filter(|punishment| punishment.is_valid_for_execution(now))
					.min_by_key(|punishment| punishment.issued);

				if let Some(punishment) = pending {
					selected.push(punishment);
				}
			}
		}
	}

	let kicks = player
		.punishments
		.iter()
		.filter(|punishment| registry.kind_of(punishment.type_ordinal) == PunishmentKind::Kick)
		.filter(|punishment| punishment.started.is_none())
		.filter(|punishment| punishment.issued >= kicks_since)
		.filter(|punishment| punishment.is_valid_for_execution(now));

	selected.extend(kicks);
	selected
}

/// Converts a punishment into its wire form.
pub fn to_wire(
	punishment: &Punishment,
	registry: &TypeRegistry,
	now: DateTime<Utc>,
) -> WirePunishment {
	WirePunishment {
		id: punishment.id.clone(),
		kind: registry.kind_of(punishment.type_ordinal),
		ordinal: punishment.type_ordinal,
		started: punishment.started.is_some(),
		expiration: punishment.projected_expiry(now),
		description: describe(punishment, registry),
	}
}

/// The text shown to the punished player.
///
/// Dynamic types (and linked bans) use the configured `playerDescription` template, with the
/// `{linked-id}` placeholder substituted for linked bans. Manual punishments show their
/// reason.
fn describe(punishment: &Punishment, registry: &TypeRegistry) -> String {
	let config = registry.by_ordinal(punishment.type_ordinal);

	let templated = punishment.type_ordinal >= crate::settings::FIRST_DYNAMIC_ORDINAL
		|| punishment.type_ordinal == ORDINAL_LINKED_BAN;

	if templated {
		if let Some(template) = config.and_then(|config| config.player_description.as_deref()) {
			let linked_id = punishment
				.data
				.linked_ban_id
				.as_ref()
				.map_or_else(String::new, |id| id.0.clone());

			return template.replace("{linked-id}", &linked_id);
		}
	}

	punishment
		.reason()
		.map(str::to_owned)
		.or_else(|| config.map(|config| config.name.clone()))
		.unwrap_or_else(|| "No reason provided".to_owned())
}

#[cfg(test)]
mod tests {
	use chrono::{DateTime, Duration, TimeZone, Utc};
	use uuid::Uuid;

	use super::{select_punishments, to_wire};
	use crate::players::Player;
	use crate::punishments::{Punishment, PunishmentData, PunishmentId};
	use crate::settings::{PunishmentKind, TypeRegistry};
	use crate::time::Millis;

	fn now() -> DateTime<Utc> {
		Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
	}

	fn punishment(ordinal: u32, issued: DateTime<Utc>) -> Punishment {
		Punishment {
			id: PunishmentId::random(),
			issuer_name: "steve".to_owned(),
			issued,
			started: None,
			type_ordinal: ordinal,
			modifications: Vec::new(),
			notes: Vec::new(),
			evidence: Vec::new(),
			attached_ticket_ids: Vec::new(),
			data: PunishmentData {
				duration: Some(Millis(3_600_000)),
				..Default::default()
			},
		}
	}

	fn player_with(punishments: Vec<Punishment>) -> Player {
		let mut player = Player::new(Uuid::new_v4(), "steve".to_owned(), now());
		player.punishments = punishments;
		player
	}

	#[test]
	fn at_most_one_ban_and_the_started_one_wins() {
		let registry = TypeRegistry::defaults();

		let mut started_ban = punishment(2, now() - Duration::hours(2));
		started_ban.started = Some(now() - Duration::hours(2));
		started_ban.data.duration = Some(Millis::PERMANENT);

		let pending_ban = punishment(2, now() - Duration::hours(1));
		let expected = started_ban.id.clone();

		let player = player_with(vec![pending_ban, started_ban]);
		let selected = select_punishments(&player, &registry, now() - Duration::minutes(5), now());

		assert_eq!(selected.len(), 1);
		assert_eq!(selected.first().map(|punishment| &punishment.id), Some(&expected));
	}

	#[test]
	fn earliest_valid_unstarted_ban_is_picked_when_none_started() {
		let registry = TypeRegistry::defaults();

		let early = punishment(2, now() - Duration::hours(3));
		let late = punishment(2, now() - Duration::hours(1));
		let expected = early.id.clone();

		let player = player_with(vec![late, early]);
		let selected = select_punishments(&player, &registry, now() - Duration::minutes(5), now());

		assert_eq!(selected.len(), 1);
		assert_eq!(selected.first().map(|punishment| &punishment.id), Some(&expected));
	}

	#[test]
	fn bans_and_mutes_select_independently() {
		let registry = TypeRegistry::defaults();

		let ban = punishment(2, now() - Duration::hours(1));
		let mute = punishment(1, now() - Duration::hours(1));

		let player = player_with(vec![ban, mute]);
		let selected = select_punishments(&player, &registry, now() - Duration::minutes(5), now());

		assert_eq!(selected.len(), 2);
	}

	#[test]
	fn stale_kicks_are_not_resent() {
		let registry = TypeRegistry::defaults();

		let recent_kick = punishment(0, now() - Duration::minutes(2));
		let stale_kick = punishment(0, now() - Duration::hours(2));
		let expected = recent_kick.id.clone();

		let player = player_with(vec![stale_kick, recent_kick]);
		let selected = select_punishments(&player, &registry, now() - Duration::minutes(5), now());

		assert_eq!(selected.len(), 1);
		assert_eq!(selected.first().map(|punishment| &punishment.id), Some(&expected));
	}

	#[test]
	fn executed_kicks_are_never_selected_again() {
		let registry = TypeRegistry::defaults();

		let mut kick = punishment(0, now() - Duration::minutes(2));
		kick.started = Some(now() - Duration::minutes(1));
		kick.data.active = Some(false);
		kick.data.completed = Some(true);

		let player = player_with(vec![kick]);
		let selected = select_punishments(&player, &registry, now() - Duration::minutes(5), now());

		assert!(selected.is_empty());
	}

	#[test]
	fn wire_form_reports_unstarted_expiry_from_now() {
		let registry = TypeRegistry::defaults();
		let pending = punishment(2, now() - Duration::days(1));

		let wire = to_wire(&pending, &registry, now());

		assert_eq!(wire.kind, PunishmentKind::Ban);
		assert!(!wire.started);
		assert_eq!(wire.expiration, Some(now() + Duration::hours(1)));
	}
}
