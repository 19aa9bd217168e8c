//! Types for modeling punishments.
//!
//! A punishment is an append-only record: it is never deleted, and every change after creation
//! is either an appended [`Modification`] or one of a small set of `data` keys. Its *effective*
//! state (is it active, when does it expire) is computed by folding the modifications in
//! `issued` order, see [`Punishment::effective_state()`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;

use crate::players::Note;
use crate::settings::{OffenseLevel, Severity};
use crate::time::Millis;

crate::make_str_id!(PunishmentId);

impl PunishmentId {
	/// The alphabet punishment ids are drawn from.
	const ALPHABET: &'static [u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

	/// The length of a punishment id.
	const LENGTH: usize = 8;

	/// Generates a new random id (8 uppercase alphanumeric characters).
	pub fn random() -> Self {
		let mut rng = rand::thread_rng();

		let id = (0..Self::LENGTH)
			.map(|_| {
				let idx = rng.gen_range(0..Self::ALPHABET.len());
				char::from(*Self::ALPHABET.get(idx).expect("index is in range"))
			})
			.collect::<String>();

		Self(id)
	}
}

/// The kinds of modifications that can be appended to a punishment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModificationType {
	/// A staff pardon. Terminates the punishment's active state irrevocably.
	ManualPardon,

	/// An accepted appeal. Terminates the punishment's active state irrevocably.
	AppealAccept,

	/// A staff duration change.
	ManualDurationChange,

	/// A duration change resulting from an appeal.
	AppealDurationChange,

	/// Marks the punishment alt-blocking.
	SetAltBlockingTrue,

	/// Clears the alt-blocking flag.
	SetAltBlockingFalse,

	/// Marks the punishment stat-wiping.
	SetWipingTrue,

	/// Clears the stat-wiping flag.
	SetWipingFalse,
}

impl ModificationType {
	/// Whether this modification pardons the punishment.
	pub const fn is_pardon(self) -> bool {
		matches!(self, Self::ManualPardon | Self::AppealAccept)
	}
}

/// A modification appended to a punishment.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Modification {
	/// What kind of modification this is.
	#[serde(rename = "type")]
	pub kind: ModificationType,

	/// Who issued the modification.
	pub issuer_name: String,

	/// When the modification was issued.
	#[serde(with = "chrono::serde::ts_milliseconds")]
	#[schema(value_type = i64)]
	pub issued: DateTime<Utc>,

	/// The new duration, for duration changes. `0` and `-1` mean permanent.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub effective_duration: Option<Millis>,

	/// Why the modification was issued.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub reason: Option<String>,
}

/// Evidence attached to a punishment: either a plain text reference or an uploaded file.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum Evidence {
	/// A plain text reference (a chat excerpt, an external link, …).
	Text(String),

	/// An uploaded file.
	#[serde(rename_all = "camelCase")]
	File {
		/// Where the file lives in the object store.
		file_url: String,

		/// The original file name.
		file_name: String,

		/// The MIME type.
		file_type: String,

		/// The file size in bytes.
		file_size: i64,
	},
}

/// The well-known keys of a punishment's `data` map, plus a spill bag for everything else.
#[derive(Debug, Default, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct PunishmentData {
	/// The punishment duration in milliseconds; `-1` means permanent.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub duration: Option<Millis>,

	/// When the punishment expires. Derived from `started + duration` at acknowledgement.
	#[serde(with = "chrono::serde::ts_milliseconds_option", skip_serializing_if = "Option::is_none")]
	#[schema(value_type = Option<i64>)]
	pub expires: Option<DateTime<Utc>>,

	/// `false` marks the punishment explicitly inactive.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub active: Option<bool>,

	/// The severity chosen at creation (dynamic punishments only).
	#[serde(skip_serializing_if = "Option::is_none")]
	pub severity: Option<Severity>,

	/// The player's offence tier at creation (dynamic punishments only). Set once, never
	/// updated.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<OffenseLevel>,

	/// Whether this ban propagates to linked accounts.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub alt_blocking: Option<bool>,

	/// Whether the player's stats are wiped when the punishment expires.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub wipe_after_expiry: Option<bool>,

	/// For linked bans: the id of the ban this one was derived from.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub linked_ban_id: Option<PunishmentId>,

	/// Whether this punishment was rolled back.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub rolled_back: Option<bool>,

	/// When the rollback happened.
	#[serde(with = "chrono::serde::ts_milliseconds_option", skip_serializing_if = "Option::is_none")]
	#[schema(value_type = Option<i64>)]
	pub rollback_date: Option<DateTime<Utc>>,

	/// Who performed the rollback.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub rollback_by: Option<String>,

	/// Why the rollback happened.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub rollback_reason: Option<String>,

	/// Whether the game server reported successful execution.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub executed_on_server: Option<bool>,

	/// Whether the game server reported a failed execution.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub execution_failed: Option<bool>,

	/// The error the game server reported.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub execution_error: Option<String>,

	/// When the failed execution was attempted.
	#[serde(with = "chrono::serde::ts_milliseconds_option", skip_serializing_if = "Option::is_none")]
	#[schema(value_type = Option<i64>)]
	pub execution_attempted_at: Option<DateTime<Utc>>,

	/// Whether a kick has been carried out.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub completed: Option<bool>,

	/// When the kick was carried out.
	#[serde(with = "chrono::serde::ts_milliseconds_option", skip_serializing_if = "Option::is_none")]
	#[schema(value_type = Option<i64>)]
	pub completed_at: Option<DateTime<Utc>>,

	/// When the punishment was voided by an automatic unban.
	#[serde(with = "chrono::serde::ts_milliseconds_option", skip_serializing_if = "Option::is_none")]
	#[schema(value_type = Option<i64>)]
	pub unbanned: Option<DateTime<Utc>>,

	/// The resolution of the appeal that ended this punishment.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub appeal_outcome: Option<String>,

	/// The appeal ticket that ended this punishment.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub appeal_ticket_id: Option<String>,

	/// Keys this core does not interpret.
	#[serde(flatten)]
	#[schema(value_type = Object)]
	pub rest: BTreeMap<String, JsonValue>,
}

/// The result of folding a punishment's modifications, see
/// [`Punishment::effective_state()`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveState {
	/// Whether the punishment is effectively active.
	pub active: bool,

	/// When the punishment effectively expires; `None` means never.
	pub expiry: Option<DateTime<Utc>>,
}

/// A punishment on a player's record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Punishment {
	/// The punishment's id (8 uppercase alphanumeric characters).
	pub id: PunishmentId,

	/// Who issued the punishment.
	pub issuer_name: String,

	/// When the punishment was issued.
	#[serde(with = "chrono::serde::ts_milliseconds")]
	#[schema(value_type = i64)]
	pub issued: DateTime<Utc>,

	/// When the game server acknowledged execution. Set exactly once.
	#[serde(default, with = "chrono::serde::ts_milliseconds_option")]
	#[schema(value_type = Option<i64>)]
	pub started: Option<DateTime<Utc>>,

	/// The ordinal of the punishment's type.
	#[serde(rename = "type_ordinal")]
	pub type_ordinal: u32,

	/// Appended modifications, in `issued` order.
	#[serde(default)]
	pub modifications: Vec<Modification>,

	/// Notes on the punishment. The first note is the reason.
	#[serde(default)]
	pub notes: Vec<Note>,

	/// Attached evidence.
	#[serde(default)]
	pub evidence: Vec<Evidence>,

	/// Tickets (appeals, reports) referencing this punishment.
	#[serde(default)]
	pub attached_ticket_ids: Vec<String>,

	/// The punishment's key/value data.
	#[serde(default)]
	pub data: PunishmentData,
}

impl Punishment {
	/// The punishment's reason.
	///
	/// By convention this is always the first note, never a `data` key.
	pub fn reason(&self) -> Option<&str> {
		self.notes.first().map(|note| note.text.as_str())
	}

	/// Whether any pardon modification (manual or appeal) exists.
	pub fn is_pardoned(&self) -> bool {
		self.modifications
			.iter()
			.any(|modification| modification.kind.is_pardon())
	}

	/// Computes the punishment's effective state at `now`.
	///
	/// Starting from `(data.active != false, data.expires)`, modifications are folded in
	/// `issued` order:
	///
	/// - pardons force the state inactive,
	/// - duration changes of `0` / `-1` make the punishment permanent (and active),
	/// - positive duration changes re-anchor the expiry at the modification time,
	/// - flag flips do not touch active/expiry.
	///
	/// An expiry in the past forces the state inactive.
	pub fn effective_state(&self, now: DateTime<Utc>) -> EffectiveState {
		let mut active = self.data.active != Some(false);
		let mut expiry = self.data.expires;

		let mut modifications = self.modifications.iter().collect::<Vec<_>>();
		modifications.sort_by_key(|modification| modification.issued);

		for modification in modifications {
			match modification.kind {
				ModificationType::ManualPardon | ModificationType::AppealAccept => {
					active = false;
				}
				ModificationType::ManualDurationChange
				| ModificationType::AppealDurationChange => {
					let Some(duration) = modification.effective_duration else {
						continue;
					};

					if duration.0 <= 0 {
						expiry = None;
						active = true;
					} else {
						let new_expiry = modification.issued
							+ chrono::Duration::milliseconds(duration.0);

						expiry = Some(new_expiry);
						active = new_expiry > now;
					}
				}
				ModificationType::SetAltBlockingTrue
				| ModificationType::SetAltBlockingFalse
				| ModificationType::SetWipingTrue
				| ModificationType::SetWipingFalse => {}
			}
		}

		if expiry.is_some_and(|expiry| expiry <= now) {
			active = false;
		}

		EffectiveState { active, expiry }
	}

	/// Whether the punishment is *active*: started, effectively active, and not expired.
	pub fn is_active(&self, now: DateTime<Utc>) -> bool {
		let state = self.effective_state(now);

		self.started.is_some() && state.active && state.expiry.map_or(true, |expiry| expiry > now)
	}

	/// Whether the punishment is *valid for execution*: not explicitly inactive, not
	/// pardoned, and not expired. Unstarted punishments can be valid.
	pub fn is_valid_for_execution(&self, now: DateTime<Utc>) -> bool {
		self.data.active != Some(false)
			&& !self.is_pardoned()
			&& self
				.effective_state(now)
				.expiry
				.map_or(true, |expiry| expiry > now)
	}

	/// The expiry to display for this punishment.
	///
	/// Started punishments report their effective expiry. Unstarted punishments report the
	/// expiry they would have *if they started now*; this is display-only and nothing is
	/// persisted.
	pub fn projected_expiry(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
		if self.started.is_some() {
			return self.effective_state(now).expiry;
		}

		self.data
			.duration
			.and_then(|duration| duration.expiry_from(now))
	}

	/// Appends a modification, keeping the related `data` flags in step.
	pub fn add_modification(&mut self, modification: Modification) {
		match modification.kind {
			ModificationType::SetAltBlockingTrue => self.data.alt_blocking = Some(true),
			ModificationType::SetAltBlockingFalse => self.data.alt_blocking = Some(false),
			ModificationType::SetWipingTrue => self.data.wipe_after_expiry = Some(true),
			ModificationType::SetWipingFalse => self.data.wipe_after_expiry = Some(false),
			ModificationType::ManualPardon
			| ModificationType::AppealAccept
			| ModificationType::ManualDurationChange
			| ModificationType::AppealDurationChange => {}
		}

		self.modifications.push(modification);
	}
}

#[cfg(test)]
mod tests {
	use chrono::{DateTime, Duration, TimeZone, Utc};

	use super::{
		Modification, ModificationType, Punishment, PunishmentData, PunishmentId,
	};
	use crate::time::Millis;

	fn at(millis: i64) -> DateTime<Utc> {
		Utc.timestamp_millis_opt(millis).unwrap()
	}

	fn punishment(issued: DateTime<Utc>) -> Punishment {
		Punishment {
			id: PunishmentId::random(),
			issuer_name: "steve".to_owned(),
			issued,
			started: None,
			type_ordinal: 2,
			modifications: Vec::new(),
			notes: Vec::new(),
			evidence: Vec::new(),
			attached_ticket_ids: Vec::new(),
			data: PunishmentData::default(),
		}
	}

	fn modification(kind: ModificationType, issued: DateTime<Utc>) -> Modification {
		Modification {
			kind,
			issuer_name: "alex".to_owned(),
			issued,
			effective_duration: None,
			reason: None,
		}
	}

	#[test]
	fn random_ids_are_eight_uppercase_alphanumerics() {
		let id = PunishmentId::random();

		assert_eq!(id.0.len(), 8);
		assert!(id
			.0
			.chars()
			.all(|char| char.is_ascii_uppercase() || char.is_ascii_digit()));
	}

	#[test]
	fn pardons_force_the_state_inactive() {
		let issued = at(1_000_000);
		let mut punishment = punishment(issued);

		punishment.started = Some(issued);
		punishment.data.duration = Some(Millis(3_600_000));
		punishment.data.expires = Some(issued + Duration::hours(1));
		punishment.add_modification(modification(
			ModificationType::ManualPardon,
			issued + Duration::seconds(10),
		));

		let now = issued + Duration::seconds(20);

		assert!(!punishment.effective_state(now).active);
		assert!(!punishment.is_active(now));
		assert!(!punishment.is_valid_for_execution(now));
	}

	#[test]
	fn nonpositive_duration_changes_make_the_punishment_permanent() {
		let issued = at(1_000_000);
		let mut punishment = punishment(issued);

		punishment.started = Some(issued);
		punishment.data.expires = Some(issued + Duration::hours(1));

		let mut change = modification(
			ModificationType::ManualDurationChange,
			issued + Duration::hours(2),
		);
		change.effective_duration = Some(Millis(-1));
		punishment.add_modification(change);

		let now = issued + Duration::hours(3);
		let state = punishment.effective_state(now);

		assert!(state.active);
		assert_eq!(state.expiry, None);
	}

	#[test]
	fn positive_duration_changes_anchor_at_the_modification_time() {
		let issued = at(1_000_000);
		let mut punishment = punishment(issued);

		punishment.started = Some(issued);

		let change_time = issued + Duration::hours(1);
		let mut change = modification(ModificationType::ManualDurationChange, change_time);
		change.effective_duration = Some(Millis(1_800_000));
		punishment.add_modification(change);

		let state = punishment.effective_state(issued + Duration::minutes(75));

		assert!(state.active);
		assert_eq!(state.expiry, Some(change_time + Duration::minutes(30)));

		let state = punishment.effective_state(issued + Duration::minutes(95));

		assert!(!state.active);
	}

	#[test]
	fn modifications_apply_in_issued_order_regardless_of_append_order() {
		let issued = at(1_000_000);
		let mut punishment = punishment(issued);

		punishment.started = Some(issued);

		// Appended out of order: the re-opening duration change was issued *before* the
		// pardon, so the pardon must win.
		let mut change = modification(
			ModificationType::ManualDurationChange,
			issued + Duration::hours(1),
		);
		change.effective_duration = Some(Millis(-1));

		punishment.add_modification(modification(
			ModificationType::ManualPardon,
			issued + Duration::hours(2),
		));
		punishment.add_modification(change);

		assert!(!punishment.effective_state(issued + Duration::hours(3)).active);
	}

	#[test]
	fn expired_punishments_are_inactive_but_unexpired_ones_are_not() {
		let issued = at(1_000_000);
		let mut punishment = punishment(issued);

		punishment.started = Some(issued);
		punishment.data.expires = Some(issued + Duration::hours(1));

		assert!(punishment.is_active(issued + Duration::minutes(59)));
		assert!(!punishment.is_active(issued + Duration::minutes(61)));
	}

	#[test]
	fn unstarted_punishments_are_not_active_but_can_be_valid() {
		let issued = at(1_000_000);
		let mut punishment = punishment(issued);

		punishment.data.duration = Some(Millis(3_600_000));

		let now = issued + Duration::minutes(5);

		assert!(!punishment.is_active(now));
		assert!(punishment.is_valid_for_execution(now));
	}

	#[test]
	fn projected_expiry_of_unstarted_punishments_is_relative_to_now() {
		let issued = at(1_000_000);
		let mut punishment = punishment(issued);

		punishment.data.duration = Some(Millis(3_600_000));

		let now = issued + Duration::days(2);

		assert_eq!(punishment.projected_expiry(now), Some(now + Duration::hours(1)));
	}

	#[test]
	fn flag_flips_touch_data_but_not_the_state() {
		let issued = at(1_000_000);
		let mut punishment = punishment(issued);

		punishment.started = Some(issued);
		punishment.add_modification(modification(
			ModificationType::SetAltBlockingTrue,
			issued + Duration::seconds(1),
		));

		assert_eq!(punishment.data.alt_blocking, Some(true));
		assert!(punishment.effective_state(issued + Duration::seconds(2)).active);

		punishment.add_modification(modification(
			ModificationType::SetAltBlockingFalse,
			issued + Duration::seconds(3),
		));

		assert_eq!(punishment.data.alt_blocking, Some(false));
	}
}
