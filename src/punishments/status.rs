//! The player status calculator.
//!
//! Every *active* punishment contributes points to its type's category (Social or Gameplay);
//! the accumulated points place the player on the three-tier offence ladder. These tiers feed
//! back into duration selection when new dynamic punishments are created.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::players::Player;
use crate::settings::{Category, OffenseLevel, Thresholds, TypeRegistry};

/// A player's derived status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStatus {
	/// Points accumulated from active Social punishments.
	pub social_points: i64,

	/// Points accumulated from active Gameplay punishments.
	pub gameplay_points: i64,

	/// The player's social offence tier.
	pub social_tier: OffenseLevel,

	/// The player's gameplay offence tier.
	pub gameplay_tier: OffenseLevel,
}

impl PlayerStatus {
	/// The tier relevant for a punishment of the given category.
	///
	/// Administrative types use the worse of the two tiers.
	pub fn relevant_tier(&self, category: Category) -> OffenseLevel {
		match category {
			Category::Social => self.social_tier,
			Category::Gameplay => self.gameplay_tier,
			Category::Administrative => self.social_tier.max(self.gameplay_tier),
		}
	}
}

/// Computes a player's status from their active punishments.
///
/// Inactive punishments contribute zero.
pub fn calculate(player: &Player, registry: &TypeRegistry, now: DateTime<Utc>) -> PlayerStatus {
	let mut social_points = 0_i64;
	let mut gameplay_points = 0_i64;

	for punishment in &player.punishments {
		if !punishment.is_active(now) {
			continue;
		}

		let Some(config) = registry.by_ordinal(punishment.type_ordinal) else {
			continue;
		};

		let severity = punishment.data.severity.unwrap_or_default();
		let points = config.points_for(severity);

		match config.category {
			Category::Social => social_points += points,
			Category::Gameplay => gameplay_points += points,
			Category::Administrative => {}
		}
	}

	let thresholds = &registry.status_thresholds;

	PlayerStatus {
		social_points,
		gameplay_points,
		social_tier: tier(social_points, thresholds.social),
		gameplay_tier: tier(gameplay_points, thresholds.gameplay),
	}
}

/// Places a point total on the offence ladder.
fn tier(points: i64, thresholds: Thresholds) -> OffenseLevel {
	if points >= thresholds.habitual {
		OffenseLevel::Habitual
	} else if points >= thresholds.medium {
		OffenseLevel::Medium
	} else {
		OffenseLevel::Low
	}
}

#[cfg(test)]
mod tests {
	use chrono::{DateTime, Duration, TimeZone, Utc};
	use serde_json::json;
	use uuid::Uuid;

	use super::{calculate, PlayerStatus};
	use crate::players::Player;
	use crate::punishments::{Punishment, PunishmentData, PunishmentId};
	use crate::settings::{Category, OffenseLevel, Severity, TypeRegistry};
	use crate::time::Millis;

	fn now() -> DateTime<Utc> {
		Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
	}

	fn registry() -> TypeRegistry {
		let chat_abuse = serde_json::from_value(json!({
			"ordinal": 10,
			"name": "Chat Abuse",
			"category": "Social",
			"points": { "low": 1, "regular": 2, "severe": 4 },
		}))
		.expect("valid type config");

		let cheating = serde_json::from_value(json!({
			"ordinal": 11,
			"name": "Cheating",
			"category": "Gameplay",
			"customPoints": 6,
		}))
		.expect("valid type config");

		TypeRegistry::from_types([chat_abuse, cheating])
	}

	fn active_punishment(ordinal: u32, severity: Option<Severity>) -> Punishment {
		Punishment {
			id: PunishmentId::random(),
			issuer_name: "steve".to_owned(),
			issued: now() - Duration::hours(1),
			started: Some(now() - Duration::hours(1)),
			type_ordinal: ordinal,
			modifications: Vec::new(),
			notes: Vec::new(),
			evidence: Vec::new(),
			attached_ticket_ids: Vec::new(),
			data: PunishmentData {
				severity,
				duration: Some(Millis::PERMANENT),
				..Default::default()
			},
		}
	}

	#[test]
	fn points_accumulate_per_category() {
		let mut player = Player::new(Uuid::new_v4(), "steve".to_owned(), now());

		player
			.punishments
			.push(active_punishment(10, Some(Severity::Regular)));
		player
			.punishments
			.push(active_punishment(10, Some(Severity::Severe)));
		player.punishments.push(active_punishment(11, None));

		let status = calculate(&player, &registry(), now());

		assert_eq!(status.social_points, 6);
		assert_eq!(status.gameplay_points, 6);
		assert_eq!(status.social_tier, OffenseLevel::Medium);
		assert_eq!(status.gameplay_tier, OffenseLevel::Medium);
	}

	#[test]
	fn inactive_punishments_contribute_zero() {
		let mut player = Player::new(Uuid::new_v4(), "steve".to_owned(), now());

		let mut expired = active_punishment(10, Some(Severity::Severe));
		expired.data.duration = Some(Millis(1_000));
		expired.data.expires = Some(now() - Duration::minutes(30));

		player.punishments.push(expired);

		let status = calculate(&player, &registry(), now());

		assert_eq!(status.social_points, 0);
		assert_eq!(status.social_tier, OffenseLevel::Low);
	}

	#[test]
	fn administrative_types_use_the_worse_tier() {
		let status = PlayerStatus {
			social_points: 0,
			gameplay_points: 0,
			social_tier: OffenseLevel::Habitual,
			gameplay_tier: OffenseLevel::Low,
		};

		assert_eq!(
			status.relevant_tier(Category::Administrative),
			OffenseLevel::Habitual
		);
		assert_eq!(status.relevant_tier(Category::Gameplay), OffenseLevel::Low);
	}
}
