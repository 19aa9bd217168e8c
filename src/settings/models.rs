//! Types for modeling per-tenant settings.
//!
//! Only the parts of the settings document this core consumes are typed; everything else the
//! panel stores in there passes through the spill bag untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;

use crate::time::Millis;

/// The per-tenant settings document.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
	/// The tenant's punishment type catalogue.
	#[serde(default)]
	pub punishment_types: Vec<PunishmentTypeConfig>,

	/// The point thresholds for deriving a player's offence tier.
	#[serde(default)]
	pub status_thresholds: StatusThresholds,

	/// Settings this core does not interpret.
	#[serde(flatten)]
	pub rest: BTreeMap<String, JsonValue>,
}

/// Point thresholds per punishment category.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct StatusThresholds {
	/// Thresholds applied to gameplay points.
	pub gameplay: Thresholds,

	/// Thresholds applied to social points.
	pub social: Thresholds,
}

/// The two boundaries of the three-tier offence ladder.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct Thresholds {
	/// Points at which a player becomes a `medium` offender.
	pub medium: i64,

	/// Points at which a player becomes a `habitual` offender.
	pub habitual: i64,
}

impl Default for StatusThresholds {
	fn default() -> Self {
		Self {
			gameplay: Thresholds {
				medium: 5,
				habitual: 10,
			},
			social: Thresholds {
				medium: 4,
				habitual: 8,
			},
		}
	}
}

/// The category a punishment type belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Category {
	/// Chat and behaviour offences; accumulates social points.
	Social,

	/// Cheating and gameplay offences; accumulates gameplay points.
	Gameplay,

	/// Staff-issued administrative kinds; accumulates no points.
	Administrative,
}

/// The severity of an individual punishment.
#[derive(
	Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
	/// Also accepted as `lenient`.
	#[serde(alias = "lenient")]
	Low,

	/// Also accepted as `medium`.
	#[default]
	#[serde(alias = "medium")]
	Regular,

	/// Also accepted as `aggravated` and `high`.
	#[serde(alias = "aggravated", alias = "high")]
	Severe,
}

/// A player's offence tier ("status"), derived from accumulated points.
#[derive(
	Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum OffenseLevel {
	#[allow(clippy::missing_docs_in_private_items)]
	#[default]
	Low,

	#[allow(clippy::missing_docs_in_private_items)]
	Medium,

	#[allow(clippy::missing_docs_in_private_items)]
	Habitual,
}

/// A configured duration, e.g. `{ "value": 2, "unit": "hours" }`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DurationEntry {
	/// How many units.
	pub value: i64,

	/// The unit of [`value`](DurationEntry::value).
	pub unit: DurationUnit,

	/// An optional punishment-kind hint (`"ban"`, `"kick"`, …), used to classify dynamic
	/// types.
	#[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
	pub kind_hint: Option<String>,
}

impl DurationEntry {
	/// Converts this entry into milliseconds.
	pub fn as_millis(&self) -> Millis {
		Millis(self.value.saturating_mul(self.unit.millis()))
	}
}

/// Units a [`DurationEntry`] can be expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
	#[allow(clippy::missing_docs_in_private_items)]
	Seconds,

	#[allow(clippy::missing_docs_in_private_items)]
	Minutes,

	#[allow(clippy::missing_docs_in_private_items)]
	Hours,

	#[allow(clippy::missing_docs_in_private_items)]
	Days,

	#[allow(clippy::missing_docs_in_private_items)]
	Weeks,

	/// A month counts as 30 days.
	Months,
}

impl DurationUnit {
	/// The number of milliseconds in one unit.
	const fn millis(self) -> i64 {
		match self {
			Self::Seconds => 1_000,
			Self::Minutes => 60 * 1_000,
			Self::Hours => 60 * 60 * 1_000,
			Self::Days => 24 * 60 * 60 * 1_000,
			Self::Weeks => 7 * 24 * 60 * 60 * 1_000,
			Self::Months => 30 * 24 * 60 * 60 * 1_000,
		}
	}
}

/// Durations per offence tier.
///
/// Old settings documents called the lowest tier `first`; reads accept both spellings.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OffenseDurations {
	/// Duration for `low` tier offenders.
	#[serde(alias = "first")]
	pub low: DurationEntry,

	/// Duration for `medium` tier offenders.
	pub medium: DurationEntry,

	/// Duration for `habitual` tier offenders.
	pub habitual: DurationEntry,
}

impl OffenseDurations {
	/// The duration for the given offence tier.
	pub const fn get(&self, level: OffenseLevel) -> &DurationEntry {
		match level {
			OffenseLevel::Low => &self.low,
			OffenseLevel::Medium => &self.medium,
			OffenseLevel::Habitual => &self.habitual,
		}
	}
}

/// Durations per severity.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SeverityDurations {
	/// Durations for `low` severity punishments.
	#[serde(alias = "lenient")]
	pub low: OffenseDurations,

	/// Durations for `regular` severity punishments.
	#[serde(alias = "medium")]
	pub regular: OffenseDurations,

	/// Durations for `severe` severity punishments.
	#[serde(alias = "aggravated")]
	pub severe: OffenseDurations,
}

impl SeverityDurations {
	/// The duration matrix for the given severity.
	pub const fn get(&self, severity: Severity) -> &OffenseDurations {
		match severity {
			Severity::Low => &self.low,
			Severity::Regular => &self.regular,
			Severity::Severe => &self.severe,
		}
	}
}

/// Points per severity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct SeverityPoints {
	#[allow(clippy::missing_docs_in_private_items)]
	#[serde(alias = "lenient")]
	pub low: i64,

	#[allow(clippy::missing_docs_in_private_items)]
	#[serde(alias = "medium")]
	pub regular: i64,

	#[allow(clippy::missing_docs_in_private_items)]
	#[serde(alias = "aggravated")]
	pub severe: i64,
}

impl SeverityPoints {
	/// The points for the given severity.
	pub const fn get(&self, severity: Severity) -> i64 {
		match severity {
			Severity::Low => self.low,
			Severity::Regular => self.regular,
			Severity::Severe => self.severe,
		}
	}
}

/// One entry of the tenant's punishment type catalogue.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PunishmentTypeConfig {
	/// The ordinal identifying this type. `0`–`5` are the built-in manual kinds; tenant
	/// defined types start at `6`.
	pub ordinal: u32,

	/// The type's display name.
	pub name: String,

	/// The category this type belongs to.
	pub category: Category,

	/// Whether players can appeal punishments of this type.
	#[serde(default)]
	pub is_appealable: bool,

	/// The appeal form layout, as rendered by the panel.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub appeal_form: Option<JsonValue>,

	/// Whether the tenant may edit this type.
	#[serde(default)]
	pub is_customizable: bool,

	/// Duration matrix for multi-severity types.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub durations: Option<SeverityDurations>,

	/// Duration matrix for single-severity types.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub single_severity_durations: Option<OffenseDurations>,

	/// Point schedule for multi-severity types.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub points: Option<SeverityPoints>,

	/// A fixed point override; takes precedence over every other schedule.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub custom_points: Option<i64>,

	/// Point schedule for single-severity types.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub single_severity_points: Option<i64>,

	/// Whether punishments of this type may be flagged alt-blocking.
	#[serde(default)]
	pub can_be_alt_blocking: bool,

	/// Whether punishments of this type may be flagged stat-wiping.
	#[serde(default)]
	pub can_be_stat_wiping: bool,

	/// Whether punishments of this type are voided when the player changes their username.
	#[serde(default)]
	pub permanent_until_username_change: bool,

	/// Whether punishments of this type are voided when the player changes their skin.
	#[serde(default)]
	pub permanent_until_skin_change: bool,

	/// The description shown to staff.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub staff_description: Option<String>,

	/// The description template shown to punished players.
	///
	/// May contain a `{linked-id}` placeholder for linked bans.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub player_description: Option<String>,
}

impl PunishmentTypeConfig {
	/// The kind hint configured on this type's duration matrix, if any.
	pub fn duration_kind_hint(&self) -> Option<&str> {
		self.durations
			.as_ref()
			.map(|durations| &durations.regular.low)
			.or_else(|| {
				self.single_severity_durations
					.as_ref()
					.map(|durations| &durations.low)
			})
			.and_then(|entry| entry.kind_hint.as_deref())
	}

	/// Looks up the configured duration for the given severity and offence tier.
	pub fn duration_for(&self, severity: Severity, level: OffenseLevel) -> Option<Millis> {
		if let Some(durations) = &self.durations {
			return Some(durations.get(severity).get(level).as_millis());
		}

		self.single_severity_durations
			.as_ref()
			.map(|durations| durations.get(level).as_millis())
	}

	/// The points one active punishment of this type contributes.
	pub fn points_for(&self, severity: Severity) -> i64 {
		self.custom_points
			.or(self.single_severity_points)
			.unwrap_or_else(|| self.points.map_or(0, |points| points.get(severity)))
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::{DurationUnit, OffenseLevel, Severity, SeverityDurations};

	#[test]
	fn units_convert_to_milliseconds() {
		assert_eq!(DurationUnit::Seconds.millis(), 1_000);
		assert_eq!(DurationUnit::Hours.millis(), 3_600_000);
		assert_eq!(DurationUnit::Months.millis(), 2_592_000_000);
	}

	#[test]
	fn severity_aliases_are_accepted() {
		assert_eq!(
			serde_json::from_value::<Severity>(json!("lenient")).expect("parses"),
			Severity::Low
		);
		assert_eq!(
			serde_json::from_value::<Severity>(json!("high")).expect("parses"),
			Severity::Severe
		);
	}

	#[test]
	fn legacy_first_key_maps_to_the_low_tier() {
		let durations = serde_json::from_value::<SeverityDurations>(json!({
			"low": {
				"first": { "value": 1, "unit": "hours" },
				"medium": { "value": 2, "unit": "hours" },
				"habitual": { "value": 4, "unit": "hours" },
			},
			"regular": {
				"first": { "value": 6, "unit": "hours" },
				"medium": { "value": 12, "unit": "hours" },
				"habitual": { "value": 1, "unit": "days" },
			},
			"severe": {
				"first": { "value": 2, "unit": "days" },
				"medium": { "value": 1, "unit": "weeks" },
				"habitual": { "value": 1, "unit": "months" },
			},
		}))
		.expect("parses");

		let entry = durations.get(Severity::Regular).get(OffenseLevel::Low);

		assert_eq!(entry.as_millis().0, 6 * 3_600_000);
	}
}
