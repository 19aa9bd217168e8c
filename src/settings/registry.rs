//! The punishment type registry.
//!
//! A [`TypeRegistry`] is the tenant's punishment type catalogue indexed by ordinal, with the six
//! built-in manual kinds always present. It is loaded from the settings document and cached per
//! tenant for a few minutes; when the settings cannot be read the registry falls back to the
//! built-ins so punishment processing keeps working.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use derive_more::Display;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::database::Datastore;
use crate::settings::{Category, PunishmentTypeConfig, Settings, StatusThresholds};

/// The broad kind of enforcement a punishment type maps to on the game server.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PunishmentKind {
	/// Blocks the player from joining.
	#[display("ban")]
	Ban,

	/// Blocks the player from chatting.
	#[display("mute")]
	Mute,

	/// Removes the player from the server once.
	#[display("kick")]
	Kick,
}

/// The ordinal of the built-in kick type.
pub const ORDINAL_KICK: u32 = 0;

/// The ordinal of the built-in manual mute type.
pub const ORDINAL_MANUAL_MUTE: u32 = 1;

/// The ordinal of the built-in manual ban type.
pub const ORDINAL_MANUAL_BAN: u32 = 2;

/// The ordinal of the built-in security ban type.
pub const ORDINAL_SECURITY_BAN: u32 = 3;

/// The ordinal of the built-in linked ban type.
pub const ORDINAL_LINKED_BAN: u32 = 4;

/// The ordinal of the built-in blacklist type.
pub const ORDINAL_BLACKLIST: u32 = 5;

/// The first ordinal available to tenant-defined ("dynamic") types.
pub const FIRST_DYNAMIC_ORDINAL: u32 = 6;

/// A tenant's punishment type catalogue, indexed by ordinal.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
	/// The configured types, including the built-ins.
	types: BTreeMap<u32, PunishmentTypeConfig>,

	/// The tenant's offence tier thresholds.
	pub status_thresholds: StatusThresholds,
}

impl TypeRegistry {
	/// Builds a registry containing only the built-in manual kinds.
	pub fn defaults() -> Self {
		let types = core_types()
			.into_iter()
			.map(|config| (config.ordinal, config))
			.collect();

		Self {
			types,
			status_thresholds: StatusThresholds::default(),
		}
	}

	/// Builds a registry from a list of configured types.
	///
	/// Built-ins are always present; configured entries with the same ordinal override them.
	pub fn from_types<T>(configured: T) -> Self
	where
		T: IntoIterator<Item = PunishmentTypeConfig>,
	{
		let mut registry = Self::defaults();

		for config in configured {
			registry.types.insert(config.ordinal, config);
		}

		registry
	}

	/// Builds a registry from a settings document.
	pub fn from_settings(settings: &Settings) -> Self {
		let mut registry = Self::from_types(settings.punishment_types.iter().cloned());
		registry.status_thresholds = settings.status_thresholds;

		registry
	}

	/// Looks up a type by its ordinal.
	pub fn by_ordinal(&self, ordinal: u32) -> Option<&PunishmentTypeConfig> {
		self.types.get(&ordinal)
	}

	/// All tenant-defined (non-manual) types.
	pub fn dynamic_types(&self) -> impl Iterator<Item = &PunishmentTypeConfig> {
		self.types
			.values()
			.filter(|config| config.ordinal >= FIRST_DYNAMIC_ORDINAL)
	}

	/// The enforcement kind of the given ordinal.
	///
	/// Ordinals `0`–`5` are hardcoded. For dynamic types, the kind hint on the duration
	/// matrix decides; failing that, the type name; failing that, bans are assumed.
	pub fn kind_of(&self, ordinal: u32) -> PunishmentKind {
		match ordinal {
			ORDINAL_KICK => return PunishmentKind::Kick,
			ORDINAL_MANUAL_MUTE => return PunishmentKind::Mute,
			ORDINAL_MANUAL_BAN..=ORDINAL_BLACKLIST => return PunishmentKind::Ban,
			_ => {}
		}

		let Some(config) = self.by_ordinal(ordinal) else {
			return PunishmentKind::Ban;
		};

		if let Some(hint) = config.duration_kind_hint() {
			let hint = hint.to_lowercase();

			return if hint.contains("kick") {
				PunishmentKind::Kick
			} else if hint.contains("ban") {
				PunishmentKind::Ban
			} else {
				PunishmentKind::Mute
			};
		}

		let name = config.name.to_lowercase();

		if name.contains("kick") {
			PunishmentKind::Kick
		} else if name.contains("mute") {
			PunishmentKind::Mute
		} else {
			PunishmentKind::Ban
		}
	}

	/// Ordinals that are voided when the player changes their username.
	pub fn permanent_until_username_change_ordinals(&self) -> BTreeSet<u32> {
		self.types
			.values()
			.filter(|config| config.permanent_until_username_change)
			.map(|config| config.ordinal)
			.collect()
	}

	/// Ordinals that are voided when the player changes their skin.
	pub fn permanent_until_skin_change_ordinals(&self) -> BTreeSet<u32> {
		self.types
			.values()
			.filter(|config| config.permanent_until_skin_change)
			.map(|config| config.ordinal)
			.collect()
	}
}

/// The built-in manual punishment types.
fn core_types() -> Vec<PunishmentTypeConfig> {
	let manual = |ordinal: u32, name: &str, is_appealable: bool| PunishmentTypeConfig {
		ordinal,
		name: name.to_owned(),
		category: Category::Administrative,
		is_appealable,
		appeal_form: None,
		is_customizable: false,
		durations: None,
		single_severity_durations: None,
		points: None,
		custom_points: None,
		single_severity_points: None,
		can_be_alt_blocking: ordinal == ORDINAL_MANUAL_BAN || ordinal == ORDINAL_BLACKLIST,
		can_be_stat_wiping: false,
		permanent_until_username_change: false,
		permanent_until_skin_change: false,
		staff_description: None,
		player_description: None,
	};

	vec![
		manual(ORDINAL_KICK, "Kick", false),
		manual(ORDINAL_MANUAL_MUTE, "Manual Mute", true),
		manual(ORDINAL_MANUAL_BAN, "Manual Ban", true),
		manual(ORDINAL_SECURITY_BAN, "Security Ban", true),
		manual(ORDINAL_LINKED_BAN, "Linked Ban", true),
		manual(ORDINAL_BLACKLIST, "Blacklist", false),
	]
}

/// How long a cached registry stays fresh.
const CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// A process-wide cache of per-tenant type registries.
///
/// This is the only process-wide mutable state in the crate; entries expire after
/// [`CACHE_TTL`] and can be invalidated explicitly when a tenant's settings change.
#[derive(Debug, Default)]
pub struct RegistryCache {
	/// Cached registries by tenant name.
	inner: Mutex<HashMap<String, (Instant, Arc<TypeRegistry>)>>,
}

impl RegistryCache {
	/// Creates an empty cache.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the registry for the given tenant, loading it from the settings document if the
	/// cached copy is missing or stale.
	///
	/// Settings fetch failures fall back to the built-in types; the system stays usable.
	pub async fn get(&self, server_name: &str, db: &Datastore) -> Arc<TypeRegistry> {
		if let Some(registry) = self.fresh(server_name) {
			return registry;
		}

		let registry = match db.get_settings().await {
			Ok(Some(settings)) => TypeRegistry::from_settings(&settings),
			Ok(None) => TypeRegistry::defaults(),
			Err(error) => {
				tracing::warn! {
					%server_name,
					%error,
					"failed to load settings, using built-in punishment types",
				};

				TypeRegistry::defaults()
			}
		};

		let registry = Arc::new(registry);
		let mut inner = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

		inner.insert(
			server_name.to_owned(),
			(Instant::now(), Arc::clone(&registry)),
		);

		registry
	}

	/// Drops the cached registry for the given tenant.
	pub fn invalidate(&self, server_name: &str) {
		let mut inner = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

		inner.remove(server_name);
	}

	/// Returns the cached registry for `server_name` if it has not expired.
	fn fresh(&self, server_name: &str) -> Option<Arc<TypeRegistry>> {
		let inner = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

		inner
			.get(server_name)
			.filter(|(loaded, _)| loaded.elapsed() < CACHE_TTL)
			.map(|(_, registry)| Arc::clone(registry))
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::{PunishmentKind, TypeRegistry, ORDINAL_LINKED_BAN};
	use crate::settings::PunishmentTypeConfig;

	fn dynamic_type(ordinal: u32, name: &str, extra: serde_json::Value) -> PunishmentTypeConfig {
		let mut value = json!({
			"ordinal": ordinal,
			"name": name,
			"category": "Social",
		});

		value
			.as_object_mut()
			.expect("literal is an object")
			.extend(extra.as_object().cloned().unwrap_or_default());

		serde_json::from_value(value).expect("valid type config")
	}

	#[test]
	fn hardcoded_ordinals_resolve_first() {
		let registry = TypeRegistry::defaults();

		assert_eq!(registry.kind_of(0), PunishmentKind::Kick);
		assert_eq!(registry.kind_of(1), PunishmentKind::Mute);
		assert_eq!(registry.kind_of(2), PunishmentKind::Ban);
		assert_eq!(registry.kind_of(ORDINAL_LINKED_BAN), PunishmentKind::Ban);
		assert_eq!(registry.kind_of(5), PunishmentKind::Ban);
	}

	#[test]
	fn duration_hint_wins_over_the_name() {
		let registry = TypeRegistry::from_types([dynamic_type(
			10,
			"Chat Abuse Mute",
			json!({
				"singleSeverityDurations": {
					"first": { "value": 1, "unit": "hours", "type": "ban" },
					"medium": { "value": 2, "unit": "hours", "type": "ban" },
					"habitual": { "value": 4, "unit": "hours", "type": "ban" },
				},
			}),
		)]);

		assert_eq!(registry.kind_of(10), PunishmentKind::Ban);
	}

	#[test]
	fn a_present_hint_without_known_substring_means_mute() {
		let registry = TypeRegistry::from_types([dynamic_type(
			11,
			"Something",
			json!({
				"singleSeverityDurations": {
					"first": { "value": 1, "unit": "hours", "type": "silence" },
					"medium": { "value": 2, "unit": "hours", "type": "silence" },
					"habitual": { "value": 4, "unit": "hours", "type": "silence" },
				},
			}),
		)]);

		assert_eq!(registry.kind_of(11), PunishmentKind::Mute);
	}

	#[test]
	fn name_heuristic_applies_without_a_hint() {
		let registry = TypeRegistry::from_types([
			dynamic_type(12, "Team Griefing Kick", json!({})),
			dynamic_type(13, "Spam Mute", json!({})),
			dynamic_type(14, "Cheating", json!({})),
		]);

		assert_eq!(registry.kind_of(12), PunishmentKind::Kick);
		assert_eq!(registry.kind_of(13), PunishmentKind::Mute);
		assert_eq!(registry.kind_of(14), PunishmentKind::Ban);
	}

	#[test]
	fn unknown_ordinals_default_to_ban() {
		let registry = TypeRegistry::defaults();

		assert_eq!(registry.kind_of(99), PunishmentKind::Ban);
	}

	#[test]
	fn permanent_until_change_sets_are_derived() {
		let registry = TypeRegistry::from_types([
			dynamic_type(20, "Inappropriate Name", json!({ "permanentUntilUsernameChange": true })),
			dynamic_type(21, "Inappropriate Skin", json!({ "permanentUntilSkinChange": true })),
		]);

		assert!(registry
			.permanent_until_username_change_ordinals()
			.contains(&20));
		assert!(registry.permanent_until_skin_change_ordinals().contains(&21));
		assert!(!registry
			.permanent_until_username_change_ordinals()
			.contains(&21));
	}
}
