//! Everything related to per-tenant settings and the punishment type registry.

use axum::routing::get;
use axum::Router;

use crate::State;

mod models;
pub use models::{
	Category, DurationEntry, DurationUnit, OffenseDurations, OffenseLevel, PunishmentTypeConfig,
	Settings, Severity, SeverityDurations, SeverityPoints, StatusThresholds, Thresholds,
};

mod registry;
pub use registry::{
	PunishmentKind, RegistryCache, TypeRegistry, FIRST_DYNAMIC_ORDINAL, ORDINAL_BLACKLIST,
	ORDINAL_KICK, ORDINAL_LINKED_BAN, ORDINAL_MANUAL_BAN, ORDINAL_MANUAL_MUTE,
	ORDINAL_SECURITY_BAN,
};

mod store;
pub mod handlers;

/// Returns an [`axum::Router`] for the settings routes on the Minecraft surface.
pub fn minecraft_router(state: State) -> Router {
	Router::new()
		.route("/punishment-types", get(handlers::punishment_types))
		.with_state(state)
}
