//! Everything related to punishments.

use axum::routing::post;
use axum::Router;

use crate::State;

mod models;
pub use models::{
	EffectiveState, Evidence, Modification, ModificationType, Punishment, PunishmentData,
	PunishmentId,
};

pub mod engine;
pub mod status;
pub mod handlers;

/// Returns an [`axum::Router`] for the punishment routes on the Minecraft surface.
pub fn minecraft_router(state: State) -> Router {
	Router::new()
		.route("/punishment/create", post(handlers::create::manual))
		.route("/punishment/dynamic", post(handlers::create::dynamic))
		.route("/punishment/:id/pardon", post(handlers::pardon::by_id))
		.route("/player/pardon", post(handlers::pardon::by_name))
		.with_state(state)
}
