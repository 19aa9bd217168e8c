//! Everything related to players.

use axum::routing::{get, post};
use axum::Router;

use crate::State;

mod models;
pub use models::{
	IpEntry, IpInfo, Note, Notification, NotificationEntry, Player, PlayerData, UsernameRecord,
};

pub mod store;
pub mod handlers;

/// Returns an [`axum::Router`] for the player routes on the Minecraft surface.
pub fn minecraft_router(state: State) -> Router {
	Router::new()
		.route("/player", get(handlers::minecraft::get))
		.route("/player-name", get(handlers::minecraft::get_by_name))
		.route(
			"/player/:uuid/linked-accounts",
			get(handlers::minecraft::linked_accounts),
		)
		.route("/player/note/create", post(handlers::minecraft::create_note))
		.with_state(state)
}

/// Returns an [`axum::Router`] for the `/players` routes on the panel surface.
pub fn panel_router(state: State) -> Router {
	Router::new()
		.route("/players", get(handlers::panel::get_many))
		.route("/players/:uuid", get(handlers::panel::get_single))
		.route(
			"/players/:uuid/punishments",
			post(handlers::panel::create_punishment),
		)
		.route("/players/:uuid/notes", post(handlers::panel::create_note))
		.route(
			"/players/:uuid/punishments/:id/modifications",
			post(handlers::panel::add_modification),
		)
		.route(
			"/players/:uuid/punishments/:id/evidence",
			post(handlers::panel::add_evidence),
		)
		.with_state(state)
}
