//! The game-server sync protocol.
//!
//! Game servers poll these routes every few seconds: logins and disconnects keep the player
//! store current, `/sync` delivers new and modified punishments plus notifications, and
//! acknowledgements report execution back (which is the only thing that ever *starts* a
//! punishment).

use axum::routing::post;
use axum::Router;

use crate::State;

mod models;
pub use models::{
	AcknowledgeRequest, AcknowledgeResponse, DisconnectRequest, LoginRequest, LoginResponse,
	ModifiedPunishment, NotificationAcknowledgeRequest, OnlinePlayer, PlayerNotifications,
	ServerStatus, StartedPunishment, StatusResponse, SyncPlayer, SyncRequest, SyncResponse,
	SyncStats, WirePunishment,
};

pub mod selection;
pub mod handlers;

/// Returns an [`axum::Router`] for the sync protocol routes on the Minecraft surface.
pub fn minecraft_router(state: State) -> Router {
	Router::new()
		.route("/player/login", post(handlers::login::login))
		.route("/player/disconnect", post(handlers::disconnect::disconnect))
		.route("/sync", post(handlers::sync::sync))
		.route("/punishment/acknowledge", post(handlers::acknowledge::acknowledge))
		.route(
			"/notification/acknowledge",
			post(handlers::notifications::acknowledge),
		)
		.with_state(state)
}
