//! Everything related to tickets and the appeal workflow.

use axum::routing::{get, patch, post};
use axum::Router;

use crate::State;

mod models;
pub use models::{Ticket, TicketData, TicketId, TicketReply, TicketStatus, TicketType};

mod store;
pub mod handlers;

/// Returns an [`axum::Router`] for the `/appeals` routes on the panel surface.
pub fn panel_router(state: State) -> Router {
	Router::new()
		.route("/appeals", post(handlers::root::post).get(handlers::root::get))
		.route("/appeals/:id", get(handlers::by_id::get))
		.route("/appeals/:id/replies", post(handlers::by_id::post_reply))
		.route("/appeals/:id/status", patch(handlers::by_id::patch_status))
		.with_state(state)
}

/// Returns an [`axum::Router`] for the ticket routes on the Minecraft surface.
pub fn minecraft_router(state: State) -> Router {
	Router::new()
		.route("/ticket/create", post(handlers::ticket::create))
		.with_state(state)
}
