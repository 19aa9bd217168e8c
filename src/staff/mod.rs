//! Everything related to staff members.

use axum::routing::get;
use axum::Router;

use crate::State;

mod models;
pub use models::{Staff, StaffPermissions, TicketSubscription};

mod store;
pub mod handlers;

/// Returns an [`axum::Router`] for the staff routes on the Minecraft surface.
pub fn minecraft_router(state: State) -> Router {
	Router::new()
		.route("/staff-permissions", get(handlers::permissions))
		.with_state(state)
}
