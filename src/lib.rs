#![doc = include_str!("../README.md")]

use axum::routing::get;
use axum::{Json, Router};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use self::openapi::Security;

mod error;

#[doc(inline)]
pub use error::{Error, Result};

mod config;

#[doc(inline)]
pub use config::Config;

mod state;

#[doc(inline)]
pub use state::State;

#[cfg(test)]
mod tests;

pub mod openapi;
pub mod middleware;
pub mod database;
pub mod tenants;
pub mod auth;
pub mod ip_info;
pub mod serde;
pub mod time;
pub mod make_id;
pub mod responses;

pub mod settings;
pub mod players;
pub mod punishments;
pub mod linking;
pub mod sync;
pub mod appeals;
pub mod audit;
pub mod staff;

/// The API's OpenAPI document.
#[derive(Debug, Clone, Copy, OpenApi)]
#[openapi(
  info(
    title = "Warden API",
    description = "The moderation core of the Warden panel.",
    license(
      name = "Licensed under the GPLv3",
      url = "https://www.gnu.org/licenses/gpl-3.0",
    ),
  ),
  modifiers(&Security),
  paths(
    sync::handlers::login::login,
    sync::handlers::disconnect::disconnect,
    sync::handlers::sync::sync,
    sync::handlers::acknowledge::acknowledge,
    sync::handlers::notifications::acknowledge,

    punishments::handlers::create::manual,
    punishments::handlers::create::dynamic,
    punishments::handlers::pardon::by_id,
    punishments::handlers::pardon::by_name,

    players::handlers::minecraft::get,
    players::handlers::minecraft::get_by_name,
    players::handlers::minecraft::linked_accounts,
    players::handlers::minecraft::create_note,
    players::handlers::panel::get_many,
    players::handlers::panel::get_single,
    players::handlers::panel::create_punishment,
    players::handlers::panel::create_note,
    players::handlers::panel::add_modification,
    players::handlers::panel::add_evidence,

    appeals::handlers::root::post,
    appeals::handlers::root::get,
    appeals::handlers::by_id::get,
    appeals::handlers::by_id::post_reply,
    appeals::handlers::by_id::patch_status,
    appeals::handlers::ticket::create,

    audit::handlers::rollback_single,
    audit::handlers::bulk_rollback,
    audit::handlers::staff_rollback,
    audit::handlers::logs,
    audit::handlers::stats,
    audit::handlers::recent_activity,

    settings::handlers::punishment_types,
    staff::handlers::permissions,
  ),
  components(schemas(
    sync::WirePunishment,
    sync::LoginRequest,
    sync::LoginResponse,
    sync::DisconnectRequest,
    sync::OnlinePlayer,
    sync::SyncRequest,
    sync::SyncResponse,
    sync::SyncPlayer,
    sync::StartedPunishment,
    sync::ModifiedPunishment,
    sync::PlayerNotifications,
    sync::SyncStats,
    sync::ServerStatus,
    sync::AcknowledgeRequest,
    sync::AcknowledgeResponse,
    sync::NotificationAcknowledgeRequest,
    sync::StatusResponse,

    punishments::Punishment,
    punishments::PunishmentData,
    punishments::PunishmentId,
    punishments::Modification,
    punishments::ModificationType,
    punishments::Evidence,
    punishments::status::PlayerStatus,
    punishments::handlers::create::NewManualPunishment,
    punishments::handlers::create::NewDynamicPunishment,
    punishments::handlers::create::CreatedPunishment,
    punishments::handlers::pardon::PardonRequest,
    punishments::handlers::pardon::PardonByNameRequest,
    punishments::handlers::pardon::PardonedPunishment,

    players::Player,
    players::PlayerData,
    players::IpEntry,
    players::IpInfo,
    players::Note,
    players::Notification,
    players::NotificationEntry,
    players::UsernameRecord,
    players::handlers::minecraft::PlayerProfile,
    players::handlers::minecraft::LinkedAccount,
    players::handlers::minecraft::NewNote,
    players::handlers::panel::PlayerSummary,
    players::handlers::panel::PanelPlayerProfile,
    players::handlers::panel::PanelNewPunishment,
    players::handlers::panel::PanelNewNote,
    players::handlers::panel::NewModification,
    players::handlers::panel::NewEvidence,

    settings::PunishmentTypeConfig,
    settings::Category,
    settings::Severity,
    settings::OffenseLevel,
    settings::DurationEntry,
    settings::DurationUnit,
    settings::OffenseDurations,
    settings::SeverityDurations,
    settings::SeverityPoints,
    settings::StatusThresholds,
    settings::Thresholds,
    settings::PunishmentKind,

    appeals::Ticket,
    appeals::TicketId,
    appeals::TicketReply,
    appeals::TicketData,
    appeals::TicketStatus,
    appeals::TicketType,
    appeals::handlers::root::NewAppeal,
    appeals::handlers::root::CreatedAppeal,
    appeals::handlers::by_id::NewReply,
    appeals::handlers::by_id::StatusUpdate,
    appeals::handlers::ticket::NewTicket,
    appeals::handlers::ticket::CreatedTicket,

    audit::LogEntry,
    audit::LogLevel,
    audit::handlers::RollbackRequest,
    audit::handlers::RollbackResponse,
    audit::handlers::BulkRollbackRequest,
    audit::handlers::StaffRollbackRequest,
    audit::handlers::TenantStats,
    audit::handlers::ActivityEntry,

    staff::Staff,
    staff::StaffPermissions,
    staff::TicketSubscription,
    auth::Role,

    time::Millis,
  )),
)]
pub struct ApiDoc;

/// Builds the API's router.
///
/// Two surfaces: `/api/minecraft` for game servers (API key per tenant) and `/api/panel` for
/// staff and players (host + session cookie). The OpenAPI document is served at
/// `/docs/openapi.json`.
pub fn server(state: State) -> Router {
	let minecraft = Router::new()
		.merge(sync::minecraft_router(state.clone()))
		.merge(punishments::minecraft_router(state.clone()))
		.merge(players::minecraft_router(state.clone()))
		.merge(appeals::minecraft_router(state.clone()))
		.merge(settings::minecraft_router(state.clone()))
		.merge(staff::minecraft_router(state.clone()));

	let panel = Router::new()
		.merge(players::panel_router(state.clone()))
		.merge(appeals::panel_router(state.clone()))
		.merge(audit::panel_router(state.clone()))
		.layer(middleware::cors::panel(&state.config));

	let docs = Router::new()
		.route("/docs/openapi.json", get(openapi_json))
		.route_layer(middleware::cors::permissive());

	Router::new()
		.nest("/api/minecraft", minecraft)
		.nest("/api/panel", panel)
		.merge(docs)
		.layer(TraceLayer::new_for_http())
}

/// Serves the OpenAPI document.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
	Json(ApiDoc::openapi())
}
