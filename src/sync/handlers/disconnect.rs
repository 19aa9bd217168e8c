//! HTTP handler for `POST /player/disconnect`.

use axum::Json;
use chrono::Utc;

use crate::auth::Tenant;
use crate::sync::{DisconnectRequest, StatusResponse};
use crate::Result;

/// Record a player disconnect.
#[tracing::instrument(skip(tenant, request), fields(server = %tenant.server_name, player = %request.minecraft_uuid))]
#[utoipa::path(
  post,
  path = "/player/disconnect",
  tag = "Sync",
  security(("API Key" = [])),
  request_body = DisconnectRequest,
  responses(
    (status = 200, body = StatusResponse),
    (status = 401, description = "missing or invalid API key"),
    (status = 404, description = "no such player"),
  ),
)]
pub async fn disconnect(
	tenant: Tenant,
	Json(request): Json<DisconnectRequest>,
) -> Result<Json<StatusResponse>> {
	tenant
		.db
		.on_disconnect(request.minecraft_uuid, Utc::now())
		.await?;

	Ok(Json(StatusResponse::OK))
}
