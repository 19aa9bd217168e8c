//! HTTP handler for `POST /notification/acknowledge`.

use std::collections::BTreeSet;

use axum::Json;

use crate::auth::Tenant;
use crate::sync::{NotificationAcknowledgeRequest, StatusResponse};
use crate::Result;

/// Acknowledge delivered notifications.
///
/// Removes exactly the named notifications from the player's pending queue; anything queued
/// concurrently stays. Legacy plain-string entries cannot be addressed and are dropped.
#[tracing::instrument(skip(tenant, request), fields(server = %tenant.server_name, player = %request.player_uuid))]
#[utoipa::path(
  post,
  path = "/notification/acknowledge",
  tag = "Sync",
  security(("API Key" = [])),
  request_body = NotificationAcknowledgeRequest,
  responses(
    (status = 200, body = StatusResponse),
    (status = 401, description = "missing or invalid API key"),
    (status = 404, description = "no such player"),
  ),
)]
pub async fn acknowledge(
	tenant: Tenant,
	Json(request): Json<NotificationAcknowledgeRequest>,
) -> Result<Json<StatusResponse>> {
	let ids: BTreeSet<_> = request.notification_ids.iter().copied().collect();

	tenant
		.db
		.update_player(request.player_uuid, |player| {
			player.acknowledge_notifications(&ids);

			Ok(())
		})
		.await?;

	Ok(Json(StatusResponse::OK))
}
