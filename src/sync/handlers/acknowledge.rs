//! HTTP handler for `POST /punishment/acknowledge`.

use axum::Json;
use chrono::Utc;

use crate::auth::Tenant;
use crate::punishments::engine::{self, Acknowledgement};
use crate::sync::{selection, AcknowledgeRequest, AcknowledgeResponse};
use crate::{Result, State};

/// Acknowledge the (attempted) execution of a punishment.
///
/// The first successful acknowledgement starts the punishment; repeats are no-ops.
#[tracing::instrument(
  skip(state, tenant, request),
  fields(server = %tenant.server_name, punishment = %request.punishment_id),
)]
#[utoipa::path(
  post,
  path = "/punishment/acknowledge",
  tag = "Sync",
  security(("API Key" = [])),
  request_body = AcknowledgeRequest,
  responses(
    (status = 200, body = AcknowledgeResponse),
    (status = 401, description = "missing or invalid API key"),
    (status = 404, description = "no such player or punishment"),
  ),
)]
pub async fn acknowledge(
	state: State,
	tenant: Tenant,
	Json(request): Json<AcknowledgeRequest>,
) -> Result<Json<AcknowledgeResponse>> {
	let now = Utc::now();

	let registry = state
		.punishment_types
		.get(&tenant.server_name, &tenant.db)
		.await;

	let punishment = engine::acknowledge(
		&tenant.db,
		&registry,
		Acknowledgement {
			punishment_id: request.punishment_id,
			player_uuid: request.player_uuid,
			executed_at: request.executed_at,
			success: request.success,
			error_message: request.error_message,
		},
		now,
	)
	.await?;

	Ok(Json(AcknowledgeResponse {
		status: 200,
		punishment: selection::to_wire(&punishment, &registry, now),
	}))
}
