//! HTTP handlers for the punishment type catalogue.

use axum::Json;
use itertools::Itertools;

use crate::auth::Tenant;
use crate::settings::PunishmentTypeConfig;
use crate::{Result, State};

/// Fetch the tenant-defined (non-manual) punishment types.
#[tracing::instrument(skip(state, tenant), fields(server = %tenant.server_name))]
#[utoipa::path(
  get,
  path = "/punishment-types",
  tag = "Punishments",
  security(("API Key" = [])),
  responses(
    (status = 200, body = Vec<PunishmentTypeConfig>),
    (status = 401, description = "missing or invalid API key"),
  ),
)]
pub async fn punishment_types(
	state: State,
	tenant: Tenant,
) -> Result<Json<Vec<PunishmentTypeConfig>>> {
	let registry = state
		.punishment_types
		.get(&tenant.server_name, &tenant.db)
		.await;

	Ok(Json(registry.dynamic_types().cloned().collect_vec()))
}
