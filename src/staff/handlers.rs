//! HTTP handlers for staff routes.

use axum::Json;
use itertools::Itertools;

use crate::auth::Tenant;
use crate::staff::StaffPermissions;
use crate::Result;

/// Fetch all staff members with their derived permission sets.
#[tracing::instrument(skip(tenant), fields(server = %tenant.server_name))]
#[utoipa::path(
  get,
  path = "/staff-permissions",
  tag = "Staff",
  security(("API Key" = [])),
  responses(
    (status = 200, body = Vec<StaffPermissions>),
    (status = 401, description = "missing or invalid API key"),
  ),
)]
pub async fn permissions(tenant: Tenant) -> Result<Json<Vec<StaffPermissions>>> {
	let staff = tenant
		.db
		.list_staff()
		.await?
		.into_iter()
		.map(StaffPermissions::from)
		.collect_vec();

	Ok(Json(staff))
}
