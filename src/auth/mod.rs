//! Authentication for both API surfaces.
//!
//! Game servers authenticate with a per-tenant API key in the `X-API-Key` header; the
//! [`Tenant`] extractor resolves it to a `(server name, datastore)` pair. Panel requests carry
//! an opaque session cookie and resolve their tenant from the `Host` header; the [`Session`]
//! extractor yields the tenant plus the acting staff member.
//!
//! Session *creation* (login flows, invitations) is not handled here; this module only consumes
//! session documents.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header, request};
use axum_extra::extract::CookieJar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::database::{Collection, Datastore};
use crate::staff::Staff;
use crate::{Error, Result, State};

/// The header game servers authenticate with.
pub const API_KEY_HEADER: &str = "x-api-key";

/// The cookie panel sessions are carried in.
pub const SESSION_COOKIE: &str = "warden_session";

/// A staff role.
///
/// Roles are strictly ordered; a route that requires [`Role::Moderator`] accepts admins too.
#[derive(
	Debug,
	Clone,
	Copy,
	PartialEq,
	Eq,
	PartialOrd,
	Ord,
	Hash,
	derive_more::Display,
	Serialize,
	Deserialize,
	ToSchema,
)]
pub enum Role {
	/// May view players and handle tickets.
	#[display("Helper")]
	Helper,

	/// May additionally issue and pardon punishments.
	#[display("Moderator")]
	Moderator,

	/// May additionally roll back punishments and inspect audit data.
	#[display("Admin")]
	Admin,

	/// May do everything.
	#[display("Super Admin")]
	#[serde(rename = "Super Admin")]
	SuperAdmin,
}

impl Role {
	/// The permission strings implied by this role.
	pub fn permissions(self) -> Vec<&'static str> {
		let mut permissions = vec!["player.view", "ticket.view", "ticket.reply"];

		if self >= Self::Moderator {
			permissions.extend([
				"player.note",
				"punishment.create",
				"punishment.pardon",
				"appeal.resolve",
			]);
		}

		if self >= Self::Admin {
			permissions.extend(["punishment.rollback", "audit.view", "settings.view"]);
		}

		if self >= Self::SuperAdmin {
			permissions.extend(["settings.modify", "staff.manage"]);
		}

		permissions
	}
}

/// A resolved tenant.
///
/// Extracting this authenticates the request as a game server of that tenant. Every operation
/// downstream of the extraction runs against [`Tenant::db`] and nothing else.
#[derive(Debug, Clone)]
pub struct Tenant {
	/// The tenant's name.
	pub server_name: String,

	/// The tenant's datastore.
	pub db: Datastore,
}

#[async_trait]
impl FromRequestParts<State> for Tenant {
	type Rejection = Error;

	async fn from_request_parts(
		parts: &mut request::Parts,
		state: &State,
	) -> Result<Self> {
		let api_key = parts
			.headers
			.get(API_KEY_HEADER)
			.and_then(|value| value.to_str().ok())
			.ok_or_else(|| Error::unauthorized().context("missing API key header"))?;

		let server_name = state
			.tenants
			.resolve_api_key(api_key)
			.await?
			.ok_or_else(|| Error::unauthorized().context("unrecognized API key"))?;

		let db = state.tenants.datastore(&server_name).await?;

		tracing::debug!(%server_name, "authenticated game server");

		Ok(Self { server_name, db })
	}
}

/// A tenant resolved from the panel `Host` header, without any staff session.
///
/// Player-facing panel routes (appeal filing) use this: the tenant is known, the caller is not
/// staff.
#[derive(Debug, Clone)]
pub struct PanelTenant {
	/// The tenant's name.
	pub server_name: String,

	/// The tenant's datastore.
	pub db: Datastore,
}

#[async_trait]
impl FromRequestParts<State> for PanelTenant {
	type Rejection = Error;

	async fn from_request_parts(
		parts: &mut request::Parts,
		state: &State,
	) -> Result<Self> {
		let host = parts
			.headers
			.get(header::HOST)
			.and_then(|value| value.to_str().ok())
			.ok_or_else(|| Error::unauthorized().context("missing Host header"))?;

		let server_name = state
			.tenants
			.resolve_host(host, &state.config.panel_domain)
			.await?
			.ok_or_else(|| Error::unauthorized().context("unknown panel host"))?;

		let db = state.tenants.datastore(&server_name).await?;

		Ok(Self { server_name, db })
	}
}

/// A session document, as stored in the `sessions` collection.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDoc {
	/// The staff member this session belongs to.
	pub username: String,

	/// When the session expires, if ever.
	#[serde(default, with = "chrono::serde::ts_milliseconds_option")]
	pub expires: Option<DateTime<Utc>>,
}

/// An authenticated panel session.
#[derive(Debug, Clone)]
pub struct Session {
	/// The tenant the session belongs to.
	pub server_name: String,

	/// The tenant's datastore.
	pub db: Datastore,

	/// The staff member acting through this session.
	pub staff: Staff,
}

impl Session {
	/// The acting staff member's role.
	pub fn role(&self) -> Role {
		self.staff.role
	}

	/// Rejects the request unless the acting staff member has at least the `required` role.
	pub fn require(&self, required: Role) -> Result<()> {
		if self.staff.role >= required {
			Ok(())
		} else {
			Err(Error::insufficient_role(required))
		}
	}
}

#[async_trait]
impl FromRequestParts<State> for Session {
	type Rejection = Error;

	async fn from_request_parts(
		parts: &mut request::Parts,
		state: &State,
	) -> Result<Self> {
		let host = parts
			.headers
			.get(header::HOST)
			.and_then(|value| value.to_str().ok())
			.ok_or_else(|| Error::unauthorized().context("missing Host header"))?;

		let server_name = state
			.tenants
			.resolve_host(host, &state.config.panel_domain)
			.await?
			.ok_or_else(|| Error::unauthorized().context("unknown panel host"))?;

		let db = state.tenants.datastore(&server_name).await?;

		let jar = CookieJar::from_headers(&parts.headers);
		let session_id = jar
			.get(SESSION_COOKIE)
			.map(|cookie| cookie.value().to_owned())
			.ok_or_else(|| Error::unauthorized().context("missing session cookie"))?;

		let session = db
			.load::<SessionDoc>(Collection::Sessions, &session_id)
			.await?
			.ok_or_else(|| Error::unauthorized().context("unknown session"))?;

		if session.expires.is_some_and(|expires| expires <= Utc::now()) {
			return Err(Error::unauthorized().context("expired session"));
		}

		let staff = db
			.get_staff(&session.username)
			.await?
			.ok_or_else(|| Error::unauthorized().context("session has no staff record"))?;

		tracing::debug!(%server_name, staff = %staff.username, "authenticated panel session");

		Ok(Self {
			server_name,
			db,
			staff,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::Role;

	#[test]
	fn roles_are_ordered() {
		assert!(Role::Helper < Role::Moderator);
		assert!(Role::Moderator < Role::Admin);
		assert!(Role::Admin < Role::SuperAdmin);
	}

	#[test]
	fn permissions_are_cumulative() {
		let helper = Role::Helper.permissions();
		let admin = Role::Admin.permissions();

		assert!(helper.iter().all(|permission| admin.contains(permission)));
		assert!(admin.contains(&"punishment.rollback"));
		assert!(!helper.contains(&"punishment.create"));
	}

	#[test]
	fn super_admin_serializes_with_a_space() {
		let json = serde_json::to_string(&Role::SuperAdmin).expect("serializes");

		assert_eq!(json, "\"Super Admin\"");
	}
}
