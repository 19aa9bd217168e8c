//! HTTP handler for `POST /player/login`.

use axum::Json;
use chrono::{Duration, Utc};
use itertools::Itertools;

use crate::auth::Tenant;
use crate::players::store::LoginRecord;
use crate::punishments::engine;
use crate::sync::selection::{self, KICK_LOGIN_WINDOW_MS};
use crate::sync::{LoginRequest, LoginResponse};
use crate::{Result, State};

/// Record a player login and fetch everything the game server must enforce for them.
///
/// Never starts punishments; starting only happens through acknowledgement. Account linking
/// runs in the background afterwards and never delays this response.
#[tracing::instrument(skip(state, tenant, login), fields(server = %tenant.server_name, player = %login.minecraft_uuid))]
#[utoipa::path(
  post,
  path = "/player/login",
  tag = "Sync",
  security(("API Key" = [])),
  request_body = LoginRequest,
  responses(
    (status = 200, body = LoginResponse),
    (status = 401, description = "missing or invalid API key"),
    (status = 503, description = "tenant datastore unavailable"),
  ),
)]
pub async fn login(
	state: State,
	tenant: Tenant,
	Json(login): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
	let now = Utc::now();

	// The game server may pass IP info along; otherwise ask the lookup service. A failed
	// lookup records the address with unknown fields.
	let ip_info = match login.ip_info {
		Some(info) => info,
		None => state.ip_info.lookup(&login.ip_address).await,
	};

	let record = LoginRecord {
		minecraft_uuid: login.minecraft_uuid,
		username: login.username.clone(),
		ip_address: login.ip_address.clone(),
		ip_info,
		skin_hash: login.skin_hash.clone(),
		server_name: login
			.server_name
			.clone()
			.unwrap_or_else(|| tenant.server_name.clone()),
	};

	let outcome = tenant.db.upsert_on_login(&record, now).await?;
	let mut player = outcome.player;

	let registry = state
		.punishment_types
		.get(&tenant.server_name, &tenant.db)
		.await;

	// Identity changes void "permanent until username/skin change" punishments. A failure
	// here must not block the login.
	if outcome.username_changed || outcome.skin_changed {
		match engine::auto_unban_on_login(
			&tenant.db,
			&registry,
			login.minecraft_uuid,
			outcome.username_changed,
			outcome.skin_changed,
			now,
		)
		.await
		{
			Ok(voided) if !voided.is_empty() => {
				if let Some(fresh) = tenant.db.get_player(login.minecraft_uuid).await? {
					player = fresh;
				}
			}
			Ok(_) => {}
			Err(error) => {
				tracing::warn! {
					player = %login.minecraft_uuid,
					%error,
					"auto-unban failed during login",
				};
			}
		}
	}

	if outcome.new_ip {
		state.linker.schedule(&tenant.server_name, login.minecraft_uuid);
	}

	let kicks_since = now - Duration::milliseconds(KICK_LOGIN_WINDOW_MS);

	let active_punishments = selection::select_punishments(&player, &registry, kicks_since, now)
		.into_iter()
		.map(|punishment| selection::to_wire(punishment, &registry, now))
		.collect_vec();

	let pending_notifications = tenant
		.db
		.update_player(login.minecraft_uuid, |player| Ok(player.drain_notifications()))
		.await?;

	Ok(Json(LoginResponse {
		status: 200,
		active_punishments,
		pending_notifications,
	}))
}
