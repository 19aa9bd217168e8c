//! HTTP handlers for the `/audit` routes, logs, stats and the activity feed.

use axum::extract::{Path, Query};
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::audit::{rollback, LogEntry};
use crate::auth::{Role, Session};
use crate::punishments::PunishmentId;
use crate::settings::PunishmentKind;
use crate::{Error, Result, State};

/// Request payload for a single rollback.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RollbackRequest {
	/// Why the punishment is rolled back.
	#[serde(default, deserialize_with = "crate::serde::string::deserialize_empty_as_none")]
	pub reason: Option<String>,
}

/// Response payload after a rollback.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RollbackResponse {
	/// How many punishments were rolled back.
	pub count: usize,

	/// The rolled back punishments.
	pub punishment_ids: Vec<PunishmentId>,

	/// How many players could not be saved (bulk operations only).
	pub failed_players: u64,
}

/// Roll back a single punishment.
#[tracing::instrument(skip(session, request), fields(server = %session.server_name))]
#[utoipa::path(
  post,
  path = "/audit/punishment/{id}/rollback",
  tag = "Audit",
  params(("id" = String, Path, description = "the punishment id")),
  request_body = RollbackRequest,
  responses(
    (status = 200, body = RollbackResponse),
    (status = 401, description = "not logged in"),
    (status = 403, description = "requires the Admin role"),
    (status = 404, description = "no such punishment"),
    (status = 409, description = "the punishment is already rolled back"),
  ),
)]
pub async fn rollback_single(
	session: Session,
	Path(id): Path<PunishmentId>,
	Json(request): Json<RollbackRequest>,
) -> Result<Json<RollbackResponse>> {
	session.require(Role::Admin)?;

	let (_, punishment) = rollback::rollback_single(
		&session.db,
		&id,
		&session.staff.username,
		request.reason,
		Utc::now(),
	)
	.await?;

	Ok(Json(RollbackResponse {
		count: 1,
		punishment_ids: vec![punishment.id],
		failed_players: 0,
	}))
}

/// Request payload for a bulk rollback.
///
/// Either an explicit `[startTs, endTs]` window or a legacy `timeRange` token
/// (`1h`, `6h`, `24h`, `7d`, `30d`, `all`).
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkRollbackRequest {
	/// The legacy window token.
	#[serde(default)]
	pub time_range: Option<String>,

	/// Window start (Unix milliseconds).
	#[serde(default, with = "chrono::serde::ts_milliseconds_option")]
	#[schema(value_type = Option<i64>)]
	pub start_ts: Option<DateTime<Utc>>,

	/// Window end (Unix milliseconds); defaults to now.
	#[serde(default, with = "chrono::serde::ts_milliseconds_option")]
	#[schema(value_type = Option<i64>)]
	pub end_ts: Option<DateTime<Utc>>,
}

impl BulkRollbackRequest {
	/// Resolves the request into an explicit window.
	fn window(&self, now: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
		if let Some(start) = self.start_ts {
			return Ok((start, self.end_ts.unwrap_or(now)));
		}

		let token = self
			.time_range
			.as_deref()
			.ok_or_else(|| Error::invalid("timeRange: provide a token or startTs/endTs"))?;

		rollback::window_from_token(token, now)
			.ok_or_else(|| Error::invalid(format_args!("timeRange `{token}`")))
	}
}

/// Roll back every punishment issued in a window.
#[tracing::instrument(skip(session, request), fields(server = %session.server_name))]
#[utoipa::path(
  post,
  path = "/audit/punishments/bulk-rollback",
  tag = "Audit",
  request_body = BulkRollbackRequest,
  responses(
    (status = 200, body = RollbackResponse),
    (status = 400, description = "no usable window"),
    (status = 401, description = "not logged in"),
    (status = 403, description = "requires the Admin role"),
  ),
)]
pub async fn bulk_rollback(
	session: Session,
	Json(request): Json<BulkRollbackRequest>,
) -> Result<Json<RollbackResponse>> {
	session.require(Role::Admin)?;

	let now = Utc::now();
	let (start, end) = request.window(now)?;

	let summary = rollback::rollback_window(
		&session.db,
		start,
		end,
		None,
		&session.staff.username,
		now,
	)
	.await?;

	Ok(Json(RollbackResponse {
		count: summary.punishment_ids.len(),
		punishment_ids: summary.punishment_ids,
		failed_players: summary.failed_players,
	}))
}

/// Request payload for rolling back a staff member's punishments in a window.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StaffRollbackRequest {
	/// Window start (Unix milliseconds).
	#[serde(with = "chrono::serde::ts_milliseconds")]
	#[schema(value_type = i64)]
	pub start_date: DateTime<Utc>,

	/// Window end (Unix milliseconds).
	#[serde(with = "chrono::serde::ts_milliseconds")]
	#[schema(value_type = i64)]
	pub end_date: DateTime<Utc>,
}

/// Roll back everything a staff member issued inside a window.
///
/// `username` is matched against punishment `issuerName`s.
#[tracing::instrument(skip(session, request), fields(server = %session.server_name))]
#[utoipa::path(
  post,
  path = "/audit/staff/{username}/rollback-date-range",
  tag = "Audit",
  params(("username" = String, Path, description = "the issuing staff member")),
  request_body = StaffRollbackRequest,
  responses(
    (status = 200, body = RollbackResponse),
    (status = 401, description = "not logged in"),
    (status = 403, description = "requires the Admin role"),
  ),
)]
pub async fn staff_rollback(
	session: Session,
	Path(username): Path<String>,
	Json(request): Json<StaffRollbackRequest>,
) -> Result<Json<RollbackResponse>> {
	session.require(Role::Admin)?;

	if request.end_date < request.start_date {
		return Err(Error::invalid("endDate: must not precede startDate"));
	}

	let summary = rollback::rollback_window(
		&session.db,
		request.start_date,
		request.end_date,
		Some(&username),
		&session.staff.username,
		Utc::now(),
	)
	.await?;

	Ok(Json(RollbackResponse {
		count: summary.punishment_ids.len(),
		punishment_ids: summary.punishment_ids,
		failed_players: summary.failed_players,
	}))
}

/// Query parameters for `GET /logs`.
#[derive(Debug, Deserialize, IntoParams)]
pub struct LogParams {
	/// Maximum number of entries to return.
	#[serde(default = "LogParams::default_limit")]
	pub limit: i64,
}

impl LogParams {
	/// The default result limit.
	const fn default_limit() -> i64 {
		100
	}
}

/// Fetch the tenant's audit log, newest first.
#[tracing::instrument(skip(session), fields(server = %session.server_name))]
#[utoipa::path(
  get,
  path = "/logs",
  tag = "Audit",
  params(LogParams),
  responses(
    (status = 200, body = Vec<LogEntry>),
    (status = 401, description = "not logged in"),
    (status = 403, description = "requires the Admin role"),
  ),
)]
pub async fn logs(
	session: Session,
	Query(LogParams { limit }): Query<LogParams>,
) -> Result<Json<Vec<LogEntry>>> {
	session.require(Role::Admin)?;

	let entries = session.db.list_logs(limit.clamp(1, 1_000)).await?;

	if entries.is_empty() {
		return Err(Error::no_content());
	}

	Ok(Json(entries))
}

/// Tenant statistics for the panel dashboard.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TenantStats {
	/// How many players the tenant has ever seen.
	pub total_players: u64,

	/// How many players are currently online.
	pub online_players: u64,

	/// How many bans are currently active.
	pub active_bans: u64,

	/// How many mutes are currently active.
	pub active_mutes: u64,

	/// How many tickets are awaiting staff attention.
	pub open_tickets: u64,
}

/// Fetch tenant statistics.
#[tracing::instrument(skip(state, session), fields(server = %session.server_name))]
#[utoipa::path(
  get,
  path = "/stats",
  tag = "Audit",
  responses(
    (status = 200, body = TenantStats),
    (status = 401, description = "not logged in"),
  ),
)]
pub async fn stats(state: State, session: Session) -> Result<Json<TenantStats>> {
	let now = Utc::now();

	let registry = state
		.punishment_types
		.get(&session.server_name, &session.db)
		.await;

	let players = session.db.all_players().await?;

	let active_of = |kind: PunishmentKind| -> u64 {
		players
			.iter()
			.flat_map(|player| &player.punishments)
			.filter(|punishment| {
				registry.kind_of(punishment.type_ordinal) == kind
					&& punishment.is_active(now)
			})
			.count()
			.try_into()
			.unwrap_or(u64::MAX)
	};

	Ok(Json(TenantStats {
		total_players: players.len().try_into().unwrap_or(u64::MAX),
		online_players: players
			.iter()
			.filter(|player| player.data.is_online)
			.count()
			.try_into()
			.unwrap_or(u64::MAX),
		active_bans: active_of(PunishmentKind::Ban),
		active_mutes: active_of(PunishmentKind::Mute),
		open_tickets: session.db.count_open_tickets().await?,
	}))
}

/// One entry of the recent activity feed.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
	/// What kind of event this is: `punishment`, `ticket` or `log`.
	pub kind: &'static str,

	/// When the event happened.
	#[serde(with = "chrono::serde::ts_milliseconds")]
	#[schema(value_type = i64)]
	pub timestamp: DateTime<Utc>,

	/// A one-line description.
	pub summary: String,

	/// The player the event concerns, if any.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub player_uuid: Option<Uuid>,
}

/// How far back the activity feed looks.
const ACTIVITY_WINDOW_HOURS: i64 = 24;

/// The maximum number of activity entries returned.
const ACTIVITY_LIMIT: usize = 50;

/// Fetch the last day of moderation activity: punishments, tickets and audit entries merged
/// into one reverse-chronological feed.
#[tracing::instrument(skip(session), fields(server = %session.server_name))]
#[utoipa::path(
  get,
  path = "/activity/recent",
  tag = "Audit",
  responses(
    (status = 200, body = Vec<ActivityEntry>),
    (status = 401, description = "not logged in"),
  ),
)]
pub async fn recent_activity(session: Session) -> Result<Json<Vec<ActivityEntry>>> {
	let since = Utc::now() - Duration::hours(ACTIVITY_WINDOW_HOURS);
	let mut feed = Vec::new();

	for player in session.db.all_players().await? {
		for punishment in &player.punishments {
			if punishment.issued < since {
				continue;
			}

			feed.push(ActivityEntry {
				kind: "punishment",
				timestamp: punishment.issued,
				summary: format!(
					"{issuer} punished {player} ({id})",
					issuer = punishment.issuer_name,
					player = player
						.current_username()
						.unwrap_or("unknown player"),
					id = punishment.id,
				),
				player_uuid: Some(player.minecraft_uuid),
			});
		}
	}

	for ticket in session.db.tickets_since(since).await? {
		feed.push(ActivityEntry {
			kind: "ticket",
			timestamp: ticket.created,
			summary: format!(
				"{creator} opened {id}",
				creator = ticket.creator,
				id = ticket.id,
			),
			player_uuid: ticket.creator_uuid,
		});
	}

	for entry in session.db.logs_since(since).await? {
		feed.push(ActivityEntry {
			kind: "log",
			timestamp: entry.created,
			summary: format!("[{source}] {message}", source = entry.source, message = entry.message),
			player_uuid: None,
		});
	}

	let feed = feed
		.into_iter()
		.sorted_by_key(|entry| std::cmp::Reverse(entry.timestamp))
		.take(ACTIVITY_LIMIT)
		.collect_vec();

	if feed.is_empty() {
		return Err(Error::no_content());
	}

	Ok(Json(feed))
}
