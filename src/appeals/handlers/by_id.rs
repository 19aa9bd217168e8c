//! HTTP handlers for the `/appeals/{id}` routes.

use axum::extract::Path;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::appeals::{Ticket, TicketReply, TicketStatus};
use crate::auth::{Role, Session};
use crate::players::Notification;
use crate::punishments::engine;
use crate::{audit, Error, Result};

/// Fetch a single appeal ticket.
#[tracing::instrument(skip(session), fields(server = %session.server_name))]
#[utoipa::path(
  get,
  path = "/appeals/{id}",
  tag = "Appeals",
  params(("id" = String, Path, description = "the ticket id")),
  responses(
    (status = 200, body = Ticket),
    (status = 401, description = "not logged in"),
    (status = 404, description = "no such ticket"),
  ),
)]
pub async fn get(session: Session, Path(id): Path<String>) -> Result<Json<Ticket>> {
	let ticket = session
		.db
		.get_ticket(&id)
		.await?
		.ok_or_else(|| Error::not_found("ticket"))?;

	Ok(Json(ticket))
}

/// Request payload for replying to an appeal.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewReply {
	/// The reply text.
	pub content: String,

	/// An optional action marker.
	#[serde(default)]
	pub action: Option<String>,
}

/// Reply to an appeal ticket as staff.
#[tracing::instrument(skip(session, reply), fields(server = %session.server_name))]
#[utoipa::path(
  post,
  path = "/appeals/{id}/replies",
  tag = "Appeals",
  params(("id" = String, Path, description = "the ticket id")),
  request_body = NewReply,
  responses(
    (status = 200, body = Ticket),
    (status = 401, description = "not logged in"),
    (status = 404, description = "no such ticket"),
  ),
)]
pub async fn post_reply(
	session: Session,
	Path(id): Path<String>,
	Json(reply): Json<NewReply>,
) -> Result<Json<Ticket>> {
	if reply.content.trim().is_empty() {
		return Err(Error::invalid("content"));
	}

	let now = Utc::now();
	let staff_name = session.staff.username.clone();

	let ticket = session
		.db
		.update_ticket(&id, |ticket| {
			ticket.replies.push(TicketReply {
				name: staff_name.clone(),
				content: reply.content.clone(),
				kind: "staff".to_owned(),
				created: now,
				staff: true,
				action: reply.action.clone(),
				attachments: None,
			});

			Ok(ticket.clone())
		})
		.await?;

	notify_appellant(
		&session,
		&ticket,
		format!("Your appeal {id} has a new reply from staff"),
	)
	.await;

	Ok(Json(ticket))
}

/// Request payload for updating an appeal's status.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
	/// The new status.
	#[serde(default)]
	pub status: Option<TicketStatus>,

	/// The terminal resolution (`Approved`, `Denied`, …).
	#[serde(default)]
	pub resolution: Option<String>,

	/// Whether the ticket is locked against further player replies.
	#[serde(default)]
	pub locked: Option<bool>,
}

/// Update an appeal's status, resolution or lock state.
///
/// Every changed field is recorded as a system reply. Closing or resolving an appeal whose
/// resolution is `Approved` / `Accepted` applies the approval to the underlying punishment.
#[tracing::instrument(skip(session, update), fields(server = %session.server_name))]
#[utoipa::path(
  patch,
  path = "/appeals/{id}/status",
  tag = "Appeals",
  params(("id" = String, Path, description = "the ticket id")),
  request_body = StatusUpdate,
  responses(
    (status = 200, body = Ticket),
    (status = 401, description = "not logged in"),
    (status = 403, description = "requires the Moderator role"),
    (status = 404, description = "no such ticket"),
  ),
)]
pub async fn patch_status(
	session: Session,
	Path(id): Path<String>,
	Json(update): Json<StatusUpdate>,
) -> Result<Json<Ticket>> {
	session.require(Role::Moderator)?;

	let now = Utc::now();
	let staff_name = session.staff.username.clone();

	let (ticket, status_changed) = session
		.db
		.update_ticket(&id, |ticket| {
			let mut status_changed = false;

			if let Some(status) = update.status {
				if ticket.status != status {
					ticket.add_system_reply(
						format!(
							"{staff_name} changed the status from {} to {}",
							ticket.status.as_str(),
							status.as_str(),
						),
						"status_change".to_owned(),
						now,
					);

					ticket.status = status;
					status_changed = true;
				}
			}

			if let Some(resolution) = &update.resolution {
				if ticket.data.resolution.as_deref() != Some(resolution.as_str()) {
					ticket.add_system_reply(
						format!("{staff_name} set the resolution to {resolution}"),
						"resolution_change".to_owned(),
						now,
					);

					ticket.data.resolution = Some(resolution.clone());
				}
			}

			if let Some(locked) = update.locked {
				if ticket.locked != locked {
					ticket.add_system_reply(
						format!(
							"{staff_name} {} the ticket",
							if locked { "locked" } else { "unlocked" },
						),
						"lock_change".to_owned(),
						now,
					);

					ticket.locked = locked;
				}
			}

			Ok((ticket.clone(), status_changed))
		})
		.await?;

	let approved = matches!(
		ticket.status,
		TicketStatus::Closed | TicketStatus::Resolved
	) && matches!(
		ticket.data.resolution.as_deref(),
		Some("Approved") | Some("Accepted")
	);

	if approved {
		if let (Some(player_uuid), Some(punishment_id)) =
			(ticket.data.player_uuid, ticket.data.punishment_id.clone())
		{
			let resolution = ticket
				.data
				.resolution
				.clone()
				.unwrap_or_else(|| "Approved".to_owned());

			engine::apply_appeal_approval(
				&session.db,
				player_uuid,
				&punishment_id,
				&ticket.id,
				&resolution,
				&session.staff.username,
				now,
			)
			.await?;

			audit::record(
				&session.db,
				audit::LogLevel::Moderation,
				session.staff.username.clone(),
				format!(
					"approved appeal {id}, pardoning punishment {punishment_id}",
					id = ticket.id,
				),
				Some(serde_json::json!({
					"ticketId": ticket.id,
					"punishmentId": punishment_id,
					"playerUuid": player_uuid,
				})),
				now,
			)
			.await;

			notify_appellant(
				&session,
				&ticket,
				format!(
					"Your appeal {id} was {resolution}; the punishment has been lifted",
					id = ticket.id,
				),
			)
			.await;
		}
	} else if status_changed {
		notify_appellant(
			&session,
			&ticket,
			format!(
				"Your appeal {id} is now {status}",
				id = ticket.id,
				status = ticket.status.as_str(),
			),
		)
		.await;
	}

	Ok(Json(ticket))
}

/// Queues an `appeal_update` notification for the ticket's creator.
///
/// Failures are logged and swallowed; ticket updates must not fail because the player record
/// cannot be written.
async fn notify_appellant(session: &Session, ticket: &Ticket, message: String) {
	let Some(player_uuid) = ticket.data.player_uuid.or(ticket.creator_uuid) else {
		return;
	};

	let now = Utc::now();

	let result = session
		.db
		.update_player(player_uuid, |player| {
			player.enqueue_notification(Notification::new("appeal_update", &message, now));

			Ok(())
		})
		.await;

	if let Err(error) = result {
		tracing::warn! {
			ticket = %ticket.id,
			%error,
			"failed to queue appeal notification",
		};
	}
}
