//! HTTP handler for in-game ticket creation.

use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::appeals::{Ticket, TicketData, TicketId, TicketReply, TicketStatus, TicketType};
use crate::auth::Tenant;
use crate::responses::Created;
use crate::{Error, Result};

/// Request payload for creating a ticket from in-game.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewTicket {
	/// What kind of ticket to create. Appeals use `POST /appeals` instead.
	#[serde(rename = "type")]
	pub kind: TicketType,

	/// The Minecraft UUID of the reporter.
	pub creator_uuid: Uuid,

	/// The reporter's username, if the game server already knows it.
	#[serde(default)]
	pub creator: Option<String>,

	/// The ticket body.
	pub content: String,

	/// The reported player, for report tickets.
	#[serde(default)]
	pub reported_player_uuid: Option<Uuid>,

	/// Extra tags.
	#[serde(default)]
	pub tags: Vec<String>,
}

/// Response payload after creating a ticket.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatedTicket {
	/// The new ticket's id.
	pub id: TicketId,
}

/// Create a ticket from in-game.
#[tracing::instrument(skip(tenant, new_ticket), fields(server = %tenant.server_name))]
#[utoipa::path(
  post,
  path = "/ticket/create",
  tag = "Tickets",
  security(("API Key" = [])),
  request_body = NewTicket,
  responses(
    (status = 201, body = CreatedTicket),
    (status = 400, description = "missing required fields"),
    (status = 401, description = "missing or invalid API key"),
  ),
)]
pub async fn create(
	tenant: Tenant,
	Json(new_ticket): Json<NewTicket>,
) -> Result<Created<Json<CreatedTicket>>> {
	if new_ticket.content.trim().is_empty() {
		return Err(Error::invalid("content"));
	}

	if new_ticket.kind == TicketType::Appeal {
		return Err(Error::invalid("type: appeals are filed through the panel"));
	}

	let now = Utc::now();

	let creator = match new_ticket.creator {
		Some(name) => name,
		None => tenant
			.db
			.get_player(new_ticket.creator_uuid)
			.await?
			.as_ref()
			.and_then(|player| player.current_username())
			.unwrap_or("unknown player")
			.to_owned(),
	};

	let mut tags = vec![serde_json::to_value(new_ticket.kind)?
		.as_str()
		.unwrap_or("ticket")
		.to_owned()];
	tags.extend(new_ticket.tags);

	let mut ticket = Ticket {
		id: TicketId::generate(new_ticket.kind.id_prefix()),
		kind: new_ticket.kind,
		status: TicketStatus::Open,
		created: now,
		creator: creator.clone(),
		creator_uuid: Some(new_ticket.creator_uuid),
		tags,
		replies: vec![TicketReply {
			name: creator,
			content: new_ticket.content,
			kind: "player".to_owned(),
			created: now,
			staff: false,
			action: None,
			attachments: None,
		}],
		data: TicketData {
			reported_player_uuid: new_ticket.reported_player_uuid,
			..Default::default()
		},
		locked: false,
	};

	// Re-roll colliding ids a few times.
	for _ in 0..5_u32 {
		if tenant.db.get_ticket(&ticket.id).await?.is_none() {
			break;
		}

		ticket.id = TicketId::generate(new_ticket.kind.id_prefix());
	}

	tenant.db.insert_ticket(&ticket).await?;

	tracing::info! {
		server = %tenant.server_name,
		ticket = %ticket.id,
		"ticket created from in-game",
	};

	Ok(Created(Json(CreatedTicket { id: ticket.id })))
}
