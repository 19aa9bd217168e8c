//! HTTP handlers for the `/appeals` root route.

use std::collections::BTreeMap;

use axum::extract::Query;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::appeals::{Ticket, TicketData, TicketId, TicketReply, TicketStatus, TicketType};
use crate::auth::{PanelTenant, Session};
use crate::punishments::PunishmentId;
use crate::responses::Created;
use crate::{Error, Result, State};

/// How often a colliding ticket id is re-rolled before giving up.
const MAX_ID_ATTEMPTS: u32 = 5;

/// Request payload for filing an appeal.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewAppeal {
	/// The punishment being appealed.
	pub punishment_id: PunishmentId,

	/// The punished player.
	pub player_uuid: Uuid,

	/// Where to reach the appellant.
	pub email: String,

	/// Why the punishment should be revoked.
	pub reason: String,

	/// Supporting evidence.
	#[serde(default, deserialize_with = "crate::serde::string::deserialize_empty_as_none")]
	pub evidence: Option<String>,

	/// Additional appeal-form answers, keyed by field id.
	#[serde(default)]
	pub additional_data: BTreeMap<String, JsonValue>,

	/// Human-readable labels for the `additional_data` keys.
	#[serde(default)]
	pub field_labels: BTreeMap<String, String>,

	/// Attachment URLs.
	#[serde(default, deserialize_with = "crate::serde::vec::deserialize_empty_as_none")]
	pub attachments: Option<Vec<String>>,
}

/// Response payload after filing an appeal.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatedAppeal {
	/// The new appeal's ticket id.
	pub id: TicketId,
}

/// File an appeal against a punishment.
#[tracing::instrument(skip(state, tenant, appeal), fields(server = %tenant.server_name))]
#[utoipa::path(
  post,
  path = "/appeals",
  tag = "Appeals",
  request_body = NewAppeal,
  responses(
    (status = 201, body = CreatedAppeal),
    (status = 400, description = "missing required fields"),
    (status = 404, description = "player or punishment not found"),
    (status = 409, description = "an appeal already exists for this punishment"),
  ),
)]
pub async fn post(
	state: State,
	tenant: PanelTenant,
	Json(appeal): Json<NewAppeal>,
) -> Result<Created<Json<CreatedAppeal>>> {
	if appeal.email.trim().is_empty() {
		return Err(Error::invalid("email"));
	}

	if appeal.reason.trim().is_empty() {
		return Err(Error::invalid("reason"));
	}

	let now = Utc::now();
	let player = tenant.db.require_player(appeal.player_uuid).await?;

	let punishment = player
		.punishment(&appeal.punishment_id)
		.ok_or_else(|| Error::not_found("punishment"))?;

	if tenant
		.db
		.find_appeal_for_punishment(&appeal.punishment_id)
		.await?
		.is_some()
	{
		return Err(Error::duplicate_appeal(appeal.punishment_id.clone()));
	}

	let registry = state
		.punishment_types
		.get(&tenant.server_name, &tenant.db)
		.await;

	let kind_tag = registry.kind_of(punishment.type_ordinal).to_string();
	let creator = player
		.current_username()
		.unwrap_or("unknown player")
		.to_owned();

	let content = compose_initial_reply(&appeal);

	let mut ticket = Ticket {
		id: TicketId::generate(TicketType::Appeal.id_prefix()),
		kind: TicketType::Appeal,
		status: TicketStatus::Open,
		created: now,
		creator: creator.clone(),
		creator_uuid: Some(appeal.player_uuid),
		tags: vec!["appeal".to_owned(), kind_tag],
		replies: vec![TicketReply {
			name: creator,
			content,
			kind: "player".to_owned(),
			created: now,
			staff: false,
			action: None,
			attachments: appeal.attachments.clone(),
		}],
		data: TicketData {
			punishment_id: Some(appeal.punishment_id.clone()),
			player_uuid: Some(appeal.player_uuid),
			contact_email: Some(appeal.email.clone()),
			..Default::default()
		},
		locked: false,
	};

	// Six random digits can collide; re-roll a few times before reporting an error.
	let mut inserted = false;

	for attempt in 0..MAX_ID_ATTEMPTS {
		if tenant.db.get_ticket(&ticket.id).await?.is_some() {
			ticket.id = TicketId::generate(TicketType::Appeal.id_prefix());
			continue;
		}

		match tenant.db.insert_ticket(&ticket).await {
			Ok(()) => {
				inserted = true;
				break;
			}
			Err(error) if attempt + 1 == MAX_ID_ATTEMPTS => return Err(error),
			Err(_) => {
				ticket.id = TicketId::generate(TicketType::Appeal.id_prefix());
			}
		}
	}

	if !inserted {
		return Err(Error::save_conflict().context("could not allocate a ticket id"));
	}

	let ticket_id = ticket.id.clone();
	let punishment_id = appeal.punishment_id.clone();

	tenant
		.db
		.update_player(appeal.player_uuid, |player| {
			let punishment = player
				.punishment_mut(&punishment_id)
				.ok_or_else(|| Error::not_found("punishment"))?;

			if !punishment.attached_ticket_ids.iter().any(|id| id == &ticket_id.0) {
				punishment.attached_ticket_ids.push(ticket_id.0.clone());
			}

			Ok(())
		})
		.await?;

	tracing::info! {
		server = %tenant.server_name,
		ticket = %ticket.id,
		punishment = %appeal.punishment_id,
		"appeal filed",
	};

	Ok(Created(Json(CreatedAppeal { id: ticket.id })))
}

/// Query parameters for `/appeals`.
#[derive(Debug, Deserialize, IntoParams)]
pub struct GetParams {
	/// Maximum number of results to return.
	#[serde(default = "GetParams::default_limit")]
	pub limit: i64,
}

impl GetParams {
	/// The default result limit.
	const fn default_limit() -> i64 {
		100
	}
}

/// Fetch appeal tickets.
#[tracing::instrument(skip(session), fields(server = %session.server_name))]
#[utoipa::path(
  get,
  path = "/appeals",
  tag = "Appeals",
  params(GetParams),
  responses(
    (status = 200, body = Vec<Ticket>),
    (status = 401, description = "not logged in"),
  ),
)]
pub async fn get(
	session: Session,
	Query(GetParams { limit }): Query<GetParams>,
) -> Result<Json<Vec<Ticket>>> {
	let tickets = session
		.db
		.list_tickets(Some(TicketType::Appeal), limit.clamp(1, 500))
		.await?;

	if tickets.is_empty() {
		return Err(Error::no_content());
	}

	Ok(Json(tickets))
}

/// Composes the appeal's initial player reply from the form answers.
fn compose_initial_reply(appeal: &NewAppeal) -> String {
	let mut content = appeal.reason.trim().to_owned();

	if let Some(evidence) = &appeal.evidence {
		content.push_str("\n\nEvidence:\n");
		content.push_str(evidence.trim());
	}

	for (field, value) in &appeal.additional_data {
		let label = appeal
			.field_labels
			.get(field)
			.map_or(field.as_str(), String::as_str);

		let rendered = match value {
			JsonValue::String(text) => text.clone(),
			other => other.to_string(),
		};

		content.push_str("\n\n");
		content.push_str(label);
		content.push_str(":\n");
		content.push_str(&rendered);
	}

	content.push_str("\n\nContact: ");
	content.push_str(appeal.email.trim());

	content
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeMap;

	use serde_json::json;
	use uuid::Uuid;

	use super::{compose_initial_reply, NewAppeal};
	use crate::punishments::PunishmentId;

	#[test]
	fn initial_reply_uses_field_labels() {
		let appeal = NewAppeal {
			punishment_id: PunishmentId::from("ABCD1234"),
			player_uuid: Uuid::new_v4(),
			email: "steve@example.com".to_owned(),
			reason: "I was not cheating".to_owned(),
			evidence: Some("https://youtu.be/clip".to_owned()),
			additional_data: BTreeMap::from([("pvp_experience".to_owned(), json!("5 years"))]),
			field_labels: BTreeMap::from([(
				"pvp_experience".to_owned(),
				"PvP experience".to_owned(),
			)]),
			attachments: None,
		};

		let content = compose_initial_reply(&appeal);

		assert!(content.starts_with("I was not cheating"));
		assert!(content.contains("Evidence:\nhttps://youtu.be/clip"));
		assert!(content.contains("PvP experience:\n5 years"));
		assert!(content.ends_with("Contact: steve@example.com"));
	}
}
