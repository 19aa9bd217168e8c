//! Types for modeling tickets and appeals.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::punishments::PunishmentId;

crate::make_str_id!(TicketId);

impl TicketId {
	/// Generates a ticket id of the form `<PREFIX>-<6 random digits>`.
	pub fn generate(prefix: &str) -> Self {
		let digits = rand::thread_rng().gen_range(0..=999_999_u32);

		Self(format!("{prefix}-{digits:06}"))
	}
}

/// The kinds of tickets the panel knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TicketType {
	/// An appeal against a punishment.
	Appeal,

	/// A bug report.
	Bug,

	/// A support request.
	Support,

	/// An in-game chat report.
	#[serde(rename = "chat_report")]
	ChatReport,

	/// An in-game player report.
	#[serde(rename = "player_report")]
	PlayerReport,

	/// Anything else, kept for forward compatibility.
	#[serde(other)]
	Other,
}

impl TicketType {
	/// The id prefix for tickets of this type.
	pub const fn id_prefix(self) -> &'static str {
		match self {
			Self::Appeal => "APPEAL",
			Self::Bug => "BUG",
			Self::Support => "SUPPORT",
			Self::ChatReport | Self::PlayerReport => "REPORT",
			Self::Other => "TICKET",
		}
	}
}

/// The status of a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum TicketStatus {
	#[allow(clippy::missing_docs_in_private_items)]
	Open,

	#[allow(clippy::missing_docs_in_private_items)]
	#[serde(rename = "Under Review")]
	UnderReview,

	#[allow(clippy::missing_docs_in_private_items)]
	#[serde(rename = "Pending Player Response")]
	PendingPlayerResponse,

	#[allow(clippy::missing_docs_in_private_items)]
	Approved,

	#[allow(clippy::missing_docs_in_private_items)]
	Denied,

	#[allow(clippy::missing_docs_in_private_items)]
	Accepted,

	#[allow(clippy::missing_docs_in_private_items)]
	Rejected,

	#[allow(clippy::missing_docs_in_private_items)]
	Resolved,

	#[allow(clippy::missing_docs_in_private_items)]
	Closed,
}

impl TicketStatus {
	/// Whether this status ends the ticket's lifecycle.
	pub const fn is_terminal(self) -> bool {
		matches!(
			self,
			Self::Approved
				| Self::Denied | Self::Accepted
				| Self::Rejected | Self::Resolved
				| Self::Closed
		)
	}

	/// The status string as shown in replies.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Open => "Open",
			Self::UnderReview => "Under Review",
			Self::PendingPlayerResponse => "Pending Player Response",
			Self::Approved => "Approved",
			Self::Denied => "Denied",
			Self::Accepted => "Accepted",
			Self::Rejected => "Rejected",
			Self::Resolved => "Resolved",
			Self::Closed => "Closed",
		}
	}
}

/// A reply on a ticket.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TicketReply {
	/// Who wrote the reply.
	pub name: String,

	/// The reply text.
	pub content: String,

	/// Who kind of author wrote it: `player`, `staff` or `system`.
	#[serde(rename = "type")]
	pub kind: String,

	/// When the reply was written.
	#[serde(with = "chrono::serde::ts_milliseconds")]
	#[schema(value_type = i64)]
	pub created: DateTime<Utc>,

	/// Whether the author was staff.
	pub staff: bool,

	/// The action this reply records (status changes and the like).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub action: Option<String>,

	/// Attachment URLs.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub attachments: Option<Vec<String>>,
}

/// The well-known keys of a ticket's `data` map, plus a spill bag for everything else.
#[derive(Debug, Default, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct TicketData {
	/// For appeals: the punishment being appealed.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub punishment_id: Option<PunishmentId>,

	/// For appeals: the punished player.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub player_uuid: Option<Uuid>,

	/// For appeals: where to reach the appellant.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub contact_email: Option<String>,

	/// The terminal resolution (`Approved`, `Denied`, …).
	#[serde(skip_serializing_if = "Option::is_none")]
	pub resolution: Option<String>,

	/// For reports: the reported player.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reported_player_uuid: Option<Uuid>,

	/// Keys this core does not interpret.
	#[serde(flatten)]
	#[schema(value_type = Object)]
	pub rest: BTreeMap<String, JsonValue>,
}

/// A ticket.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
	/// The ticket's id (`APPEAL-123456`).
	#[serde(rename = "_id")]
	pub id: TicketId,

	/// What kind of ticket this is.
	#[serde(rename = "type")]
	pub kind: TicketType,

	/// The ticket's current status.
	pub status: TicketStatus,

	/// When the ticket was created.
	#[serde(with = "chrono::serde::ts_milliseconds")]
	#[schema(value_type = i64)]
	pub created: DateTime<Utc>,

	/// The display name of whoever created the ticket.
	pub creator: String,

	/// The Minecraft UUID of whoever created the ticket, if known.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub creator_uuid: Option<Uuid>,

	/// Freeform tags (`appeal`, `ban`, …).
	#[serde(default)]
	pub tags: Vec<String>,

	/// The conversation on the ticket.
	#[serde(default)]
	pub replies: Vec<TicketReply>,

	/// The ticket's key/value data.
	#[serde(default)]
	pub data: TicketData,

	/// Whether the ticket is locked against further player replies.
	#[serde(default)]
	pub locked: bool,
}

impl Ticket {
	/// Appends a system reply recording an action.
	pub fn add_system_reply(&mut self, content: String, action: String, now: DateTime<Utc>) {
		self.replies.push(TicketReply {
			name: "System".to_owned(),
			content,
			kind: "system".to_owned(),
			created: now,
			staff: false,
			action: Some(action),
			attachments: None,
		});
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::{TicketId, TicketStatus, TicketType};

	#[test]
	fn generated_ids_carry_the_prefix_and_six_digits() {
		let id = TicketId::generate(TicketType::Appeal.id_prefix());

		let (prefix, digits) = id.0.split_once('-').expect("id contains a dash");

		assert_eq!(prefix, "APPEAL");
		assert_eq!(digits.len(), 6);
		assert!(digits.chars().all(|char| char.is_ascii_digit()));
	}

	#[test]
	fn statuses_with_spaces_round_trip() {
		let status = serde_json::from_value::<TicketStatus>(json!("Pending Player Response"))
			.expect("parses");

		assert_eq!(status, TicketStatus::PendingPlayerResponse);
		assert!(!status.is_terminal());
		assert!(TicketStatus::Resolved.is_terminal());
	}

	#[test]
	fn unknown_ticket_types_fall_back_to_other() {
		let kind = serde_json::from_value::<TicketType>(json!("billing")).expect("parses");

		assert_eq!(kind, TicketType::Other);
	}
}
