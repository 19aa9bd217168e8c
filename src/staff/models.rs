//! Types for modeling staff members.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::Role;

/// A staff member of a tenant.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Staff {
	/// The staff member's panel username.
	pub username: String,

	/// The staff member's contact email.
	#[serde(default)]
	pub email: Option<String>,

	/// The staff member's role.
	pub role: Role,

	/// The Minecraft account assigned to this staff member, if any.
	#[serde(default)]
	pub assigned_minecraft_uuid: Option<Uuid>,

	/// The Minecraft username assigned to this staff member, if any.
	///
	/// Punishments issued in-game carry this name as `issuerName`; it is how audit entries
	/// find their way back to a staff record.
	#[serde(default)]
	pub assigned_minecraft_username: Option<String>,

	/// Tickets this staff member is subscribed to.
	#[serde(default)]
	pub subscribed_tickets: Vec<TicketSubscription>,
}

/// A staff member's subscription to a ticket.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TicketSubscription {
	/// The subscribed ticket.
	pub ticket_id: String,

	/// When the subscription was created.
	#[serde(with = "chrono::serde::ts_milliseconds")]
	#[schema(value_type = i64)]
	pub subscribed_at: DateTime<Utc>,

	/// Whether the subscription is still active.
	pub active: bool,

	/// When the staff member last read the ticket.
	#[serde(default, with = "chrono::serde::ts_milliseconds_option")]
	#[schema(value_type = Option<i64>)]
	pub last_read_at: Option<DateTime<Utc>>,
}

/// A staff member together with their derived permission set.
///
/// This is what game servers consume to decide which in-game commands a staff member may run.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StaffPermissions {
	/// The staff member's panel username.
	pub username: String,

	/// The Minecraft username assigned to this staff member, if any.
	pub assigned_minecraft_username: Option<String>,

	/// The Minecraft account assigned to this staff member, if any.
	pub assigned_minecraft_uuid: Option<Uuid>,

	/// The staff member's role.
	pub role: Role,

	/// The permission strings derived from the role.
	pub permissions: Vec<&'static str>,
}

impl From<Staff> for StaffPermissions {
	fn from(staff: Staff) -> Self {
		Self {
			username: staff.username,
			assigned_minecraft_username: staff.assigned_minecraft_username,
			assigned_minecraft_uuid: staff.assigned_minecraft_uuid,
			role: staff.role,
			permissions: staff.role.permissions(),
		}
	}
}
