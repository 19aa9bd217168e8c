//! Datastore operations on the `staff` collection.

use crate::database::{Collection, Datastore};
use crate::staff::Staff;
use crate::Result;

impl Datastore {
	/// Fetches a staff member by their panel username.
	pub async fn get_staff(&self, username: &str) -> Result<Option<Staff>> {
		self.load(Collection::Staff, username).await
	}

	/// Fetches the staff member whose assigned Minecraft username matches `name`
	/// (case-insensitively).
	pub async fn find_staff_by_minecraft_username(&self, name: &str) -> Result<Option<Staff>> {
		let raw = sqlx::query_scalar::<_, String>(
			"SELECT doc FROM staff \
			 WHERE lower(json_extract(doc, '$.assignedMinecraftUsername')) = lower(?)",
		)
		.bind(name)
		.fetch_optional(self.pool())
		.await?;

		raw.as_deref().map(Self::decode).transpose()
	}

	/// Fetches all staff members.
	pub async fn list_staff(&self) -> Result<Vec<Staff>> {
		let rows = sqlx::query_scalar::<_, String>("SELECT doc FROM staff ORDER BY username")
			.fetch_all(self.pool())
			.await?;

		rows.iter().map(|raw| Self::decode(raw)).collect()
	}

	/// Inserts or replaces a staff member.
	pub async fn upsert_staff(&self, staff: &Staff) -> Result<()> {
		self.upsert(Collection::Staff, &staff.username, staff).await
	}
}
