//! Datastore operations on the `settings` collection.

use crate::database::{Collection, Datastore};
use crate::settings::Settings;
use crate::Result;

/// The fixed id of the settings singleton.
const SETTINGS_ID: &str = "0";

impl Datastore {
	/// Fetches the tenant's settings document.
	pub async fn get_settings(&self) -> Result<Option<Settings>> {
		self.load(Collection::Settings, SETTINGS_ID).await
	}

	/// Replaces the tenant's settings document.
	pub async fn save_settings(&self, settings: &Settings) -> Result<()> {
		self.upsert(Collection::Settings, SETTINGS_ID, settings).await
	}
}
