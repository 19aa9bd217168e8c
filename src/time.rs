//! Helper types to deal with time.
//!
//! Durations in documents and wire payloads are integer milliseconds, with `-1` meaning
//! "permanent". Timestamps are integer Unix milliseconds (see the `chrono::serde` modules used
//! on the model types).

use chrono::{DateTime, Duration, Utc};
use derive_more::{Deref, DerefMut, Display, From, Into};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A duration in milliseconds as stored in punishment data.
///
/// Negative values mean "permanent".
#[derive(
	Debug,
	Display,
	Default,
	Clone,
	Copy,
	PartialEq,
	Eq,
	PartialOrd,
	Ord,
	Hash,
	Deref,
	DerefMut,
	From,
	Into,
	Serialize,
	Deserialize,
	ToSchema,
)]
#[serde(transparent)]
#[display("{_0}")]
pub struct Millis(pub i64);

impl Millis {
	/// The marker value for permanent punishments.
	pub const PERMANENT: Self = Self(-1);

	/// Whether this duration marks a permanent punishment.
	pub const fn is_permanent(self) -> bool {
		self.0 < 0
	}

	/// Converts this value into a [`chrono::Duration`], if it represents an actual duration.
	pub fn to_duration(self) -> Option<Duration> {
		(self.0 >= 0).then(|| Duration::milliseconds(self.0))
	}

	/// The expiry timestamp of a punishment with this duration, starting at `started`.
	///
	/// Permanent durations have no expiry.
	pub fn expiry_from(self, started: DateTime<Utc>) -> Option<DateTime<Utc>> {
		self.to_duration().map(|duration| started + duration)
	}
}

impl From<Duration> for Millis {
	fn from(duration: Duration) -> Self {
		Self(duration.num_milliseconds())
	}
}

#[cfg(test)]
mod tests {
	use chrono::{Duration, TimeZone, Utc};

	use super::Millis;

	#[test]
	fn permanent_durations_never_expire() {
		let start = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();

		assert!(Millis::PERMANENT.is_permanent());
		assert_eq!(Millis::PERMANENT.expiry_from(start), None);
		assert_eq!(Millis::PERMANENT.to_duration(), None);
	}

	#[test]
	fn finite_durations_expire_relative_to_start() {
		let start = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
		let hour = Millis(3_600_000);

		assert!(!hour.is_permanent());
		assert_eq!(hour.expiry_from(start), Some(start + Duration::hours(1)));
	}
}
