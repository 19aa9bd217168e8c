//! Custom [`serde`] functions.

#![allow(missing_docs)]

pub mod string {
	use serde::{Deserialize, Deserializer};

	pub fn deserialize_empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
	where
		D: Deserializer<'de>,
	{
		let Some(value) = Option::<String>::deserialize(deserializer)? else {
			return Ok(None);
		};

		if value.trim().is_empty() {
			return Ok(None);
		}

		Ok(Some(value))
	}
}

pub mod timestamps {
	//! (De)serializes a `Vec<DateTime<Utc>>` as integer Unix milliseconds.

	use chrono::{DateTime, TimeZone, Utc};
	use serde::ser::SerializeSeq;
	use serde::{de, Deserialize, Deserializer, Serializer};

	pub fn serialize<S>(timestamps: &[DateTime<Utc>], serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let mut seq = serializer.serialize_seq(Some(timestamps.len()))?;

		for timestamp in timestamps {
			seq.serialize_element(&timestamp.timestamp_millis())?;
		}

		seq.end()
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<DateTime<Utc>>, D::Error>
	where
		D: Deserializer<'de>,
	{
		Vec::<i64>::deserialize(deserializer)?
			.into_iter()
			.map(|millis| {
				Utc.timestamp_millis_opt(millis).single().ok_or_else(|| {
					de::Error::custom(format_args!("timestamp out of range: {millis}"))
				})
			})
			.collect()
	}
}

pub mod vec {
	use serde::{Deserialize, Deserializer};

	pub fn deserialize_empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
	where
		D: Deserializer<'de>,
		T: Deserialize<'de>,
	{
		let Some(vec) = Option::<Vec<T>>::deserialize(deserializer)? else {
			return Ok(None);
		};

		if vec.is_empty() {
			return Ok(None);
		}

		Ok(Some(vec))
	}
}
