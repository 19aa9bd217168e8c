//! Canonicalisation of legacy document shapes.
//!
//! Older documents persisted their `data` fields as entry lists (`[["key", value], …]`) instead
//! of plain objects. Reads must tolerate both shapes; writes always produce objects. The
//! conversion happens once, on the raw JSON value, before a document is deserialized into its
//! typed form.

use serde_json::{Map, Value};

/// Recursively rewrites every `data` field that is stored as an entry list into a plain object.
pub(crate) fn canonicalize_data_maps(value: &mut Value) {
	match value {
		Value::Object(map) => {
			for (key, field) in map.iter_mut() {
				if key == "data" {
					if let Some(object) = entries_to_object(field) {
						*field = object;
					}
				}

				canonicalize_data_maps(field);
			}
		}
		Value::Array(items) => {
			for item in items.iter_mut() {
				canonicalize_data_maps(item);
			}
		}
		_ => {}
	}
}

/// Converts an entry list (`[["key", value], …]`) into an object.
///
/// Returns `None` if `value` is not an entry list. An empty array counts as an empty map, since
/// a `data` field is never a legitimate plain list.
fn entries_to_object(value: &Value) -> Option<Value> {
	let Value::Array(items) = value else {
		return None;
	};

	let mut object = Map::with_capacity(items.len());

	for item in items {
		let Value::Array(pair) = item else {
			return None;
		};

		let [Value::String(key), entry] = pair.as_slice() else {
			return None;
		};

		object.insert(key.clone(), entry.clone());
	}

	Some(Value::Object(object))
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::canonicalize_data_maps;

	#[test]
	fn entry_lists_become_objects() {
		let mut doc = json!({
			"punishments": [{
				"id": "ABCD1234",
				"data": [["duration", 3600000], ["active", true]],
			}],
			"data": [["isOnline", false]],
		});

		canonicalize_data_maps(&mut doc);

		assert_eq!(
			doc,
			json!({
				"punishments": [{
					"id": "ABCD1234",
					"data": { "duration": 3600000, "active": true },
				}],
				"data": { "isOnline": false },
			})
		);
	}

	#[test]
	fn object_shaped_data_is_untouched() {
		let mut doc = json!({ "data": { "isOnline": true } });
		let expected = doc.clone();

		canonicalize_data_maps(&mut doc);

		assert_eq!(doc, expected);
	}

	#[test]
	fn empty_entry_lists_become_empty_objects() {
		let mut doc = json!({ "data": [] });

		canonicalize_data_maps(&mut doc);

		assert_eq!(doc, json!({ "data": {} }));
	}

	#[test]
	fn legitimate_lists_outside_data_fields_survive() {
		let mut doc = json!({ "attachments": [["https://cdn/evidence.png", "image"]] });
		let expected = doc.clone();

		canonicalize_data_maps(&mut doc);

		assert_eq!(doc, expected);
	}
}
