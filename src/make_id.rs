//! A helper macro for creating "ID" types.
//!
//! Every identifier that travels through documents and wire payloads is a string with semantic
//! meaning (a punishment id, a ticket id). [`make_str_id!()`] creates thin wrappers around
//! [`String`] so they cannot be mixed up.
//!
//! [`make_str_id!()`]: crate::make_str_id

/// Creates a thin string wrapper that can be used as an ID with semantic meaning.
#[macro_export]
macro_rules! make_str_id {
	($name:ident) => {
		#[allow(missing_docs, clippy::missing_docs_in_private_items)]
		#[repr(transparent)]
		#[derive(
			Debug,
			Clone,
			PartialEq,
			Eq,
			PartialOrd,
			Ord,
			Hash,
			::derive_more::Display,
			::derive_more::Into,
			::derive_more::From,
			::serde::Serialize,
			::serde::Deserialize,
			::utoipa::ToSchema,
		)]
		#[serde(transparent)]
		#[display("{_0}")]
		pub struct $name(pub String);

		impl ::std::ops::Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}

		impl From<&str> for $name {
			fn from(value: &str) -> Self {
				Self(value.to_owned())
			}
		}

		impl PartialEq<str> for $name {
			fn eq(&self, other: &str) -> bool {
				self.0 == other
			}
		}

		impl PartialEq<&str> for $name {
			fn eq(&self, other: &&str) -> bool {
				self.0 == *other
			}
		}
	};
}
