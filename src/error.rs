//! Runtime errors.
//!
//! This module exposes the [`Error`] type that is used across the code base for bubbling up
//! errors. Any foreign errors that can occur at runtime can be turned into an [`Error`]. Specific
//! error cases have dedicated constructors, see all the public methods on [`Error`].
//!
//! [`Error`] implements [`IntoResponse`], which means it can be returned from HTTP handlers,
//! middleware, etc. The response body carries both the `{status, message}` envelope consumed by
//! game servers and the `{error}` field consumed by the panel frontend.
//!
//! This module also exposes a [`Result`] type alias, which sets [`Error`] as the default `E` type
//! parameter.
//!
//! [`Error`]: struct@Error

use std::fmt::{self, Display, Formatter};
use std::panic::Location;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::auth::Role;
use crate::punishments::PunishmentId;

/// Type alias for a [`Result<T, E>`] with its `E` parameter set to [`Error`].
///
/// [`Result`]: std::result::Result
/// [`Error`]: struct@Error
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The API's core error type.
///
/// Any errors that ever reach the outside should be this type.
/// It carries information about the kind of error that occurred, where it occurred, and any extra
/// information like error sources or debug messages.
///
/// This type implements [`IntoResponse`], which means it can be returned from HTTP handlers,
/// middleware, etc.
#[derive(Debug, Error)]
pub struct Error {
	/// The kind of error that occurred.
	///
	/// This is used for determining the HTTP status code and error message for the response
	/// body, when an error is returned from a request.
	kind: ErrorKind,

	/// The source code location of where the error occurred.
	///
	/// This is used for debugging / troubleshooting, and is included in logs.
	location: Location<'static>,

	/// Extra information about the error, like source errors or debug messages.
	attachments: Vec<Attachment>,
}

impl Display for Error {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let Self {
			kind,
			location,
			attachments,
		} = self;

		write!(f, "[{location}] {kind}")?;

		if !attachments.is_empty() {
			write!(f, ":")?;

			for attachment in attachments.iter().rev() {
				write!(f, "\n  - {attachment}")?;
			}
		}

		Ok(())
	}
}

/// The different kinds of errors that can occur at runtime.
///
/// Every individual error case should be covered by this enum, with its own error message and any
/// extra information that is necessary to keep around.
#[allow(clippy::missing_docs_in_private_items)]
#[derive(Debug, Error)]
enum ErrorKind {
	#[error("no content")]
	NoContent,

	#[error("could not find {what}")]
	NotFound { what: String },

	#[error("invalid {what}")]
	InvalidInput { what: String },

	#[error("unknown punishment type ordinal `{ordinal}`")]
	UnknownOrdinal { ordinal: u32 },

	#[error("you are not permitted to perform this action")]
	Unauthorized,

	#[error("this action requires the {required} role")]
	InsufficientRole { required: Role },

	#[error("Cannot create mute: Player already has an active mute")]
	MuteAlreadyActive,

	#[error("punishment `{punishment_id}` is already pardoned")]
	AlreadyPardoned { punishment_id: PunishmentId },

	#[error("punishment `{punishment_id}` is already rolled back")]
	AlreadyRolledBack { punishment_id: PunishmentId },

	#[error("an appeal already exists for punishment `{punishment_id}`")]
	DuplicateAppeal { punishment_id: PunishmentId },

	#[error("the record was modified concurrently, please retry")]
	SaveConflict,

	#[error("tenant datastore is unavailable")]
	TenantUnavailable,

	#[cfg_attr(test, error("database error: {0}"))]
	#[cfg_attr(not(test), error("database error"))]
	Database(#[from] sqlx::Error),

	#[cfg_attr(test, error("malformed document: {0}"))]
	#[cfg_attr(not(test), error("internal server error"))]
	Document(#[from] serde_json::Error),
}

#[allow(clippy::missing_docs_in_private_items)]
type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Generic error attachments.
#[derive(Debug)]
struct Attachment {
	/// The attachment context.
	///
	/// This could be a more concrete error type, e.g. from a third party crate, or simply an
	/// error message.
	context: BoxedError,

	/// The source code location of where this attachment was created.
	location: Location<'static>,
}

impl Display for Attachment {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "'{}' at {}", self.context, self.location)
	}
}

impl Attachment {
	/// Creates a new [`Attachment`].
	#[track_caller]
	fn new<C>(context: C) -> Self
	where
		C: Into<BoxedError>,
	{
		Self {
			context: context.into(),
			location: *Location::caller(),
		}
	}
}

impl Error {
	/// Creates a new [`Error`] of the given [`ErrorKind`].
	///
	/// [`Error`]: struct@Error
	#[track_caller]
	fn new<E>(kind: E) -> Self
	where
		E: Into<ErrorKind>,
	{
		Self {
			kind: kind.into(),
			location: *Location::caller(),
			attachments: Vec::new(),
		}
	}

	/// Attach additional context to an error.
	///
	/// This can be another, more concrete, error type, or simply an error message.
	/// If `ctx` is also an [`Error`], it will have its attachments transferred to `self`.
	///
	/// [`Error`]: struct@Error
	#[track_caller]
	pub(crate) fn context<E>(mut self, ctx: E) -> Self
	where
		E: Into<BoxedError>,
	{
		match Into::<BoxedError>::into(ctx).downcast::<Self>() {
			Ok(mut err) => {
				self.attachments.append(&mut err.attachments);
				self.attachments.push(Attachment::new(err.kind));
			}
			Err(other) => {
				self.attachments.push(Attachment::new(other));
			}
		}

		self
	}

	/// A generic `204 No Content` error.
	///
	/// This should be returned from `GET` handlers that would otherwise return an empty
	/// response body.
	#[track_caller]
	pub(crate) fn no_content() -> Self {
		Self::new(ErrorKind::NoContent)
	}

	/// An error signaling that a resource could not be found.
	///
	/// Produces a `404 Not Found` status.
	#[track_caller]
	pub(crate) fn not_found<T>(what: T) -> Self
	where
		T: Display,
	{
		Self::new(ErrorKind::NotFound {
			what: what.to_string(),
		})
	}

	/// An error signaling invalid user input.
	///
	/// Produces a `400 Bad Request` status.
	#[track_caller]
	pub(crate) fn invalid<T>(what: T) -> Self
	where
		T: Display,
	{
		Self::new(ErrorKind::InvalidInput {
			what: what.to_string(),
		})
	}

	/// An error signaling that a request referenced a punishment type ordinal that is not
	/// configured for the tenant.
	///
	/// Produces a `400 Bad Request` status.
	#[track_caller]
	pub(crate) fn unknown_ordinal(ordinal: u32) -> Self {
		Self::new(ErrorKind::UnknownOrdinal { ordinal })
	}

	/// A generic `401 Unauthorized` error.
	///
	/// If you can, you should [attach additional context][context] to such an error to make
	/// debugging the cause of the error easier later.
	///
	/// [context]: Error::context()
	#[track_caller]
	pub(crate) fn unauthorized() -> Self {
		Self::new(ErrorKind::Unauthorized)
	}

	/// An authorization failure caused by the requesting staff member's role being too low.
	///
	/// Produces a `403 Forbidden` status.
	#[track_caller]
	pub(crate) fn insufficient_role(required: Role) -> Self {
		Self::new(ErrorKind::InsufficientRole { required })
	}

	/// An error that occurs when issuing a mute to a player who already has an active one.
	///
	/// Only one mute may ever be active per player, see [`crate::punishments::engine`].
	///
	/// Produces a `409 Conflict` status.
	#[track_caller]
	pub(crate) fn mute_already_active() -> Self {
		Self::new(ErrorKind::MuteAlreadyActive)
	}

	/// An error that occurs when pardoning a punishment that already carries a pardon
	/// modification.
	///
	/// Produces a `409 Conflict` status.
	#[track_caller]
	pub(crate) fn already_pardoned(punishment_id: PunishmentId) -> Self {
		Self::new(ErrorKind::AlreadyPardoned { punishment_id })
	}

	/// An error that occurs when rolling back a punishment that was already rolled back.
	///
	/// Rollbacks are idempotent at the punishment level; the second application is rejected
	/// so bulk operations can count actual mutations.
	///
	/// Produces a `409 Conflict` status.
	#[track_caller]
	pub(crate) fn already_rolled_back(punishment_id: PunishmentId) -> Self {
		Self::new(ErrorKind::AlreadyRolledBack { punishment_id })
	}

	/// An error that occurs when filing an appeal for a punishment that already has one.
	///
	/// Produces a `409 Conflict` status.
	#[track_caller]
	pub(crate) fn duplicate_appeal(punishment_id: PunishmentId) -> Self {
		Self::new(ErrorKind::DuplicateAppeal { punishment_id })
	}

	/// An error that occurs when an optimistic save loses the compare-and-swap race too many
	/// times in a row.
	///
	/// Produces a `409 Conflict` status.
	#[track_caller]
	pub(crate) fn save_conflict() -> Self {
		Self::new(ErrorKind::SaveConflict)
	}

	/// An error signaling that the tenant's datastore could not be reached.
	///
	/// Produces a `503 Service Unavailable` status. No retries happen server-side.
	#[track_caller]
	pub(crate) fn tenant_unavailable() -> Self {
		Self::new(ErrorKind::TenantUnavailable)
	}

	/// Whether this error represents a "conflict" (HTTP 409).
	pub(crate) fn is_conflict(&self) -> bool {
		self.status() == StatusCode::CONFLICT
	}

	/// The HTTP status code this error maps to.
	fn status(&self) -> StatusCode {
		match self.kind {
			ErrorKind::NoContent => StatusCode::NO_CONTENT,
			ErrorKind::NotFound { .. } => StatusCode::NOT_FOUND,
			ErrorKind::InvalidInput { .. } | ErrorKind::UnknownOrdinal { .. } => {
				StatusCode::BAD_REQUEST
			}
			ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
			ErrorKind::InsufficientRole { .. } => StatusCode::FORBIDDEN,
			ErrorKind::MuteAlreadyActive
			| ErrorKind::AlreadyPardoned { .. }
			| ErrorKind::AlreadyRolledBack { .. }
			| ErrorKind::DuplicateAppeal { .. }
			| ErrorKind::SaveConflict => StatusCode::CONFLICT,
			ErrorKind::TenantUnavailable => StatusCode::SERVICE_UNAVAILABLE,
			ErrorKind::Database(_) | ErrorKind::Document(_) => {
				StatusCode::INTERNAL_SERVER_ERROR
			}
		}
	}
}

impl From<sqlx::Error> for Error {
	#[track_caller]
	fn from(error: sqlx::Error) -> Self {
		Self::new(error)
	}
}

impl From<serde_json::Error> for Error {
	#[track_caller]
	fn from(error: serde_json::Error) -> Self {
		Self::new(error)
	}
}

impl IntoResponse for Error {
	fn into_response(self) -> Response {
		let status = self.status();
		let message = self.kind.to_string();

		if status.is_server_error() {
			tracing::error!(error = %self, "request failed");
		} else {
			tracing::debug!(error = %self, "request rejected");
		}

		if status == StatusCode::NO_CONTENT {
			return status.into_response();
		}

		let body = Json(json!({
			"status": status.as_u16(),
			"message": message,
			"error": message,
		}));

		(status, body).into_response()
	}
}

#[cfg(test)]
mod tests {
	use axum::http::StatusCode;

	use super::Error;
	use crate::punishments::PunishmentId;

	#[test]
	fn statuses_follow_the_taxonomy() {
		let id = PunishmentId::from("ABCD1234".to_owned());

		assert_eq!(Error::not_found("player").status(), StatusCode::NOT_FOUND);
		assert_eq!(Error::invalid("uuid").status(), StatusCode::BAD_REQUEST);
		assert_eq!(Error::unauthorized().status(), StatusCode::UNAUTHORIZED);
		assert_eq!(Error::mute_already_active().status(), StatusCode::CONFLICT);
		assert_eq!(
			Error::already_rolled_back(id.clone()).status(),
			StatusCode::CONFLICT
		);
		assert_eq!(Error::duplicate_appeal(id).status(), StatusCode::CONFLICT);
		assert_eq!(
			Error::tenant_unavailable().status(),
			StatusCode::SERVICE_UNAVAILABLE
		);
	}

	#[test]
	fn conflicts_are_recognizable() {
		assert!(Error::save_conflict().is_conflict());
		assert!(!Error::unauthorized().is_conflict());
	}
}
