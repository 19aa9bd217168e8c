//! Helper types for HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// A `201 Created` response wrapper.
#[derive(Debug, Serialize)]
pub struct Created<T = ()>(pub T);

impl<T> IntoResponse for Created<T>
where
	T: IntoResponse,
{
	fn into_response(self) -> Response {
		(StatusCode::CREATED, self.0).into_response()
	}
}

/// A `204 No Content` response.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct NoContent;

impl IntoResponse for NoContent {
	fn into_response(self) -> Response {
		StatusCode::NO_CONTENT.into_response()
	}
}
