//! CORS middlewares.

use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::Config;

/// Permissive CORS for read-only routes.
pub fn permissive() -> CorsLayer {
	CorsLayer::permissive().allow_methods([Method::GET])
}

/// CORS for the panel frontend.
///
/// With a configured origin only that origin may call with credentials; otherwise the request
/// origin is mirrored (development setups).
pub fn panel(config: &Config) -> CorsLayer {
	let origin = match &config.panel_origin {
		Some(origin) => match HeaderValue::from_str(origin) {
			Ok(value) => AllowOrigin::exact(value),
			Err(_) => {
				tracing::warn!(%origin, "invalid panel origin, mirroring request origins");

				AllowOrigin::mirror_request()
			}
		},
		None => AllowOrigin::mirror_request(),
	};

	CorsLayer::new()
		.allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
		.allow_credentials(true)
		.allow_headers([header::CONTENT_TYPE])
		.allow_origin(origin)
}
