//! OpenAPI document helpers.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::Modify;

/// Registers the API's security schemes.
#[derive(Debug, Clone, Copy)]
pub struct Security;

impl Modify for Security {
	fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
		let components = openapi.components.get_or_insert_with(Default::default);

		components.add_security_scheme(
			"API Key",
			SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(
				crate::auth::API_KEY_HEADER,
			))),
		);

		components.add_security_scheme(
			"Session Cookie",
			SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(
				crate::auth::SESSION_COOKIE,
			))),
		);
	}
}
