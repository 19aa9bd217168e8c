//! The API's global application state.
//!
//! A [`State`] instance is created on startup and then passed to axum so it can be accessed in
//! handlers, extractors, etc.

use std::convert::Infallible;
use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request;

use crate::config::Config;
use crate::ip_info::IpInfoClient;
use crate::linking::LinkerHandle;
use crate::settings::RegistryCache;
use crate::tenants::Tenants;
use crate::Result;

/// The API's state.
#[derive(Debug, Clone)]
pub struct State {
	/// Runtime configuration.
	pub config: Arc<Config>,

	/// The tenant registry.
	pub tenants: Arc<Tenants>,

	/// The per-tenant punishment type registry cache.
	pub punishment_types: Arc<RegistryCache>,

	/// The IP information client.
	pub ip_info: Arc<IpInfoClient>,

	/// The background account-linking worker.
	pub linker: LinkerHandle,
}

impl State {
	/// Creates a new [`State`].
	pub async fn new(config: Config) -> Result<Self> {
		tracing::debug!(?config, "initializing application state");

		let ip_info_url = config.ip_info_url();
		let config = Arc::new(config);
		let tenants = Arc::new(Tenants::open(&config.data_dir).await?);
		let punishment_types = Arc::new(RegistryCache::new());
		let ip_info = Arc::new(IpInfoClient::new(reqwest::Client::new(), ip_info_url));
		let linker = LinkerHandle::spawn(Arc::clone(&tenants), Arc::clone(&punishment_types));

		Ok(Self {
			config,
			tenants,
			punishment_types,
			ip_info,
			linker,
		})
	}

	/// Creates a [`State`] whose tenants live in memory.
	#[cfg(test)]
	pub(crate) async fn for_tests() -> Result<Self> {
		let config = Config {
			ip_addr: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
			port: 0,
			data_dir: std::path::PathBuf::from("."),
			panel_domain: "warden.test".to_owned(),
			ip_info_url: None,
			panel_origin: None,
		};

		let ip_info_url = config.ip_info_url();
		let config = Arc::new(config);
		let tenants = Arc::new(Tenants::in_memory().await?);
		let punishment_types = Arc::new(RegistryCache::new());
		let ip_info = Arc::new(IpInfoClient::new(reqwest::Client::new(), ip_info_url));
		let linker = LinkerHandle::spawn(Arc::clone(&tenants), Arc::clone(&punishment_types));

		Ok(Self {
			config,
			tenants,
			punishment_types,
			ip_info,
			linker,
		})
	}
}

#[async_trait]
impl FromRequestParts<State> for State {
	type Rejection = Infallible;

	async fn from_request_parts(
		_parts: &mut request::Parts,
		state: &State,
	) -> Result<Self, Self::Rejection> {
		Ok(state.clone())
	}
}
