//! Configuration that is loaded at startup and then used throughout the application.

use std::fmt::{self, Debug};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use serde::Deserialize;
use url::Url;

/// This struct is initialized once when the API starts up, and its values are read from the
/// environment.
#[derive(Clone, Deserialize)]
pub struct Config {
	/// The IP address the HTTP server should listen on.
	#[serde(rename = "api_ip")]
	pub ip_addr: IpAddr,

	/// The port the HTTP server should listen on.
	#[serde(rename = "api_port")]
	pub port: u16,

	/// Directory holding the tenant registry and the per-tenant datastores.
	pub data_dir: PathBuf,

	/// The domain the panel is served under.
	///
	/// Panel requests resolve their tenant from the `Host` header: a request for
	/// `myserver.<panel_domain>` belongs to the tenant named `myserver`.
	pub panel_domain: String,

	/// Base URL of the IP information service used to geolocate and classify login IPs.
	#[serde(default)]
	pub ip_info_url: Option<Url>,

	/// Origin allowed to call panel mutation routes.
	#[serde(default)]
	pub panel_origin: Option<String>,
}

impl Config {
	/// The default IP information service.
	const DEFAULT_IP_INFO_URL: &'static str = "http://ip-api.com/json";

	/// Parses a [`Config`] instance from the environment.
	pub fn new() -> envy::Result<Self> {
		envy::prefixed("WARDEN_").from_env()
	}

	/// Returns a full [`SocketAddr`] for where the HTTP server should listen on.
	pub fn socket_addr(&self) -> SocketAddr {
		SocketAddr::new(self.ip_addr, self.port)
	}

	/// The base URL for IP information lookups.
	pub fn ip_info_url(&self) -> Url {
		self.ip_info_url.clone().unwrap_or_else(|| {
			Self::DEFAULT_IP_INFO_URL
				.parse::<Url>()
				.expect("hardcoded URL is valid")
		})
	}
}

impl Debug for Config {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Config")
			.field("address", &self.socket_addr())
			.field("data_dir", &self.data_dir.display())
			.field("panel_domain", &self.panel_domain)
			.field("ip_info_url", &self.ip_info_url().as_str())
			.finish()
	}
}
