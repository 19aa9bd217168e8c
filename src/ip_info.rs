//! IP information lookups.
//!
//! Login IPs are classified (country, region, ASN, proxy/hosting flags) through an external
//! ip-api.com compatible service. Lookups degrade gracefully: on any failure the address is
//! recorded with unknown fields and the login proceeds.

use serde::Deserialize;
use url::Url;

use crate::players::IpInfo;

/// A client for an ip-api.com compatible service.
#[derive(Debug, Clone)]
pub struct IpInfoClient {
	/// The HTTP client used for lookups.
	http_client: reqwest::Client,

	/// The service base URL (e.g. `http://ip-api.com/json`).
	base_url: Url,
}

/// The response shape of ip-api.com.
#[derive(Debug, Deserialize)]
struct IpApiResponse {
	/// `success` or `fail`.
	#[serde(default)]
	status: Option<String>,

	#[allow(clippy::missing_docs_in_private_items)]
	#[serde(default)]
	country: Option<String>,

	#[allow(clippy::missing_docs_in_private_items)]
	#[serde(default, rename = "regionName")]
	region_name: Option<String>,

	/// The announcing autonomous system, e.g. `AS13335 Cloudflare, Inc.`.
	#[serde(default, rename = "as")]
	asn: Option<String>,

	#[allow(clippy::missing_docs_in_private_items)]
	#[serde(default)]
	proxy: bool,

	#[allow(clippy::missing_docs_in_private_items)]
	#[serde(default)]
	hosting: bool,
}

impl IpInfoClient {
	/// Creates a new client.
	pub fn new(http_client: reqwest::Client, base_url: Url) -> Self {
		Self {
			http_client,
			base_url,
		}
	}

	/// Looks up what the service knows about `ip_address`.
	///
	/// Never fails; unknown info is returned instead.
	pub async fn lookup(&self, ip_address: &str) -> IpInfo {
		match self.try_lookup(ip_address).await {
			Ok(info) => info,
			Err(error) => {
				tracing::warn!(%ip_address, %error, "IP info lookup failed");

				IpInfo::default()
			}
		}
	}

	/// The fallible part of [`lookup`](Self::lookup).
	async fn try_lookup(&self, ip_address: &str) -> Result<IpInfo, reqwest::Error> {
		let url = format!(
			"{base}/{ip_address}?fields=status,country,regionName,as,proxy,hosting",
			base = self.base_url.as_str().trim_end_matches('/'),
		);

		let response = self
			.http_client
			.get(url)
			.send()
			.await?
			.error_for_status()?
			.json::<IpApiResponse>()
			.await?;

		if response.status.as_deref() == Some("fail") {
			return Ok(IpInfo::default());
		}

		Ok(IpInfo {
			country: response.country,
			region: response.region_name,
			asn: response.asn,
			proxy: response.proxy,
			hosting: response.hosting,
		})
	}
}
