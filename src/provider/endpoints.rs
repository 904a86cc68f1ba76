//! VK ID endpoint set and its builder.

// crates.io
use url::Host;
// self
use crate::{_prelude::*, error::ConfigError};

/// Production authorization endpoint.
pub const VK_ID_AUTHORIZATION_ENDPOINT: &str = "https://id.vk.ru/authorize";
/// Production token endpoint.
pub const VK_ID_TOKEN_ENDPOINT: &str = "https://id.vk.ru/oauth2/auth";
/// Production user-info endpoint.
pub const VK_ID_USER_INFO_ENDPOINT: &str = "https://id.vk.ru/oauth2/user_info";

/// Endpoint set used by the flows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
	/// Authorization endpoint users are redirected to.
	pub authorization: Url,
	/// Token endpoint used for the code exchange.
	pub token: Url,
	/// User-info endpoint used for the profile fetch.
	pub user_info: Url,
}
impl ProviderEndpoints {
	/// Creates a builder seeded with the production VK ID endpoints.
	pub fn builder() -> ProviderEndpointsBuilder {
		ProviderEndpointsBuilder::default()
	}

	/// Returns the production VK ID endpoints.
	pub fn vk_id() -> Result<Self, ConfigError> {
		Self::builder().build()
	}
}

/// Builder for [`ProviderEndpoints`] values.
#[derive(Debug, Default)]
pub struct ProviderEndpointsBuilder {
	/// Authorization endpoint override.
	pub authorization_endpoint: Option<Url>,
	/// Token endpoint override.
	pub token_endpoint: Option<Url>,
	/// User-info endpoint override.
	pub user_info_endpoint: Option<Url>,
}
impl ProviderEndpointsBuilder {
	/// Overrides the authorization endpoint.
	pub fn authorization_endpoint(mut self, url: Url) -> Self {
		self.authorization_endpoint = Some(url);

		self
	}

	/// Overrides the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Overrides the user-info endpoint.
	pub fn user_info_endpoint(mut self, url: Url) -> Self {
		self.user_info_endpoint = Some(url);

		self
	}

	/// Consumes the builder and validates the resulting endpoint set.
	pub fn build(self) -> Result<ProviderEndpoints, ConfigError> {
		let authorization = resolve(
			"authorization",
			self.authorization_endpoint,
			VK_ID_AUTHORIZATION_ENDPOINT,
		)?;
		let token = resolve("token", self.token_endpoint, VK_ID_TOKEN_ENDPOINT)?;
		let user_info = resolve("user_info", self.user_info_endpoint, VK_ID_USER_INFO_ENDPOINT)?;

		Ok(ProviderEndpoints { authorization, token, user_info })
	}
}

fn resolve(
	name: &'static str,
	configured: Option<Url>,
	default: &str,
) -> Result<Url, ConfigError> {
	let url = match configured {
		Some(url) => url,
		None => Url::parse(default)
			.map_err(|source| ConfigError::InvalidEndpoint { endpoint: name, source })?,
	};

	validate_endpoint(name, &url)?;

	Ok(url)
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ConfigError> {
	match url.scheme() {
		"https" => Ok(()),
		"http" if is_loopback(url) => Ok(()),
		_ => Err(ConfigError::InsecureEndpoint { endpoint: name, url: url.to_string() }),
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(Host::Ipv4(ip)) => ip.is_loopback(),
		Some(Host::Ipv6(ip)) => ip.is_loopback(),
		Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		None => false,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(value: &str) -> Url {
		Url::parse(value).expect("Endpoint fixture should parse.")
	}

	#[test]
	fn defaults_point_at_vk_id() {
		let endpoints = ProviderEndpoints::vk_id().expect("Default endpoints should validate.");

		assert_eq!(endpoints.authorization.as_str(), VK_ID_AUTHORIZATION_ENDPOINT);
		assert_eq!(endpoints.token.as_str(), VK_ID_TOKEN_ENDPOINT);
		assert_eq!(endpoints.user_info.as_str(), VK_ID_USER_INFO_ENDPOINT);
	}

	#[test]
	fn plain_http_is_only_allowed_on_loopback() {
		let endpoints = ProviderEndpoints::builder()
			.token_endpoint(url("http://127.0.0.1:8080/oauth2/auth"))
			.user_info_endpoint(url("http://localhost:8080/oauth2/user_info"))
			.build()
			.expect("Loopback endpoints should be accepted.");

		assert_eq!(endpoints.token.port(), Some(8080));

		let err = ProviderEndpoints::builder()
			.authorization_endpoint(url("http://id.example.com/authorize"))
			.build()
			.expect_err("Remote plain HTTP endpoints must be rejected.");

		assert!(matches!(err, ConfigError::InsecureEndpoint { endpoint: "authorization", .. }));
	}
}
