//! Authorization redirect construction.

// self
use crate::{
	_prelude::*,
	auth::PkceCodeChallengeMethod,
	error::ConfigError,
	provider::ProviderEndpoints,
};

/// Scope requested from VK ID.
pub const VK_ID_SCOPE: &str = "email phone";

/// Parameters of one authorization redirect.
///
/// The value is immutable once built and only ever leaves the crate as a URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationRequest {
	client_id: String,
	redirect_uri: Url,
	state: String,
	code_challenge: String,
}
impl AuthorizationRequest {
	/// Validates that every input is non-empty.
	pub fn new(
		client_id: &str,
		redirect_uri: &Url,
		state: &str,
		code_challenge: &str,
	) -> Result<Self, ConfigError> {
		require("client_id", client_id)?;
		require("state", state)?;
		require("code_challenge", code_challenge)?;

		Ok(Self {
			client_id: client_id.to_owned(),
			redirect_uri: redirect_uri.clone(),
			state: state.to_owned(),
			code_challenge: code_challenge.to_owned(),
		})
	}

	/// Renders the redirect URL against the authorization endpoint.
	pub fn to_url(&self, endpoints: &ProviderEndpoints) -> Url {
		let mut url = endpoints.authorization.clone();
		let mut pairs = url.query_pairs_mut();

		pairs.append_pair("response_type", "code");
		pairs.append_pair("client_id", &self.client_id);
		pairs.append_pair("redirect_uri", self.redirect_uri.as_str());
		pairs.append_pair("scope", VK_ID_SCOPE);
		pairs.append_pair("state", &self.state);
		pairs.append_pair("code_challenge", &self.code_challenge);
		pairs.append_pair("code_challenge_method", PkceCodeChallengeMethod::S256.as_str());

		drop(pairs);

		url
	}
}

/// Builds the authorization redirect URL in one call.
pub fn build_authorization_url(
	endpoints: &ProviderEndpoints,
	client_id: &str,
	redirect_uri: &Url,
	state: &str,
	code_challenge: &str,
) -> Result<Url, ConfigError> {
	Ok(AuthorizationRequest::new(client_id, redirect_uri, state, code_challenge)?.to_url(endpoints))
}

fn require(name: &'static str, value: &str) -> Result<(), ConfigError> {
	if value.is_empty() { Err(ConfigError::EmptyParameter { name }) } else { Ok(()) }
}
