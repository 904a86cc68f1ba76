//! Authorization-code-for-token exchange against the VK ID token endpoint.
//!
//! VK ID expects a JSON body (not the RFC 6749 form encoding) and rejects exchanges without
//! the `device_id` returned on the callback, so the request is assembled by hand and sent
//! through the crate's [`ProviderHttpClient`] abstraction.

// crates.io
use oauth2::http::{
	Method, Request,
	header::{ACCEPT, CONTENT_TYPE},
};
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::{DeviceId, SecretString},
	error::{ConfigError, ProtocolError},
	http::ProviderHttpClient,
	oauth::{self, ProviderEndpoint, TransportErrorMapper, WireError},
};

const ENDPOINT: ProviderEndpoint = ProviderEndpoint::Token;

/// Inputs of one code exchange.
#[derive(Clone, Copy, Debug)]
pub struct TokenExchangeRequest<'a> {
	/// Authorization code from the callback.
	pub code: &'a str,
	/// PKCE verifier stored in the session.
	pub code_verifier: &'a SecretString,
	/// Device id from the callback; mandatory for VK ID.
	pub device_id: &'a DeviceId,
	/// VK ID application id.
	pub client_id: &'a str,
	/// VK ID application secret.
	pub client_secret: &'a SecretString,
	/// Redirect URI; must byte-match the one sent in the authorization request.
	pub redirect_uri: &'a Url,
}

#[derive(Serialize)]
struct TokenRequestBody<'a> {
	grant_type: &'static str,
	code: &'a str,
	code_verifier: &'a str,
	device_id: &'a str,
	client_id: &'a str,
	client_secret: &'a str,
	redirect_uri: &'a str,
}

#[derive(Deserialize)]
struct TokenWire {
	access_token: Option<String>,
	refresh_token: Option<String>,
	id_token: Option<String>,
	expires_in: Option<i64>,
	user_id: Option<Value>,
	scope: Option<String>,
	error: Option<WireError>,
	error_description: Option<String>,
}

/// Successful token endpoint response.
#[derive(Clone, Debug)]
pub struct TokenResponse {
	/// Access token used for the profile fetch.
	pub access_token: SecretString,
	/// Refresh token, unused by this crate.
	pub refresh_token: Option<SecretString>,
	/// ID token, unused by this crate.
	pub id_token: Option<SecretString>,
	/// Instant the response was received.
	pub issued_at: OffsetDateTime,
	/// Access token expiry, when `expires_in` was positive.
	pub expires_at: Option<OffsetDateTime>,
	/// Provider user id echoed by the token endpoint.
	pub user_id: Option<String>,
	/// Granted scope string.
	pub scope: Option<String>,
}

/// Client for the token endpoint.
pub struct TokenExchangeClient<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	http_client: Arc<C>,
	error_mapper: Arc<M>,
	endpoint: Url,
}
impl<C, M> TokenExchangeClient<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a client bound to the token endpoint URL.
	pub fn new(http_client: impl Into<Arc<C>>, error_mapper: impl Into<Arc<M>>, endpoint: Url) -> Self {
		Self { http_client: http_client.into(), error_mapper: error_mapper.into(), endpoint }
	}

	/// Exchanges the authorization code for an access token in one round-trip.
	///
	/// Empty `code` or `code_verifier` fail with [`Error::MissingParameter`] before any
	/// traffic; `device_id` is non-empty by construction. Nothing is retried.
	pub async fn exchange_code_for_token(
		&self,
		request: TokenExchangeRequest<'_>,
	) -> Result<TokenResponse> {
		require("code", request.code)?;
		require("code_verifier", request.code_verifier.expose())?;

		let body = serde_json::to_vec(&TokenRequestBody {
			grant_type: "authorization_code",
			code: request.code,
			code_verifier: request.code_verifier.expose(),
			device_id: request.device_id.as_ref(),
			client_id: request.client_id,
			client_secret: request.client_secret.expose(),
			redirect_uri: request.redirect_uri.as_str(),
		})
		.map_err(ConfigError::from)?;
		let http_request = Request::builder()
			.method(Method::POST)
			.uri(self.endpoint.as_str())
			.header(CONTENT_TYPE, "application/json")
			.header(ACCEPT, "application/json")
			.body(body)
			.map_err(ConfigError::from)?;
		let response = oauth::dispatch(
			self.http_client.as_ref(),
			self.error_mapper.as_ref(),
			ENDPOINT,
			http_request,
		)
		.await?;
		let status = response.status().as_u16();
		let wire: TokenWire = oauth::decode_body(ENDPOINT, &response)?;

		if let Some(error) = wire.error.filter(WireError::is_present) {
			return Err(error.into_provider_error(ENDPOINT, wire.error_description, status).into());
		}

		let access_token = wire.access_token.filter(|token| !token.is_empty()).ok_or(
			ProtocolError::MissingField { endpoint: ENDPOINT.as_str(), field: "access_token" },
		)?;
		let issued_at = OffsetDateTime::now_utc();
		let expires_at = wire
			.expires_in
			.filter(|secs| *secs > 0)
			.and_then(|secs| issued_at.checked_add(Duration::seconds(secs)));

		Ok(TokenResponse {
			access_token: SecretString::new(access_token),
			refresh_token: wire.refresh_token.map(SecretString::new),
			id_token: wire.id_token.map(SecretString::new),
			issued_at,
			expires_at,
			user_id: wire.user_id.map(|id| match id {
				Value::String(text) => text,
				other => other.to_string(),
			}),
			scope: wire.scope,
		})
	}
}
impl<C, M> Debug for TokenExchangeClient<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenExchangeClient").field("endpoint", &self.endpoint.as_str()).finish()
	}
}

fn require(name: &'static str, value: &str) -> Result<()> {
	if value.is_empty() { Err(Error::MissingParameter { name }) } else { Ok(()) }
}
