//! Profile retrieval from the VK ID user-info endpoint.

// crates.io
use oauth2::http::{
	Method, Request,
	header::{ACCEPT, CONTENT_TYPE},
};
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::SecretString,
	error::{ConfigError, ProtocolError},
	http::ProviderHttpClient,
	oauth::{self, ProviderEndpoint, TransportErrorMapper, WireError},
	provider::RawProfile,
};

const ENDPOINT: ProviderEndpoint = ProviderEndpoint::UserInfo;

#[derive(Deserialize)]
struct UserInfoWire {
	user: Option<Value>,
	error: Option<WireError>,
	error_description: Option<String>,
}

/// Client for the user-info endpoint.
///
/// The endpoint is client-scoped: besides the access token it requires the application id.
pub struct ProfileClient<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	http_client: Arc<C>,
	error_mapper: Arc<M>,
	endpoint: Url,
}
impl<C, M> ProfileClient<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a client bound to the user-info endpoint URL.
	pub fn new(http_client: impl Into<Arc<C>>, error_mapper: impl Into<Arc<M>>, endpoint: Url) -> Self {
		Self { http_client: http_client.into(), error_mapper: error_mapper.into(), endpoint }
	}

	/// Fetches the profile of the user the access token was issued to.
	///
	/// A response without `user.user_id` is a [`ProtocolError`], so every returned
	/// [`RawProfile`] can be normalized.
	pub async fn get_profile(
		&self,
		access_token: &SecretString,
		client_id: &str,
	) -> Result<RawProfile> {
		if access_token.is_empty() {
			return Err(Error::MissingParameter { name: "access_token" });
		}
		if client_id.is_empty() {
			return Err(Error::MissingParameter { name: "client_id" });
		}

		let body = url::form_urlencoded::Serializer::new(String::new())
			.append_pair("access_token", access_token.expose())
			.append_pair("client_id", client_id)
			.finish();
		let http_request = Request::builder()
			.method(Method::POST)
			.uri(self.endpoint.as_str())
			.header(CONTENT_TYPE, "application/x-www-form-urlencoded")
			.header(ACCEPT, "application/json")
			.body(body.into_bytes())
			.map_err(ConfigError::from)?;
		let response = oauth::dispatch(
			self.http_client.as_ref(),
			self.error_mapper.as_ref(),
			ENDPOINT,
			http_request,
		)
		.await?;
		let status = response.status().as_u16();
		let wire: UserInfoWire = oauth::decode_body(ENDPOINT, &response)?;

		if let Some(error) = wire.error.filter(WireError::is_present) {
			return Err(error.into_provider_error(ENDPOINT, wire.error_description, status).into());
		}

		let user = wire
			.user
			.filter(|user| !user.is_null())
			.ok_or(ProtocolError::MissingField { endpoint: ENDPOINT.as_str(), field: "user" })?;

		Ok(RawProfile::from_user_object(user)?)
	}
}
impl<C, M> Debug for ProfileClient<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ProfileClient").field("endpoint", &self.endpoint.as_str()).finish()
	}
}
