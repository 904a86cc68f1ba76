//! VK ID OAuth 2.0 clients: authorization URL construction, code exchange, and profile fetch.
//!
//! The clients never retry. Every failure is classified once into the [`Error`] taxonomy
//! (transport, protocol, provider) and handed back to the caller, which owns retry policy.

pub mod authorize;
pub mod profile;
pub mod token;

pub use authorize::*;
pub use oauth2;
pub use profile::*;
pub use token::*;

// crates.io
use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse};
use serde::de::DeserializeOwned;
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, ProtocolError, ProviderError, TransportError},
	http::{ProviderHttpClient, ResponseMetadata, ResponseMetadataSlot},
};

/// Provider endpoints contacted over the network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProviderEndpoint {
	/// Code-for-token exchange.
	Token,
	/// Profile retrieval.
	UserInfo,
}
impl ProviderEndpoint {
	/// Returns a stable label used in errors, spans, and metrics.
	pub const fn as_str(self) -> &'static str {
		match self {
			ProviderEndpoint::Token => "token",
			ProviderEndpoint::UserInfo => "user_info",
		}
	}
}
impl Display for ProviderEndpoint {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Maps HTTP transport failures into crate [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a crate error.
	fn map_transport_error(
		&self,
		endpoint: ProviderEndpoint,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		endpoint: ProviderEndpoint,
		_meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(endpoint, *inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) =>
				TransportError::Other { endpoint: endpoint.as_str(), message }.into(),
			_ => TransportError::Other {
				endpoint: endpoint.as_str(),
				message: "unclassified transport failure".into(),
			}
			.into(),
		}
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(endpoint: ProviderEndpoint, err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransportError::Timeout { endpoint: endpoint.as_str() }.into();
	}

	TransportError::network(endpoint.as_str(), err).into()
}

/// Sends one request through a fresh metadata-instrumented handle.
pub(crate) async fn dispatch<C, M>(
	http_client: &C,
	mapper: &M,
	endpoint: ProviderEndpoint,
	request: HttpRequest,
) -> Result<HttpResponse>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let meta = ResponseMetadataSlot::default();
	let handle = http_client.with_metadata(meta.clone());

	handle
		.call(request)
		.await
		.map_err(|err| mapper.map_transport_error(endpoint, meta.take().as_ref(), err))
}

/// Decodes a JSON body, keeping the failing path for diagnostics.
pub(crate) fn decode_body<T>(
	endpoint: ProviderEndpoint,
	response: &HttpResponse,
) -> Result<T, ProtocolError>
where
	T: DeserializeOwned,
{
	let mut de = serde_json::Deserializer::from_slice(response.body());

	serde_path_to_error::deserialize(&mut de).map_err(|source| ProtocolError::MalformedBody {
		endpoint: endpoint.as_str(),
		source,
		status: Some(response.status().as_u16()),
	})
}

/// Provider `error` field: a bare code on the token endpoint, an object on `user_info`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub(crate) enum WireError {
	Code(String),
	Detailed {
		#[serde(default)]
		error_code: Option<Value>,
		#[serde(default)]
		error_msg: Option<String>,
	},
	Other(Value),
}
impl WireError {
	pub(crate) fn is_present(&self) -> bool {
		match self {
			WireError::Code(code) => !code.is_empty(),
			WireError::Detailed { .. } => true,
			WireError::Other(value) => !matches!(value, Value::Bool(false)),
		}
	}

	pub(crate) fn into_provider_error(
		self,
		endpoint: ProviderEndpoint,
		description: Option<String>,
		status: u16,
	) -> ProviderError {
		let (code, description) = match self {
			WireError::Code(code) => (code, description),
			WireError::Detailed { error_code, error_msg } => (
				error_code.map(render_code).unwrap_or_else(|| "unknown_error".into()),
				error_msg.or(description),
			),
			WireError::Other(value) => (render_code(value), description),
		};

		ProviderError {
			endpoint: endpoint.as_str(),
			code,
			description: description.filter(|text| !text.is_empty()),
			status: Some(status),
		}
	}
}

fn render_code(value: Value) -> String {
	match value {
		Value::String(text) => text,
		other => other.to_string(),
	}
}
