//! Client-level error types shared by the authorization builder and the provider clients.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error returned by the provider-facing clients.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Provider answered with a body the client cannot interpret.
	#[error(transparent)]
	Protocol(#[from] ProtocolError),
	/// Provider reported an error in its response body.
	#[error(transparent)]
	Provider(#[from] ProviderError),

	/// A mandatory request parameter was empty; the provider would reject the call.
	#[error("Required parameter `{name}` is missing.")]
	MissingParameter {
		/// Wire name of the missing parameter.
		name: &'static str,
	},
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Client id or client secret is not configured.
	#[error(
		"VK ID is not configured; set SSO_VK_CLIENT_ID and SSO_VK_CLIENT_SECRET or save the credentials in the plugin settings."
	)]
	MissingCredentials,
	/// A caller-supplied value that must be non-empty was empty.
	#[error("Parameter `{name}` must not be empty.")]
	EmptyParameter {
		/// Parameter name.
		name: &'static str,
	},
	/// Public base URL cannot be parsed or cannot carry a path.
	#[error("Public base URL `{url}` is invalid.")]
	InvalidBaseUrl {
		/// Offending value.
		url: String,
		/// Underlying parsing failure, if any.
		#[source]
		source: Option<url::ParseError>,
	},
	/// Endpoint URL cannot be parsed.
	#[error("The {endpoint} endpoint is not a valid URL.")]
	InvalidEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Endpoints must use HTTPS outside of loopback hosts.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Request body could not be encoded.
	#[error("Request body could not be encoded.")]
	RequestEncode(#[from] serde_json::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO, timeouts).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the {endpoint} endpoint.")]
	Network {
		/// Endpoint label.
		endpoint: &'static str,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The bounded wait for the provider expired.
	#[error("Timed out while calling the {endpoint} endpoint.")]
	Timeout {
		/// Endpoint label.
		endpoint: &'static str,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the provider.")]
	Io(#[from] std::io::Error),
	/// Transport failed without a structured error.
	#[error("HTTP client error occurred while calling the {endpoint} endpoint: {message}.")]
	Other {
		/// Endpoint label.
		endpoint: &'static str,
		/// Transport-supplied message.
		message: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		endpoint: &'static str,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { endpoint, source: Box::new(src) }
	}
}

/// Response bodies that do not match the provider protocol.
#[derive(Debug, ThisError)]
pub enum ProtocolError {
	/// Body is not JSON or does not have the expected shape.
	#[error("The {endpoint} endpoint returned a malformed body.")]
	MalformedBody {
		/// Endpoint label.
		endpoint: &'static str,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// A success response omitted a mandatory field.
	#[error("The {endpoint} endpoint response is missing `{field}`.")]
	MissingField {
		/// Endpoint label.
		endpoint: &'static str,
		/// Dotted path of the missing field.
		field: &'static str,
	},
	/// A mandatory field is present but unusable.
	#[error("The {endpoint} endpoint response has an invalid `{field}`: {reason}.")]
	InvalidField {
		/// Endpoint label.
		endpoint: &'static str,
		/// Dotted path of the field.
		field: &'static str,
		/// Validation failure.
		reason: String,
	},
}

/// Error reported by the provider inside a response body.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("The {endpoint} endpoint returned a provider error `{code}`{}.", fmt_description(.description))]
pub struct ProviderError {
	/// Endpoint label.
	pub endpoint: &'static str,
	/// Provider error code (`error` or `error.error_code`).
	pub code: String,
	/// Provider description (`error_description` or `error.error_msg`).
	pub description: Option<String>,
	/// HTTP status code, when available.
	pub status: Option<u16>,
}

fn fmt_description(description: &Option<String>) -> String {
	match description {
		Some(text) => format!(": {text}"),
		None => String::new(),
	}
}
