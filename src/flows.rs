//! Framework-agnostic entry points for the VK ID sign-in routes.
//!
//! [`SsoFlow`] owns the transport, endpoint set, settings handle, and identity linker. The
//! host routes call [`SsoFlow::start`], [`SsoFlow::callback`], and [`SsoFlow::deauthorize`]
//! with already-parsed request data and a [`SessionStore`](crate::session::SessionStore)
//! bound to the current request, then turn the result into a redirect or an HTTP error.

pub mod callback;
pub mod start;

pub use callback::*;
pub use start::*;

// self
use crate::{
	_prelude::*,
	auth::AccountId,
	config::SharedSettings,
	error::ConfigError,
	http::ProviderHttpClient,
	link::{IdentityLinker, LinkError},
	oauth::{ProfileClient, TokenExchangeClient, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::ProviderEndpoints,
	session::SessionError,
	store::AccountStore,
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

#[cfg(feature = "reqwest")]
/// Flow handle specialized for the crate's default reqwest transport stack.
pub type ReqwestSsoFlow = SsoFlow<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Message shown to users for every upstream provider failure.
pub const SERVICE_UNAVAILABLE_MESSAGE: &str = "authentication service unavailable";

/// Terminal failures of the sign-in routes.
///
/// Every variant maps to an HTTP status through [`FlowError::http_status`] and to a message
/// safe to show to end users through [`FlowError::user_message`]; the full error chain is
/// logged, not shown.
#[derive(Debug, ThisError)]
pub enum FlowError {
	/// Credentials or another setting are missing or invalid.
	#[error(transparent)]
	Configuration(#[from] ConfigError),
	/// The host session failed.
	#[error(transparent)]
	Session(#[from] SessionError),
	/// VK ID redirected back with an `error` parameter.
	#[error("VK ID denied the authorization: {error}{}.", describe(.description))]
	ProviderDenied {
		/// Provider error code.
		error: String,
		/// Provider error description.
		description: Option<String>,
	},
	/// The callback has no authorization code.
	#[error("Callback is missing the authorization code.")]
	MissingCode,
	/// The callback has no usable device id (absent, empty or malformed).
	#[error("Callback is missing the device id.")]
	MissingDeviceId,
	/// The returned state does not match the session.
	#[error("Callback state does not match the session; CSRF validation failed.")]
	CsrfMismatch,
	/// The session holds no PKCE verifier.
	#[error("Session holds no PKCE verifier.")]
	MissingVerifier,
	/// The code exchange failed.
	#[error("Failed to exchange the authorization code for a token.")]
	TokenExchangeFailed(#[source] Error),
	/// The profile fetch failed.
	#[error("Failed to fetch the VK ID profile.")]
	ProfileFetchFailed(#[source] Error),
	/// The identity could not be linked to a local account.
	#[error("Failed to sign in the VK ID user.")]
	LoginFailed(#[source] LinkError),
	/// The identity could not be unlinked.
	#[error("Failed to remove the VK ID association.")]
	UnlinkFailed(#[source] LinkError),
}
impl FlowError {
	/// HTTP status the host should answer with.
	pub fn http_status(&self) -> u16 {
		match self {
			FlowError::ProviderDenied { .. }
			| FlowError::MissingCode
			| FlowError::MissingDeviceId => 400,
			FlowError::CsrfMismatch => 403,
			FlowError::TokenExchangeFailed(err) | FlowError::ProfileFetchFailed(err) => match err {
				Error::Config(_) => 500,
				_ => 502,
			},
			FlowError::LoginFailed(LinkError::RegistrationDisabled) => 403,
			FlowError::LoginFailed(LinkError::UnverifiedEmailConflict) => 409,
			FlowError::Configuration(_)
			| FlowError::Session(_)
			| FlowError::MissingVerifier
			| FlowError::LoginFailed(LinkError::Store(_))
			| FlowError::UnlinkFailed(_) => 500,
		}
	}

	/// Message safe to show to the end user.
	pub fn user_message(&self) -> &'static str {
		match self {
			FlowError::Configuration(_) => "VK ID sign-in is not configured",
			FlowError::ProviderDenied { .. } => "VK ID sign-in was cancelled or denied",
			FlowError::MissingCode => "missing authorization code",
			FlowError::MissingDeviceId => "missing device_id from VK",
			FlowError::CsrfMismatch => "invalid state parameter, please sign in again",
			FlowError::MissingVerifier => "sign-in session expired, please sign in again",
			FlowError::TokenExchangeFailed(_) | FlowError::ProfileFetchFailed(_) =>
				SERVICE_UNAVAILABLE_MESSAGE,
			FlowError::LoginFailed(LinkError::RegistrationDisabled) =>
				"registration through VK ID is disabled",
			FlowError::LoginFailed(LinkError::UnverifiedEmailConflict) =>
				"an account with this email already exists; sign in and connect VK ID from your profile",
			FlowError::Session(_)
			| FlowError::LoginFailed(LinkError::Store(_))
			| FlowError::UnlinkFailed(_) => "internal server error",
		}
	}
}

/// Coordinates the sign-in routes against one VK ID application.
pub struct SsoFlow<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for every outbound provider request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Provider endpoints.
	pub endpoints: ProviderEndpoints,
	/// Live settings, read once per request.
	pub settings: SharedSettings,
	/// Identity linker over the host's account store.
	pub linker: IdentityLinker,
}
impl<C, M> SsoFlow<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a flow handle that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		store: Arc<dyn AccountStore>,
		settings: impl Into<SharedSettings>,
		endpoints: ProviderEndpoints,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		let settings = settings.into();

		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			endpoints,
			linker: IdentityLinker::new(store, settings.clone()),
			settings,
		}
	}

	/// Replaces the provider endpoints.
	pub fn with_endpoints(mut self, endpoints: ProviderEndpoints) -> Self {
		self.endpoints = endpoints;

		self
	}

	/// Removes the VK ID association of `account` and returns the redirect target.
	pub async fn deauthorize(&self, account: &AccountId) -> Result<String, FlowError> {
		const KIND: FlowKind = FlowKind::Deauthorize;

		let span = FlowSpan::new(KIND, "unlink");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				self.linker.unlink(account).await.map_err(FlowError::UnlinkFailed)?;

				Ok::<_, FlowError>(self.settings.snapshot().profile_edit_path())
			})
			.await;

		finish(KIND, "unlink", &result);

		result
	}

	fn token_client(&self) -> TokenExchangeClient<C, M> {
		TokenExchangeClient::new(
			self.http_client.clone(),
			self.transport_mapper.clone(),
			self.endpoints.token.clone(),
		)
	}

	fn profile_client(&self) -> ProfileClient<C, M> {
		ProfileClient::new(
			self.http_client.clone(),
			self.transport_mapper.clone(),
			self.endpoints.user_info.clone(),
		)
	}
}
#[cfg(feature = "reqwest")]
impl SsoFlow<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a flow handle against the production VK ID endpoints.
	///
	/// Provisions its own reqwest transport with [`DEFAULT_TIMEOUT`](crate::http::DEFAULT_TIMEOUT).
	pub fn new(
		store: Arc<dyn AccountStore>,
		settings: impl Into<SharedSettings>,
	) -> Result<Self, ConfigError> {
		Ok(Self::with_http_client(
			store,
			settings,
			ProviderEndpoints::vk_id()?,
			ReqwestHttpClient::new()?,
			Arc::new(ReqwestTransportErrorMapper),
		))
	}
}
impl<C, M> Clone for SsoFlow<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			http_client: self.http_client.clone(),
			transport_mapper: self.transport_mapper.clone(),
			endpoints: self.endpoints.clone(),
			settings: self.settings.clone(),
			linker: self.linker.clone(),
		}
	}
}
impl<C, M> Debug for SsoFlow<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SsoFlow")
			.field("endpoints", &self.endpoints)
			.field("settings", &self.settings)
			.finish_non_exhaustive()
	}
}

fn finish<T>(kind: FlowKind, stage: &'static str, result: &Result<T, FlowError>) {
	match result {
		Ok(_) => obs::record_flow_outcome(kind, FlowOutcome::Success),
		Err(err) => {
			obs::record_flow_outcome(kind, FlowOutcome::Failure);
			obs::log_flow_failure(kind, stage, err.http_status(), err);
		},
	}
}

fn describe(description: &Option<String>) -> String {
	match description {
		Some(text) => format!(" ({text})"),
		None => String::new(),
	}
}
