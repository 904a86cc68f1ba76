//! Provider callback handling (`GET /auth/vkid/callback`).
//!
//! The callback is a straight pipeline: reject provider errors and malformed requests, take
//! the pending state and verifier from the session, validate the state, exchange the code,
//! fetch and normalize the profile, link the identity, and log the account in. Nothing is
//! retried; the first failure ends the attempt.

// self
use crate::{
	_prelude::*,
	auth::{self, AccountId, DeviceId},
	flows::{FlowError, SsoFlow},
	http::ProviderHttpClient,
	link::Resolution,
	oauth::{TokenExchangeRequest, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	session::SessionStore,
};

/// Query parameters VK ID appends to the redirect URI.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackParams {
	/// Authorization code.
	#[serde(default)]
	pub code: Option<String>,
	/// State echoed back by the provider.
	#[serde(default)]
	pub state: Option<String>,
	/// Device id required by the code exchange.
	#[serde(default)]
	pub device_id: Option<String>,
	/// Error code when the user or provider refused the authorization.
	#[serde(default)]
	pub error: Option<String>,
	/// Human-readable error description.
	#[serde(default)]
	pub error_description: Option<String>,
}
impl CallbackParams {
	/// Parses the raw query string of the callback request.
	pub fn from_query(query: &str) -> Self {
		let mut params = Self::default();

		for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
			let slot = match key.as_ref() {
				"code" => &mut params.code,
				"state" => &mut params.state,
				"device_id" => &mut params.device_id,
				"error" => &mut params.error,
				"error_description" => &mut params.error_description,
				_ => continue,
			};

			*slot = Some(value.into_owned());
		}

		params
	}
}

/// Stages of one callback attempt, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallbackStage {
	/// Request received.
	Start,
	/// State matched the session.
	StateValidated,
	/// Token obtained.
	CodeExchanged,
	/// Profile obtained.
	ProfileFetched,
	/// Identity linked to a local account.
	Linked,
	/// Account logged in.
	SessionEstablished,
	/// The attempt ended with an error.
	Failed,
}
impl CallbackStage {
	/// Returns a stable label suitable for span or log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallbackStage::Start => "start",
			CallbackStage::StateValidated => "state_validated",
			CallbackStage::CodeExchanged => "code_exchanged",
			CallbackStage::ProfileFetched => "profile_fetched",
			CallbackStage::Linked => "linked",
			CallbackStage::SessionEstablished => "session_established",
			CallbackStage::Failed => "failed",
		}
	}
}
impl Display for CallbackStage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Result of a completed callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallbackOutcome {
	/// Account now logged in.
	pub account: AccountId,
	/// How the identity resolved to the account.
	pub resolution: Resolution,
	/// Location to redirect the user agent to.
	pub redirect_to: String,
	/// Final stage reached; always [`CallbackStage::SessionEstablished`].
	pub stage: CallbackStage,
}

impl<C, M> SsoFlow<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Completes a sign-in from the provider redirect.
	///
	/// Provider errors and requests without `code` or `device_id` are rejected before the
	/// session is read. Otherwise the pending state and verifier are taken from the session
	/// exactly once, so a replayed callback always fails the state check.
	pub async fn callback(
		&self,
		session: &dyn SessionStore,
		params: CallbackParams,
	) -> Result<CallbackOutcome, FlowError> {
		const KIND: FlowKind = FlowKind::Callback;

		let span = FlowSpan::new(KIND, CallbackStage::Start.as_str());
		let mut stage = CallbackStage::Start;

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.run_callback(&span, &mut stage, session, params)).await;

		if result.is_err() {
			span.record_stage(CallbackStage::Failed.as_str());
		}

		super::finish(KIND, stage.as_str(), &result);

		result
	}

	async fn run_callback(
		&self,
		span: &FlowSpan,
		stage: &mut CallbackStage,
		session: &dyn SessionStore,
		params: CallbackParams,
	) -> Result<CallbackOutcome, FlowError> {
		let mut advance = |next: CallbackStage| {
			*stage = next;

			span.record_stage(next.as_str());
		};

		if let Some(error) = params.error.filter(|error| !error.is_empty()) {
			return Err(FlowError::ProviderDenied { error, description: params.error_description });
		}

		let code = params.code.filter(|code| !code.is_empty()).ok_or(FlowError::MissingCode)?;
		let device_id = params
			.device_id
			.as_deref()
			.and_then(|device_id| DeviceId::new(device_id).ok())
			.ok_or(FlowError::MissingDeviceId)?;
		let pending = session.take_pending().await?;

		if !auth::validate_state(params.state.as_deref(), pending.state.as_deref()) {
			return Err(FlowError::CsrfMismatch);
		}

		let code_verifier = pending
			.code_verifier
			.filter(|verifier| !verifier.is_empty())
			.ok_or(FlowError::MissingVerifier)?;

		advance(CallbackStage::StateValidated);

		let settings = self.settings.snapshot();
		let credentials = settings.credentials()?;
		let redirect_uri = settings.redirect_uri();
		let token = self
			.token_client()
			.exchange_code_for_token(TokenExchangeRequest {
				code: &code,
				code_verifier: &code_verifier,
				device_id: &device_id,
				client_id: &credentials.client_id,
				client_secret: &credentials.client_secret,
				redirect_uri: &redirect_uri,
			})
			.await
			.map_err(FlowError::TokenExchangeFailed)?;

		advance(CallbackStage::CodeExchanged);

		let profile = self
			.profile_client()
			.get_profile(&token.access_token, &credentials.client_id)
			.await
			.map_err(FlowError::ProfileFetchFailed)?;

		drop(token);
		advance(CallbackStage::ProfileFetched);

		let identity = profile.normalize();
		let account =
			self.linker.login_identity(&identity).await.map_err(FlowError::LoginFailed)?;

		advance(CallbackStage::Linked);
		obs::log_flow_success(FlowKind::Callback, account.resolution.as_str());

		session.establish(&account.id).await?;
		advance(CallbackStage::SessionEstablished);

		let redirect_to = session
			.take_return_to()
			.await?
			.filter(|location| !location.is_empty())
			.unwrap_or_else(|| settings.default_landing());

		Ok(CallbackOutcome {
			account: account.id,
			resolution: account.resolution,
			redirect_to,
			stage: *stage,
		})
	}
}
