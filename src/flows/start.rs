//! Authorization redirect initiation (`GET /auth/vkid`).

// self
use crate::{
	_prelude::*,
	auth::{self, PkcePair},
	flows::{FlowError, SsoFlow},
	http::ProviderHttpClient,
	oauth::{self, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	session::{PendingAuthorization, SessionStore},
};

/// Redirect produced by [`SsoFlow::start`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartOutcome {
	/// VK ID authorization URL the user agent should be sent to.
	pub authorize_url: Url,
}

impl<C, M> SsoFlow<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Starts a sign-in: stores fresh PKCE + state in the session and builds the redirect.
	///
	/// Fails with [`FlowError::Configuration`] before touching the session when credentials
	/// are missing.
	pub async fn start(&self, session: &dyn SessionStore) -> Result<StartOutcome, FlowError> {
		const KIND: FlowKind = FlowKind::Start;

		let span = FlowSpan::new(KIND, "start");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				let settings = self.settings.snapshot();
				let credentials = settings.credentials()?;
				let pkce = PkcePair::generate();
				let state = auth::generate_state();
				let authorize_url = oauth::build_authorization_url(
					&self.endpoints,
					&credentials.client_id,
					&settings.redirect_uri(),
					&state,
					pkce.challenge(),
				)?;

				session
					.save_pending(PendingAuthorization { state, code_verifier: pkce.into_verifier() })
					.await?;

				Ok::<_, FlowError>(StartOutcome { authorize_url })
			})
			.await;

		super::finish(KIND, "start", &result);

		result
	}
}
