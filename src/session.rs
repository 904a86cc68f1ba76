//! Per-browser session contract used to carry the pending authorization between redirects.
//!
//! The host binds one [`SessionStore`] to each incoming request. The flows write the pending
//! state and verifier on start, take both in a single call on callback, and finally ask the
//! host to log the account in.

// self
use crate::{
	_prelude::*,
	auth::{AccountId, SecretString},
};

/// Boxed future returned by [`SessionStore`] operations.
pub type SessionFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, SessionError>> + 'a + Send>>;

/// Session storage contract implemented by the host for the current request.
pub trait SessionStore
where
	Self: Send + Sync,
{
	/// Persists the state and verifier of a freshly started authorization.
	fn save_pending(&self, pending: PendingAuthorization) -> SessionFuture<'_, ()>;

	/// Reads and clears the pending state and verifier in one step.
	///
	/// Each slot is returned independently so the caller can tell which one was absent.
	fn take_pending(&self) -> SessionFuture<'_, PendingSlots>;

	/// Reads and clears the location to return to after login.
	fn take_return_to(&self) -> SessionFuture<'_, Option<String>>;

	/// Logs the account in for the current session.
	fn establish<'a>(&'a self, account: &'a AccountId) -> SessionFuture<'a, ()>;
}

/// State and verifier written by the start step.
#[derive(Clone, Debug)]
pub struct PendingAuthorization {
	/// Anti-CSRF state sent to the provider.
	pub state: String,
	/// PKCE verifier; never leaves the server before the exchange.
	pub code_verifier: SecretString,
}

/// Slots taken from the session on callback.
#[derive(Clone, Debug, Default)]
pub struct PendingSlots {
	/// Stored state, if any.
	pub state: Option<String>,
	/// Stored verifier, if any.
	pub code_verifier: Option<SecretString>,
}

/// Error reported by [`SessionStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum SessionError {
	/// The session backend failed.
	#[error("Session backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
	/// The host refused to log the account in.
	#[error("Login rejected for account `{account}`: {message}.")]
	LoginRejected {
		/// Account the host refused.
		account: String,
		/// Human-readable reason.
		message: String,
	},
}

#[derive(Debug, Default)]
struct SessionData {
	state: Option<String>,
	code_verifier: Option<SecretString>,
	return_to: Option<String>,
	account: Option<AccountId>,
}

/// In-process session for tests and demos.
///
/// Clones share the same underlying session.
#[derive(Clone, Debug, Default)]
pub struct MemorySession(Arc<Mutex<SessionData>>);
impl MemorySession {
	/// Records where the user should land after login.
	pub fn set_return_to(&self, location: impl Into<String>) {
		self.0.lock().return_to = Some(location.into());
	}

	/// Returns the pending state without clearing it.
	pub fn pending_state(&self) -> Option<String> {
		self.0.lock().state.clone()
	}

	/// Returns whether a verifier is pending.
	pub fn has_pending_verifier(&self) -> bool {
		self.0.lock().code_verifier.is_some()
	}

	/// Account logged in through [`SessionStore::establish`].
	pub fn account(&self) -> Option<AccountId> {
		self.0.lock().account.clone()
	}
}
impl SessionStore for MemorySession {
	fn save_pending(&self, pending: PendingAuthorization) -> SessionFuture<'_, ()> {
		let data = self.0.clone();

		Box::pin(async move {
			let mut guard = data.lock();

			guard.state = Some(pending.state);
			guard.code_verifier = Some(pending.code_verifier);

			Ok(())
		})
	}

	fn take_pending(&self) -> SessionFuture<'_, PendingSlots> {
		let data = self.0.clone();

		Box::pin(async move {
			let mut guard = data.lock();

			Ok(PendingSlots { state: guard.state.take(), code_verifier: guard.code_verifier.take() })
		})
	}

	fn take_return_to(&self) -> SessionFuture<'_, Option<String>> {
		let data = self.0.clone();

		Box::pin(async move { Ok(data.lock().return_to.take()) })
	}

	fn establish<'a>(&'a self, account: &'a AccountId) -> SessionFuture<'a, ()> {
		let data = self.0.clone();

		Box::pin(async move {
			data.lock().account = Some(account.clone());

			Ok(())
		})
	}
}
