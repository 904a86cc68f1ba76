//! PKCE verifier/challenge pairs and anti-CSRF state tokens.
//!
//! Every authorization attempt draws a fresh [`PkcePair`] and state token from the thread-local
//! CSPRNG. Verifiers use 64 alphanumeric characters (about 381 bits), a subset of the RFC 7636
//! `[A-Za-z0-9_.~-]` alphabet, and state tokens use 32 (about 190 bits).

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, auth::SecretString};

const STATE_LEN: usize = 32;
const PKCE_VERIFIER_LEN: usize = 64;

/// Supported PKCE challenge methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PkceCodeChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	S256,
}
impl PkceCodeChallengeMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			PkceCodeChallengeMethod::S256 => "S256",
		}
	}
}

/// Verifier + challenge generated for one authorization attempt.
///
/// The verifier stays in the caller's session until the code exchange; only the challenge
/// travels in the authorization redirect.
#[derive(Clone)]
pub struct PkcePair {
	verifier: SecretString,
	challenge: String,
	method: PkceCodeChallengeMethod,
}
impl PkcePair {
	/// Draws a fresh verifier and derives its S256 challenge.
	pub fn generate() -> Self {
		Self::from_verifier(random_string(PKCE_VERIFIER_LEN))
	}

	/// Rebuilds the pair for an existing verifier.
	pub fn from_verifier(verifier: impl Into<SecretString>) -> Self {
		let verifier = verifier.into();
		let challenge = compute_challenge(verifier.expose());

		Self { verifier, challenge, method: PkceCodeChallengeMethod::S256 }
	}

	/// Secret verifier submitted at the token exchange.
	pub fn verifier(&self) -> &SecretString {
		&self.verifier
	}

	/// Challenge sent with the authorization request.
	pub fn challenge(&self) -> &str {
		&self.challenge
	}

	/// Challenge method (always `S256`).
	pub fn method(&self) -> PkceCodeChallengeMethod {
		self.method
	}

	/// Consumes the pair, returning the verifier for session storage.
	pub fn into_verifier(self) -> SecretString {
		self.verifier
	}
}
impl Debug for PkcePair {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PkcePair")
			.field("verifier", &self.verifier)
			.field("challenge", &self.challenge)
			.field("method", &self.method)
			.finish()
	}
}

/// Derives the S256 challenge: base64url (no padding) of SHA-256 over the verifier.
pub fn compute_challenge(verifier: &str) -> String {
	let digest = Sha256::digest(verifier.as_bytes());

	URL_SAFE_NO_PAD.encode(digest)
}

/// Generates an anti-CSRF state token.
pub fn generate_state() -> String {
	random_string(STATE_LEN)
}

/// Compares the state echoed by the provider with the one stored in the session.
///
/// Both values must be present and non-empty; the comparison is byte-for-byte.
pub fn validate_state(received: Option<&str>, stored: Option<&str>) -> bool {
	match (received, stored) {
		(Some(received), Some(stored)) if !received.is_empty() && !stored.is_empty() =>
			received.as_bytes() == stored.as_bytes(),
		_ => false,
	}
}

fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}
