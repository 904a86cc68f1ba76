//! Account storage contract consumed by the identity linker, plus an in-memory store.
//!
//! The host application owns user accounts; this crate only needs the handful of lookups and
//! writes below. Implementations are responsible for uniqueness of emails and identity links:
//! concurrent first logins are not serialized by the crate (see
//! [`IdentityLinker::login`](crate::link::IdentityLinker::login)).

pub mod memory;

pub use memory::MemoryAccountStore;

// self
use crate::{
	_prelude::*,
	auth::{AccountId, ExternalId},
};

/// Boxed future returned by [`AccountStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract implemented by the host's account store.
pub trait AccountStore
where
	Self: Send + Sync,
{
	/// Resolves the local account linked to a VK ID user.
	fn uid_by_external_id<'a>(
		&'a self,
		external_id: &'a ExternalId,
	) -> StoreFuture<'a, Option<AccountId>>;

	/// Finds a local account by email.
	fn find_by_email<'a>(&'a self, email: &'a str) -> StoreFuture<'a, Option<EmailMatch>>;

	/// Creates a local account and returns its id.
	fn create_account(&self, account: NewAccount) -> StoreFuture<'_, AccountId>;

	/// Applies every side effect of linking an identity as one atomic write.
	///
	/// Implementations must set the account's external id field, write the
	/// external id -> account entry, store the avatar (both picture fields) when present, and,
	/// when [`IdentityAttachment::verified_email`] is set, store that email and mark it
	/// verified. An account holds at most one link: when it already carried a different
	/// external id, that id's link entry is deleted in the same write. Either all of it is
	/// persisted or an error is returned.
	fn attach_identity(&self, attachment: IdentityAttachment) -> StoreFuture<'_, ()>;

	/// Reads the external id stored on a local account.
	fn external_id_of<'a>(&'a self, account: &'a AccountId)
	-> StoreFuture<'a, Option<ExternalId>>;

	/// Deletes the link entry keyed by `external_id` and clears the account field.
	///
	/// Must succeed when the link is already gone.
	fn detach_identity<'a>(
		&'a self,
		account: &'a AccountId,
		external_id: &'a ExternalId,
	) -> StoreFuture<'a, ()>;
}

/// Account creation request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewAccount {
	/// Username (the provider display name).
	pub username: String,
	/// Email set at creation; withheld when auto-confirm sets it during attachment instead.
	pub email: Option<String>,
}

/// Account found by email lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmailMatch {
	/// Matching account.
	pub account: AccountId,
	/// Whether the account's email is verified.
	pub email_verified: bool,
}

/// Side effects applied when linking an identity to an account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentityAttachment {
	/// Target account.
	pub account: AccountId,
	/// VK ID user id.
	pub external_id: ExternalId,
	/// Avatar URL written to the picture fields.
	pub avatar_url: Option<String>,
	/// Email to store and mark verified (auto-confirm on newly created accounts).
	pub verified_email: Option<String>,
}

/// Error type produced by [`AccountStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// A uniqueness constraint (email, link) rejected the write.
	#[error("Conflict: {message}.")]
	Conflict {
		/// Human-readable error payload.
		message: String,
	},
	/// The referenced account does not exist.
	#[error("Account `{account}` does not exist.")]
	UnknownAccount {
		/// Account id that was referenced.
		account: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
