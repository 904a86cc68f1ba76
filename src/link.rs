//! Links VK ID identities to local accounts.
//!
//! Resolution order for a login: existing link, then an account with the same email (merge),
//! then a newly created account unless registration is disabled.

// self
use crate::{
	_prelude::*,
	auth::{AccountId, ExternalId},
	config::{EmailMergePolicy, SharedSettings},
	oauth::VK_ID_SCOPE,
	provider::CanonicalIdentity,
	store::{AccountStore, IdentityAttachment, NewAccount, StoreError},
};

/// Provider name shown next to profile associations.
pub const PROVIDER_NAME: &str = "VK";
/// Name the sign-in strategy is registered under.
pub const STRATEGY_NAME: &str = "vkid";
/// Icon class of the sign-in button.
pub const STRATEGY_ICON: &str = "icon-vk";

/// How a login resolved to its account.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Resolution {
	/// The identity was already linked.
	Existing,
	/// The identity was attached to an account with the same email.
	Merged,
	/// A new account was created for the identity.
	Created,
}
impl Resolution {
	/// Returns a stable label suitable for span or log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Resolution::Existing => "existing",
			Resolution::Merged => "merged",
			Resolution::Created => "created",
		}
	}
}

/// Account a VK ID identity resolved to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalAccount {
	/// Local account id.
	pub id: AccountId,
	/// Resolution path taken.
	pub resolution: Resolution,
}

/// Link state shown on the user's profile page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Association {
	/// Whether the account is linked to VK ID.
	pub associated: bool,
	/// Unlink URL when associated, link URL otherwise.
	pub url: Url,
	/// Provider display name.
	pub name: &'static str,
}

/// Sign-in button registration for the host's login and register pages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoginStrategy {
	/// Strategy name, also the route segment.
	pub name: &'static str,
	/// URL that starts the sign-in.
	pub url: Url,
	/// Redirect URI VK ID returns to.
	pub callback_url: Url,
	/// Icon class for the button.
	pub icon: &'static str,
	/// Scope requested from VK ID.
	pub scope: &'static str,
}

/// Failures raised while linking or unlinking.
#[derive(Debug, ThisError)]
pub enum LinkError {
	/// No account matched and registration through VK ID is disabled.
	#[error("Registration through VK ID is disabled.")]
	RegistrationDisabled,
	/// The matching local account's email is not verified and the merge policy forbids merging.
	#[error("An account with this email exists but its email is not verified.")]
	UnverifiedEmailConflict,
	/// The account store failed.
	#[error(transparent)]
	Store(#[from] StoreError),
}

/// Applies the account-linking rules against the host's [`AccountStore`].
#[derive(Clone)]
pub struct IdentityLinker {
	store: Arc<dyn AccountStore>,
	settings: SharedSettings,
}
impl IdentityLinker {
	/// Creates a linker over the host store and the shared settings.
	pub fn new(store: Arc<dyn AccountStore>, settings: SharedSettings) -> Self {
		Self { store, settings }
	}

	/// Resolves the local account for a VK ID user, creating or merging as needed.
	///
	/// Settings are read once at entry. The three steps are separate store calls with no
	/// lock held across them: two concurrent first logins for the same new user can both miss
	/// the lookups, and the store's uniqueness constraints decide which creation wins. The
	/// loser surfaces as [`LinkError::Store`].
	pub async fn login(
		&self,
		external_id: &ExternalId,
		display_name: &str,
		email: &str,
		avatar_url: Option<&str>,
	) -> Result<LocalAccount, LinkError> {
		let settings = self.settings.snapshot();

		if let Some(id) = self.store.uid_by_external_id(external_id).await? {
			return Ok(LocalAccount { id, resolution: Resolution::Existing });
		}

		let verified_email = settings.auto_confirm.then(|| email.to_owned());

		if let Some(found) = self.store.find_by_email(email).await? {
			if settings.email_merge == EmailMergePolicy::VerifiedOnly && !found.email_verified {
				return Err(LinkError::UnverifiedEmailConflict);
			}

			self.attach(&found.account, external_id, avatar_url, verified_email).await?;

			return Ok(LocalAccount { id: found.account, resolution: Resolution::Merged });
		}
		if settings.disable_registration {
			return Err(LinkError::RegistrationDisabled);
		}

		let id = self
			.store
			.create_account(NewAccount {
				username: display_name.to_owned(),
				email: if settings.auto_confirm { None } else { Some(email.to_owned()) },
			})
			.await?;

		self.attach(&id, external_id, avatar_url, verified_email).await?;

		Ok(LocalAccount { id, resolution: Resolution::Created })
	}

	/// [`IdentityLinker::login`] for a normalized profile.
	pub async fn login_identity(
		&self,
		identity: &CanonicalIdentity,
	) -> Result<LocalAccount, LinkError> {
		self.login(
			&identity.external_id,
			&identity.display_name,
			&identity.email,
			identity.avatar_url.as_deref(),
		)
		.await
	}

	/// Looks up the account linked to a VK ID user.
	pub async fn get_uid(&self, external_id: &ExternalId) -> Result<Option<AccountId>, LinkError> {
		Ok(self.store.uid_by_external_id(external_id).await?)
	}

	/// Removes the VK ID link of an account. Unlinked accounts are a no-op.
	pub async fn unlink(&self, account: &AccountId) -> Result<(), LinkError> {
		let Some(external_id) = self.store.external_id_of(account).await? else {
			return Ok(());
		};

		self.store.detach_identity(account, &external_id).await?;

		Ok(())
	}

	/// Reports the link state of an account for its profile page.
	pub async fn association(&self, account: &AccountId) -> Result<Association, LinkError> {
		let settings = self.settings.snapshot();
		let associated = self.store.external_id_of(account).await?.is_some();
		let url = if associated { settings.deauth_url() } else { settings.link_url() };

		Ok(Association { associated, url, name: PROVIDER_NAME })
	}

	/// Describes the sign-in button, or `None` while credentials are missing.
	pub fn strategy(&self) -> Option<LoginStrategy> {
		let settings = self.settings.snapshot();

		settings.is_configured().then(|| LoginStrategy {
			name: STRATEGY_NAME,
			url: settings.link_url(),
			callback_url: settings.redirect_uri(),
			icon: STRATEGY_ICON,
			scope: VK_ID_SCOPE,
		})
	}

	async fn attach(
		&self,
		account: &AccountId,
		external_id: &ExternalId,
		avatar_url: Option<&str>,
		verified_email: Option<String>,
	) -> Result<(), StoreError> {
		self.store
			.attach_identity(IdentityAttachment {
				account: account.clone(),
				external_id: external_id.clone(),
				avatar_url: avatar_url.map(str::to_owned),
				verified_email,
			})
			.await
	}
}
impl Debug for IdentityLinker {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IdentityLinker").field("settings", &self.settings).finish_non_exhaustive()
	}
}
