//! Thread-safe in-memory [`AccountStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{AccountId, ExternalId},
	store::{
		AccountStore, EmailMatch, IdentityAttachment, NewAccount, StoreError, StoreFuture,
	},
};

type StoreState = Arc<RwLock<Accounts>>;

/// Point-in-time copy of one stored account.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccountSnapshot {
	/// Username chosen at creation.
	pub username: String,
	/// Current email.
	pub email: Option<String>,
	/// Whether the email is verified.
	pub email_verified: bool,
	/// Linked VK ID user, if any.
	pub external_id: Option<ExternalId>,
	/// Avatar URL.
	pub picture: Option<String>,
	/// Uploaded avatar URL; mirrors `picture` for VK ID avatars.
	pub uploaded_picture: Option<String>,
}

#[derive(Debug, Default)]
struct Accounts {
	next_id: u64,
	rows: HashMap<AccountId, AccountSnapshot>,
	links: HashMap<ExternalId, AccountId>,
	emails: HashMap<String, AccountId>,
}
impl Accounts {
	fn insert(
		&mut self,
		username: String,
		email: Option<String>,
		email_verified: bool,
	) -> Result<AccountId, StoreError> {
		if let Some(email) = email.as_deref()
			&& self.emails.contains_key(&email_key(email))
		{
			return Err(StoreError::Conflict { message: format!("email {email} is taken") });
		}

		self.next_id += 1;

		let account = AccountId::new(self.next_id.to_string())
			.map_err(|e| StoreError::Backend { message: e.to_string() })?;

		if let Some(email) = email.as_deref() {
			self.emails.insert(email_key(email), account.clone());
		}

		self.rows.insert(
			account.clone(),
			AccountSnapshot { username, email, email_verified, ..Default::default() },
		);

		Ok(account)
	}

	fn attach(&mut self, attachment: IdentityAttachment) -> Result<(), StoreError> {
		let IdentityAttachment { account, external_id, avatar_url, verified_email } = attachment;

		if !self.rows.contains_key(&account) {
			return Err(StoreError::UnknownAccount { account: account.to_string() });
		}
		if let Some(owner) = self.links.get(&external_id)
			&& owner != &account
		{
			return Err(StoreError::Conflict {
				message: format!("external id {external_id} is linked to another account"),
			});
		}
		if let Some(email) = verified_email.as_deref()
			&& let Some(owner) = self.emails.get(&email_key(email))
			&& owner != &account
		{
			return Err(StoreError::Conflict { message: format!("email {email} is taken") });
		}

		let (previous_email, previous_link) = {
			let Some(row) = self.rows.get_mut(&account) else {
				return Err(StoreError::UnknownAccount { account: account.to_string() });
			};
			let previous_email = if verified_email.is_some() { row.email.take() } else { None };
			let previous_link = row.external_id.replace(external_id.clone());

			if let Some(url) = avatar_url {
				row.uploaded_picture = Some(url.clone());
				row.picture = Some(url);
			}
			if let Some(email) = verified_email.clone() {
				row.email = Some(email);
				row.email_verified = true;
			}

			(previous_email, previous_link)
		};

		// One link per account: a replaced identity must stop resolving here.
		if let Some(previous) = previous_link
			&& previous != external_id
			&& self.links.get(&previous) == Some(&account)
		{
			self.links.remove(&previous);
		}
		if let Some(previous) = previous_email {
			self.emails.remove(&email_key(&previous));
		}
		if let Some(email) = verified_email {
			self.emails.insert(email_key(&email), account.clone());
		}

		self.links.insert(external_id, account);

		Ok(())
	}

	fn detach(&mut self, account: &AccountId, external_id: &ExternalId) {
		if self.links.get(external_id).is_some_and(|owner| owner == account) {
			self.links.remove(external_id);
		}
		if let Some(row) = self.rows.get_mut(account)
			&& row.external_id.as_ref() == Some(external_id)
		{
			row.external_id = None;
		}
	}
}

/// Thread-safe account store that keeps rows in-process for tests and demos.
///
/// Emails are unique case-insensitively; ids are assigned sequentially starting at `1`.
#[derive(Clone, Debug, Default)]
pub struct MemoryAccountStore(StoreState);
impl MemoryAccountStore {
	/// Seeds an account directly, bypassing the linker.
	pub fn insert_account(
		&self,
		username: impl Into<String>,
		email: Option<&str>,
		email_verified: bool,
	) -> Result<AccountId, StoreError> {
		self.0.write().insert(username.into(), email.map(str::to_owned), email_verified)
	}

	/// Returns a copy of the stored account.
	pub fn account(&self, account: &AccountId) -> Option<AccountSnapshot> {
		self.0.read().rows.get(account).cloned()
	}

	/// Number of stored accounts.
	pub fn account_count(&self) -> usize {
		self.0.read().rows.len()
	}

	/// Returns whether the external id -> account entry exists.
	pub fn is_linked(&self, external_id: &ExternalId) -> bool {
		self.0.read().links.contains_key(external_id)
	}
}
impl AccountStore for MemoryAccountStore {
	fn uid_by_external_id<'a>(
		&'a self,
		external_id: &'a ExternalId,
	) -> StoreFuture<'a, Option<AccountId>> {
		let state = self.0.clone();

		Box::pin(async move { Ok(state.read().links.get(external_id).cloned()) })
	}

	fn find_by_email<'a>(&'a self, email: &'a str) -> StoreFuture<'a, Option<EmailMatch>> {
		let state = self.0.clone();

		Box::pin(async move {
			let guard = state.read();
			let found = guard.emails.get(&email_key(email)).and_then(|account| {
				guard.rows.get(account).map(|row| EmailMatch {
					account: account.clone(),
					email_verified: row.email_verified,
				})
			});

			Ok(found)
		})
	}

	fn create_account(&self, account: NewAccount) -> StoreFuture<'_, AccountId> {
		let state = self.0.clone();

		Box::pin(async move { state.write().insert(account.username, account.email, false) })
	}

	fn attach_identity(&self, attachment: IdentityAttachment) -> StoreFuture<'_, ()> {
		let state = self.0.clone();

		Box::pin(async move { state.write().attach(attachment) })
	}

	fn external_id_of<'a>(
		&'a self,
		account: &'a AccountId,
	) -> StoreFuture<'a, Option<ExternalId>> {
		let state = self.0.clone();

		Box::pin(async move {
			Ok(state.read().rows.get(account).and_then(|row| row.external_id.clone()))
		})
	}

	fn detach_identity<'a>(
		&'a self,
		account: &'a AccountId,
		external_id: &'a ExternalId,
	) -> StoreFuture<'a, ()> {
		let state = self.0.clone();

		Box::pin(async move {
			state.write().detach(account, external_id);

			Ok(())
		})
	}
}

fn email_key(email: &str) -> String {
	email.to_lowercase()
}
