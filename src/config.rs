//! Plugin settings: provider credentials, linking policy flags, and the public base URL.
//!
//! Settings are an explicit value. Hosts seed them from the environment
//! ([`Settings::from_env`]), layer the admin-saved values on top ([`Settings::apply`]), and
//! share them through [`SharedSettings`], which flows read once per request. Updating the
//! admin page calls [`SharedSettings::reload`]; nothing is mutated globally.

// self
use crate::{_prelude::*, auth::SecretString, error::ConfigError};

/// Environment variable consulted for the client id.
pub const CLIENT_ID_ENV: &str = "SSO_VK_CLIENT_ID";
/// Environment variable consulted for the client secret.
pub const CLIENT_SECRET_ENV: &str = "SSO_VK_CLIENT_SECRET";

const CALLBACK_PATH: &str = "/auth/vkid/callback";
const START_PATH: &str = "/auth/vkid";
const DEAUTH_PATH: &str = "/deauth/vkid";
const PROFILE_EDIT_PATH: &str = "/me/edit";

/// Policy applied when an unlinked VK ID user's email matches an existing local account.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailMergePolicy {
	/// Attach the identity to the matching account without further checks.
	#[default]
	Always,
	/// Attach only when the local account's email is already verified.
	VerifiedOnly,
}

/// Provider credentials required to start or complete an authorization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
	/// VK ID application id.
	pub client_id: String,
	/// VK ID application secret.
	pub client_secret: SecretString,
}

/// Effective plugin settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
	/// VK ID application id.
	pub client_id: Option<String>,
	/// VK ID application secret.
	pub client_secret: Option<SecretString>,
	/// Marks the email of newly created accounts as verified.
	pub auto_confirm: bool,
	/// Refuses to create local accounts for unknown VK ID users.
	pub disable_registration: bool,
	/// Email merge policy for unlinked users.
	pub email_merge: EmailMergePolicy,
	base_url: Url,
}
impl Settings {
	/// Creates empty settings for the host's public base URL (e.g. `https://forum.example.com`).
	pub fn new(base_url: &str) -> Result<Self, ConfigError> {
		Ok(Self {
			client_id: None,
			client_secret: None,
			auto_confirm: false,
			disable_registration: false,
			email_merge: EmailMergePolicy::default(),
			base_url: parse_base_url(base_url)?,
		})
	}

	/// Creates settings seeded from [`CLIENT_ID_ENV`] and [`CLIENT_SECRET_ENV`].
	pub fn from_env(base_url: &str) -> Result<Self, ConfigError> {
		Self::from_lookup(base_url, |key| std::env::var(key).ok())
	}

	/// Creates settings seeded from an arbitrary variable lookup.
	pub fn from_lookup<F>(base_url: &str, lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let mut settings = Self::new(base_url)?;

		settings.client_id = lookup(CLIENT_ID_ENV).filter(|value| !value.is_empty());
		settings.client_secret =
			lookup(CLIENT_SECRET_ENV).filter(|value| !value.is_empty()).map(SecretString::new);

		Ok(settings)
	}

	/// Sets the client credentials.
	pub fn with_credentials(
		mut self,
		client_id: impl Into<String>,
		client_secret: impl Into<SecretString>,
	) -> Self {
		self.client_id = Some(client_id.into());
		self.client_secret = Some(client_secret.into());

		self
	}

	/// Overrides the auto-confirm flag.
	pub fn with_auto_confirm(mut self, auto_confirm: bool) -> Self {
		self.auto_confirm = auto_confirm;

		self
	}

	/// Overrides the registration-disabled flag.
	pub fn with_disable_registration(mut self, disable_registration: bool) -> Self {
		self.disable_registration = disable_registration;

		self
	}

	/// Overrides the email merge policy.
	pub fn with_email_merge(mut self, policy: EmailMergePolicy) -> Self {
		self.email_merge = policy;

		self
	}

	/// Layers admin-saved values on top of the current settings.
	///
	/// Stored credentials win only when non-empty; checkbox flags are replaced outright.
	pub fn apply(&mut self, overrides: &SettingsOverrides) {
		if let Some(id) = overrides.id.as_deref().filter(|value| !value.is_empty()) {
			self.client_id = Some(id.to_owned());
		}
		if let Some(secret) = overrides.secret.as_deref().filter(|value| !value.is_empty()) {
			self.client_secret = Some(SecretString::new(secret));
		}

		self.auto_confirm = is_checked(overrides.autoconfirm.as_deref());
		self.disable_registration = is_checked(overrides.disable_registration.as_deref());

		if let Some(policy) = overrides.email_merge {
			self.email_merge = policy;
		}
	}

	/// Returns true when both credentials are present.
	pub fn is_configured(&self) -> bool {
		self.credentials().is_ok()
	}

	/// Returns the credentials or [`ConfigError::MissingCredentials`].
	pub fn credentials(&self) -> Result<Credentials, ConfigError> {
		match (self.client_id.as_deref(), self.client_secret.as_ref()) {
			(Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() =>
				Ok(Credentials { client_id: id.to_owned(), client_secret: secret.clone() }),
			_ => Err(ConfigError::MissingCredentials),
		}
	}

	/// Public base URL without a trailing slash.
	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	/// Redirect URI registered with VK ID; must match between authorization and exchange.
	pub fn redirect_uri(&self) -> Url {
		self.join(CALLBACK_PATH)
	}

	/// URL that starts the VK ID sign-in.
	pub fn link_url(&self) -> Url {
		self.join(START_PATH)
	}

	/// URL of the host page that removes the VK ID association.
	pub fn deauth_url(&self) -> Url {
		self.join(DEAUTH_PATH)
	}

	/// Relative landing location used when the session holds no return-to value.
	pub fn default_landing(&self) -> String {
		format!("{}/", self.relative_path())
	}

	/// Relative location of the profile edit page, used after deauthorization.
	pub fn profile_edit_path(&self) -> String {
		format!("{}{PROFILE_EDIT_PATH}", self.relative_path())
	}

	fn relative_path(&self) -> &str {
		self.base_url.path().trim_end_matches('/')
	}

	fn join(&self, suffix: &str) -> Url {
		let mut url = self.base_url.clone();
		let path = format!("{}{suffix}", self.relative_path());

		url.set_path(&path);

		url
	}
}

/// Values saved through the admin settings page.
///
/// Field names follow the stored settings hash; checkboxes are stored as `"on"`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsOverrides {
	/// Stored client id.
	#[serde(default)]
	pub id: Option<String>,
	/// Stored client secret.
	#[serde(default)]
	pub secret: Option<String>,
	/// Auto-confirm checkbox.
	#[serde(default)]
	pub autoconfirm: Option<String>,
	/// Registration-disabled checkbox.
	#[serde(default, rename = "disableRegistration")]
	pub disable_registration: Option<String>,
	/// Email merge policy selector.
	#[serde(default, rename = "emailMerge")]
	pub email_merge: Option<EmailMergePolicy>,
}

/// Shared, reloadable settings handle.
#[derive(Clone, Debug)]
pub struct SharedSettings(Arc<RwLock<Settings>>);
impl SharedSettings {
	/// Wraps the initial settings.
	pub fn new(settings: Settings) -> Self {
		Self(Arc::new(RwLock::new(settings)))
	}

	/// Returns a consistent copy for the duration of one request.
	pub fn snapshot(&self) -> Settings {
		self.0.read().clone()
	}

	/// Applies admin-saved values to the live settings.
	pub fn reload(&self, overrides: &SettingsOverrides) {
		self.0.write().apply(overrides);
	}

	/// Replaces the live settings wholesale.
	pub fn replace(&self, settings: Settings) {
		*self.0.write() = settings;
	}
}
impl From<Settings> for SharedSettings {
	fn from(settings: Settings) -> Self {
		Self::new(settings)
	}
}

fn is_checked(value: Option<&str>) -> bool {
	value == Some("on")
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
	let mut url = Url::parse(raw)
		.map_err(|source| ConfigError::InvalidBaseUrl { url: raw.to_owned(), source: Some(source) })?;

	if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
		return Err(ConfigError::InvalidBaseUrl { url: raw.to_owned(), source: None });
	}

	url.set_query(None);
	url.set_fragment(None);

	let trimmed = url.path().trim_end_matches('/').to_owned();

	url.set_path(&trimmed);

	Ok(url)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn settings() -> Settings {
		Settings::new("https://forum.example.com/community/")
			.expect("Base URL fixture should be valid.")
	}

	#[test]
	fn derived_urls_keep_the_base_path() {
		let settings = settings();

		assert_eq!(
			settings.redirect_uri().as_str(),
			"https://forum.example.com/community/auth/vkid/callback"
		);
		assert_eq!(settings.link_url().as_str(), "https://forum.example.com/community/auth/vkid");
		assert_eq!(
			settings.deauth_url().as_str(),
			"https://forum.example.com/community/deauth/vkid"
		);
		assert_eq!(settings.default_landing(), "/community/");
		assert_eq!(settings.profile_edit_path(), "/community/me/edit");
	}

	#[test]
	fn root_base_url_lands_on_slash() {
		let settings =
			Settings::new("https://forum.example.com").expect("Root base URL should be valid.");

		assert_eq!(settings.default_landing(), "/");
		assert_eq!(settings.redirect_uri().as_str(), "https://forum.example.com/auth/vkid/callback");
	}

	#[test]
	fn invalid_base_urls_are_rejected() {
		assert!(matches!(Settings::new("not a url"), Err(ConfigError::InvalidBaseUrl { .. })));
		assert!(matches!(
			Settings::new("mailto:admin@example.com"),
			Err(ConfigError::InvalidBaseUrl { source: None, .. })
		));
	}

	#[test]
	fn credentials_require_both_values() {
		let settings = settings();

		assert!(matches!(settings.credentials(), Err(ConfigError::MissingCredentials)));

		let only_id = Settings { client_id: Some("51234".into()), ..settings.clone() };

		assert!(!only_id.is_configured());

		let full = settings.with_credentials("51234", "secret");
		let credentials = full.credentials().expect("Credentials should be complete.");

		assert_eq!(credentials.client_id, "51234");
		assert_eq!(credentials.client_secret.expose(), "secret");
	}

	#[test]
	fn lookup_seeds_credentials_and_ignores_empty_values() {
		let settings = Settings::from_lookup("https://forum.example.com", |key| match key {
			CLIENT_ID_ENV => Some("51234".into()),
			CLIENT_SECRET_ENV => Some(String::new()),
			_ => None,
		})
		.expect("Lookup-based settings should build.");

		assert_eq!(settings.client_id.as_deref(), Some("51234"));
		assert!(settings.client_secret.is_none());
	}

	#[test]
	fn overrides_follow_checkbox_semantics() {
		let mut settings = settings().with_credentials("env-id", "env-secret").with_auto_confirm(true);
		let overrides: SettingsOverrides = serde_json::from_str(
			r#"{"id":"","secret":"stored-secret","disableRegistration":"on","emailMerge":"verified_only"}"#,
		)
		.expect("Stored settings should deserialize.");

		settings.apply(&overrides);

		assert_eq!(settings.client_id.as_deref(), Some("env-id"));
		assert_eq!(settings.client_secret.as_ref().map(SecretString::expose), Some("stored-secret"));
		assert!(!settings.auto_confirm, "Absent checkbox must switch auto-confirm off.");
		assert!(settings.disable_registration);
		assert_eq!(settings.email_merge, EmailMergePolicy::VerifiedOnly);
	}

	#[test]
	fn shared_settings_reload_is_visible_to_new_snapshots() {
		let shared = SharedSettings::new(settings());
		let before = shared.snapshot();

		shared.reload(&SettingsOverrides {
			id: Some("51234".into()),
			secret: Some("secret".into()),
			autoconfirm: Some("on".into()),
			..Default::default()
		});

		let after = shared.snapshot();

		assert!(!before.is_configured());
		assert!(after.is_configured());
		assert!(after.auto_confirm);
	}
}
