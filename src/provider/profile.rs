//! Raw VK ID profiles and their canonical, provider-neutral form.

// crates.io
use serde_json::{Map, Value};
// self
use crate::{_prelude::*, auth::ExternalId, error::ProtocolError};

/// Display name used when the provider omits `first_name`.
pub const PLACEHOLDER_DISPLAY_NAME: &str = "vkuser";

const USER_INFO_ENDPOINT: &str = "user_info";

/// `user` object returned by the user-info endpoint.
///
/// Construction guarantees a valid `user_id`, which is what makes [`RawProfile::normalize`]
/// total.
#[derive(Clone, Debug, PartialEq)]
pub struct RawProfile {
	/// Provider-assigned user id (numeric on the wire, kept as a string).
	pub user_id: ExternalId,
	/// Given name.
	pub first_name: Option<String>,
	/// Family name.
	pub last_name: Option<String>,
	/// Email, when the `email` scope was granted.
	pub email: Option<String>,
	/// Phone, when the `phone` scope was granted.
	pub phone: Option<String>,
	/// Avatar URL.
	pub avatar: Option<String>,
	/// Untouched `user` object.
	pub raw: Value,
}
impl RawProfile {
	/// Extracts a profile from the `user` object of a user-info response.
	pub fn from_user_object(user: Value) -> Result<Self, ProtocolError> {
		let Value::Object(fields) = &user else {
			return Err(ProtocolError::MissingField { endpoint: USER_INFO_ENDPOINT, field: "user" });
		};
		let user_id = match fields.get("user_id") {
			Some(Value::String(id)) => id.clone(),
			Some(Value::Number(id)) => id.to_string(),
			None | Some(Value::Null) =>
				return Err(ProtocolError::MissingField {
					endpoint: USER_INFO_ENDPOINT,
					field: "user.user_id",
				}),
			Some(other) =>
				return Err(ProtocolError::InvalidField {
					endpoint: USER_INFO_ENDPOINT,
					field: "user.user_id",
					reason: format!("expected a string or number, found {other}"),
				}),
		};
		let user_id = ExternalId::new(&user_id).map_err(|e| ProtocolError::InvalidField {
			endpoint: USER_INFO_ENDPOINT,
			field: "user.user_id",
			reason: e.to_string(),
		})?;
		let first_name = text_field(fields, "first_name");
		let last_name = text_field(fields, "last_name");
		let email = text_field(fields, "email");
		let phone = text_field(fields, "phone");
		let avatar = text_field(fields, "avatar");

		Ok(Self { user_id, first_name, last_name, email, phone, avatar, raw: user })
	}

	/// Maps the profile into a [`CanonicalIdentity`].
	///
	/// The display name falls back to [`PLACEHOLDER_DISPLAY_NAME`]. A missing email is replaced
	/// by [`placeholder_email`], so account creation downstream must tolerate an address that
	/// cannot receive mail.
	pub fn normalize(self) -> CanonicalIdentity {
		let display_name =
			self.first_name.clone().unwrap_or_else(|| PLACEHOLDER_DISPLAY_NAME.to_owned());
		let (email, email_is_placeholder) = match self.email {
			Some(email) => (email, false),
			None => (placeholder_email(&self.user_id), true),
		};

		CanonicalIdentity {
			external_id: self.user_id,
			display_name,
			first_name: self.first_name,
			last_name: self.last_name,
			email,
			email_is_placeholder,
			avatar_url: self.avatar,
			raw: self.raw,
		}
	}
}

/// Provider-neutral identity consumed by the identity linker.
#[derive(Clone, Debug, PartialEq)]
pub struct CanonicalIdentity {
	/// Provider-assigned user id.
	pub external_id: ExternalId,
	/// Name used as the username of newly created accounts.
	pub display_name: String,
	/// Given name, if supplied.
	pub first_name: Option<String>,
	/// Family name, if supplied.
	pub last_name: Option<String>,
	/// Email supplied by the provider or a synthesized placeholder.
	pub email: String,
	/// True when [`CanonicalIdentity::email`] was synthesized.
	pub email_is_placeholder: bool,
	/// Avatar URL, if supplied.
	pub avatar_url: Option<String>,
	/// Raw provider payload.
	pub raw: Value,
}

/// Deterministic stand-in address for users without a provider email.
pub fn placeholder_email(external_id: &ExternalId) -> String {
	format!("vk-{external_id}@vk.local")
}

fn text_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
	fields.get(key).and_then(Value::as_str).filter(|value| !value.is_empty()).map(str::to_owned)
}
