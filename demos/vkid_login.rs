//! Walks through the VK ID sign-in routes with in-memory stores: the start redirect, the
//! callback's state check, and an unlink.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
// self
use vkid_sso::{
	auth::ExternalId,
	config::Settings,
	flows::{CallbackParams, ReqwestSsoFlow},
	session::MemorySession,
	store::{AccountStore, IdentityAttachment, MemoryAccountStore},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let store = MemoryAccountStore::default();
	let settings = Settings::new("https://forum.example.com")?
		.with_credentials("demo-client", "demo-secret")
		.with_auto_confirm(true);
	let flow = ReqwestSsoFlow::new(Arc::new(store.clone()), settings)?;
	let session = MemorySession::default();
	let outcome = flow.start(&session).await?;

	println!("Send your user to {}.", outcome.authorize_url);

	let state = outcome
		.authorize_url
		.query_pairs()
		.find_map(|(key, value)| (key == "state").then(|| value.into_owned()))
		.unwrap_or_default();

	// Simulate a forged redirect; the state check rejects it before any request to VK ID.
	let forged = CallbackParams::from_query(&format!(
		"code=demo-code&state={state}-forged&device_id=demo-device"
	));

	match flow.callback(&session, forged).await {
		Ok(outcome) => println!("Unexpected sign-in for account {}.", outcome.account),
		Err(e) => println!("Callback refused with {}: {}.", e.http_status(), e.user_message()),
	}

	// A linked account, as a successful callback would leave it.
	let account = store.insert_account("ivan", Some("ivan@example.com"), true)?;
	let external_id = ExternalId::new("123")?;

	store
		.attach_identity(IdentityAttachment {
			account: account.clone(),
			external_id: external_id.clone(),
			avatar_url: None,
			verified_email: None,
		})
		.await?;
	println!("Account {account} is linked: {}.", store.is_linked(&external_id));

	let redirect = flow.deauthorize(&account).await?;

	println!("Unlinked; redirecting to {redirect}. Still linked: {}.", store.is_linked(&external_id));

	Ok(())
}
