mod common;

// self
use common::*;
use vkid_sso::{
	auth::{ExternalId, SecretString},
	config::{EmailMergePolicy, Settings, SettingsOverrides},
	flows::{CallbackParams, CallbackStage, FlowError, SERVICE_UNAVAILABLE_MESSAGE},
	link::{LinkError, Resolution},
	session::{MemorySession, PendingAuthorization, SessionStore},
	store::AccountStore,
};

fn callback_params(state: &str) -> CallbackParams {
	CallbackParams {
		code: Some("code-it".into()),
		state: Some(state.into()),
		device_id: Some("device-it".into()),
		..Default::default()
	}
}

fn external(value: &str) -> ExternalId {
	ExternalId::new(value).expect("External id fixture should be valid.")
}

#[tokio::test]
async fn callback_links_new_user_and_redirects_to_landing() {
	let client = ScriptedHttpClient::with_responses([(200, TOKEN_OK), (200, PROFILE_OK)]);
	let (flow, store) = scripted_flow(settings(), &client);
	let (session, state) = started_session(&flow).await;
	let outcome = flow
		.callback(&session, callback_params(&state))
		.await
		.expect("Callback should complete the sign-in.");

	assert_eq!(outcome.redirect_to, "/");
	assert_eq!(outcome.stage, CallbackStage::SessionEstablished);
	assert_eq!(outcome.resolution, Resolution::Created);
	assert_eq!(session.account(), Some(outcome.account.clone()));
	assert_eq!(client.call_count(), 2);

	let token_request = client.requests()[0].json();

	assert_eq!(token_request["device_id"], "device-it");
	assert_eq!(token_request["redirect_uri"], "https://forum.example.com/auth/vkid/callback");

	let row = store.account(&outcome.account).expect("Created account should exist.");

	assert_eq!(row.username, "Ivan");
	assert_eq!(row.email.as_deref(), Some("ivan@example.com"));
	assert_eq!(row.external_id, Some(external("123")));
	assert_eq!(row.picture.as_deref(), Some("https://cdn.example/ivan.jpg"));
	assert!(!session.has_pending_verifier(), "The verifier must be consumed.");
}

#[tokio::test]
async fn callback_honors_return_to() {
	let client = ScriptedHttpClient::with_responses([(200, TOKEN_OK), (200, PROFILE_OK)]);
	let (flow, _store) = scripted_flow(settings(), &client);
	let (session, state) = started_session(&flow).await;

	session.set_return_to("/topic/42/hello");

	let outcome = flow
		.callback(&session, callback_params(&state))
		.await
		.expect("Callback should complete the sign-in.");

	assert_eq!(outcome.redirect_to, "/topic/42/hello");
}

#[tokio::test]
async fn state_mismatch_makes_no_network_call() {
	let client = ScriptedHttpClient::with_responses([(200, TOKEN_OK), (200, PROFILE_OK)]);
	let (flow, store) = scripted_flow(settings(), &client);
	let (session, _state) = started_session(&flow).await;
	let err = flow
		.callback(&session, callback_params("forged-state"))
		.await
		.expect_err("A forged state must be rejected.");

	assert!(matches!(err, FlowError::CsrfMismatch));
	assert_eq!(err.http_status(), 403);
	assert_eq!(client.call_count(), 0);
	assert_eq!(store.account_count(), 0);
	assert!(session.pending_state().is_none(), "A failed check must still consume the state.");
}

#[tokio::test]
async fn missing_state_in_session_is_a_mismatch() {
	let client = ScriptedHttpClient::default();
	let (flow, _store) = scripted_flow(settings(), &client);
	let session = MemorySession::default();
	let err = flow
		.callback(&session, callback_params("any-state"))
		.await
		.expect_err("A callback without a pending state must be rejected.");

	assert!(matches!(err, FlowError::CsrfMismatch));
	assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn replayed_callback_is_rejected() {
	let client = ScriptedHttpClient::with_responses([(200, TOKEN_OK), (200, PROFILE_OK)]);
	let (flow, _store) = scripted_flow(settings(), &client);
	let (session, state) = started_session(&flow).await;

	flow.callback(&session, callback_params(&state))
		.await
		.expect("First callback should succeed.");

	let err = flow
		.callback(&session, callback_params(&state))
		.await
		.expect_err("Replaying the callback must fail.");

	assert!(matches!(err, FlowError::CsrfMismatch));
	assert_eq!(client.call_count(), 2);
}

#[tokio::test]
async fn provider_error_skips_exchange_and_keeps_session() {
	let client = ScriptedHttpClient::default();
	let (flow, _store) = scripted_flow(settings(), &client);
	let (session, state) = started_session(&flow).await;
	let err = flow
		.callback(
			&session,
			CallbackParams {
				state: Some(state.clone()),
				error: Some("access_denied".into()),
				error_description: Some("User denied access".into()),
				..Default::default()
			},
		)
		.await
		.expect_err("Provider errors must end the callback.");

	assert!(matches!(
		&err,
		FlowError::ProviderDenied { error, description }
			if error == "access_denied" && description.as_deref() == Some("User denied access")
	));
	assert_eq!(err.http_status(), 400);
	assert_eq!(client.call_count(), 0);
	assert_eq!(session.pending_state(), Some(state));
}

#[tokio::test]
async fn missing_code_and_device_id_are_rejected_before_the_session_is_read() {
	let client = ScriptedHttpClient::default();
	let (flow, _store) = scripted_flow(settings(), &client);
	let (session, state) = started_session(&flow).await;
	let err = flow
		.callback(&session, CallbackParams { code: None, ..callback_params(&state) })
		.await
		.expect_err("A callback without code must be rejected.");

	assert!(matches!(err, FlowError::MissingCode));

	let err = flow
		.callback(&session, CallbackParams { device_id: Some(String::new()), ..callback_params(&state) })
		.await
		.expect_err("A callback without device_id must be rejected.");

	assert!(matches!(err, FlowError::MissingDeviceId));
	assert_eq!(err.http_status(), 400);

	let err = flow
		.callback(
			&session,
			CallbackParams { device_id: Some("device with spaces".into()), ..callback_params(&state) },
		)
		.await
		.expect_err("A malformed device_id must be rejected.");

	assert!(matches!(err, FlowError::MissingDeviceId));
	assert_eq!(client.call_count(), 0);
	assert_eq!(session.pending_state(), Some(state));
}

#[tokio::test]
async fn missing_verifier_is_rejected_without_exchange() {
	let client = ScriptedHttpClient::default();
	let (flow, _store) = scripted_flow(settings(), &client);
	let session = MemorySession::default();

	session
		.save_pending(PendingAuthorization {
			state: "state-it".into(),
			code_verifier: SecretString::new(""),
		})
		.await
		.expect("Saving the pending authorization should succeed.");

	let err = flow
		.callback(&session, callback_params("state-it"))
		.await
		.expect_err("A callback without a verifier must be rejected.");

	assert!(matches!(err, FlowError::MissingVerifier));
	assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn token_failure_is_reported_as_service_unavailable() {
	let client = ScriptedHttpClient::with_responses([(
		400,
		"{\"error\":\"invalid_grant\",\"error_description\":\"code expired\"}",
	)]);
	let (flow, store) = scripted_flow(settings(), &client);
	let (session, state) = started_session(&flow).await;
	let err = flow
		.callback(&session, callback_params(&state))
		.await
		.expect_err("A rejected exchange must fail the callback.");

	assert!(matches!(err, FlowError::TokenExchangeFailed(_)));
	assert_eq!(err.http_status(), 502);
	assert_eq!(err.user_message(), SERVICE_UNAVAILABLE_MESSAGE);
	assert_eq!(client.call_count(), 1);
	assert_eq!(store.account_count(), 0);
	assert!(session.account().is_none());
}

#[tokio::test]
async fn unreachable_profile_endpoint_fails_after_exchange() {
	let client = ScriptedHttpClient::with_responses([(200, TOKEN_OK)]);
	let (flow, _store) = scripted_flow(settings(), &client);
	let (session, state) = started_session(&flow).await;
	let err = flow
		.callback(&session, callback_params(&state))
		.await
		.expect_err("A missing profile response must fail the callback.");

	assert!(matches!(err, FlowError::ProfileFetchFailed(_)));
	assert_eq!(err.user_message(), SERVICE_UNAVAILABLE_MESSAGE);
}

#[tokio::test]
async fn disabled_registration_rejects_unknown_users() {
	let client = ScriptedHttpClient::with_responses([(200, TOKEN_OK), (200, PROFILE_OK)]);
	let (flow, store) = scripted_flow(settings().with_disable_registration(true), &client);
	let (session, state) = started_session(&flow).await;
	let err = flow
		.callback(&session, callback_params(&state))
		.await
		.expect_err("Registration must be refused.");

	assert!(matches!(err, FlowError::LoginFailed(LinkError::RegistrationDisabled)));
	assert_eq!(err.http_status(), 403);
	assert_eq!(err.user_message(), "registration through VK ID is disabled");
	assert_eq!(store.account_count(), 0);
	assert!(session.account().is_none());
}

#[tokio::test]
async fn existing_email_is_merged() {
	let client = ScriptedHttpClient::with_responses([(200, TOKEN_OK), (200, PROFILE_OK)]);
	let (flow, store) = scripted_flow(settings().with_disable_registration(true), &client);
	let existing = store
		.insert_account("ivan", Some("ivan@example.com"), false)
		.expect("Seeding an account should succeed.");
	let (session, state) = started_session(&flow).await;
	let outcome = flow
		.callback(&session, callback_params(&state))
		.await
		.expect("Merging should not need registration.");

	assert_eq!(outcome.account, existing);
	assert_eq!(outcome.resolution, Resolution::Merged);
	assert_eq!(store.account_count(), 1);
	assert_eq!(
		store.uid_by_external_id(&external("123")).await.expect("Lookup should succeed."),
		Some(existing)
	);
}

#[tokio::test]
async fn verified_only_policy_blocks_merging_unverified_accounts() {
	let client = ScriptedHttpClient::with_responses([(200, TOKEN_OK), (200, PROFILE_OK)]);
	let (flow, store) =
		scripted_flow(settings().with_email_merge(EmailMergePolicy::VerifiedOnly), &client);

	store
		.insert_account("ivan", Some("ivan@example.com"), false)
		.expect("Seeding an account should succeed.");

	let (session, state) = started_session(&flow).await;
	let err = flow
		.callback(&session, callback_params(&state))
		.await
		.expect_err("Unverified accounts must not be merged.");

	assert!(matches!(err, FlowError::LoginFailed(LinkError::UnverifiedEmailConflict)));
	assert_eq!(err.http_status(), 409);
	assert!(!store.is_linked(&external("123")));
}

#[tokio::test]
async fn deauthorize_unlinks_and_redirects_to_profile_edit() {
	let client = ScriptedHttpClient::with_responses([(200, TOKEN_OK), (200, PROFILE_OK)]);
	let (flow, store) = scripted_flow(settings(), &client);
	let (session, state) = started_session(&flow).await;
	let outcome = flow
		.callback(&session, callback_params(&state))
		.await
		.expect("Callback should complete the sign-in.");
	let redirect =
		flow.deauthorize(&outcome.account).await.expect("Deauthorization should succeed.");

	assert_eq!(redirect, "/me/edit");
	assert!(!store.is_linked(&external("123")));
	assert_eq!(
		flow.linker.get_uid(&external("123")).await.expect("Lookup should succeed."),
		None
	);

	flow.deauthorize(&outcome.account).await.expect("Repeating deauthorization is a no-op.");
}

#[tokio::test]
async fn settings_reload_applies_to_the_next_request() {
	let client = ScriptedHttpClient::default();
	let (flow, _store) =
		scripted_flow(Settings::new(BASE_URL).expect("Base URL fixture should parse."), &client);
	let session = MemorySession::default();
	let err = flow.start(&session).await.expect_err("Start must fail without credentials.");

	assert!(matches!(err, FlowError::Configuration(_)));

	flow.settings.reload(&SettingsOverrides {
		id: Some(CLIENT_ID.into()),
		secret: Some(CLIENT_SECRET.into()),
		..Default::default()
	});
	flow.start(&session).await.expect("Start should succeed after the reload.");

	assert!(session.pending_state().is_some());
}

#[cfg(feature = "reqwest")]
mod over_http {
	// crates.io
	use httpmock::prelude::*;
	// self
	use super::*;
	use vkid_sso::{
		flows::ReqwestSsoFlow,
		http::ReqwestHttpClient,
		oauth::ReqwestTransportErrorMapper,
		store::MemoryAccountStore,
	};

	#[tokio::test]
	async fn full_sign_in_against_mock_provider() {
		let server = MockServer::start_async().await;
		let token_mock = server
			.mock_async(|when, then| {
				when.method(POST).path("/oauth2/auth");
				then.status(200).header("content-type", "application/json").body(TOKEN_OK);
			})
			.await;
		let profile_mock = server
			.mock_async(|when, then| {
				when.method(POST).path("/oauth2/user_info");
				then.status(200).header("content-type", "application/json").body(PROFILE_OK);
			})
			.await;
		let store = MemoryAccountStore::default();
		let flow: ReqwestSsoFlow = ReqwestSsoFlow::with_http_client(
			std::sync::Arc::new(store.clone()),
			settings().with_auto_confirm(true),
			mock_endpoints(&server.base_url()),
			ReqwestHttpClient::new().expect("Reqwest client should build."),
			std::sync::Arc::new(ReqwestTransportErrorMapper),
		);
		let (session, state) = started_session(&flow).await;
		let outcome = flow
			.callback(&session, callback_params(&state))
			.await
			.expect("Sign-in against the mock provider should succeed.");

		token_mock.assert_async().await;
		profile_mock.assert_async().await;

		let row = store.account(&outcome.account).expect("Created account should exist.");

		assert_eq!(outcome.redirect_to, "/");
		assert_eq!(row.email.as_deref(), Some("ivan@example.com"));
		assert!(row.email_verified, "Auto-confirm should verify the email.");
	}
}
