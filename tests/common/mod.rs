//! Shared fixtures for the integration tests.

#![allow(dead_code)]

// std
use std::{collections::VecDeque, error::Error as StdError, fmt, future::Future, pin::Pin, sync::Arc};
// crates.io
use parking_lot::Mutex;
// self
use vkid_sso::{
	config::Settings,
	error::{ConfigError, Error, TransportError},
	flows::SsoFlow,
	http::{ProviderHttpClient, ResponseMetadata, ResponseMetadataSlot},
	oauth::{
		ProviderEndpoint, TransportErrorMapper,
		oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse, http::StatusCode},
	},
	provider::ProviderEndpoints,
	session::{MemorySession, SessionStore},
	store::MemoryAccountStore,
};

pub const CLIENT_ID: &str = "51234";
pub const CLIENT_SECRET: &str = "secret-it";
pub const BASE_URL: &str = "https://forum.example.com";

pub fn settings() -> Settings {
	Settings::new(BASE_URL)
		.expect("Base URL fixture should parse.")
		.with_credentials(CLIENT_ID, CLIENT_SECRET)
}

/// Endpoint set pointing at a local mock server.
pub fn mock_endpoints(base: &str) -> ProviderEndpoints {
	ProviderEndpoints::builder()
		.authorization_endpoint(url(&format!("{base}/authorize")))
		.token_endpoint(url(&format!("{base}/oauth2/auth")))
		.user_info_endpoint(url(&format!("{base}/oauth2/user_info")))
		.build()
		.expect("Loopback endpoints should validate.")
}

pub fn url(value: &str) -> url::Url {
	url::Url::parse(value).expect("URL fixture should parse.")
}

/// Runs [`SsoFlow::start`] and returns the state it stored.
pub async fn started_session<C, M>(flow: &SsoFlow<C, M>) -> (MemorySession, String)
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let session = MemorySession::default();

	flow.start(&session as &dyn SessionStore).await.expect("Start should succeed.");

	let state = session.pending_state().expect("Start should store a state.");

	(session, state)
}

#[derive(Debug)]
pub struct OfflineError;
impl fmt::Display for OfflineError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str("Scripted transport has no response left.")
	}
}
impl StdError for OfflineError {}

/// Request captured by [`ScriptedHttpClient`].
#[derive(Clone, Debug)]
pub struct RecordedRequest {
	pub uri: String,
	pub content_type: Option<String>,
	pub body: Vec<u8>,
}
impl RecordedRequest {
	pub fn json(&self) -> serde_json::Value {
		serde_json::from_slice(&self.body).expect("Recorded body should be JSON.")
	}

	pub fn text(&self) -> String {
		String::from_utf8(self.body.clone()).expect("Recorded body should be UTF-8.")
	}
}

#[derive(Default)]
struct Script {
	responses: Mutex<VecDeque<(u16, String)>>,
	requests: Mutex<Vec<RecordedRequest>>,
}

/// Transport that records every request and answers from a fixed script.
#[derive(Clone, Default)]
pub struct ScriptedHttpClient(Arc<Script>);
impl ScriptedHttpClient {
	pub fn with_responses<I, S>(responses: I) -> Self
	where
		I: IntoIterator<Item = (u16, S)>,
		S: Into<String>,
	{
		let client = Self::default();

		client
			.0
			.responses
			.lock()
			.extend(responses.into_iter().map(|(status, body)| (status, body.into())));

		client
	}

	pub fn requests(&self) -> Vec<RecordedRequest> {
		self.0.requests.lock().clone()
	}

	pub fn call_count(&self) -> usize {
		self.0.requests.lock().len()
	}
}
impl ProviderHttpClient for ScriptedHttpClient {
	type Handle = ScriptedHandle;
	type TransportError = OfflineError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		ScriptedHandle { script: self.0.clone(), slot }
	}
}

pub struct ScriptedHandle {
	script: Arc<Script>,
	slot: ResponseMetadataSlot,
}
impl<'c> AsyncHttpClient<'c> for ScriptedHandle {
	type Error = HttpClientError<OfflineError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let script = self.script.clone();
		let slot = self.slot.clone();

		Box::pin(async move {
			slot.take();
			script.requests.lock().push(RecordedRequest {
				uri: request.uri().to_string(),
				content_type: request
					.headers()
					.get("content-type")
					.and_then(|value| value.to_str().ok())
					.map(str::to_owned),
				body: request.body().clone(),
			});

			let Some((status, body)) = script.responses.lock().pop_front() else {
				return Err(HttpClientError::Reqwest(Box::new(OfflineError)));
			};

			slot.store(ResponseMetadata { status: Some(status) });

			let mut response = HttpResponse::new(body.into_bytes());

			*response.status_mut() =
				StatusCode::from_u16(status).expect("Scripted status should be valid.");

			Ok(response)
		})
	}
}

/// Maps scripted transport failures the way the reqwest mapper maps network failures.
#[derive(Clone, Debug, Default)]
pub struct ScriptedMapper;
impl TransportErrorMapper<OfflineError> for ScriptedMapper {
	fn map_transport_error(
		&self,
		endpoint: ProviderEndpoint,
		_meta: Option<&ResponseMetadata>,
		err: HttpClientError<OfflineError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => TransportError::network(endpoint.as_str(), *inner).into(),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			other => TransportError::Other {
				endpoint: endpoint.as_str(),
				message: format!("{other:?}"),
			}
			.into(),
		}
	}
}

pub type ScriptedFlow = SsoFlow<ScriptedHttpClient, ScriptedMapper>;

/// Builds a flow over a scripted transport and a fresh memory store.
pub fn scripted_flow(
	settings: Settings,
	client: &ScriptedHttpClient,
) -> (ScriptedFlow, MemoryAccountStore) {
	let store = MemoryAccountStore::default();
	let flow = SsoFlow::with_http_client(
		Arc::new(store.clone()),
		settings,
		ProviderEndpoints::vk_id().expect("Production endpoints should validate."),
		client.clone(),
		Arc::new(ScriptedMapper),
	);

	(flow, store)
}

pub const TOKEN_OK: &str =
	"{\"access_token\":\"access-it\",\"refresh_token\":\"refresh-it\",\"expires_in\":3600,\"user_id\":123,\"scope\":\"email phone\"}";
pub const PROFILE_OK: &str = "{\"user\":{\"user_id\":\"123\",\"first_name\":\"Ivan\",\"last_name\":\"Petrov\",\"email\":\"ivan@example.com\",\"avatar\":\"https://cdn.example/ivan.jpg\"}}";
