//! Client-credentials grant facade over the `oauth2` crate.
//!
//! The grant posts `grant_type`, `client_id`, `client_secret`, and `scope=openid` as a form body
//! through the [`ResilientTransport`], so transient token endpoint failures are retried like any
//! other request. Everything that still fails after that surfaces as
//! [`Error::Authentication`], except transport failures which keep their own variants.

pub use oauth2;

// crates.io
use oauth2::{
	AccessToken as GrantToken, AsyncHttpClient, AuthType, Client, ClientId, ClientSecret,
	HttpClientError, RefreshToken, RequestTokenError, Scope, StandardRevocableToken,
	TokenResponse, TokenUrl,
	basic::{
		BasicErrorResponse, BasicRequestTokenError, BasicRevocationErrorResponse,
		BasicTokenIntrospectionResponse, BasicTokenType,
	},
};
// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	config::Credentials,
	error::{ConfigError, TransportError},
	http::{HttpRequest, HttpResponse, ResilientTransport, ResponseMetadata, ResponseMetadataSlot},
};

/// Scope requested by every grant.
pub const GRANT_SCOPE: &str = "openid";

type GrantError = HttpClientError<TransportError>;
type GrantClient = Client<
	BasicErrorResponse,
	GrantResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
>;
type GrantFuture<'c> = Pin<Box<dyn Future<Output = Result<HttpResponse, GrantError>> + 'c + Send>>;

/// Token endpoint body: `access_token` is required, `expires_in` and `token_type` are optional.
///
/// The tenant may omit `token_type`; it defaults to `bearer`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GrantResponse {
	access_token: GrantToken,
	#[serde(default = "bearer")]
	token_type: BasicTokenType,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	expires_in: Option<u64>,
}
impl TokenResponse for GrantResponse {
	type TokenType = BasicTokenType;

	fn access_token(&self) -> &GrantToken {
		&self.access_token
	}

	fn token_type(&self) -> &BasicTokenType {
		&self.token_type
	}

	fn expires_in(&self) -> Option<std::time::Duration> {
		self.expires_in.map(std::time::Duration::from_secs)
	}

	fn refresh_token(&self) -> Option<&RefreshToken> {
		None
	}

	fn scopes(&self) -> Option<&Vec<Scope>> {
		None
	}
}

fn bearer() -> BasicTokenType {
	BasicTokenType::Bearer
}

/// [`AsyncHttpClient`] adapter that routes `oauth2` requests through the resilient transport and
/// records response metadata for error reporting.
pub(crate) struct GrantHandle<'a> {
	transport: &'a ResilientTransport,
	slot: ResponseMetadataSlot,
}
impl<'a> GrantHandle<'a> {
	pub(crate) fn new(transport: &'a ResilientTransport, slot: ResponseMetadataSlot) -> Self {
		Self { transport, slot }
	}
}
impl<'c> AsyncHttpClient<'c> for GrantHandle<'_> {
	type Error = GrantError;
	type Future = GrantFuture<'c>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		Box::pin(async move {
			self.slot.take();

			let response = self
				.transport
				.execute(request)
				.await
				.map_err(|err| HttpClientError::Reqwest(Box::new(err)))?;

			self.slot.store(ResponseMetadata::from_response(&response));

			Ok(response)
		})
	}
}

/// Performs one client-credentials grant and returns the issued token.
pub async fn exchange_client_credentials(
	credentials: &Credentials,
	transport: &ResilientTransport,
) -> Result<AccessToken> {
	let token_endpoint = credentials.token_endpoint()?;
	let token_url = TokenUrl::new(token_endpoint.to_string()).map_err(|source| {
		ConfigError::InvalidTenantUrl { url: token_endpoint.to_string(), source }
	})?;
	let client = GrantClient::new(ClientId::new(credentials.client_id.clone()))
		.set_client_secret(ClientSecret::new(credentials.client_secret.expose().to_owned()))
		.set_auth_type(AuthType::RequestBody)
		.set_token_uri(token_url);
	let slot = ResponseMetadataSlot::default();
	let handle = GrantHandle::new(transport, slot.clone());
	let response = client
		.exchange_client_credentials()
		.add_scope(Scope::new(GRANT_SCOPE.to_owned()))
		.request_async(&handle)
		.await
		.map_err(|err| map_request_error(token_endpoint.as_str(), slot.take(), err))?;
	let lifetime = match response.expires_in() {
		Some(expires_in) => Duration::seconds(i64::try_from(expires_in.as_secs()).map_err(|_| {
			Error::authentication("token endpoint returned an out-of-range expires_in")
		})?),
		None => AccessToken::DEFAULT_LIFETIME,
	};

	Ok(AccessToken::new(
		response.access_token().secret().as_str(),
		OffsetDateTime::now_utc(),
		lifetime,
	))
}

fn map_request_error(
	url: &str,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<GrantError>,
) -> Error {
	let status = meta.and_then(|meta| meta.status);
	let status_label =
		status.map(|code| format!("HTTP {code}")).unwrap_or_else(|| "no status".into());

	match err {
		RequestTokenError::ServerResponse(response) => {
			let detail = response
				.error_description()
				.cloned()
				.unwrap_or_else(|| response.error().as_ref().to_owned());

			Error::authentication(format!(
				"token endpoint rejected the grant ({status_label}): {detail}"
			))
		},
		RequestTokenError::Parse(source, _body) => Error::authentication(format!(
			"token endpoint returned an unusable body ({status_label}) at `{}`",
			source.path()
		)),
		RequestTokenError::Other(message) => Error::authentication(format!(
			"token endpoint returned an unexpected response ({status_label}): {message}"
		)),
		RequestTokenError::Request(HttpClientError::Reqwest(inner)) =>
			Error::from_transport(url, *inner),
		RequestTokenError::Request(HttpClientError::Http(inner)) => ConfigError::from(inner).into(),
		RequestTokenError::Request(HttpClientError::Io(inner)) => TransportError::Io(inner).into(),
		RequestTokenError::Request(HttpClientError::Other(message)) =>
			TransportError::network(std::io::Error::other(message)).into(),
		RequestTokenError::Request(other) =>
			TransportError::network(std::io::Error::other(other.to_string())).into(),
	}
}
