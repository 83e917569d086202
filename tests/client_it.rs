// crates.io
use httpmock::{Mock, prelude::*};
use serde_json::json;
// self
use verify_snapshot::{
	_preludet::*,
	client::ApiRequest,
	error::Error,
};

async fn mock_token(server: &MockServer) -> Mock<'_> {
	mock_grant(
		server,
		"{\"access_token\":\"tenant-token\",\"token_type\":\"bearer\",\"expires_in\":7200}",
	)
	.await
}

async fn mock_grant<'a>(server: &'a MockServer, body: &'static str) -> Mock<'a> {
	server
		.mock_async(move |when, then| {
			when.method(POST)
				.path("/v1.0/endpoint/default/token")
				.body_includes("grant_type=client_credentials")
				.body_includes("scope=openid");
			then.status(200).header("content-type", "application/json").body(body);
		})
		.await
}

fn endpoint(server: &MockServer, path: &str) -> Url {
	Url::parse(&server.url(path)).expect("Mock endpoint should parse successfully.")
}

#[tokio::test]
async fn token_is_reused_within_its_lifetime() {
	let server = MockServer::start_async().await;
	let token = mock_token(&server).await;
	let attributes = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/v1.0/attributes")
				.header("authorization", "Bearer tenant-token")
				.header("accept", "application/json");
			then.status(200).header("content-type", "application/json").body("{\"attributes\":[]}");
		})
		.await;
	let settings = test_settings(&server.base_url(), "unused");
	let client = build_test_client(&settings);
	let url = endpoint(&server, "/v1.0/attributes");

	client.get(&url, &[]).await.expect("First call should succeed.");
	client.get(&url, &[]).await.expect("Second call should succeed.");

	token.assert_calls_async(1).await;
	attributes.assert_calls_async(2).await;
	assert_eq!(client.tokens().refresh_count(), 1);
	assert!(!client.tokens().is_stale_at(OffsetDateTime::now_utc()));
}

#[tokio::test]
async fn invalidated_token_is_refreshed_once() {
	let server = MockServer::start_async().await;
	let token = mock_token(&server).await;
	let settings = test_settings(&server.base_url(), "unused");
	let client = build_test_client(&settings);

	client.warm_up().await.expect("Warm-up should obtain a token.");
	client.tokens().invalidate();

	assert!(client.tokens().is_stale_at(OffsetDateTime::now_utc()));

	let secret = client.tokens().get_token().await.expect("Refresh should succeed.");

	assert_eq!(secret.expose(), "tenant-token");
	token.assert_calls_async(2).await;
}

#[tokio::test]
async fn grant_body_without_token_type_is_accepted() {
	let server = MockServer::start_async().await;
	let token = mock_grant(&server, "{\"access_token\":\"abc\",\"expires_in\":3600}").await;
	let settings = test_settings(&server.base_url(), "unused");
	let client = build_test_client(&settings);
	let secret = client.tokens().get_token().await.expect("Minimal grant body should be accepted.");
	let cached = client.tokens().cached().expect("Grant should cache a token.");

	assert_eq!(secret.expose(), "abc");
	assert_eq!(cached.expires_at() - cached.issued_at(), Duration::seconds(3600));
	token.assert_calls_async(1).await;
}

#[tokio::test]
async fn missing_expires_in_defaults_to_one_hour() {
	let server = MockServer::start_async().await;
	let _token = mock_grant(&server, "{\"access_token\":\"abc\"}").await;
	let settings = test_settings(&server.base_url(), "unused");
	let client = build_test_client(&settings);

	client.warm_up().await.expect("Grant without expires_in should succeed.");

	let cached = client.tokens().cached().expect("Grant should cache a token.");

	assert_eq!(cached.expires_at() - cached.issued_at(), Duration::hours(1));
	assert!(!client.tokens().is_stale_at(OffsetDateTime::now_utc()));
}

#[tokio::test]
async fn tokens_inside_the_safety_margin_refresh_on_every_call() {
	let server = MockServer::start_async().await;
	let token = mock_grant(
		&server,
		"{\"access_token\":\"short-lived\",\"token_type\":\"bearer\",\"expires_in\":60}",
	)
	.await;
	let settings = test_settings(&server.base_url(), "unused");
	let client = build_test_client(&settings);

	for _ in 0..3 {
		let secret = client.tokens().get_token().await.expect("Grant should succeed.");

		assert_eq!(secret.expose(), "short-lived");
	}

	token.assert_calls_async(3).await;
	assert_eq!(client.tokens().refresh_count(), 3);
	assert!(client.tokens().is_stale_at(OffsetDateTime::now_utc()));
}

#[tokio::test]
async fn scim_requests_negotiate_scim_json() {
	let server = MockServer::start_async().await;
	let _token = mock_token(&server).await;
	let groups = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/v2.0/Groups")
				.query_param("count", "10")
				.header("accept", "application/scim+json");
			then.status(200)
				.header("content-type", "application/scim+json")
				.body("{\"totalResults\":0,\"Resources\":[]}");
		})
		.await;
	let settings = test_settings(&server.base_url(), "unused");
	let client = build_test_client(&settings);
	let body = client
		.get_scim(&endpoint(&server, "/v2.0/Groups"), &[("count", "10".into())])
		.await
		.expect("SCIM call should succeed.");

	assert_eq!(body, json!({ "totalResults": 0, "Resources": [] }));
	groups.assert_calls_async(1).await;
}

#[tokio::test]
async fn rejected_grant_is_an_authentication_error() {
	let server = MockServer::start_async().await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/v1.0/endpoint/default/token");
			then.status(401).header("content-type", "application/json").body(
				"{\"error\":\"invalid_client\",\"error_description\":\"Client authentication failed.\"}",
			);
		})
		.await;
	let settings = test_settings(&server.base_url(), "unused");
	let client = build_test_client(&settings);
	let err = client
		.get(&endpoint(&server, "/v1.0/attributes"), &[])
		.await
		.expect_err("A rejected grant must fail the call.");

	assert!(matches!(err, Error::Authentication { .. }), "Unexpected error: {err:?}.");
	assert!(err.is_fatal());
	token.assert_calls_async(1).await;
}

#[tokio::test]
async fn transient_statuses_are_retried_then_surfaced() {
	let server = MockServer::start_async().await;
	let _token = mock_token(&server).await;
	let unavailable = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1.0/attributes");
			then.status(503).body("maintenance window");
		})
		.await;
	let settings = test_settings(&server.base_url(), "unused");
	let client = build_test_client(&settings);
	let err = client
		.get(&endpoint(&server, "/v1.0/attributes"), &[])
		.await
		.expect_err("Persistent 503 must fail after retries.");

	match err {
		Error::Request { status, body_preview, .. } => {
			assert_eq!(status, 503);
			assert_eq!(body_preview.as_deref(), Some("maintenance window"));
		},
		other => panic!("Unexpected error: {other:?}."),
	}

	unavailable.assert_calls_async(1 + settings.retry.max_retries).await;
}

#[tokio::test]
async fn gated_endpoints_report_missing_entitlements() {
	let server = MockServer::start_async().await;
	let _token = mock_token(&server).await;
	let dynamic_groups = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1.0/dynamicgroups");
			then.status(401).body("unauthorized");
		})
		.await;
	let settings = test_settings(&server.base_url(), "unused");
	let client = build_test_client(&settings);
	let request = ApiRequest::get(endpoint(&server, "/v1.0/dynamicgroups"))
		.gated(Some(verify_snapshot::catalog::ABAC_GATE));
	let err = client.send(&request).await.expect_err("401 on a gated endpoint must fail.");

	match &err {
		Error::Entitlement { entitlement, status, .. } => {
			assert_eq!(*entitlement, "ABAC");
			assert_eq!(*status, 401);
		},
		other => panic!("Unexpected error: {other:?}."),
	}

	assert!(err.to_string().contains("administrator"));
	dynamic_groups.assert_calls_async(1).await;

	let ungated = client
		.send(&ApiRequest::get(endpoint(&server, "/v1.0/dynamicgroups")))
		.await
		.expect_err("Ungated 401 is a plain request error.");

	assert!(matches!(ungated, Error::Request { status: 401, .. }));
}
