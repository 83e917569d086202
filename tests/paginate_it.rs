// crates.io
use httpmock::{Mock, prelude::*};
use serde_json::json;
// self
use verify_snapshot::{
	_preludet::*,
	catalog::ABAC_GATE,
	client::ApiRequest,
	error::Error,
	paginate::{ItemsShape, OffsetLimit, PageFamily, Paginator, ScimIndex},
};

const APPLICATIONS: ItemsShape = ItemsShape::keys(&["_embedded.applications", "applications"]);

async fn mock_token(server: &MockServer) -> Mock<'_> {
	server
		.mock_async(|when, then| {
			when.method(POST).path("/v1.0/endpoint/default/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"tenant-token\",\"token_type\":\"bearer\",\"expires_in\":7200}",
			);
		})
		.await
}

fn applications(range: std::ops::Range<usize>) -> Value {
	range
		.map(|n| {
			json!({
				"name": format!("app-{n}"),
				"_links": { "self": { "href": format!("/v1.0/applications/{n}") } },
			})
		})
		.collect()
}

async fn mock_application_page(
	server: &MockServer,
	offset: usize,
	items: std::ops::Range<usize>,
) -> Mock<'_> {
	let body = json!({ "_embedded": { "applications": applications(items) }, "total": 250 });

	server
		.mock_async(move |when, then| {
			when.method(GET)
				.path("/v1.0/applications")
				.query_param("limit", "100")
				.query_param("offset", offset.to_string());
			then.status(200).header("content-type", "application/json").body(body.to_string());
		})
		.await
}

fn request(server: &MockServer, path: &str) -> ApiRequest {
	ApiRequest::get(Url::parse(&server.url(path)).expect("Mock endpoint should parse successfully."))
}

#[tokio::test]
async fn offset_limit_fetches_each_offset_once() {
	let server = MockServer::start_async().await;
	let token = mock_token(&server).await;
	let pages = [
		mock_application_page(&server, 0, 0..100).await,
		mock_application_page(&server, 100, 100..200).await,
		mock_application_page(&server, 200, 200..250).await,
	];
	let settings = test_settings(&server.base_url(), "unused");
	let client = build_test_client(&settings);
	let mut paginator = Paginator::new(
		&client,
		request(&server, "/v1.0/applications"),
		Box::new(OffsetLimit::new(100)),
		APPLICATIONS,
	);
	let mut names = Vec::new();

	while let Some(item) = paginator.next().await.expect("Traversal should succeed.") {
		names.push(item["name"].as_str().expect("Fixture items carry a name.").to_owned());
	}

	assert_eq!(names.len(), 250);
	assert_eq!(names.first().map(String::as_str), Some("app-0"));
	assert_eq!(names.last().map(String::as_str), Some("app-249"));
	assert_eq!(paginator.stats().pages, 3);
	assert_eq!(paginator.stats().reported_total, Some(250));
	assert!(paginator.interruption().is_none());

	for page in &pages {
		page.assert_calls_async(1).await;
	}

	token.assert_calls_async(1).await;
}

#[tokio::test]
async fn scim_stops_after_a_single_covering_page() {
	let server = MockServer::start_async().await;
	let _token = mock_token(&server).await;
	let resources = (1..=5).map(|n| json!({ "id": format!("g{n}") })).collect::<Vec<_>>();
	let body =
		json!({ "totalResults": 5, "itemsPerPage": 5, "startIndex": 1, "Resources": resources });
	let groups = server
		.mock_async(move |when, then| {
			when.method(GET)
				.path("/v2.0/Groups")
				.query_param("count", "100")
				.query_param("startIndex", "1")
				.header("accept", "application/scim+json");
			then.status(200).header("content-type", "application/scim+json").body(body.to_string());
		})
		.await;
	let settings = test_settings(&server.base_url(), "unused");
	let client = build_test_client(&settings);
	let items = Paginator::new(
		&client,
		request(&server, "/v2.0/Groups").scim(),
		Box::new(ScimIndex::new(100)),
		ItemsShape::keys(&["Resources", "groups", "Groups"]),
	)
	.collect_all()
	.await
	.expect("SCIM traversal should succeed.");

	assert_eq!(items.len(), 5);
	groups.assert_calls_async(1).await;
}

#[tokio::test]
async fn later_page_failure_ends_the_sequence_early() {
	let server = MockServer::start_async().await;
	let _token = mock_token(&server).await;
	let first = mock_application_page(&server, 0, 0..100).await;
	let broken = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1.0/applications").query_param("offset", "100");
			then.status(400).body("bad offset");
		})
		.await;
	let settings = test_settings(&server.base_url(), "unused");
	let client = build_test_client(&settings);
	let mut paginator = Paginator::new(
		&client,
		request(&server, "/v1.0/applications"),
		PageFamily::OffsetLimit.strategy(100),
		APPLICATIONS,
	);
	let mut count = 0;

	while paginator.next().await.expect("Later page failures are not raised.").is_some() {
		count += 1;
	}

	assert_eq!(count, 100);
	assert!(matches!(paginator.interruption(), Some(Error::Request { status: 400, .. })));
	first.assert_calls_async(1).await;
	broken.assert_calls_async(1).await;
}

#[tokio::test]
async fn first_page_failures_and_entitlement_gaps_propagate() {
	let server = MockServer::start_async().await;
	let _token = mock_token(&server).await;
	let _missing = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1.0/attributes");
			then.status(404);
		})
		.await;
	let _gated = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1.0/dynamicgroups");
			then.status(401);
		})
		.await;
	let settings = test_settings(&server.base_url(), "unused");
	let client = build_test_client(&settings);
	let err = Paginator::new(
		&client,
		request(&server, "/v1.0/attributes"),
		PageFamily::OffsetLimit.strategy(100),
		ItemsShape::keys(&["attributes"]),
	)
	.collect_all()
	.await
	.expect_err("A failing first page has no partial result.");

	assert!(err.is_not_found());

	let err = Paginator::new(
		&client,
		request(&server, "/v1.0/dynamicgroups").gated(Some(ABAC_GATE)),
		PageFamily::OffsetLimit.strategy(100),
		ItemsShape::keys(&["dynamicGroups", "groups"]).or_bare(),
	)
	.collect_all()
	.await
	.expect_err("Entitlement gaps must propagate.");

	assert!(matches!(err, Error::Entitlement { status: 401, .. }));
}

#[tokio::test]
async fn unexpected_envelopes_fail_closed() {
	let server = MockServer::start_async().await;
	let _token = mock_token(&server).await;
	let _functions = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1.0/attributefunctions");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"results\":[{\"id\":\"f1\"}]}");
		})
		.await;
	let settings = test_settings(&server.base_url(), "unused");
	let client = build_test_client(&settings);
	let err = Paginator::new(
		&client,
		request(&server, "/v1.0/attributefunctions"),
		PageFamily::SingleShot.strategy(100),
		ItemsShape::keys(&["attributeFunctions", "functions"]).or_bare(),
	)
	.collect_all()
	.await
	.expect_err("Unknown envelopes must not decode as empty.");

	assert!(matches!(err, Error::Decode(_)), "Unexpected error: {err:?}.");
}
