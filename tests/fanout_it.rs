// crates.io
use httpmock::{Mock, prelude::*};
use serde_json::json;
// self
use verify_snapshot::{
	_preludet::*,
	catalog::ABAC_GATE,
	error::Error,
	fanout::{ApplicationDetail, DetailFetcher, DetailOutcome, PathDetail},
};

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

fn collection(server: &MockServer, path: &str) -> Url {
	Url::parse(&server.url(path)).expect("Mock collection should parse successfully.")
}

#[tokio::test]
async fn one_missing_detail_is_a_soft_outcome() {
	let server = MockServer::start_async().await;
	let token = mock_token(&server).await;
	let mut details = Vec::new();

	for id in ["g1", "g2", "g3", "g4"] {
		let body = json!({ "id": id, "rules": [] }).to_string();

		details.push(
			server
				.mock_async(move |when, then| {
					when.method(GET).path(format!("/v1.0/dynamicgroups/{id}"));
					then.status(200).header("content-type", "application/json").body(body);
				})
				.await,
		);
	}

	let gone = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1.0/dynamicgroups/g5");
			then.status(404);
		})
		.await;
	let settings = test_settings(&server.base_url(), "unused");
	let client = build_test_client(&settings);
	let fetcher = DetailFetcher::new(client, 3);
	let op = Arc::new(PathDetail::new(collection(&server, "/v1.0/dynamicgroups")));
	let ids = (1..=5).map(|n| format!("g{n}"));
	let reports = fetcher.fetch_all(ids, op).await.expect("Fan-out should not raise.");
	let mut found = reports
		.iter()
		.filter_map(|report| match &report.outcome {
			DetailOutcome::Found(body) => Some(body["id"].as_str().unwrap_or_default().to_owned()),
			_ => None,
		})
		.collect::<Vec<_>>();

	found.sort();

	assert_eq!(reports.len(), 5);
	assert_eq!(found, ["g1", "g2", "g3", "g4"]);
	assert!(
		reports
			.iter()
			.any(|report| report.id == "g5" && matches!(report.outcome, DetailOutcome::NotFound))
	);

	for detail in &details {
		detail.assert_calls_async(1).await;
	}

	gone.assert_calls_async(1).await;
	token.assert_calls_async(1).await;
}

#[tokio::test]
async fn entitlement_gap_aborts_the_fan_out() {
	let server = MockServer::start_async().await;
	let _token = mock_token(&server).await;
	let mut denied = Vec::new();

	for n in 1..=4 {
		denied.push(
			server
				.mock_async(move |when, then| {
					when.method(GET).path(format!("/v1.0/dynamicgroups/g{n}"));
					then.status(401);
				})
				.await,
		);
	}

	let settings = test_settings(&server.base_url(), "unused");
	let client = build_test_client(&settings);
	let op = Arc::new(
		PathDetail::new(collection(&server, "/v1.0/dynamicgroups")).gated(Some(ABAC_GATE)),
	);
	let err = DetailFetcher::new(client, 2)
		.fetch_all((1..=4).map(|n| format!("g{n}")), op)
		.await
		.expect_err("Entitlement errors are fatal for the fan-out.");

	assert!(
		matches!(err, Error::Entitlement { entitlement: "ABAC", .. }),
		"Unexpected error: {err:?}."
	);
}

#[tokio::test]
async fn application_detail_backfills_failed_sub_resources() {
	let server = MockServer::start_async().await;
	let _token = mock_token(&server).await;
	let _detail = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1.0/applications/app-1");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"id\":\"app-1\",\"name\":\"Payroll\"}");
		})
		.await;
	let _entitlements = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1.0/applications/app-1/entitlements");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"entitlements\":[{\"id\":\"e1\"}]}");
		})
		.await;
	let _sso = server
		.mock_async(|when, then| {
			when.method(GET).path("/v1.0/applications/app-1/sso");
			then.status(500);
		})
		.await;
	let settings = test_settings(&server.base_url(), "unused");
	let client = build_test_client(&settings);
	let op = Arc::new(ApplicationDetail::new(collection(&server, "/v1.0/applications")));
	let reports = DetailFetcher::new(client, 1)
		.fetch_all(["app-1".to_owned()], op)
		.await
		.expect("Fan-out should not raise.");

	match &reports[..] {
		[report] => match &report.outcome {
			DetailOutcome::Found(body) => {
				assert_eq!(body["name"], json!("Payroll"));
				assert_eq!(body["entitlements"], json!([{ "id": "e1" }]));
				assert_eq!(body["sso_configuration"], json!({}));
			},
			other => panic!("Unexpected outcome: {other:?}."),
		},
		other => panic!("Unexpected reports: {other:?}."),
	}
}
