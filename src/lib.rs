//! Snapshot IBM Security Verify tenant configuration through a retrying, paginating OAuth 2.0
//! client, one JSONL file per object type and environment.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod extract;
pub mod fanout;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod paginate;
pub mod record;
pub mod snapshot;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		client::ApiClient,
		config::{Credentials, Environment, RetryPolicy, Settings},
		http::ReqwestTransport,
	};

	/// Client id used by test settings.
	pub const TEST_CLIENT_ID: &str = "snapshot-client";
	/// Client secret used by test settings.
	pub const TEST_CLIENT_SECRET: &str = "snapshot-secret";

	/// Builds settings that point at `tenant_url` with instant retries and a short timeout.
	pub fn test_settings(tenant_url: &str, output_dir: impl Into<std::path::PathBuf>) -> Settings {
		let tenant = Url::parse(tenant_url).expect("Failed to parse mock tenant URL.");
		let environment = Environment::new("bidevt").expect("Test environment should be known.");

		Settings {
			environment,
			credentials: Credentials::new(tenant, TEST_CLIENT_ID, TEST_CLIENT_SECRET),
			retry: RetryPolicy::default()
				.with_backoff_factor(0.)
				.with_timeout(std::time::Duration::from_secs(5)),
			page_size: 100,
			workers: 4,
			rate_limit_delay: std::time::Duration::ZERO,
			output_dir: output_dir.into(),
		}
	}

	/// Builds an [`ApiClient`] backed by the reqwest transport for the given settings.
	pub fn build_test_client(settings: &Settings) -> Arc<ApiClient> {
		let transport =
			ReqwestTransport::new().expect("Failed to build reqwest transport for tests.");

		Arc::new(ApiClient::new(settings, Arc::new(transport)))
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap, VecDeque},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::{Map, Value};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(feature = "cli")]
use {clap as _, color_eyre as _, dotenvy as _, tracing_subscriber as _};
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _, tempfile as _};
