//! Token lifecycle owner for one API client.
//!
//! [`TokenManager::get_token`] refreshes only when no token is cached or the cached one has
//! entered its [`AccessToken::SAFETY_MARGIN`]. There is no singleflight guard: concurrent
//! callers that race on a stale token may each perform a grant. Callers that fan out call
//! [`TokenManager::get_token`] once, serially, before spawning workers.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, Secret},
	config::Credentials,
	http::ResilientTransport,
	oauth,
	obs::{self, OpKind},
};

/// Owns the cached [`AccessToken`] and its refresh policy.
pub struct TokenManager {
	credentials: Credentials,
	transport: Arc<ResilientTransport>,
	current: RwLock<Option<AccessToken>>,
	refreshes: AtomicU64,
}
impl TokenManager {
	/// Creates a manager with no cached token.
	pub fn new(credentials: Credentials, transport: Arc<ResilientTransport>) -> Self {
		Self { credentials, transport, current: RwLock::new(None), refreshes: AtomicU64::new(0) }
	}

	/// Returns a fresh bearer value, refreshing first when the cached token is absent or stale.
	pub async fn get_token(&self) -> Result<Secret> {
		let now = OffsetDateTime::now_utc();
		let cached = self
			.current
			.read()
			.as_ref()
			.filter(|token| !token.is_stale_at(now))
			.map(|token| token.secret().clone());

		if let Some(secret) = cached {
			return Ok(secret);
		}

		self.refresh().await
	}

	/// Performs a grant unconditionally and replaces the cached token.
	pub async fn refresh(&self) -> Result<Secret> {
		let token = obs::observe(OpKind::TokenRefresh, "refresh", async {
			tracing::info!(client_id = %self.credentials.client_id, "Obtaining new access token.");

			let token = oauth::exchange_client_credentials(&self.credentials, &self.transport)
				.await
				.inspect_err(|err| {
					tracing::error!(error = %err, "Failed to obtain access token.");
				})?;

			tracing::info!(expires_at = %token.expires_at(), "Access token obtained.");

			Ok(token)
		})
		.await?;
		let secret = token.secret().clone();

		self.refreshes.fetch_add(1, Ordering::Relaxed);
		*self.current.write() = Some(token);

		Ok(secret)
	}

	/// Returns `true` when the next [`TokenManager::get_token`] call at `now` would refresh.
	pub fn is_stale_at(&self, now: OffsetDateTime) -> bool {
		self.current.read().as_ref().is_none_or(|token| token.is_stale_at(now))
	}

	/// Snapshot of the cached token, if any.
	pub fn cached(&self) -> Option<AccessToken> {
		self.current.read().clone()
	}

	/// Drops the cached token so the next call refreshes.
	pub fn invalidate(&self) {
		*self.current.write() = None;
	}

	/// Number of successful grants performed by this manager.
	pub fn refresh_count(&self) -> u64 {
		self.refreshes.load(Ordering::Relaxed)
	}

	/// Credentials used for grants.
	pub fn credentials(&self) -> &Credentials {
		&self.credentials
	}
}
impl Debug for TokenManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManager")
			.field("client_id", &self.credentials.client_id)
			.field("token_cached", &self.current.read().is_some())
			.field("refreshes", &self.refresh_count())
			.finish()
	}
}
