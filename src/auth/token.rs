//! Access token value and its staleness rules.

// self
use crate::{_prelude::*, auth::Secret};

/// Access token issued by the tenant's client-credentials grant.
///
/// Replaced wholesale on refresh; only [`AccessToken::secret`] is ever handed out.
#[derive(Clone)]
pub struct AccessToken {
	secret: Secret,
	issued_at: OffsetDateTime,
	expires_at: OffsetDateTime,
}
impl AccessToken {
	/// Tokens are treated as stale this long before their real expiry.
	pub const SAFETY_MARGIN: Duration = Duration::seconds(60);
	/// Lifetime assumed when the grant response omits `expires_in`.
	pub const DEFAULT_LIFETIME: Duration = Duration::seconds(3600);

	/// Builds a token issued at `issued_at` that lives for `lifetime`.
	pub fn new(secret: impl Into<Secret>, issued_at: OffsetDateTime, lifetime: Duration) -> Self {
		let lifetime = if lifetime.is_negative() { Duration::ZERO } else { lifetime };

		Self { secret: secret.into(), issued_at, expires_at: issued_at + lifetime }
	}

	/// Bearer value for the `Authorization` header.
	pub fn secret(&self) -> &Secret {
		&self.secret
	}

	/// Instant the grant completed.
	pub fn issued_at(&self) -> OffsetDateTime {
		self.issued_at
	}

	/// Expiry reported by the tenant.
	pub fn expires_at(&self) -> OffsetDateTime {
		self.expires_at
	}

	/// Instant after which the token must be refreshed.
	pub fn refresh_at(&self) -> OffsetDateTime {
		self.expires_at - Self::SAFETY_MARGIN
	}

	/// Returns `true` once `now` has reached the safety margin before expiry.
	pub fn is_stale_at(&self, now: OffsetDateTime) -> bool {
		now >= self.refresh_at()
	}
}
impl Debug for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AccessToken")
			.field("secret", &"<redacted>")
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn staleness_honours_safety_margin() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let token = AccessToken::new("access", issued, Duration::hours(1));

		assert_eq!(token.refresh_at(), macros::datetime!(2025-01-01 00:59 UTC));
		assert!(!token.is_stale_at(macros::datetime!(2025-01-01 00:58:59 UTC)));
		assert!(token.is_stale_at(macros::datetime!(2025-01-01 00:59 UTC)));
		assert!(token.is_stale_at(macros::datetime!(2025-01-01 01:30 UTC)));
	}

	#[test]
	fn short_lived_tokens_are_immediately_stale() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let token = AccessToken::new("access", issued, Duration::seconds(30));

		assert!(token.is_stale_at(issued));
		assert!(format!("{token:?}").contains("<redacted>"));
	}
}
