//! Credential value type.

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

/// An access/refresh token pair with its expiry.
///
/// Credentials are never mutated in place; a refresh produces a new value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    access_token: String,
    refresh_token: String,
    expires_at: SystemTime,
}

impl Credential {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: SystemTime,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at,
        }
    }

    /// Build a credential that expires `ttl` from now.
    ///
    /// # Panics
    /// If `ttl` overflows the system clock. Use `checked_expiring_in` for untrusted lifetimes.
    pub fn expiring_in(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self::new(access_token, refresh_token, SystemTime::now() + ttl)
    }

    /// Like `expiring_in`, but `None` when `ttl` overflows the system clock.
    pub fn checked_expiring_in(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        ttl: Duration,
    ) -> Option<Self> {
        let expires_at = SystemTime::now().checked_add(ttl)?;
        Some(Self::new(access_token, refresh_token, expires_at))
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    pub fn expires_at(&self) -> SystemTime {
        self.expires_at
    }

    /// Whether the credential should be refreshed, refreshing `skew` before expiry.
    pub fn requires_refresh(&self, skew: Duration) -> bool {
        self.requires_refresh_at(SystemTime::now(), skew)
    }

    /// `now + skew >= expires_at`.
    pub fn requires_refresh_at(&self, now: SystemTime, skew: Duration) -> bool {
        match now.checked_add(skew) {
            Some(deadline) => deadline >= self.expires_at,
            None => true,
        }
    }

    /// Time left until expiry, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.expires_at
            .duration_since(SystemTime::now())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
