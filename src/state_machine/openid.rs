//! OpenID token lifecycle types (spec §3.3, §6.3, §6.6).

use std::time::{Duration, Instant};

use crate::time::Clock;

/// The credential shape returned to a widget's `get_openid` request once
/// allowed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenIdCredentials {
    pub access_token: String,
    pub expires_in_seconds: u64,
    pub homeserver: String,
    /// Defaults to `"Bearer"` (spec §6.6).
    pub token_type: String,
}

impl OpenIdCredentials {
    pub fn new(access_token: impl Into<String>, expires_in_seconds: u64, homeserver: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_in_seconds,
            homeserver: homeserver.into(),
            token_type: "Bearer".to_owned(),
        }
    }
}

/// A cached credential plus when it was acquired, so expiry can be checked
/// against an injectable clock (spec §3.3).
#[derive(Clone, Debug)]
pub struct OpenIdState {
    pub credentials: OpenIdCredentials,
    pub acquired_at: Instant,
}

impl OpenIdState {
    pub fn new(credentials: OpenIdCredentials, acquired_at: Instant) -> Self {
        Self { credentials, acquired_at }
    }

    pub fn is_expired(&self, clock: &dyn Clock) -> bool {
        clock.now().saturating_duration_since(self.acquired_at)
            >= Duration::from_secs(self.credentials.expires_in_seconds)
    }
}

/// The client's (or user's) decision on an outstanding `get_openid` request,
/// fed back into [`crate::state_machine::StateMachine::process_capability_approval`].
#[derive(Clone, Debug)]
pub enum OpenIdDecision {
    Allowed(OpenIdCredentials),
    Blocked,
}
