//! # Token State & Authentication Mode
//!
//! The client authenticates in one of three modes, selected per request:
//!
//! - **Bearer** — a JWT access token is present (after `sign_in`);
//! - **Signed** — no token, but a secret key is configured: the request
//!   is HMAC-signed (see [`crate::signer`]);
//! - **Anonymous** — neither token nor secret key: the request carries
//!   `Authorization: Anonymous {accessKey}` and relies on server-side
//!   guest permissions.
//!
//! [`TokenState`] is the small mutable core behind bearer mode. It is
//! only ever changed through [`set`](TokenState::set) /
//! [`set_from_jwt`](TokenState::set_from_jwt) / [`clear`](TokenState::clear),
//! which keeps the expiry/refresh arithmetic testable in isolation.
//!
//! A token is usable while `now < expires`, and a refresh is attempted
//! when `next_refresh > 0 && now >= next_refresh`.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use serde_json::Value;

/// Sentinel for "no timestamp recorded".
const UNSET: i64 = -1;

/// The authentication mode a request goes out with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// `Authorization: Anonymous {accessKey}`.
    Anonymous,
    /// HMAC-signed request headers (access key + secret key).
    Signed,
    /// `Authorization: Bearer {token}`.
    Bearer,
}

/// JWT access token plus the two timestamps that drive silent refresh.
///
/// Timestamps are Unix milliseconds; `-1` means unset.
#[derive(Debug, Clone)]
pub(crate) struct TokenState {
    token: Option<String>,
    expires: i64,
    next_refresh: i64,
}

impl TokenState {
    pub(crate) fn new() -> Self {
        Self {
            token: None,
            expires: UNSET,
            next_refresh: UNSET,
        }
    }

    pub(crate) fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Store a token together with its expiry and next-refresh timestamps,
    /// as delivered in the sign-in/refresh response envelope (millis).
    pub(crate) fn set(&mut self, token: String, expires: i64, next_refresh: i64) {
        self.token = Some(token);
        self.expires = expires;
        self.next_refresh = next_refresh;
    }

    /// Store a raw JWT, lifting the `exp` and `refresh` claims (seconds)
    /// out of its claims segment. Malformed tokens reset both timestamps.
    pub(crate) fn set_from_jwt(&mut self, token: &str) {
        match decode_claims(token) {
            Some((exp, refresh)) => {
                self.expires = exp.map_or(UNSET, |s| s.saturating_mul(1000));
                self.next_refresh = refresh.map_or(UNSET, |s| s.saturating_mul(1000));
            }
            None => {
                self.expires = UNSET;
                self.next_refresh = UNSET;
            }
        }
        self.token = if token.is_empty() {
            None
        } else {
            Some(token.to_string())
        };
    }

    /// Drop the token and both timestamps.
    pub(crate) fn clear(&mut self) {
        self.token = None;
        self.expires = UNSET;
        self.next_refresh = UNSET;
    }

    /// The token is expired once `now` has reached the recorded expiry.
    pub(crate) fn is_expired(&self, now_millis: i64) -> bool {
        self.expires > 0 && now_millis >= self.expires
    }

    /// A refresh is due when a token is present, still valid, and the
    /// next-refresh timestamp has passed.
    pub(crate) fn refresh_due(&self, now_millis: i64) -> bool {
        self.token.is_some()
            && !self.is_expired(now_millis)
            && self.next_refresh > 0
            && now_millis >= self.next_refresh
    }
}

/// Decode the `exp` and `refresh` claims from a JWT's claims segment.
///
/// Accepts both URL-safe (RFC 7515) and standard base64 alphabets.
fn decode_claims(token: &str) -> Option<(Option<i64>, Option<i64>)> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD.decode(payload))
        .ok()?;
    let claims: Value = serde_json::from_slice(&bytes).ok()?;
    let obj = claims.as_object()?;
    Some((
        obj.get("exp").and_then(Value::as_i64),
        obj.get("refresh").and_then(Value::as_i64),
    ))
}
