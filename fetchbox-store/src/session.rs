//! Session and credential types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Opaque proof of authentication issued by the Remote Store.
///
/// The store owns the session; everything else reads it. The token is
/// never interpreted by this workspace - only its presence and expiry
/// drive behavior (route guarding, `MissingSession` rejections).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    access_token: SmolStr,
    expires_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Creates a session from an issued token.
    pub fn new(access_token: impl Into<SmolStr>, expires_at: Option<DateTime<Utc>>) -> Self {
        Session {
            access_token: access_token.into(),
            expires_at,
        }
    }

    /// Returns the opaque access token.
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Returns when this session expires, if it expires at all.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Returns true when the session has passed its expiry.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }
}

/// Sign-in credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// Account identifier (e-mail for agency accounts).
    pub email: String,
    /// Account secret.
    pub password: String,
}

impl Credentials {
    /// Creates credentials from an email/password pair.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            email: email.into(),
            password: password.into(),
        }
    }
}
