//! Identity keys and the users they resolve to.

use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::Role;

/// Errors from identity-key validation.
#[derive(Debug, thiserror::Error)]
pub enum IdentityKeyError {
    #[error("Identity key must be an email address or a phone number")]
    Invalid,
}

/// The value a one-time code proves control of: an email address or a
/// phone number, normalized at construction.
///
/// OTP sessions are correlated by this key, and the authenticated user
/// record is resolved or created from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityKey(String);

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static regex"))
}

fn phone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+?[0-9]{7,15}$").expect("static regex"))
}

impl IdentityKey {
    /// Validate and normalize a raw identity key.
    ///
    /// Emails are lowercased; phone numbers keep a leading `+` and
    /// digits only. Anything else is rejected before any state is
    /// touched.
    pub fn parse(raw: &str) -> Result<Self, IdentityKeyError> {
        let trimmed = raw.trim();
        if email_re().is_match(trimmed) {
            return Ok(Self(trimmed.to_ascii_lowercase()));
        }
        let compact: String = trimmed
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
            .collect();
        if phone_re().is_match(&compact) {
            return Ok(Self(compact));
        }
        Err(IdentityKeyError::Invalid)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An authenticated practice member (doctor, caregiver, specialist, or
/// admin). Created the first time an identity key verifies a code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub identity: IdentityKey,
    pub name: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}
