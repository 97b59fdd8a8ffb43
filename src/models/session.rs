//! One-time-code authentication sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{IdentityKey, Role};

/// A single one-time-code session.
///
/// At most one live (unexpired, unverified) session exists per identity
/// key at issuance time — issuing a new code deletes prior sessions for
/// the key. Once `verified` flips to true the session never
/// authenticates again; it is kept as an audit trace rather than
/// deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpSession {
    pub identity: IdentityKey,
    /// Fixed-length numeric code, stored as the string that was issued.
    pub code: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub verified: bool,
    /// Verification attempts recorded so far. Incremented *before* the
    /// code comparison so a crash mid-verification still counts.
    pub attempts: u32,
    /// Role requested at issuance; applied to the user on success.
    pub role: Role,
}

impl OtpSession {
    /// Whether the session has passed its expiry instant.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
