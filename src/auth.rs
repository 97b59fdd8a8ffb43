//! One-time-code authentication sessions.
//!
//! Flow:
//! 1. Client requests a code for an identity key (email/phone) + role
//! 2. Issuance supersedes any prior session for that key, stores a new
//!    one, and hands the code to the notification sink
//! 3. Client verifies with (session id, code); success resolves or
//!    creates the user record for the key
//!
//! Security: fixed-length random numeric codes, 5-minute expiry,
//! single use, attempt ceiling, constant-time code comparison.
//! Issuance and verification are serialized per resource key — the
//! identity key and the session id respectively — because the store
//! has no transactions to lean on.

use std::sync::{Arc, PoisonError};

use chrono::{Duration, Utc};
use rand::Rng;
use subtle::ConstantTimeEq;

use crate::config::OtpConfig;
use crate::keyed_lock::KeyedLocks;
use crate::models::{IdentityKey, OtpSession, Role, User};
use crate::store::{RecordId, RecordStore, StoreError};

// ═══════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════

/// Errors from code issuance and verification.
///
/// Every variant is terminal for the session it names; the caller's
/// only recovery path for expiry/lockout is requesting a fresh code.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid session")]
    SessionNotFound,
    #[error("Code expired")]
    CodeExpired,
    #[error("Code already used")]
    CodeAlreadyUsed,
    #[error("Too many attempts")]
    TooManyAttempts,
    #[error("Invalid code")]
    InvalidCode,
    #[error("Code delivery failed: {0}")]
    Delivery(#[from] NotificationError),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        // The only store failure mode is a row vanishing between read
        // and patch — a superseded session behaves as not found.
        match err {
            StoreError::RecordNotFound(_) => AuthError::SessionNotFound,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Notification sink — external delivery collaborator
// ═══════════════════════════════════════════════════════════

/// Failure reported by the delivery collaborator.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct NotificationError(pub String);

/// Out-of-band delivery of an issued code (email, SMS, …).
///
/// The core never dictates a channel. Delivery happens after the
/// session is committed and outside any lock; a failure surfaces to
/// the caller but is never rolled back against the stored session.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, identity: &IdentityKey, code: &str) -> Result<(), NotificationError>;
}

/// Development sink: writes the code to the log instead of a channel.
pub struct LogSink;

impl NotificationSink for LogSink {
    fn deliver(&self, identity: &IdentityKey, code: &str) -> Result<(), NotificationError> {
        tracing::info!(identity = %identity, "one-time code (log delivery): {code}");
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════
// Results
// ═══════════════════════════════════════════════════════════

/// Outcome of `issue_code`.
#[derive(Debug, Clone)]
pub struct IssuedCode {
    pub session_id: RecordId,
    /// The plaintext code. Exposed to callers only so development mode
    /// can echo it; production handlers must not forward it.
    pub code: String,
    pub expires_at: chrono::DateTime<Utc>,
}

/// Outcome of a successful `verify_code`.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    pub user_id: RecordId,
    pub identity: IdentityKey,
    pub role: Role,
    /// Whether the user record was created by this verification
    /// (drives onboarding vs. normal sign-in on the client).
    pub is_new_identity: bool,
}

// ═══════════════════════════════════════════════════════════
// OtpAuthenticator
// ═══════════════════════════════════════════════════════════

/// Owns the one-time-code session lifecycle.
pub struct OtpAuthenticator {
    store: Arc<RecordStore>,
    locks: KeyedLocks,
    sink: Arc<dyn NotificationSink>,
    config: OtpConfig,
}

impl OtpAuthenticator {
    pub fn new(store: Arc<RecordStore>, config: OtpConfig, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
            sink,
            config,
        }
    }

    /// Issue a fresh code for an identity key.
    ///
    /// Supersession: all prior sessions for the key are deleted first,
    /// so a retried client or an attacker can never accumulate multiple
    /// guessable codes. The delete+insert is serialized on the identity
    /// key.
    pub fn issue_code(&self, identity: &IdentityKey, role: Role) -> Result<IssuedCode, AuthError> {
        // Generate before taking the lock; nothing external happens
        // inside the critical section.
        let code = generate_code(self.config.code_length);
        let now = Utc::now();
        let expires_at = now + Duration::seconds(self.config.ttl_secs);

        let session_id = {
            let cell = self.locks.acquire(&identity_lock_key(identity));
            let _guard = cell.lock().unwrap_or_else(PoisonError::into_inner);

            let stale = self
                .store
                .otp_sessions
                .find(|s| s.identity == *identity);
            for (stale_id, _) in &stale {
                self.store.otp_sessions.delete(*stale_id);
            }
            if !stale.is_empty() {
                tracing::debug!(identity = %identity, count = stale.len(), "superseded prior sessions");
            }

            self.store.otp_sessions.insert(OtpSession {
                identity: identity.clone(),
                code: code.clone(),
                issued_at: now,
                expires_at,
                verified: false,
                attempts: 0,
                role,
            })
        };

        // Delivery happens fully outside the lock. A failure surfaces,
        // but the committed session stays — the caller re-issues.
        if let Err(err) = self.sink.deliver(identity, &code) {
            tracing::error!(identity = %identity, "code delivery failed: {err}");
            return Err(AuthError::Delivery(err));
        }

        tracing::info!(identity = %identity, session = %session_id, "one-time code issued");
        Ok(IssuedCode {
            session_id,
            code,
            expires_at,
        })
    }

    /// Verify a supplied code against a session.
    ///
    /// The guard ladder runs in strict order and fails fast: existence,
    /// expiry, replay, lockout. The attempt is recorded *before* the
    /// code comparison so a crash mid-verification still counts against
    /// the budget. On success the session flips to verified (single
    /// use) and the user record for the key is resolved or created.
    pub fn verify_code(
        &self,
        session_id: RecordId,
        supplied_code: &str,
    ) -> Result<VerifiedIdentity, AuthError> {
        let session = {
            let cell = self.locks.acquire(&session_lock_key(session_id));
            let _guard = cell.lock().unwrap_or_else(PoisonError::into_inner);

            let session = self
                .store
                .otp_sessions
                .get(session_id)
                .ok_or(AuthError::SessionNotFound)?;

            if session.is_expired(Utc::now()) {
                return Err(AuthError::CodeExpired);
            }
            if session.verified {
                return Err(AuthError::CodeAlreadyUsed);
            }
            if session.attempts >= self.config.max_attempts {
                return Err(AuthError::TooManyAttempts);
            }

            // Count the attempt before comparing.
            self.store
                .otp_sessions
                .patch(session_id, |s| s.attempts += 1)?;

            let matches: bool = supplied_code
                .as_bytes()
                .ct_eq(session.code.as_bytes())
                .into();
            if !matches {
                tracing::warn!(session = %session_id, "code mismatch");
                return Err(AuthError::InvalidCode);
            }

            self.store
                .otp_sessions
                .patch(session_id, |s| s.verified = true)?;
            session
        };

        // Resolve or create the user for the session's identity key,
        // serialized on the key so only one record can ever exist.
        let identity = session.identity.clone();
        let (user_id, is_new_identity) = {
            let cell = self.locks.acquire(&identity_lock_key(&identity));
            let _guard = cell.lock().unwrap_or_else(PoisonError::into_inner);

            match self.store.users.find_one(|u| u.identity == identity) {
                Some((user_id, _)) => {
                    self.store
                        .users
                        .patch(user_id, |u| u.role = session.role)
                        .map_err(|_| AuthError::SessionNotFound)?;
                    (user_id, false)
                }
                None => {
                    let user_id = self.store.users.insert(User {
                        identity: identity.clone(),
                        name: None,
                        role: session.role,
                        created_at: Utc::now(),
                    });
                    (user_id, true)
                }
            }
        };

        tracing::info!(identity = %identity, user = %user_id, new = is_new_identity, "identity verified");
        Ok(VerifiedIdentity {
            user_id,
            identity,
            role: session.role,
            is_new_identity,
        })
    }

    /// The identity key a session was issued for, if the session still
    /// exists. Used by the HTTP layer to cross-check the request key.
    pub fn session_identity(&self, session_id: RecordId) -> Option<IdentityKey> {
        self.store.otp_sessions.get(session_id).map(|s| s.identity)
    }
}

/// Fixed-length random numeric code.
fn generate_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

fn identity_lock_key(identity: &IdentityKey) -> String {
    format!("otp:{identity}")
}

fn session_lock_key(session_id: RecordId) -> String {
    format!("otp-session:{session_id}")
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSink;

    impl NotificationSink for FailingSink {
        fn deliver(&self, _identity: &IdentityKey, _code: &str) -> Result<(), NotificationError> {
            Err(NotificationError("smtp unreachable".into()))
        }
    }

    fn authenticator() -> (Arc<RecordStore>, OtpAuthenticator) {
        let store = Arc::new(RecordStore::new());
        let auth = OtpAuthenticator::new(store.clone(), OtpConfig::default(), Arc::new(LogSink));
        (store, auth)
    }

    fn authenticator_with(config: OtpConfig) -> (Arc<RecordStore>, OtpAuthenticator) {
        let store = Arc::new(RecordStore::new());
        let auth = OtpAuthenticator::new(store.clone(), config, Arc::new(LogSink));
        (store, auth)
    }

    fn key(raw: &str) -> IdentityKey {
        IdentityKey::parse(raw).unwrap()
    }

    #[test]
    fn issued_code_has_configured_length_and_is_numeric() {
        let (_, auth) = authenticator();
        let issued = auth.issue_code(&key("doc@example.com"), Role::Doctor).unwrap();
        assert_eq!(issued.code.len(), 6);
        assert!(issued.code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn verify_succeeds_and_creates_user() {
        let (store, auth) = authenticator();
        let identity = key("doc@example.com");
        let issued = auth.issue_code(&identity, Role::Doctor).unwrap();

        let verified = auth.verify_code(issued.session_id, &issued.code).unwrap();
        assert!(verified.is_new_identity);
        assert_eq!(verified.role, Role::Doctor);
        assert_eq!(verified.identity, identity);
        assert_eq!(store.users.len(), 1);
    }

    #[test]
    fn second_sign_in_reuses_user_and_updates_role() {
        let (store, auth) = authenticator();
        let identity = key("doc@example.com");

        let first = auth.issue_code(&identity, Role::Doctor).unwrap();
        let v1 = auth.verify_code(first.session_id, &first.code).unwrap();

        let second = auth.issue_code(&identity, Role::Admin).unwrap();
        let v2 = auth.verify_code(second.session_id, &second.code).unwrap();

        assert!(!v2.is_new_identity);
        assert_eq!(v2.user_id, v1.user_id);
        assert_eq!(store.users.len(), 1);
        assert_eq!(store.users.get(v2.user_id).unwrap().role, Role::Admin);
    }

    #[test]
    fn issuing_twice_supersedes_older_session() {
        let (store, auth) = authenticator();
        let identity = key("doc@example.com");

        let old = auth.issue_code(&identity, Role::Doctor).unwrap();
        let new = auth.issue_code(&identity, Role::Doctor).unwrap();

        // Exactly one live session remains.
        assert_eq!(store.otp_sessions.len(), 1);

        // The superseded id no longer verifies.
        let result = auth.verify_code(old.session_id, &old.code);
        assert!(matches!(result, Err(AuthError::SessionNotFound)));

        // The fresh one does.
        assert!(auth.verify_code(new.session_id, &new.code).is_ok());
    }

    #[test]
    fn replay_of_verified_session_is_rejected() {
        let (_, auth) = authenticator();
        let issued = auth.issue_code(&key("doc@example.com"), Role::Doctor).unwrap();

        auth.verify_code(issued.session_id, &issued.code).unwrap();

        let replay = auth.verify_code(issued.session_id, &issued.code);
        assert!(matches!(replay, Err(AuthError::CodeAlreadyUsed)));
    }

    #[test]
    fn wrong_code_is_rejected_and_counted() {
        let (store, auth) = authenticator();
        let issued = auth.issue_code(&key("doc@example.com"), Role::Doctor).unwrap();

        let result = auth.verify_code(issued.session_id, "000000x");
        assert!(matches!(result, Err(AuthError::InvalidCode)));
        assert_eq!(store.otp_sessions.get(issued.session_id).unwrap().attempts, 1);
    }

    #[test]
    fn attempt_ceiling_locks_out_even_the_correct_code() {
        let (_, auth) = authenticator();
        let issued = auth.issue_code(&key("doc@example.com"), Role::Doctor).unwrap();

        // A wrong guess that can never equal a numeric code.
        for _ in 0..5 {
            let result = auth.verify_code(issued.session_id, "wrong!");
            assert!(matches!(result, Err(AuthError::InvalidCode)));
        }

        let sixth = auth.verify_code(issued.session_id, &issued.code);
        assert!(matches!(sixth, Err(AuthError::TooManyAttempts)));
    }

    #[test]
    fn expired_session_fails_regardless_of_code() {
        let config = OtpConfig {
            ttl_secs: -60, // already expired at issuance
            ..OtpConfig::default()
        };
        let (_, auth) = authenticator_with(config);
        let issued = auth.issue_code(&key("doc@example.com"), Role::Doctor).unwrap();

        let result = auth.verify_code(issued.session_id, &issued.code);
        assert!(matches!(result, Err(AuthError::CodeExpired)));
    }

    #[test]
    fn unknown_session_id_fails() {
        let (_, auth) = authenticator();
        let result = auth.verify_code(RecordId::new(), "123456");
        assert!(matches!(result, Err(AuthError::SessionNotFound)));
    }

    #[test]
    fn delivery_failure_surfaces_but_session_is_kept() {
        let store = Arc::new(RecordStore::new());
        let auth =
            OtpAuthenticator::new(store.clone(), OtpConfig::default(), Arc::new(FailingSink));
        let identity = key("doc@example.com");

        let result = auth.issue_code(&identity, Role::Doctor);
        assert!(matches!(result, Err(AuthError::Delivery(_))));

        // Committed state is not rolled back.
        assert_eq!(store.otp_sessions.len(), 1);
    }

    #[test]
    fn session_identity_reports_stored_key() {
        let (_, auth) = authenticator();
        let identity = key("doc@example.com");
        let issued = auth.issue_code(&identity, Role::Doctor).unwrap();
        assert_eq!(auth.session_identity(issued.session_id), Some(identity));
        assert_eq!(auth.session_identity(RecordId::new()), None);
    }
}
