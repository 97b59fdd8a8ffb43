//! Shared types for the HTTP API layer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::core_state::CoreState;
use crate::models::{IdentityKey, Role};
use crate::store::RecordId;

/// Bare acknowledgement body for mutations with nothing else to say.
#[derive(Serialize)]
pub struct AckResponse {
    pub success: bool,
}

// ═══════════════════════════════════════════════════════════
// API context — shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
/// Wraps `CoreState` plus the bearer-token registry.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
    pub tokens: Arc<Mutex<TokenRegistry>>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self {
            core,
            tokens: Arc::new(Mutex::new(TokenRegistry::new())),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Auth context — injected by auth middleware
// ═══════════════════════════════════════════════════════════

/// Authenticated caller, injected into request extensions by the auth
/// middleware after token validation. Handlers take the staff identity
/// from here, never from request bodies.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: RecordId,
    pub identity: IdentityKey,
    pub role: Role,
}

// ═══════════════════════════════════════════════════════════
// Token registry
// ═══════════════════════════════════════════════════════════

/// Bearer tokens issued at verify time, stored as SHA-256 hashes.
/// The plaintext token lives only in the verify response.
pub struct TokenRegistry {
    entries: HashMap<[u8; 32], AuthContext>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Mint a token for a verified caller. Returns the plaintext token.
    pub fn issue(&mut self, context: AuthContext) -> String {
        let token = generate_token();
        self.entries.insert(hash_token(&token), context);
        token
    }

    /// Resolve a presented token to its caller.
    pub fn resolve(&self, token: &str) -> Option<AuthContext> {
        self.entries.get(&hash_token(token)).cloned()
    }

    /// Drop every token for a user (sign-out everywhere).
    pub fn revoke_user(&mut self, user_id: RecordId) {
        self.entries.retain(|_, ctx| ctx.user_id != user_id);
    }
}

impl Default for TokenRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve a token through the registry's mutex.
pub fn resolve_token(tokens: &Mutex<TokenRegistry>, token: &str) -> Option<AuthContext> {
    tokens
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .resolve(token)
}

/// Hash a bearer token string using SHA-256.
pub fn hash_token(token: &str) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().into()
}

/// Generate a random bearer token (URL-safe base64, 32 bytes of entropy).
pub fn generate_token() -> String {
    use base64::Engine;
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}
