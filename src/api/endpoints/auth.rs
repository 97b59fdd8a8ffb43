//! Authentication endpoints for the one-time-code sign-in flow.
//!
//! `POST /api/auth/send-otp` — Unprotected: request a code for an
//! identity key.
//! `POST /api/auth/verify-otp` — Unprotected: exchange (session, code)
//! for a bearer token.

use std::sync::PoisonError;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext};
use crate::auth::AuthError;
use crate::models::{IdentityKey, Role};
use crate::store::RecordId;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOtpRequest {
    pub identity_key: String,
    pub role: Role,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOtpResponse {
    pub success: bool,
    pub session_id: RecordId,
    /// Seconds until the code stops verifying.
    pub expires_in: i64,
    pub message: &'static str,
    /// Echoed only when the service runs with dev echo enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub development_code: Option<String>,
}

/// `POST /api/auth/send-otp` — issue a fresh code for an identity key.
///
/// Any prior session for the key is superseded. The code travels via
/// the notification sink; development mode may also echo it here.
pub async fn send_otp(
    State(ctx): State<ApiContext>,
    Json(request): Json<SendOtpRequest>,
) -> Result<Json<SendOtpResponse>, ApiError> {
    let identity = IdentityKey::parse(&request.identity_key)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let issued = ctx.core.authenticator.issue_code(&identity, request.role)?;

    let development_code = ctx
        .core
        .config
        .dev_echo_code
        .then_some(issued.code.clone());

    Ok(Json(SendOtpResponse {
        success: true,
        session_id: issued.session_id,
        expires_in: ctx.core.config.otp.ttl_secs,
        message: "Verification code sent",
        development_code,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpRequest {
    pub identity_key: String,
    pub code: String,
    pub session_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpResponse {
    pub success: bool,
    /// False when this verification created the user record.
    pub user_exists: bool,
    pub user_id: RecordId,
    pub role: Role,
    /// Client navigation hint: onboarding for first sign-in.
    pub redirect_to: &'static str,
    /// Bearer token for the protected API surface.
    pub token: String,
}

/// `POST /api/auth/verify-otp` — verify a code and mint a bearer token.
///
/// The request's identity key must match the key the session was
/// issued for; a mismatch is indistinguishable from an unknown session.
pub async fn verify_otp(
    State(ctx): State<ApiContext>,
    Json(request): Json<VerifyOtpRequest>,
) -> Result<Json<VerifyOtpResponse>, ApiError> {
    let identity = IdentityKey::parse(&request.identity_key)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let session_id: RecordId = request
        .session_id
        .parse()
        .map_err(|_| ApiError::from(AuthError::SessionNotFound))?;

    match ctx.core.authenticator.session_identity(session_id) {
        Some(stored) if stored == identity => {}
        _ => return Err(AuthError::SessionNotFound.into()),
    }

    let verified = ctx.core.authenticator.verify_code(session_id, &request.code)?;

    let token = ctx
        .tokens
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .issue(AuthContext {
            user_id: verified.user_id,
            identity: verified.identity,
            role: verified.role,
        });

    let redirect_to = if verified.is_new_identity {
        "/onboarding"
    } else {
        "/dashboard"
    };

    Ok(Json(VerifyOtpResponse {
        success: true,
        user_exists: !verified.is_new_identity,
        user_id: verified.user_id,
        role: verified.role,
        redirect_to,
        token,
    }))
}
