//! API router.
//!
//! Returns a composable `Router` that can be mounted on any axum
//! server. Routes are nested under `/api/`.
//!
//! Two route groups:
//! - public: the one-time-code sign-in flow, CORS-enabled
//! - protected: scheduling and capacity, behind bearer-token auth

use std::sync::Arc;

use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the API router.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost
/// layer). Endpoint handlers use `State<ApiContext>` via `with_state`.
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

/// Build router from a pre-constructed `ApiContext`.
///
/// Used by integration tests that need the shared context (e.g. to
/// mint tokens directly).
#[cfg(test)]
pub(crate) fn api_router_with_ctx(ctx: ApiContext) -> Router {
    build_router(ctx)
}

fn build_router(ctx: ApiContext) -> Router {
    // Protected routes. Extension must be outermost so the auth
    // middleware can extract ApiContext.
    let protected = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/schedule/occupancy", get(endpoints::schedule::occupancy))
        .route("/schedule/stats", get(endpoints::schedule::roster_stats))
        .route(
            "/schedule/caregivers/:id/availability",
            get(endpoints::schedule::caregiver_availability),
        )
        .route(
            "/schedule/caregivers/:id/history",
            get(endpoints::schedule::caregiver_history),
        )
        .route("/schedule/bookings", post(endpoints::schedule::create_booking))
        .route(
            "/schedule/bookings/:id/cancel",
            post(endpoints::schedule::cancel_booking),
        )
        .route(
            "/schedule/bookings/:id/status",
            post(endpoints::schedule::set_booking_status),
        )
        .route(
            "/capacity/specialists",
            get(endpoints::capacity::list_specialists),
        )
        .route(
            "/capacity/specialists/:id/assignments",
            get(endpoints::capacity::list_assignments),
        )
        .route(
            "/capacity/assignments",
            post(endpoints::capacity::create_assignment),
        )
        .route(
            "/capacity/assignments/:id/status",
            post(endpoints::capacity::set_assignment_status),
        )
        .route(
            "/capacity/assignments/:id/plan",
            post(endpoints::capacity::set_plan),
        )
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        .layer(axum::Extension(ctx.clone()));

    // Browser clients hit the sign-in routes cross-origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let public = Router::new()
        .route("/auth/send-otp", post(endpoints::auth::send_otp))
        .route("/auth/verify-otp", post(endpoints::auth::verify_otp))
        .with_state(ctx.clone())
        .layer(cors)
        .layer(axum::Extension(ctx));

    Router::new().nest("/api", protected).nest("/api", public)
}
