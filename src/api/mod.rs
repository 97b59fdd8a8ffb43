//! HTTP API layer.
//!
//! Exposes the core services as REST endpoints under `/api/`. The
//! sign-in routes are public (CORS-enabled for browser clients);
//! everything else sits behind bearer-token auth.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod types;

pub use router::api_router;
pub use types::ApiContext;
