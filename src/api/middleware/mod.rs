//! API middleware.
//!
//! A single layer: bearer-token validation, which injects the caller's
//! `AuthContext` for every protected handler.

pub mod auth;
