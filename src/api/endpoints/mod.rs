//! API endpoint handlers.
//!
//! Each module covers one surface: authentication, caregiver
//! scheduling, specialist capacity, and the health probe.

pub mod auth;
pub mod capacity;
pub mod health;
pub mod schedule;
