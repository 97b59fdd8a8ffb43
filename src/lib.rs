pub mod api;
pub mod auth; // One-time-code sessions
pub mod capacity; // Specialist load allocation
pub mod config;
pub mod core_state;
pub mod keyed_lock;
pub mod models;
pub mod scheduling; // Caregiver slot bookings
pub mod seed;
pub mod store;

use tracing_subscriber::EnvFilter;

/// Initialize tracing from `RUST_LOG`, defaulting to the app filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}
