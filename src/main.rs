use std::sync::Arc;

use vaidya::api::api_router;
use vaidya::config::{self, AppConfig};
use vaidya::core_state::CoreState;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    vaidya::init_tracing();

    let config = AppConfig::from_env();
    tracing::info!(
        "{} starting v{} on {}",
        config::APP_NAME,
        config::APP_VERSION,
        config.bind_addr
    );
    if config.dev_echo_code {
        tracing::warn!("development code echo is enabled; do not run this in production");
    }

    let bind_addr = config.bind_addr;
    let core = Arc::new(CoreState::new(config));
    let app = api_router(core);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await
}
