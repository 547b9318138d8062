use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;

use filesearch_backend::core::config::AppPaths;
use filesearch_backend::core::logging;
use filesearch_backend::server::router::router;
use filesearch_backend::state::error::InitializationError;
use filesearch_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; real environment variables still apply.
    let _ = dotenvy::dotenv();

    let paths = Arc::new(AppPaths::new());
    logging::init(&paths);

    let state = match AppState::initialize(paths) {
        Ok(state) => state,
        Err(err) => {
            tracing::error!("{}", err);
            if matches!(err, InitializationError::Provider(_)) {
                tracing::error!(
                    "Set GEMINI_API_KEY in the environment, .env or secrets.yaml (provider.api_key)"
                );
            }
            return Err(err.into());
        }
    };

    let bind_addr = state.settings.server.bind_addr();
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;

    tracing::info!(
        "File Search backend listening on http://{} (provider: {}, model: {})",
        addr,
        state.proxy.provider_name(),
        state.proxy.model()
    );

    let app = router(state);
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
