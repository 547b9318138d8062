use std::sync::Arc;

use crate::core::config::{AppPaths, AppSettings, ConfigService};
use crate::provider::{GeminiProvider, IndexProvider};
use crate::proxy::ProxyService;

pub mod error;

use error::InitializationError;

/// State shared by every route.
///
/// Holds no per-session data: settings are immutable after startup and the
/// proxy only wraps a shared provider client.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub settings: Arc<AppSettings>,
    pub proxy: ProxyService,
}

impl AppState {
    /// Loads configuration from disk and the environment and connects the
    /// Gemini File Search client.
    pub fn initialize(paths: Arc<AppPaths>) -> Result<Arc<Self>, InitializationError> {
        let config = ConfigService::new(paths.clone());

        let settings = config
            .load_settings()
            .map_err(InitializationError::Config)?;

        if let Ok(effective) = serde_json::to_value(&settings) {
            tracing::debug!(
                "Effective config: {}",
                config.redact_sensitive_values(&effective)
            );
        }

        let provider =
            GeminiProvider::new(&settings.provider).map_err(InitializationError::Provider)?;

        Ok(Self::with_provider(paths, settings, Arc::new(provider)))
    }

    pub fn with_provider(
        paths: Arc<AppPaths>,
        settings: AppSettings,
        provider: Arc<dyn IndexProvider>,
    ) -> Arc<Self> {
        let proxy = ProxyService::new(provider, &settings);
        Arc::new(AppState {
            paths,
            settings: Arc::new(settings),
            proxy,
        })
    }
}
