use std::sync::Arc;

use super::config::{AppPaths, ConfigService, Settings};
use super::errors::RagError;
use super::logging::{self, ConsoleTarget};

/// Loads configuration and installs logging for one binary.
pub fn init(log_file: &str, console: ConsoleTarget) -> Result<Settings, RagError> {
    let paths = Arc::new(AppPaths::new());
    let config_service = ConfigService::new(paths.clone());
    let settings = Settings::load(&config_service)?;

    logging::init(&paths, &settings.logging, log_file, console);
    tracing::debug!(
        "Loaded configuration from {}: {}",
        config_service.config_path().display(),
        settings.redacted()
    );

    Ok(settings)
}
