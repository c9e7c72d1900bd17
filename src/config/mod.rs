// Configuration management module
// Handles TOML configuration loading, validation, and environment overrides

pub mod settings;

pub use settings::{
    Config, ConfigError, DEFAULT_HISTORY_WINDOW, DEFAULT_TOP_K, OllamaConfig, RetrievalConfig,
    ServerConfig, SessionConfig, default_config_dir,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    default_config_dir()
}
