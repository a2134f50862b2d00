//! Client settings
//!
//! Manages persistence of the endpoint, default request parameters and
//! stream limits.

use crate::config::{get_data_dir, ConfigError};
use crate::stream::DEFAULT_MAX_PARTIAL_BYTES;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default completions endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/completions";

/// Client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Completions endpoint the request is POSTed to
    pub endpoint: String,
    /// Model used when the request does not name one
    pub model: String,
    /// Maximum number of tokens to generate
    pub max_tokens: u32,
    /// Temperature parameter for text generation (0.0 - 2.0)
    pub temperature: f32,
    /// Minimum interval between text callbacks, unthrottled when unset
    pub throttle_ms: Option<u64>,
    /// Largest incomplete JSON fragment held across chunks
    pub max_partial_bytes: usize,
    /// Whole-request timeout, none when unset
    pub request_timeout_secs: Option<u64>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: "gpt-3.5-turbo-instruct".to_string(),
            max_tokens: 256,
            temperature: 0.7,
            throttle_ms: None,
            max_partial_bytes: DEFAULT_MAX_PARTIAL_BYTES,
            request_timeout_secs: None,
        }
    }
}

impl ClientSettings {
    /// Validate settings values
    ///
    /// Ensures all parameters are within acceptable ranges
    pub fn validate(&mut self) {
        if self.endpoint.trim().is_empty() {
            self.endpoint = DEFAULT_ENDPOINT.to_string();
        }

        // Clamp temperature between 0.0 and 2.0
        self.temperature = self.temperature.clamp(0.0, 2.0);

        if self.max_tokens == 0 {
            self.max_tokens = 256;
        }

        if self.max_partial_bytes == 0 {
            self.max_partial_bytes = DEFAULT_MAX_PARTIAL_BYTES;
        }

        if self.request_timeout_secs == Some(0) {
            self.request_timeout_secs = None;
        }
    }
}

/// Get the settings file path
fn get_settings_path() -> Result<PathBuf, ConfigError> {
    Ok(get_data_dir()?.join("settings.json"))
}

/// Load settings from disk
///
/// Writes the defaults on first run so there is a file to edit. Returns
/// default settings if the file can't be read or is corrupted.
pub fn load_settings() -> ClientSettings {
    match get_settings_path().and_then(|path| load_or_init(&path)) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("Failed to load settings, using defaults: {}", e);
            ClientSettings::default()
        }
    }
}

/// Load settings from an explicit path, with error propagation
pub fn load_settings_from(path: &Path) -> Result<ClientSettings, ConfigError> {
    if !path.exists() {
        tracing::info!("Settings file not found, using defaults");
        return Ok(ClientSettings::default());
    }

    let json = fs::read_to_string(path)?;
    let mut settings: ClientSettings = serde_json::from_str(&json)?;

    // Validate loaded settings
    settings.validate();

    tracing::debug!("Loaded settings from {}", path.display());
    Ok(settings)
}

/// Load settings from `path`, saving the defaults there if it doesn't exist
pub fn load_or_init(path: &Path) -> Result<ClientSettings, ConfigError> {
    if path.exists() {
        return load_settings_from(path);
    }

    let settings = ClientSettings::default();
    save_settings_to(&settings, path)?;
    tracing::info!("Wrote default settings to {}", path.display());
    Ok(settings)
}

/// Save settings to an explicit path
pub fn save_settings_to(settings: &ClientSettings, path: &Path) -> Result<(), ConfigError> {
    // Ensure the parent directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)?;

    tracing::debug!("Saved settings to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = ClientSettings::default();
        assert_eq!(settings.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(settings.temperature, 0.7);
        assert_eq!(settings.throttle_ms, None);
        assert_eq!(settings.max_partial_bytes, 1024 * 1024);
    }

    #[test]
    fn test_settings_validation() {
        let mut settings = ClientSettings::default();

        // Test temperature clamping
        settings.temperature = 5.0;
        settings.validate();
        assert_eq!(settings.temperature, 2.0);

        settings.temperature = -1.0;
        settings.validate();
        assert_eq!(settings.temperature, 0.0);

        // Zero limits fall back to defaults
        settings.max_partial_bytes = 0;
        settings.max_tokens = 0;
        settings.request_timeout_secs = Some(0);
        settings.validate();
        assert_eq!(settings.max_partial_bytes, DEFAULT_MAX_PARTIAL_BYTES);
        assert_eq!(settings.max_tokens, 256);
        assert_eq!(settings.request_timeout_secs, None);

        settings.endpoint = "  ".to_string();
        settings.validate();
        assert_eq!(settings.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_partial_file_uses_defaults_for_missing_fields() {
        let settings: ClientSettings = serde_json::from_str(r#"{"throttle_ms": 50}"#).unwrap();
        assert_eq!(settings.throttle_ms, Some(50));
        assert_eq!(settings.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_settings_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let settings = ClientSettings {
            endpoint: "http://localhost:8080/v1/completions".to_string(),
            throttle_ms: Some(100),
            temperature: 9.0,
            ..Default::default()
        };
        save_settings_to(&settings, &path).unwrap();

        let loaded = load_settings_from(&path).unwrap();
        assert_eq!(loaded.endpoint, settings.endpoint);
        assert_eq!(loaded.throttle_ms, Some(100));
        // Validation runs on load
        assert_eq!(loaded.temperature, 2.0);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_settings_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded, ClientSettings::default());
    }

    #[test]
    fn test_first_run_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("settings.json");

        let settings = load_or_init(&path).unwrap();
        assert_eq!(settings, ClientSettings::default());
        assert!(path.exists());

        fs::write(&path, r#"{"throttle_ms": 250}"#).unwrap();
        assert_eq!(load_or_init(&path).unwrap().throttle_ms, Some(250));
    }

    #[test]
    fn test_corrupted_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            load_settings_from(&path),
            Err(ConfigError::JsonError(_))
        ));
    }
}
