//! Application configuration
//!
//! All settings come from the environment (plus `.env` via dotenvy in main)
//! and are resolved exactly once at startup. Nothing here is mutated after
//! load; components receive the values they need at construction.

use crate::error::{Error, Result};
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Cloudinary cloud name
    pub cloud_name: String,
    /// Cloudinary API key
    pub api_key: String,
    /// Cloudinary API secret
    pub api_secret: String,
    /// Backend collection endpoint
    pub server_url: String,
    /// Device id reported with every reading
    pub sensor_device_id: i64,
    /// Skip all hardware and run with mock capture/sensor values
    pub mock_mode: bool,
    /// Allow the fswebcam utility as the first capture fallback
    pub use_fswebcam: bool,
    /// Bundled placeholder image used when fswebcam is unavailable
    pub placeholder_image: PathBuf,
}

impl AppConfig {
    /// Load configuration from the environment.
    ///
    /// Cloudinary credentials are required; everything else has a default.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            cloud_name: require("CLOUDINARY_CLOUD_NAME")?,
            api_key: require("CLOUDINARY_API_KEY")?,
            api_secret: require("CLOUDINARY_API_SECRET")?,
            server_url: std::env::var("SERVER_URL")
                .unwrap_or_else(|_| "http://localhost:5000/data".to_string()),
            sensor_device_id: std::env::var("SENSOR_DEVICE_ID")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),
            mock_mode: flag("MOCK_MODE"),
            use_fswebcam: flag("USE_FSWEBCAM"),
            placeholder_image: std::env::var("PLACEHOLDER_IMAGE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("test_image.jpg")),
        })
    }
}

fn require(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| Error::Config(format!("{} is not set", key)))
}

fn flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| v.to_lowercase() == "true")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_env_defaults() {
        std::env::set_var("CLOUDINARY_CLOUD_NAME", "demo");
        std::env::set_var("CLOUDINARY_API_KEY", "key");
        std::env::set_var("CLOUDINARY_API_SECRET", "secret");
        std::env::remove_var("SERVER_URL");
        std::env::remove_var("SENSOR_DEVICE_ID");
        std::env::remove_var("MOCK_MODE");

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.server_url, "http://localhost:5000/data");
        assert_eq!(config.sensor_device_id, 1);
        assert!(!config.mock_mode);
        assert!(!config.use_fswebcam);
    }

    #[test]
    fn test_missing_credentials() {
        std::env::remove_var("CLOUDINARY_API_SECRET_MISSING");
        let err = require("CLOUDINARY_API_SECRET_MISSING").unwrap_err();
        assert!(err.to_string().contains("is not set"));
    }
}
