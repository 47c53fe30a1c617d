//! ImageUploader - Cloudinary Image Hosting
//!
//! ## Responsibilities
//!
//! - Signed upload of the captured frame to Cloudinary
//! - Extraction of the public `secure_url` from the response
//!
//! Failures stay inside this module's `Result`; the monitoring loop treats
//! any of them as "no URL this cycle".

use crate::error::{Error, Result};
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha1::{Digest, Sha1};
use std::path::Path;
use std::time::Duration;

/// Cloudinary API host; constructor-overridable for tests
const DEFAULT_API_BASE: &str = "https://api.cloudinary.com";

/// All frames land under this logical folder
const UPLOAD_FOLDER: &str = "agos";

/// Relevant slice of the Cloudinary upload response
#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
}

/// Cloudinary uploader instance
pub struct ImageUploader {
    client: reqwest::Client,
    api_base: String,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

impl ImageUploader {
    /// Create an uploader for the given Cloudinary account.
    pub fn new(cloud_name: String, api_key: String, api_secret: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            cloud_name,
            api_key,
            api_secret,
        }
    }

    /// Point the uploader at a different API host (tests)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Upload the file at `path`, returning its public URL.
    pub async fn upload(&self, path: &Path) -> Result<String> {
        let data = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "frame.jpg".to_string());

        let timestamp = Utc::now().timestamp();
        let signature = sign_upload(UPLOAD_FOLDER, timestamp, &self.api_secret);

        let form = Form::new()
            .part(
                "file",
                Part::bytes(data)
                    .file_name(file_name)
                    .mime_str("image/jpeg")?,
            )
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp.to_string())
            .text("folder", UPLOAD_FOLDER.to_string())
            .text("signature", signature);

        let url = format!("{}/v1_1/{}/image/upload", self.api_base, self.cloud_name);
        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.upload_error(path, e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(self.upload_error(path, format!("{} - {}", status, body.trim())));
        }

        let result: UploadResponse = resp
            .json()
            .await
            .map_err(|e| self.upload_error(path, format!("invalid response: {}", e)))?;

        result
            .secure_url
            .ok_or_else(|| self.upload_error(path, "response missing secure_url".to_string()))
    }

    fn upload_error(&self, path: &Path, message: String) -> Error {
        Error::Upload {
            path: path.display().to_string(),
            message,
        }
    }
}

/// Signature over the non-file upload parameters, per the Cloudinary signed
/// upload contract: lowercase hex SHA-1 of `folder=<f>&timestamp=<ts><secret>`.
fn sign_upload(folder: &str, timestamp: i64, api_secret: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(format!("folder={}&timestamp={}", folder, timestamp));
    hasher.update(api_secret);
    let digest = hasher.finalize();

    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_upload_known_vector() {
        // sha1("folder=agos&timestamp=1700000000topsecret")
        assert_eq!(
            sign_upload("agos", 1_700_000_000, "topsecret"),
            "451f2a947ec1e8cbce9d5e69a70cf5ea132cfeab"
        );
    }

    #[test]
    fn test_sign_upload_is_hex() {
        let sig = sign_upload(UPLOAD_FOLDER, 0, "secret");
        assert_eq!(sig.len(), 40);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[tokio::test]
    async fn test_upload_missing_file_is_error() {
        let uploader = ImageUploader::new(
            "demo".to_string(),
            "key".to_string(),
            "secret".to_string(),
        );

        let err = uploader
            .upload(Path::new("/nonexistent/agos-frame.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
