//! Manual mock-mode check of every component, no hardware required.
//!
//! Forces mock mode, exercises config loading, the capture fallback chain,
//! the mock sensor, and (when Cloudinary credentials are configured) a real
//! upload, then prints a per-check summary. Exits non-zero on any failure.

use agos_edge::camera::Camera;
use agos_edge::config::AppConfig;
use agos_edge::sensor::{DistanceSensor, MOCK_BAND_CM};
use agos_edge::uploader::ImageUploader;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

enum Check {
    Passed(String),
    Failed(String),
    Skipped(String),
}

#[tokio::main]
async fn main() {
    // Keep component logs out of the way of the summary
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agos_edge=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    std::env::set_var("MOCK_MODE", "true");
    dotenvy::dotenv().ok();

    let mut checks: Vec<(&str, Check)> = Vec::new();

    // Environment
    let config = match AppConfig::from_env() {
        Ok(config) => {
            checks.push((
                "environment",
                Check::Passed(format!(
                    "device {} -> {}",
                    config.sensor_device_id, config.server_url
                )),
            ));
            Some(config)
        }
        Err(e) => {
            checks.push(("environment", Check::Failed(e.to_string())));
            None
        }
    };

    let use_fswebcam = config.as_ref().map(|c| c.use_fswebcam).unwrap_or(false);
    let placeholder = config
        .as_ref()
        .map(|c| c.placeholder_image.clone())
        .unwrap_or_else(|| PathBuf::from("test_image.jpg"));

    // Camera fallback chain
    let camera = Camera::detect(true, use_fswebcam, placeholder).await;
    checks.push(("camera", check_camera(&camera).await));

    // Mock sensor band
    let sensor = DistanceSensor::new(true);
    checks.push(("sensor", check_sensor(&sensor).await));

    // Upload, only against a configured account
    let upload_check = match &config {
        Some(config) => check_upload(&camera, config).await,
        None => Check::Skipped("Cloudinary credentials not configured".to_string()),
    };
    checks.push(("upload", upload_check));

    println!("==== AGOS edge self-test (mock mode) ====");
    let mut failed = 0;
    for (name, check) in &checks {
        match check {
            Check::Passed(detail) => println!("[PASS] {}: {}", name, detail),
            Check::Failed(detail) => {
                failed += 1;
                println!("[FAIL] {}: {}", name, detail);
            }
            Check::Skipped(detail) => println!("[SKIP] {}: {}", name, detail),
        }
    }
    println!("{} checks, {} failed", checks.len(), failed);

    if failed > 0 {
        std::process::exit(1);
    }
}

async fn check_camera(camera: &Camera) -> Check {
    match camera.capture(None).await {
        Ok(path) => {
            let size = tokio::fs::metadata(&path)
                .await
                .map(|m| m.len())
                .unwrap_or(0);
            let _ = tokio::fs::remove_file(&path).await;
            if size > 0 {
                Check::Passed(format!("{} ({} bytes)", path.display(), size))
            } else {
                Check::Failed(format!("{} is empty", path.display()))
            }
        }
        Err(e) => Check::Failed(e.to_string()),
    }
}

async fn check_sensor(sensor: &DistanceSensor) -> Check {
    match sensor.measure_distance().await {
        Ok(distance) if (MOCK_BAND_CM.0..=MOCK_BAND_CM.1).contains(&distance) => {
            Check::Passed(format!("{:.1} cm", distance))
        }
        Ok(distance) => Check::Failed(format!("{:.1} cm outside mock band", distance)),
        Err(e) => Check::Failed(e.to_string()),
    }
}

async fn check_upload(camera: &Camera, config: &AppConfig) -> Check {
    let path = match camera.capture(None).await {
        Ok(path) => path,
        Err(e) => return Check::Failed(format!("capture for upload failed: {}", e)),
    };

    let uploader = ImageUploader::new(
        config.cloud_name.clone(),
        config.api_key.clone(),
        config.api_secret.clone(),
    );
    let result = uploader.upload(&path).await;
    let _ = tokio::fs::remove_file(&path).await;

    match result {
        Ok(url) => Check::Passed(url),
        Err(e) => Check::Failed(e.to_string()),
    }
}
