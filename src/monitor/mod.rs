//! MonitorLoop - Acquisition and Reporting Cycle
//!
//! ## Responsibilities
//!
//! - Run capture -> upload -> measure -> POST strictly in sequence
//! - Classify backend POST outcomes
//! - Remove the cycle's temp file whatever happened before
//! - Observe the shutdown flag between cycles
//!
//! A failed step ends the cycle, never the process; the next cycle three
//! seconds later is the only retry mechanism.

use crate::camera::Camera;
use crate::models::WaterLevelReading;
use crate::sensor::DistanceSensor;
use crate::uploader::ImageUploader;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Pause between cycles
const CYCLE_INTERVAL: Duration = Duration::from_secs(3);

/// Bound on the backend POST
const POST_TIMEOUT: Duration = Duration::from_secs(5);

/// The acquisition-and-reporting loop
pub struct MonitorLoop {
    camera: Camera,
    sensor: DistanceSensor,
    uploader: ImageUploader,
    client: reqwest::Client,
    server_url: String,
    sensor_device_id: i64,
    shutdown: Arc<AtomicBool>,
}

impl MonitorLoop {
    pub fn new(
        camera: Camera,
        sensor: DistanceSensor,
        uploader: ImageUploader,
        server_url: String,
        sensor_device_id: i64,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(POST_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            camera,
            sensor,
            uploader,
            client,
            server_url,
            sensor_device_id,
            shutdown,
        }
    }

    /// Run cycles until the shutdown flag is observed. The flag is checked
    /// only between cycles; an in-flight cycle always completes.
    pub async fn run(&self) {
        tracing::info!(
            endpoint = %self.server_url,
            interval_sec = CYCLE_INTERVAL.as_secs(),
            "monitoring loop started"
        );

        while !self.shutdown.load(Ordering::SeqCst) {
            self.run_cycle().await;
            tokio::time::sleep(CYCLE_INTERVAL).await;
        }

        tracing::info!("monitoring loop stopped");
    }

    /// One full acquisition cycle. Never propagates an error; every outcome
    /// is logged, and the temp file is removed on the way out.
    pub async fn run_cycle(&self) {
        let image_path = match self.camera.capture(None).await {
            Ok(path) => path,
            Err(e) => {
                tracing::error!(error = %e, "image capture failed, skipping this cycle");
                return;
            }
        };

        self.report(&image_path).await;
        cleanup_temp_file(&image_path).await;
    }

    /// Upload, measure, and POST. Ends the cycle (after logging) on the
    /// first failed step; the caller still removes the temp file. A failed
    /// upload skips the sensor read entirely, because the cycle is already
    /// unusable without an image URL.
    async fn report(&self, image_path: &Path) {
        let image_url = match self.uploader.upload(image_path).await {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(error = %e, "image upload failed, skipping this cycle");
                return;
            }
        };

        let distance_cm = match self.sensor.measure_distance().await {
            Ok(distance) => distance,
            Err(e) => {
                tracing::warn!(error = %e, "water level read failed, skipping this cycle");
                return;
            }
        };

        let reading = WaterLevelReading::now(self.sensor_device_id, distance_cm);
        self.post_reading(&reading, &image_url).await;
    }

    async fn post_reading(&self, reading: &WaterLevelReading, image_url: &str) {
        match self
            .client
            .post(&self.server_url)
            .json(reading)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!(
                    sensor_device_id = reading.sensor_device_id,
                    distance_cm = reading.raw_distance_cm,
                    image_url = image_url,
                    "reading posted"
                );
            }
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                tracing::error!(
                    status = %status,
                    body = %body.trim(),
                    "backend rejected reading"
                );
            }
            Err(e) if e.is_timeout() => {
                tracing::error!(endpoint = %self.server_url, "timeout posting reading");
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to post reading");
            }
        }
    }
}

/// Best-effort removal of the cycle's temp file
async fn cleanup_temp_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "temp file removed");
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to remove temp file"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cleanup_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.jpg");
        std::fs::write(&path, b"data").unwrap();

        cleanup_temp_file(&path).await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_cleanup_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        cleanup_temp_file(&dir.path().join("never-created.jpg")).await;
    }

    #[tokio::test]
    async fn test_run_exits_immediately_once_shutdown_is_set() {
        let shutdown = Arc::new(AtomicBool::new(true));
        let camera = Camera::detect(true, false, "missing.jpg".into()).await;
        let sensor = DistanceSensor::new(true);
        let uploader =
            ImageUploader::new("demo".to_string(), "key".to_string(), "secret".to_string());
        let monitor = MonitorLoop::new(
            camera,
            sensor,
            uploader,
            "http://127.0.0.1:1/data".to_string(),
            1,
            shutdown,
        );

        // Flag already set: no cycle may start
        tokio::time::timeout(Duration::from_millis(100), monitor.run())
            .await
            .expect("loop must exit without running a cycle");
    }
}
