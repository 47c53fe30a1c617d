//! AGOS Edge Agent
//!
//! Main entry point for the water-level monitoring agent.

use agos_edge::{
    camera::Camera, config::AppConfig, monitor::MonitorLoop, sensor::DistanceSensor,
    uploader::ImageUploader,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agos_edge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting AGOS edge agent v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::from_env()?;
    tracing::info!(
        server_url = %config.server_url,
        sensor_device_id = config.sensor_device_id,
        mock_mode = config.mock_mode,
        use_fswebcam = config.use_fswebcam,
        "Configuration loaded"
    );

    // Initialize components; hardware availability is probed once here
    let camera = Camera::detect(
        config.mock_mode,
        config.use_fswebcam,
        config.placeholder_image.clone(),
    )
    .await;
    tracing::info!(mode = camera.mode().as_str(), "Camera initialized");

    let sensor = DistanceSensor::new(config.mock_mode);
    let uploader = ImageUploader::new(
        config.cloud_name.clone(),
        config.api_key.clone(),
        config.api_secret.clone(),
    );

    // Shutdown flag, set by the signal listener and observed between cycles
    let shutdown = Arc::new(AtomicBool::new(false));
    spawn_signal_listener(shutdown.clone());

    let monitor = MonitorLoop::new(
        camera,
        sensor,
        uploader,
        config.server_url.clone(),
        config.sensor_device_id,
        shutdown,
    );
    monitor.run().await;

    tracing::info!("AGOS edge agent stopped");
    Ok(())
}

/// SIGINT/SIGTERM request a graceful drain: the flag flips, the in-flight
/// cycle completes, the loop exits.
fn spawn_signal_listener(shutdown: Arc<AtomicBool>) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {}
                        _ = sigterm.recv() => {}
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to install SIGTERM handler");
                    let _ = ctrl_c.await;
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }

        tracing::info!("shutdown requested, draining current cycle");
        shutdown.store(true, Ordering::SeqCst);
    });
}
