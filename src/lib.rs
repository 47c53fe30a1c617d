//! AGOS Edge Agent Library
//!
//! Edge component of the AGOS water-level monitoring system. Each cycle it
//! captures a frame, measures the distance to the water surface with an
//! ultrasonic rangefinder, uploads the frame to Cloudinary, and reports the
//! reading plus image URL to the collection backend.
//!
//! ## Components
//!
//! 1. Camera - still capture (hardware or fallback chain)
//! 2. DistanceSensor - HC-SR04 driver / mock generator
//! 3. ImageUploader - signed Cloudinary upload
//! 4. MonitorLoop - per-cycle orchestration and backend reporting

pub mod camera;
pub mod config;
pub mod error;
pub mod models;
pub mod monitor;
pub mod sensor;
pub mod uploader;

pub use config::AppConfig;
pub use error::{Error, Result};
