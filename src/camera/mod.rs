//! Camera - Image Capture
//!
//! ## Responsibilities
//!
//! - Still capture through the Pi camera stack (`rpicam-still` subprocess)
//! - Deterministic fallback chain when hardware is disabled or missing:
//!   fswebcam -> bundled placeholder -> built-in frame
//! - Per-cycle temp-file destinations
//!
//! Every capture subprocess runs with `kill_on_drop`, so a timeout can never
//! leave the camera device held by a zombie child.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

const RPICAM_BIN: &str = "rpicam-still";
const FSWEBCAM_BIN: &str = "fswebcam";

/// Auto-exposure/focus warm-up before the still is taken (rpicam `--timeout`)
const WARMUP_MS: u32 = 2_000;

/// Hard bound on any capture subprocess
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(15);

const FSWEBCAM_RESOLUTION: &str = "640x480";

/// Solid-gray 1x1 baseline JPEG (standard Annex K tables), written when no
/// other capture strategy is available. Keeps the chain infallible short of
/// an I/O error on the destination itself.
const BUILTIN_FRAME: &[u8] = &[
    0xFF, 0xD8, 0xFF, 0xDB, 0x00, 0x43, 0x00, 0x10, 0x10, 0x10, 0x10, 0x10,
    0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10,
    0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10,
    0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10,
    0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10,
    0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0xFF,
    0xC0, 0x00, 0x0B, 0x08, 0x00, 0x01, 0x00, 0x01, 0x01, 0x01, 0x11, 0x00,
    0xFF, 0xC4, 0x00, 0x1F, 0x00, 0x00, 0x01, 0x05, 0x01, 0x01, 0x01, 0x01,
    0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x02,
    0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0xFF, 0xC4, 0x00,
    0xB5, 0x10, 0x00, 0x02, 0x01, 0x03, 0x03, 0x02, 0x04, 0x03, 0x05, 0x05,
    0x04, 0x04, 0x00, 0x00, 0x01, 0x7D, 0x01, 0x02, 0x03, 0x00, 0x04, 0x11,
    0x05, 0x12, 0x21, 0x31, 0x41, 0x06, 0x13, 0x51, 0x61, 0x07, 0x22, 0x71,
    0x14, 0x32, 0x81, 0x91, 0xA1, 0x08, 0x23, 0x42, 0xB1, 0xC1, 0x15, 0x52,
    0xD1, 0xF0, 0x24, 0x33, 0x62, 0x72, 0x82, 0x09, 0x0A, 0x16, 0x17, 0x18,
    0x19, 0x1A, 0x25, 0x26, 0x27, 0x28, 0x29, 0x2A, 0x34, 0x35, 0x36, 0x37,
    0x38, 0x39, 0x3A, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x49, 0x4A, 0x53,
    0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5A, 0x63, 0x64, 0x65, 0x66, 0x67,
    0x68, 0x69, 0x6A, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7A, 0x83,
    0x84, 0x85, 0x86, 0x87, 0x88, 0x89, 0x8A, 0x92, 0x93, 0x94, 0x95, 0x96,
    0x97, 0x98, 0x99, 0x9A, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6, 0xA7, 0xA8, 0xA9,
    0xAA, 0xB2, 0xB3, 0xB4, 0xB5, 0xB6, 0xB7, 0xB8, 0xB9, 0xBA, 0xC2, 0xC3,
    0xC4, 0xC5, 0xC6, 0xC7, 0xC8, 0xC9, 0xCA, 0xD2, 0xD3, 0xD4, 0xD5, 0xD6,
    0xD7, 0xD8, 0xD9, 0xDA, 0xE1, 0xE2, 0xE3, 0xE4, 0xE5, 0xE6, 0xE7, 0xE8,
    0xE9, 0xEA, 0xF1, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6, 0xF7, 0xF8, 0xF9, 0xFA,
    0xFF, 0xDA, 0x00, 0x08, 0x01, 0x01, 0x00, 0x00, 0x3F, 0x00, 0x2B, 0xFF,
    0xD9,
];

/// How stills are produced for this process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// Pi camera via rpicam-still
    Hardware,
    /// fswebcam / placeholder / built-in frame chain
    Fallback,
}

impl CaptureMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureMode::Hardware => "hardware",
            CaptureMode::Fallback => "fallback",
        }
    }
}

/// Camera service instance
pub struct Camera {
    mode: CaptureMode,
    use_fswebcam: bool,
    placeholder_image: PathBuf,
}

impl Camera {
    /// Probe the camera stack and resolve the capture mode once.
    ///
    /// Hardware is selected only when mock mode is off and `rpicam-still`
    /// answers a version probe; everything else falls back deterministically.
    pub async fn detect(mock_mode: bool, use_fswebcam: bool, placeholder_image: PathBuf) -> Self {
        let mode = if mock_mode {
            tracing::info!("camera running in mock mode");
            CaptureMode::Fallback
        } else {
            match Self::check_rpicam().await {
                Ok(version) => {
                    tracing::info!(version = %version, "camera stack available");
                    CaptureMode::Hardware
                }
                Err(e) => {
                    tracing::warn!(error = %e, "camera stack unavailable, using fallback capture");
                    CaptureMode::Fallback
                }
            }
        };

        Self {
            mode,
            use_fswebcam,
            placeholder_image,
        }
    }

    /// Resolved capture mode
    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    /// Check that the rpicam tooling is installed
    async fn check_rpicam() -> Result<String> {
        let output = Command::new(RPICAM_BIN)
            .arg("--version")
            .output()
            .await
            .map_err(|e| Error::Capture(format!("{} not found: {}", RPICAM_BIN, e)))?;

        if !output.status.success() {
            return Err(Error::Capture(format!("{} version check failed", RPICAM_BIN)));
        }

        let version = String::from_utf8_lossy(&output.stdout);
        Ok(version.lines().next().unwrap_or("unknown").to_string())
    }

    /// Capture one still to `destination`, or to a fresh temp path when none
    /// is given. Returns the path the frame was written to; the caller owns
    /// the file from here on.
    pub async fn capture(&self, destination: Option<PathBuf>) -> Result<PathBuf> {
        let dest = destination.unwrap_or_else(default_destination);

        match self.mode {
            CaptureMode::Hardware => self.capture_hardware(&dest).await?,
            CaptureMode::Fallback => self.capture_fallback(&dest).await?,
        }

        tracing::debug!(
            path = %dest.display(),
            mode = self.mode.as_str(),
            "frame captured"
        );
        Ok(dest)
    }

    /// One still through the Pi camera stack. The warm-up flag gives the
    /// sensor 2s to settle auto-exposure before the frame is taken.
    async fn capture_hardware(&self, dest: &Path) -> Result<()> {
        run_capture_tool(
            RPICAM_BIN,
            &[
                "--nopreview",
                "--timeout",
                &WARMUP_MS.to_string(),
                "--output",
                &dest.to_string_lossy(),
            ],
        )
        .await
    }

    /// Fallback chain: each strategy is tried only when the previous one is
    /// unavailable or errored; the built-in frame terminates the chain.
    async fn capture_fallback(&self, dest: &Path) -> Result<()> {
        if self.use_fswebcam {
            match self.capture_fswebcam(dest).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::debug!(error = %e, "fswebcam capture failed, trying placeholder");
                }
            }
        }

        if self.placeholder_image.exists() {
            match tokio::fs::copy(&self.placeholder_image, dest).await {
                Ok(_) => {
                    tracing::debug!(
                        placeholder = %self.placeholder_image.display(),
                        "placeholder image copied"
                    );
                    return Ok(());
                }
                Err(e) => {
                    tracing::debug!(error = %e, "placeholder copy failed, writing built-in frame");
                }
            }
        }

        tokio::fs::write(dest, BUILTIN_FRAME).await?;
        Ok(())
    }

    async fn capture_fswebcam(&self, dest: &Path) -> Result<()> {
        run_capture_tool(
            FSWEBCAM_BIN,
            &[
                "-r",
                FSWEBCAM_RESOLUTION,
                "--no-banner",
                &dest.to_string_lossy(),
            ],
        )
        .await
    }
}

/// Run a capture utility with a hard timeout.
///
/// `kill_on_drop` sends SIGKILL to the child when the timeout cancels the
/// wait, so an unresponsive camera cannot accumulate stuck processes.
async fn run_capture_tool(program: &str, args: &[&str]) -> Result<()> {
    let child = Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::Capture(format!("{} spawn failed: {}", program, e)))?;

    match tokio::time::timeout(CAPTURE_TIMEOUT, child.wait_with_output()).await {
        Ok(Ok(output)) => {
            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(Error::Capture(format!(
                    "{} failed: {}",
                    program,
                    stderr.trim()
                )));
            }
            Ok(())
        }
        Ok(Err(e)) => Err(Error::Capture(format!("{} execution failed: {}", program, e))),
        Err(_) => {
            tracing::warn!(
                program = program,
                timeout_sec = CAPTURE_TIMEOUT.as_secs(),
                "capture tool timeout, process killed via kill_on_drop"
            );
            Err(Error::Capture(format!(
                "{} timeout ({}s)",
                program,
                CAPTURE_TIMEOUT.as_secs()
            )))
        }
    }
}

/// Fresh per-cycle destination under the system temp directory
fn default_destination() -> PathBuf {
    std::env::temp_dir().join(format!("agos-frame-{}.jpg", uuid::Uuid::now_v7()))
}
