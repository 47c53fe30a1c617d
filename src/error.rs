//! Error handling for the AGOS edge agent

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Which echo polling phase timed out during an ultrasonic read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoPhase {
    /// Waiting for the echo line to go high
    Rising,
    /// Waiting for the echo line to go low
    Falling,
}

impl std::fmt::Display for EchoPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EchoPhase::Rising => write!(f, "rising"),
            EchoPhase::Falling => write!(f, "falling"),
        }
    }
}

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Config error
    #[error("Config error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Image capture error
    #[error("Capture error: {0}")]
    Capture(String),

    /// Image upload error
    #[error("Upload failed for {path}: {message}")]
    Upload { path: String, message: String },

    /// Echo line never transitioned within the polling bound
    #[error("Sensor timeout waiting for {0} echo edge")]
    EchoTimeout(EchoPhase),

    /// GPIO access error
    #[error("GPIO error: {0}")]
    Gpio(String),

    /// Blocking sensor task failed to complete
    #[error("Sensor task error: {0}")]
    SensorTask(String),
}
