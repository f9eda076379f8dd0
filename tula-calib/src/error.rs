//! Error types for TulaCalib

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// TulaCalib error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration could not be serialized
    #[error("Config write error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    /// Sequence plan could not be parsed or written
    #[error("Plan error: {0}")]
    Plan(#[from] serde_json::Error),

    /// Dataset artifact could not be written
    #[error("Dataset write error: {0}")]
    Dataset(#[from] csv::Error),

    /// Transport closed by the remote end
    #[error("Transport disconnected")]
    Disconnected,

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
