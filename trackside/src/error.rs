//! Error types for trackside

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TracksideError {
    #[error("Audio device error: {0}")]
    AudioDevice(String),

    #[error("Audio format error: {0}")]
    AudioFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Audio loading error: {0}")]
    AudioLoading(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Audio graph error: {0}")]
    Graph(String),

    #[error("Spatial audio error: {0}")]
    SpatialAudio(String),

    #[error(transparent)]
    Config(#[from] ConfigValidationError),

    #[error(transparent)]
    SoundLoad(#[from] SoundLoadError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub type Result<T> = std::result::Result<T, TracksideError>;

/// A sound file could not be read or decoded.
///
/// Cloneable so that every caller waiting on the same in-flight decode
/// receives the failure.
#[derive(Error, Debug, Clone)]
#[error("Failed to load sound {}: {cause}", .path.display())]
pub struct SoundLoadError {
    pub path: PathBuf,
    pub cause: Arc<TracksideError>,
}

impl SoundLoadError {
    pub fn new(path: impl Into<PathBuf>, cause: TracksideError) -> Self {
        Self {
            path: path.into(),
            cause: Arc::new(cause),
        }
    }
}

/// One rejected field of the configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    /// Field path, outermost first (`["sounds", "track", "BL1", "0", "gain"]`)
    pub path: Vec<String>,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "- {}: {}", self.path.join(" -> "), self.message)
    }
}

/// The configuration file failed validation. Fatal at startup.
#[derive(Error, Debug, Clone)]
pub struct ConfigValidationError {
    pub issues: Vec<ConfigIssue>,
}

impl ConfigValidationError {
    pub fn single(path: &[&str], message: impl Into<String>) -> Self {
        Self {
            issues: vec![ConfigIssue {
                path: path.iter().map(|s| s.to_string()).collect(),
                message: message.into(),
            }],
        }
    }
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Error loading configuration file:")?;
        let lines: Vec<String> = self.issues.iter().map(|i| i.to_string()).collect();
        write!(f, "{}", lines.join("\n"))
    }
}

/// Connection-level failure of the telemetry transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Malformed packet: {0}")]
    Malformed(String),
}
