//! Error types for Roadkit

use thiserror::Error;

/// The main error type for Roadkit operations
#[derive(Debug, Error)]
pub enum RoadError {
    /// Fewer than two points, or an edit that would orphan an intersection
    /// connection. The operation is refused without partial mutation.
    #[error("Invalid topology: {0}")]
    InvalidTopology(String),

    /// A lane or sample that cannot produce geometry.
    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    /// A mesh, material or prefab required for generation is absent.
    #[error("Missing asset: {0}")]
    MissingAsset(String),

    #[error("External query failed: {0}")]
    ExternalQueryFailure(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Index out of range: {index} (valid range is 0..{len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),

    #[error("TOML serialization error: {0}")]
    TomlSerError(String),

    #[error("Image error: {0}")]
    ImageError(String),
}

/// Result type alias for Roadkit operations
pub type Result<T> = std::result::Result<T, RoadError>;

impl From<toml::de::Error> for RoadError {
    fn from(err: toml::de::Error) -> Self {
        RoadError::TomlParseError(err.to_string())
    }
}

impl From<toml::ser::Error> for RoadError {
    fn from(err: toml::ser::Error) -> Self {
        RoadError::TomlSerError(err.to_string())
    }
}
