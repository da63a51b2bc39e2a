use thiserror::Error;

/// Invalid geometry or color inputs, detected before any processing starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("thumbnail size must be a power of two, got {0}")]
    ThumbnailSize(u32),

    #[error("output directory '{0}' already exists")]
    OutputExists(String),

    #[error("background color must be an '[r, g, b]' triple of numbers: {0}")]
    BackgroundColor(String),

    #[error("background color component {0} is outside [0, 1]")]
    BackgroundRange(f64),

    #[error("equirectangular input must be a full 2:1 panorama unless --haov and --vaov are given")]
    AngleOfView,
}
