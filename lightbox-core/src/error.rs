use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Placeholder image unavailable: {0}")]
    Placeholder(String),

    #[error("Cache is closed")]
    Closed,

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, CacheError>;
