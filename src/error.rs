// src/error.rs
use thiserror::Error;

use preview_core::PreviewError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Preview error: {0}")]
    Preview(#[from] PreviewError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid window: first {first}, count {count}, {total} fonts loaded")]
    InvalidWindow { first: usize, count: usize, total: usize },
}

pub type AppResult<T> = Result<T, AppError>;
