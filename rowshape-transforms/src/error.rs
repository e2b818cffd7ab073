use rowshape_common::error::ValueError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Value error: `{0}`")]
    ValueError(#[from] ValueError),

    #[error("JSON error: `{0}`")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: `{0}`")]
    IoError(#[from] std::io::Error),
}
