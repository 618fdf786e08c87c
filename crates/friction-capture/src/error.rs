use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Core error: {0}")]
    Core(#[from] friction_core::error::CoreError),

    #[error("Import error: {0}")]
    Import(String),
}
