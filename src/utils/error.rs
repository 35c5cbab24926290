//! Error types and handling
//!
//! Application-wide error type and the payload returned to the frontend.

use crate::capture::CaptureError;
use crate::overlay::OverlayError;
use crate::recorder::RecordingError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Recording(#[from] RecordingError),

    #[error(transparent)]
    Overlay(#[from] OverlayError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Stable code the frontend switches on
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Capture(e) => e.code(),
            AppError::Recording(e) => e.code(),
            AppError::Overlay(e) => e.code(),
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Human readable message for the error dialog
    pub fn user_message(&self) -> String {
        match self {
            AppError::Capture(e) => e.user_message(),
            AppError::Recording(e) => e.user_message(),
            AppError::Overlay(e) => e.user_message(),
            other => other.to_string(),
        }
    }

    /// Whether re-acquiring the camera can fix this
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Capture(_))
    }
}

/// Error response for frontend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        ErrorResponse {
            code: error.code().to_string(),
            message: error.user_message(),
        }
    }
}

impl From<CaptureError> for ErrorResponse {
    fn from(error: CaptureError) -> Self {
        AppError::from(error).into()
    }
}

impl From<RecordingError> for ErrorResponse {
    fn from(error: RecordingError) -> Self {
        AppError::from(error).into()
    }
}

impl From<OverlayError> for ErrorResponse {
    fn from(error: OverlayError) -> Self {
        AppError::from(error).into()
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
