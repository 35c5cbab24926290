//! Loading and error status shown over the preview

use crate::capture::CaptureError;
use crate::recorder::RecordingError;
use crate::utils::error::AppError;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// An error the user has to see
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorNotice {
    pub code: String,
    pub message: String,
    /// Whether the dialog offers "Try again"
    pub retryable: bool,
}

impl From<&AppError> for ErrorNotice {
    fn from(error: &AppError) -> Self {
        Self {
            code: error.code().to_string(),
            message: error.user_message(),
            retryable: error.is_retryable(),
        }
    }
}

impl From<&CaptureError> for ErrorNotice {
    fn from(error: &CaptureError) -> Self {
        Self {
            code: error.code().to_string(),
            message: error.user_message(),
            retryable: true,
        }
    }
}

impl From<&RecordingError> for ErrorNotice {
    fn from(error: &RecordingError) -> Self {
        Self {
            code: error.code().to_string(),
            message: error.user_message(),
            retryable: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewStatus {
    pub loading: bool,
    pub error: Option<ErrorNotice>,
}

/// Publishes `ViewStatus` changes to whoever renders them
pub struct StatusSurface {
    tx: watch::Sender<ViewStatus>,
}

impl Default for StatusSurface {
    fn default() -> Self {
        let (tx, _) = watch::channel(ViewStatus::default());
        Self { tx }
    }
}

impl StatusSurface {
    pub fn current(&self) -> ViewStatus {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewStatus> {
        self.tx.subscribe()
    }

    pub fn begin_loading(&self) {
        self.tx.send_modify(|status| status.loading = true);
    }

    pub fn succeed(&self) {
        self.tx.send_replace(ViewStatus::default());
    }

    pub fn fail(&self, notice: impl Into<ErrorNotice>) {
        let notice = notice.into();
        tracing::warn!("{}: {}", notice.code, notice.message);
        self.tx.send_replace(ViewStatus {
            loading: false,
            error: Some(notice),
        });
    }

    /// Hide the error dialog without touching the loading flag
    pub fn dismiss(&self) {
        self.tx.send_if_modified(|status| status.error.take().is_some());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loading_then_failure() {
        let status = StatusSurface::default();
        let mut rx = status.subscribe();

        status.begin_loading();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().loading);

        status.fail(&CaptureError::DeviceBusy("in use".into()));
        let current = rx.borrow_and_update().clone();
        assert!(!current.loading);
        let notice = current.error.unwrap();
        assert_eq!(notice.code, "DEVICE_BUSY");
        assert!(notice.retryable);
    }

    #[test]
    fn test_succeed_clears_error() {
        let status = StatusSurface::default();
        status.fail(&CaptureError::Unknown("boom".into()));
        status.begin_loading();
        assert!(status.current().error.is_some());

        status.succeed();
        assert_eq!(status.current(), ViewStatus::default());
    }

    #[test]
    fn test_recording_errors_not_retryable() {
        let status = StatusSurface::default();
        status.fail(&RecordingError::NoSupportedFormat);
        let notice = status.current().error.unwrap();
        assert_eq!(notice.code, "NO_SUPPORTED_FORMAT");
        assert!(!notice.retryable);

        status.fail(&AppError::Config("bad".into()));
        assert_eq!(status.current().error.unwrap().code, "CONFIG_ERROR");
    }

    #[test]
    fn test_dismiss_only_notifies_when_shown() {
        let status = StatusSurface::default();
        let mut rx = status.subscribe();
        status.dismiss();
        assert!(!rx.has_changed().unwrap());

        status.fail(&CaptureError::Unknown("boom".into()));
        rx.borrow_and_update();
        status.dismiss();
        assert!(rx.has_changed().unwrap());
        assert_eq!(status.current().error, None);
    }
}
