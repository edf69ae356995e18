use thiserror::Error;

use super::types::{ErrorKind, ScrapeFailure};
use crate::browser::DriverError;

/// Terminal pipeline failures
///
/// Only these conditions stop a scrape; transient read failures inside the
/// checks are absorbed where they happen.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScrapeError {
    #[error("Page load failed: {0}")]
    PageLoad(String),

    #[error("The search engine requires CAPTCHA verification")]
    CaptchaRequired,

    #[error("AI Mode is not available in your country or language")]
    AiModeNotAvailable,

    #[error("Browser was closed: {0}")]
    BrowserClosedByUser(String),

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Aborted by user")]
    Interrupted,

    #[error("Unexpected error: {0}")]
    Unknown(String),
}

impl ScrapeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScrapeError::PageLoad(_) => ErrorKind::PageLoadError,
            ScrapeError::CaptchaRequired => ErrorKind::CaptchaRequired,
            ScrapeError::AiModeNotAvailable => ErrorKind::AiModeNotAvailable,
            ScrapeError::BrowserClosedByUser(_) => ErrorKind::BrowserClosedByUser,
            ScrapeError::Extraction(_) => ErrorKind::ExtractionError,
            ScrapeError::Interrupted => ErrorKind::Interrupted,
            ScrapeError::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Remediation hint shown next to the message
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            ScrapeError::CaptchaRequired => {
                Some("Run again with --show-browser and solve the challenge in the window.")
            }
            ScrapeError::AiModeNotAvailable => Some(
                "Try using a proxy/VPN and ensure browser locale is set to a supported language.",
            ),
            ScrapeError::PageLoad(_) => Some("Check network connectivity and try again."),
            _ => None,
        }
    }

    /// Map a driver error raised by a stage that has no softer fallback
    pub(crate) fn from_driver(err: DriverError, stage: &str) -> Self {
        match err {
            DriverError::SessionClosed(message) => ScrapeError::BrowserClosedByUser(message),
            other => ScrapeError::Unknown(format!("{stage}: {other}")),
        }
    }
}

impl From<ScrapeError> for ScrapeFailure {
    fn from(err: ScrapeError) -> Self {
        let message = match &err {
            ScrapeError::AiModeNotAvailable => format!(
                "{err}. Please use a proxy/VPN to access from a supported region (e.g., US, UK, Germany)."
            ),
            ScrapeError::CaptchaRequired => {
                format!("{err}. Please run again with the browser visible.")
            }
            _ => err.to_string(),
        };

        ScrapeFailure {
            error: err.kind(),
            message,
            suggestion: err.suggestion().map(str::to_string),
        }
    }
}
