//! Host browser capabilities the pipeline relies on
//!
//! The extraction stages only ever talk to a [`PageDriver`]. Production code
//! uses [`super::ChromePage`]; tests use the scripted page from the `testing` feature.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by a page driver
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// The page, context or browser process is gone; nothing else will work
    #[error("Browser session closed: {0}")]
    SessionClosed(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Element not found: {0}")]
    NotFound(String),

    #[error("Script evaluation failed: {0}")]
    Evaluation(String),

    #[error("CDP error: {0}")]
    Protocol(String),
}

impl DriverError {
    pub fn is_session_closed(&self) -> bool {
        matches!(self, DriverError::SessionClosed(_))
    }

    /// Map a raw CDP/transport error message onto a driver error
    ///
    /// Session loss is detected from the message text because chromiumoxide
    /// reports it through several unrelated error variants.
    pub fn classify(message: impl std::fmt::Display) -> Self {
        let message = message.to_string();
        let lower = message.to_lowercase();
        if SESSION_CLOSED_PATTERNS.iter().any(|re| re.is_match(&lower)) {
            DriverError::SessionClosed(message)
        } else {
            DriverError::Protocol(message)
        }
    }
}

/// Messages that mean the browser session is unrecoverable.
/// Compiled once at first use via `once_cell::sync::Lazy`.
static SESSION_CLOSED_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"browser has been closed",
        r"browser (closed|disconnected|crashed)",
        r"target (closed|crashed|destroyed)",
        r"page (closed|crashed)",
        r"session (not found|closed|disconnected)",
        r"channel (closed|disconnected)",
        r"channel.*send",
        r"websocket (closed|error|disconnected)",
        r"connection (closed|reset)",
        r"no response from.*chrom",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// An anchor as read from the DOM, before any filtering
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLink {
    pub href: String,
    pub text: String,
    pub aria_label: Option<String>,
}

/// Capabilities required from the host browser page
///
/// Every method is a single bounded round trip. Waiting and retrying is the
/// caller's business.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate and wait for the document to load, bounded by `timeout`
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), DriverError>;

    /// Current resolved address (after redirects)
    async fn current_url(&self) -> Result<String, DriverError>;

    /// Rendered text of `document.body`
    async fn body_text(&self) -> Result<String, DriverError>;

    /// Whether any element matches `selector`
    async fn has_element(&self, selector: &str) -> Result<bool, DriverError>;

    /// Whether the first element matching `selector` is rendered and visible
    async fn is_visible(&self, selector: &str) -> Result<bool, DriverError>;

    /// Evaluate a JavaScript expression (promises are awaited) and return its JSON value
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, DriverError>;

    /// All `a[href]` anchors inside the first element matching `container`.
    /// A missing container yields an empty list.
    async fn links_in(&self, container: &str) -> Result<Vec<RawLink>, DriverError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_session_loss_messages() {
        for message in [
            "Target closed",
            "Browser has been closed",
            "WebSocket closed unexpectedly",
            "session not found",
        ] {
            assert!(
                DriverError::classify(message).is_session_closed(),
                "{message} should be session loss"
            );
        }
    }

    #[test]
    fn other_messages_are_protocol_errors() {
        let err = DriverError::classify("Cannot find context with specified id");
        assert_eq!(
            err,
            DriverError::Protocol("Cannot find context with specified id".to_string())
        );
    }
}
