//! Data structures exchanged between the pipeline stages

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use url::Url;

use crate::utils::constants::{AI_MODE_UDM, SEARCH_URL};

/// One outbound reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,

    /// Absolute URL, always starting with `http`
    pub url: String,

    /// Host domain of `url`
    pub source: String,
}

/// The sources revealed by clicking one citation anchor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationGroup {
    /// Id of the `[CITE-<id>]` token inserted after the anchor
    pub marker_id: u32,

    /// Sources in sidebar order, unique by URL within this group
    #[serde(default)]
    pub sources: Vec<Source>,
}

impl CitationGroup {
    /// Literal placeholder for this group in captured content
    pub fn token(&self) -> String {
        marker_token(self.marker_id)
    }
}

/// `[CITE-<id>]`
pub fn marker_token(marker_id: u32) -> String {
    format!("[CITE-{marker_id}]")
}

/// One query to execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeRequest {
    query: String,
}

impl ScrapeRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// AI-mode results URL for this query
    pub fn search_url(&self) -> String {
        match Url::parse(SEARCH_URL) {
            Ok(mut url) => {
                url.query_pairs_mut()
                    .append_pair("udm", AI_MODE_UDM)
                    .append_pair("q", &self.query);
                url.to_string()
            }
            Err(_) => format!("{SEARCH_URL}?udm={AI_MODE_UDM}&q={}", self.query.replace(' ', "+")),
        }
    }
}

/// Failure categories, stable across the process boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    PageLoadError,
    CaptchaRequired,
    AiModeNotAvailable,
    BrowserClosedByUser,
    ExtractionError,
    Interrupted,
    Unknown,
}

impl ErrorKind {
    /// Process exit code for this failure
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::CaptchaRequired => 2,
            ErrorKind::BrowserClosedByUser => 3,
            ErrorKind::AiModeNotAvailable => 4,
            ErrorKind::Interrupted => 130,
            ErrorKind::PageLoadError | ErrorKind::ExtractionError | ErrorKind::Unknown => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::PageLoadError => "PAGE_LOAD_ERROR",
            ErrorKind::CaptchaRequired => "CAPTCHA_REQUIRED",
            ErrorKind::AiModeNotAvailable => "AI_MODE_NOT_AVAILABLE",
            ErrorKind::BrowserClosedByUser => "BROWSER_CLOSED_BY_USER",
            ErrorKind::ExtractionError => "EXTRACTION_ERROR",
            ErrorKind::Interrupted => "INTERRUPTED",
            ErrorKind::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeSuccess {
    pub markdown: String,
    pub sources: Vec<Source>,
    pub source_url: String,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeFailure {
    pub error: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// Final outcome of one `scrape` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeResult {
    Success(ScrapeSuccess),
    Failure(ScrapeFailure),
}

impl ScrapeResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ScrapeResult::Success(_))
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            ScrapeResult::Success(_) => None,
            ScrapeResult::Failure(failure) => Some(failure.error),
        }
    }

    /// 0 on success, otherwise the failure's exit code
    pub fn exit_code(&self) -> i32 {
        self.error_kind().map(ErrorKind::exit_code).unwrap_or(0)
    }

    /// `{success: true, ...}` / `{success: false, error, message, suggestion?}`
    pub fn to_json(&self) -> Value {
        match self {
            ScrapeResult::Success(s) => json!({
                "success": true,
                "markdown": s.markdown,
                "sources": s.sources,
                "source_url": s.source_url,
                "query": s.query,
            }),
            ScrapeResult::Failure(f) => {
                let mut value = json!({
                    "success": false,
                    "error": f.error,
                    "message": f.message,
                });
                if let Some(suggestion) = &f.suggestion {
                    value["suggestion"] = json!(suggestion);
                }
                value
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_url_selects_ai_mode_and_encodes_query() {
        let request = ScrapeRequest::new("rust async & tokio");
        assert_eq!(
            request.search_url(),
            "https://www.google.com/search?udm=50&q=rust+async+%26+tokio"
        );
    }

    #[test]
    fn exit_codes_follow_process_contract() {
        assert_eq!(ErrorKind::CaptchaRequired.exit_code(), 2);
        assert_eq!(ErrorKind::BrowserClosedByUser.exit_code(), 3);
        assert_eq!(ErrorKind::AiModeNotAvailable.exit_code(), 4);
        assert_eq!(ErrorKind::Interrupted.exit_code(), 130);
        assert_eq!(ErrorKind::PageLoadError.exit_code(), 1);
        assert_eq!(ErrorKind::Unknown.exit_code(), 1);
    }

    #[test]
    fn failure_json_omits_missing_suggestion() {
        let result = ScrapeResult::Failure(ScrapeFailure {
            error: ErrorKind::CaptchaRequired,
            message: "challenge".to_string(),
            suggestion: None,
        });
        let json = result.to_json();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "CAPTCHA_REQUIRED");
        assert!(json.get("suggestion").is_none());
        assert!(json.get("markdown").is_none());
    }

    #[test]
    fn success_json_carries_sources() {
        let result = ScrapeResult::Success(ScrapeSuccess {
            markdown: "Answer [1]".to_string(),
            sources: vec![Source {
                title: "A".to_string(),
                url: "https://a.example/".to_string(),
                source: "a.example".to_string(),
            }],
            source_url: "https://www.google.com/search?udm=50&q=a".to_string(),
            query: "a".to_string(),
        });
        let json = result.to_json();
        assert_eq!(json["success"], true);
        assert_eq!(json["sources"][0]["source"], "a.example");
        assert_eq!(result.exit_code(), 0);
    }
}

/// Which independent check produced a detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectionLayer {
    /// Resolved address contains a challenge path
    Address,
    /// Body text contains an "unusual traffic" phrase
    Text,
    /// Short page that also mentions a challenge keyword
    Length,
    /// A known challenge widget is present
    Structural,
    /// Region/language restriction banner
    Unavailable,
}

/// One challenge/availability match; transient, never stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionSignal {
    pub layer: DetectionLayer,
    /// Phrase, address fragment or selector that matched
    pub matched: String,
}

impl DetectionSignal {
    pub fn new(layer: DetectionLayer, matched: impl Into<String>) -> Self {
        Self {
            layer,
            matched: matched.into(),
        }
    }
}
