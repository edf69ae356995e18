//! Anti-bot challenge detection
//!
//! Four independent layers, evaluated in fixed priority order:
//!
//! 1. Address: the engine redirects challenged clients to a fixed path
//! 2. Text: "unusual traffic" wording in any configured language
//! 3. Length: challenge pages are tiny; only counts together with a keyword
//!    so that legitimately short answers are not flagged
//! 4. Structural: known challenge widgets (legacy backup)
//!
//! A layer whose read fails counts as "no match" for that layer.

use tracing::{debug, info};

use super::config::ScrapeConfig;
use super::types::{DetectionLayer, DetectionSignal};
use crate::browser::PageDriver;

#[derive(Debug, Clone)]
pub struct ChallengeDetector {
    paths: Vec<String>,
    phrases: Vec<String>,
    keywords: Vec<String>,
    widgets: Vec<String>,
    short_page_threshold: usize,
}

impl ChallengeDetector {
    pub fn new(config: &ScrapeConfig) -> Self {
        let lower = |items: &[String]| items.iter().map(|s| s.to_lowercase()).collect();
        Self {
            paths: config.phrases.challenge_paths.clone(),
            phrases: lower(&config.phrases.challenge),
            keywords: lower(&config.phrases.challenge_keywords),
            widgets: config.selectors.challenge_widgets.clone(),
            short_page_threshold: config.timing.short_page_threshold,
        }
    }

    /// True if any layer confirms a challenge
    pub async fn detect(&self, page: &dyn PageDriver) -> bool {
        self.inspect(page).await.is_some()
    }

    /// First confirmed layer, if any
    pub async fn inspect(&self, page: &dyn PageDriver) -> Option<DetectionSignal> {
        if let Ok(url) = page.current_url().await
            && let Some(signal) = self.match_address(&url)
        {
            info!("CAPTCHA detected (address contains '{}')", signal.matched);
            return Some(signal);
        }

        match page.body_text().await {
            Ok(body) => {
                if let Some(signal) = self.match_text(&body).or_else(|| self.match_length(&body)) {
                    info!(
                        "CAPTCHA detected ({:?} layer matched '{}')",
                        signal.layer, signal.matched
                    );
                    return Some(signal);
                }
            }
            Err(e) => debug!("Body text unavailable for challenge check: {}", e),
        }

        for selector in &self.widgets {
            if let Ok(true) = page.has_element(selector).await {
                info!("CAPTCHA detected (element {} found)", selector);
                return Some(DetectionSignal::new(DetectionLayer::Structural, selector.clone()));
            }
        }

        None
    }

    pub fn match_address(&self, url: &str) -> Option<DetectionSignal> {
        self.paths
            .iter()
            .find(|path| url.contains(path.as_str()))
            .map(|path| DetectionSignal::new(DetectionLayer::Address, path.clone()))
    }

    pub fn match_text(&self, body: &str) -> Option<DetectionSignal> {
        let body_lower = body.to_lowercase();
        self.phrases
            .iter()
            .find(|phrase| body_lower.contains(phrase.as_str()))
            .map(|phrase| DetectionSignal::new(DetectionLayer::Text, phrase.clone()))
    }

    pub fn match_length(&self, body: &str) -> Option<DetectionSignal> {
        let trimmed = body.trim();
        if trimmed.chars().count() >= self.short_page_threshold {
            return None;
        }
        let body_lower = trimmed.to_lowercase();
        self.keywords
            .iter()
            .find(|keyword| body_lower.contains(keyword.as_str()))
            .map(|keyword| DetectionSignal::new(DetectionLayer::Length, keyword.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> ChallengeDetector {
        ChallengeDetector::new(&ScrapeConfig::default())
    }

    fn padded(text: &str, len: usize) -> String {
        let mut body = text.to_string();
        while body.chars().count() < len {
            body.push('x');
        }
        body
    }

    #[test]
    fn address_layer_matches_challenge_path() {
        let signal = detector()
            .match_address("https://www.google.com/sorry/index?continue=abc")
            .unwrap();
        assert_eq!(signal.layer, DetectionLayer::Address);
        assert!(detector().match_address("https://www.google.com/search?q=a").is_none());
    }

    #[test]
    fn text_layer_is_case_insensitive_and_multilingual() {
        let d = detector();
        assert!(d.match_text("Our systems have detected UNUSUAL TRAFFIC").is_some());
        assert!(d.match_text("Unsere Systeme haben ungewöhnlichen Datenverkehr").is_some());
        assert!(d.match_text("Rust is a systems language").is_none());
    }

    #[test]
    fn short_page_with_keyword_is_a_challenge() {
        let body = padded("Please solve this captcha ", 550);
        let signal = detector().match_length(&body).unwrap();
        assert_eq!(signal.layer, DetectionLayer::Length);
        assert_eq!(signal.matched, "captcha");
    }

    #[test]
    fn short_page_without_keyword_is_not_a_challenge() {
        let body = padded("A short but legitimate answer ", 300);
        assert!(detector().match_length(&body).is_none());
    }

    #[test]
    fn long_page_with_keyword_is_not_flagged_by_length() {
        let body = padded("An article about captcha design ", 2_000);
        assert!(detector().match_length(&body).is_none());
    }
}
