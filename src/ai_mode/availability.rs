//! Region/language restriction check

use tracing::{debug, error};

use super::config::ScrapeConfig;
use super::types::{DetectionLayer, DetectionSignal};
use crate::browser::PageDriver;

#[derive(Debug, Clone)]
pub struct AvailabilityChecker {
    phrases: Vec<String>,
}

impl AvailabilityChecker {
    pub fn new(config: &ScrapeConfig) -> Self {
        Self {
            phrases: config.phrases.unavailable.clone(),
        }
    }

    /// False only if a restriction banner is positively present.
    /// An unreadable page is assumed available; this check never blocks.
    pub async fn is_available(&self, page: &dyn PageDriver) -> bool {
        match page.body_text().await {
            Ok(body) => match self.match_banner(&body) {
                Some(signal) => {
                    error!("AI Mode not available in this region/language ('{}')", signal.matched);
                    false
                }
                None => {
                    debug!("AI Mode available, proceeding...");
                    true
                }
            },
            Err(e) => {
                debug!("Could not check AI Mode availability: {}", e);
                true
            }
        }
    }

    pub fn match_banner(&self, body: &str) -> Option<DetectionSignal> {
        self.phrases
            .iter()
            .find(|phrase| body.contains(phrase.as_str()))
            .map(|phrase| DetectionSignal::new(DetectionLayer::Unavailable, phrase.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_banner_in_any_configured_language() {
        let checker = AvailabilityChecker::new(&ScrapeConfig::default());
        assert!(checker
            .match_banner("… Le Mode IA n'est pas disponible dans votre pays ou votre langue …")
            .is_some());
        assert!(checker.match_banner("AI Mode isn't available right now").is_some());
        assert!(checker.match_banner("Here is your answer about Rust").is_none());
    }
}
