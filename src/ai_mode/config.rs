//! Immutable configuration for the extraction pipeline
//!
//! Locale coverage lives here, in explicit tables keyed by detection purpose,
//! so the stages contain no hard-coded phrases or selectors. Every field has a
//! serde default, which lets `config.yaml` override individual entries.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::utils::constants::{
    CDP_REQUEST_MARGIN_MS, CITATION_CLICK_POLL_MS, CITATION_CLICK_WAIT_MS, CITATION_SETTLE_MS,
    COMPLETION_DEADLINE_MS, COMPLETION_METHOD_TIMEOUT_MS, EXTRACTION_TIMEOUT_MS,
    MARKER_POLL_INTERVAL_MS, PAGE_LOAD_TIMEOUT_MS, SHORT_PAGE_THRESHOLD, TEXT_POLL_INTERVAL_MS,
};
use crate::utils::{ConfigError, validate_navigation_timeout, validate_wait_timeout};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Multilingual literal phrases, one table per detection purpose
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseTables {
    /// Address fragments of the challenge page
    #[serde(default = "default_challenge_paths")]
    pub challenge_paths: Vec<String>,

    /// "Unusual traffic" phrases, matched case-insensitively
    #[serde(default = "default_challenge_phrases")]
    pub challenge: Vec<String>,

    /// Generic keywords that confirm a suspiciously short page is a challenge
    #[serde(default = "default_challenge_keywords")]
    pub challenge_keywords: Vec<String>,

    /// "Not available in your country or language" banners
    #[serde(default = "default_unavailable_phrases")]
    pub unavailable: Vec<String>,

    /// Text that only appears once generation has finished
    #[serde(default = "default_complete_phrases")]
    pub complete: Vec<String>,

    /// Disclaimer lead-ins; everything from here on is discarded
    #[serde(default = "default_cutoff_phrases")]
    pub cutoff: Vec<String>,

    /// Labels of collapsed "show more" controls
    #[serde(default = "default_show_more_labels")]
    pub show_more: Vec<String>,
}

fn default_challenge_paths() -> Vec<String> {
    strings(&["/sorry/index", "google.com/sorry"])
}

fn default_challenge_phrases() -> Vec<String> {
    strings(&[
        "unusual traffic",
        "our systems have detected",
        "ungewöhnlichen datenverkehr",
        "unsere systeme haben",
    ])
}

fn default_challenge_keywords() -> Vec<String> {
    strings(&["captcha", "unusual", "über diese seite"])
}

fn default_unavailable_phrases() -> Vec<String> {
    strings(&[
        // English
        "AI Mode is not available in your country or language",
        "AI Mode isn't available",
        // German
        "Der KI-Modus ist in Ihrem Land oder Ihrer Sprache nicht verfügbar",
        "KI-Modus ist nicht verfügbar",
        // French
        "Le Mode IA n'est pas disponible dans votre pays ou votre langue",
        "Mode IA n'est pas disponible",
        "Découvrez le Mode IA",
        // Spanish
        "El modo de IA no está disponible en tu país o idioma",
        // Italian
        "La modalità IA non è disponibile nel tuo Paese o nella tua lingua",
        // Dutch
        "AI-modus is niet beschikbaar in uw land of taal",
    ])
}

fn default_complete_phrases() -> Vec<String> {
    strings(&[
        // English
        "AI-generated",
        "AI Overview",
        "Generative AI is experimental",
        // German
        "KI-Antworten",
        "KI-generiert",
        "Generative KI",
        // Dutch
        "AI-gegenereerd",
        "AI-overzicht",
        // Spanish
        "Las respuestas de la IA",
        "Resumen de IA",
        "Información general de IA",
        // French
        "Réponses IA",
        "Aperçu de l'IA",
        "Vue d'ensemble de l'IA",
        // Italian
        "Risposte IA",
        "Panoramica IA",
        "Panoramica dell'IA",
    ])
}

fn default_cutoff_phrases() -> Vec<String> {
    strings(&[
        // English
        "AI-generated answers may contain mistakes",
        "AI can make mistakes",
        "Generative AI is experimental",
        // German
        "KI-Antworten können Fehler enthalten",
        "Öffentlicher Link wird erstellt",
        // Dutch
        "AI-reacties kunnen fouten bevatten",
        // Spanish
        "Las respuestas de la IA pueden contener errores",
        "pueden contener errores",
        // French
        "Les réponses de l'IA peuvent contenir des erreurs",
        "peuvent contenir des erreurs",
        // Italian
        "Le risposte dell'IA possono contenere errori",
        "possono contenere errori",
    ])
}

fn default_show_more_labels() -> Vec<String> {
    strings(&["Show more", "Mehr anzeigen", "Meer weergeven"])
}

impl Default for PhraseTables {
    fn default() -> Self {
        Self {
            challenge_paths: default_challenge_paths(),
            challenge: default_challenge_phrases(),
            challenge_keywords: default_challenge_keywords(),
            unavailable: default_unavailable_phrases(),
            complete: default_complete_phrases(),
            cutoff: default_cutoff_phrases(),
            show_more: default_show_more_labels(),
        }
    }
}

/// CSS selectors for the regions and controls of the results page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Container holding the generated answer
    #[serde(default = "default_main_container")]
    pub main_container: String,

    /// Sidebar that lists sources for the clicked citation
    #[serde(default = "default_sidebar")]
    pub sidebar: String,

    /// Citation anchors, tried in order; the first with a visible match wins
    #[serde(default = "default_citation_anchors")]
    pub citation_anchors: Vec<String>,

    /// Language-independent icon shown once generation is done (thumbs up)
    #[serde(default = "default_primary_marker")]
    pub primary_completion_marker: String,

    /// Language-independent feedback control
    #[serde(default = "default_secondary_marker")]
    pub secondary_completion_marker: String,

    /// Known challenge widgets
    #[serde(default = "default_challenge_widgets")]
    pub challenge_widgets: Vec<String>,
}

fn default_main_container() -> String {
    r#"[data-container-id="main-col"]"#.to_string()
}

fn default_sidebar() -> String {
    r#"[data-container-id="rhs-col"]"#.to_string()
}

fn default_citation_anchors() -> Vec<String> {
    strings(&[
        r#"[aria-label="View related links"]"#,
        r#"[aria-label*="Related links"]"#,
        r#"[aria-label="Zugehörige Links anzeigen"]"#,
        r#"[aria-label*="Zugehörige Links"]"#,
        r#"[aria-label*="Gerelateerde links"]"#,
        r#"button[aria-label*="links" i]"#,
    ])
}

fn default_primary_marker() -> String {
    r#"button svg[viewBox="3 3 18 18"]"#.to_string()
}

fn default_secondary_marker() -> String {
    r#"[aria-label*="feedback" i]"#.to_string()
}

fn default_challenge_widgets() -> Vec<String> {
    strings(&[
        "div#recaptcha",
        r#"iframe[src*="recaptcha"]"#,
        r#"[id*="captcha"]"#,
    ])
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            main_container: default_main_container(),
            sidebar: default_sidebar(),
            citation_anchors: default_citation_anchors(),
            primary_completion_marker: default_primary_marker(),
            secondary_completion_marker: default_secondary_marker(),
            challenge_widgets: default_challenge_widgets(),
        }
    }
}

/// Timeouts and polling intervals, all in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_page_load_ms")]
    pub page_load_ms: u64,

    /// Shared budget for the whole completion cascade
    #[serde(default = "default_completion_deadline_ms")]
    pub completion_deadline_ms: u64,

    /// Cap for each marker method inside the cascade
    #[serde(default = "default_completion_method_ms")]
    pub completion_method_ms: u64,

    #[serde(default = "default_marker_poll_ms")]
    pub marker_poll_ms: u64,

    #[serde(default = "default_text_poll_ms")]
    pub text_poll_ms: u64,

    #[serde(default = "default_click_wait_ms")]
    pub click_wait_ms: u64,

    #[serde(default = "default_click_poll_ms")]
    pub click_poll_ms: u64,

    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Bound on the whole citation script run
    #[serde(default = "default_extraction_ms")]
    pub extraction_ms: u64,

    /// Character count below which a page is suspected to be a challenge
    #[serde(default = "default_short_page_threshold")]
    pub short_page_threshold: usize,
}

fn default_page_load_ms() -> u64 {
    PAGE_LOAD_TIMEOUT_MS
}
fn default_completion_deadline_ms() -> u64 {
    COMPLETION_DEADLINE_MS
}
fn default_completion_method_ms() -> u64 {
    COMPLETION_METHOD_TIMEOUT_MS
}
fn default_marker_poll_ms() -> u64 {
    MARKER_POLL_INTERVAL_MS
}
fn default_text_poll_ms() -> u64 {
    TEXT_POLL_INTERVAL_MS
}
fn default_click_wait_ms() -> u64 {
    CITATION_CLICK_WAIT_MS
}
fn default_click_poll_ms() -> u64 {
    CITATION_CLICK_POLL_MS
}
fn default_settle_ms() -> u64 {
    CITATION_SETTLE_MS
}
fn default_extraction_ms() -> u64 {
    EXTRACTION_TIMEOUT_MS
}
fn default_short_page_threshold() -> usize {
    SHORT_PAGE_THRESHOLD
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            page_load_ms: default_page_load_ms(),
            completion_deadline_ms: default_completion_deadline_ms(),
            completion_method_ms: default_completion_method_ms(),
            marker_poll_ms: default_marker_poll_ms(),
            text_poll_ms: default_text_poll_ms(),
            click_wait_ms: default_click_wait_ms(),
            click_poll_ms: default_click_poll_ms(),
            settle_ms: default_settle_ms(),
            extraction_ms: default_extraction_ms(),
            short_page_threshold: default_short_page_threshold(),
        }
    }
}

impl TimingConfig {
    pub fn page_load(&self) -> Duration {
        Duration::from_millis(self.page_load_ms)
    }

    pub fn completion_deadline(&self) -> Duration {
        Duration::from_millis(self.completion_deadline_ms)
    }

    pub fn completion_method(&self) -> Duration {
        Duration::from_millis(self.completion_method_ms)
    }

    pub fn marker_poll(&self) -> Duration {
        Duration::from_millis(self.marker_poll_ms)
    }

    pub fn text_poll(&self) -> Duration {
        Duration::from_millis(self.text_poll_ms)
    }

    pub fn extraction(&self) -> Duration {
        Duration::from_millis(self.extraction_ms)
    }

    /// Timeout for individual CDP requests
    ///
    /// The browser handler evicts any command older than this, so it must
    /// outlast navigation and the citation script.
    pub fn request_timeout(&self) -> Duration {
        let longest = self
            .page_load_ms
            .max(self.extraction_ms)
            .max(self.completion_method_ms);
        Duration::from_millis(longest + CDP_REQUEST_MARGIN_MS)
    }
}

/// Everything the pipeline stages need, fixed at construction time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeConfig {
    #[serde(default)]
    pub phrases: PhraseTables,

    #[serde(default)]
    pub selectors: SelectorConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    /// The host platform's own domains; never recorded as sources
    #[serde(default = "default_skip_domains")]
    pub skip_domains: Vec<String>,
}

fn default_skip_domains() -> Vec<String> {
    strings(&["google.com", "google.de", "gstatic.com", "support.google.com"])
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            phrases: PhraseTables::default(),
            selectors: SelectorConfig::default(),
            timing: TimingConfig::default(),
            skip_domains: default_skip_domains(),
        }
    }
}

impl ScrapeConfig {
    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.timing;
        validate_navigation_timeout("page_load_ms", t.page_load_ms)?;
        validate_wait_timeout("completion_deadline_ms", t.completion_deadline_ms)?;
        validate_wait_timeout("completion_method_ms", t.completion_method_ms)?;
        validate_wait_timeout("marker_poll_ms", t.marker_poll_ms)?;
        validate_wait_timeout("text_poll_ms", t.text_poll_ms)?;
        validate_wait_timeout("click_wait_ms", t.click_wait_ms)?;
        validate_wait_timeout("click_poll_ms", t.click_poll_ms)?;
        validate_navigation_timeout("extraction_ms", t.extraction_ms)?;

        if self.selectors.citation_anchors.is_empty() {
            return Err(ConfigError::EmptySelectorList("citation_anchors"));
        }
        if self.selectors.main_container.trim().is_empty() {
            return Err(ConfigError::EmptySelectorList("main_container"));
        }
        if self.phrases.complete.is_empty() {
            return Err(ConfigError::EmptyPhraseTable("complete"));
        }
        Ok(())
    }
}
