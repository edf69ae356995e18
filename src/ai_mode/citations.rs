//! Citation extraction from the live answer DOM
//!
//! The in-page script marks every visible citation anchor with a
//! `[CITE-<id>]` token, clicks it and records the sources the sidebar shows.
//! Its output is validated and re-filtered here before anything downstream
//! sees it. When no anchor produced a source, the sidebar is read once from
//! the host side instead.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use super::config::ScrapeConfig;
use super::error::ScrapeError;
use super::types::{CitationGroup, Source};
use crate::browser::{DriverError, PageDriver, RawLink};
use crate::utils::constants::SHOW_MORE_EXPAND_WAIT_MS;

const EXTRACT_CITATIONS_JS: &str = include_str!("js/extract_citations.js");

/// Captured answer HTML plus the citation groups found in it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub html: String,
    pub groups: Vec<CitationGroup>,
    /// True when `groups` came from the host-side sidebar scrape
    pub used_fallback: bool,
}

impl Extraction {
    pub fn source_count(&self) -> usize {
        self.groups.iter().map(|g| g.sources.len()).sum()
    }
}

/// Options handed to the in-page script
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScriptOptions<'a> {
    container: &'a str,
    sidebar: &'a str,
    citation_selectors: &'a [String],
    skip_domains: &'a [String],
    show_more: &'a [String],
    expand_wait_ms: u64,
    click_wait_ms: u64,
    click_poll_ms: u64,
    settle_ms: u64,
}

/// Shape returned by the in-page script
#[derive(Debug, Deserialize)]
struct ScriptOutcome {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    html: Option<String>,
    #[serde(default)]
    citations: Vec<ScriptGroup>,
}

#[derive(Debug, Deserialize)]
struct ScriptGroup {
    marker_id: u32,
    #[serde(default)]
    sources: Vec<ScriptSource>,
}

#[derive(Debug, Deserialize)]
struct ScriptSource {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
}

/// Admission rules for a source URL
#[derive(Debug, Clone)]
pub struct SourceFilter {
    skip_domains: Vec<String>,
}

impl SourceFilter {
    pub fn new(skip_domains: Vec<String>) -> Self {
        Self { skip_domains }
    }

    /// Absolute `http(s)` URL with a host, not on the skip list
    pub fn admit(&self, title: &str, url: &str) -> Option<Source> {
        if !url.starts_with("http") {
            return None;
        }
        if self.skip_domains.iter().any(|d| url.contains(d.as_str())) {
            return None;
        }
        let host = Url::parse(url).ok()?.host_str()?.to_string();
        Some(Source {
            title: title.trim().to_string(),
            url: url.to_string(),
            source: host,
        })
    }

    /// Filter and deduplicate by URL, keeping first-seen order
    pub fn collect<'a, I>(&self, candidates: I) -> Vec<Source>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .filter_map(|(title, url)| self.admit(title, url))
            .filter(|source| seen.insert(source.url.clone()))
            .collect()
    }
}

pub struct CitationExtractor {
    container: String,
    sidebar: String,
    citation_selectors: Vec<String>,
    show_more: Vec<String>,
    click_wait_ms: u64,
    click_poll_ms: u64,
    settle_ms: u64,
    filter: SourceFilter,
}

impl CitationExtractor {
    pub fn new(config: &ScrapeConfig) -> Self {
        Self {
            container: config.selectors.main_container.clone(),
            sidebar: config.selectors.sidebar.clone(),
            citation_selectors: config.selectors.citation_anchors.clone(),
            show_more: config.phrases.show_more.clone(),
            click_wait_ms: config.timing.click_wait_ms,
            click_poll_ms: config.timing.click_poll_ms,
            settle_ms: config.timing.settle_ms,
            filter: SourceFilter::new(config.skip_domains.clone()),
        }
    }

    /// Run the in-page script and collect citation groups
    pub async fn extract(&self, page: &dyn PageDriver) -> Result<Extraction, ScrapeError> {
        let script = self.script()?;

        let value = page.evaluate(&script).await.map_err(|e| match e {
            DriverError::SessionClosed(message) => ScrapeError::BrowserClosedByUser(message),
            other => ScrapeError::Extraction(format!("citation script failed: {other}")),
        })?;

        let outcome: ScriptOutcome = serde_json::from_value(value)
            .map_err(|e| ScrapeError::Extraction(format!("unexpected citation script result: {e}")))?;

        if let Some(error) = outcome.error {
            return Err(ScrapeError::Extraction(error));
        }
        let html = outcome
            .html
            .ok_or_else(|| ScrapeError::Extraction("citation script returned no HTML".into()))?;

        let groups: Vec<CitationGroup> = outcome
            .citations
            .into_iter()
            .map(|group| CitationGroup {
                marker_id: group.marker_id,
                sources: self.filter.collect(
                    group
                        .sources
                        .iter()
                        .map(|s| (s.title.as_str(), s.url.as_str())),
                ),
            })
            .collect();

        debug!("DOM injection: {} citation groups", groups.len());

        if groups.iter().any(|g| !g.sources.is_empty()) {
            let extraction = Extraction {
                html,
                groups,
                used_fallback: false,
            };
            info!(
                "Extracted {} sources in {} citation groups",
                extraction.source_count(),
                extraction.groups.len()
            );
            return Ok(extraction);
        }

        info!("No citations from DOM, trying sidebar fallback...");
        let fallback = self.sidebar_fallback(page).await?;
        if fallback.is_empty() {
            warn!("No sources found (DOM and sidebar both empty)");
            return Ok(Extraction {
                html,
                groups,
                used_fallback: false,
            });
        }

        info!("Sidebar fallback: {} sources", fallback.len());
        Ok(Extraction {
            html,
            groups: vec![CitationGroup {
                marker_id: 0,
                sources: fallback,
            }],
            used_fallback: true,
        })
    }

    /// Host-side read of the sidebar, without clicking anything
    async fn sidebar_fallback(&self, page: &dyn PageDriver) -> Result<Vec<Source>, ScrapeError> {
        let links = match page.links_in(&self.sidebar).await {
            Ok(links) => links,
            Err(DriverError::SessionClosed(message)) => {
                return Err(ScrapeError::BrowserClosedByUser(message));
            }
            Err(e) => {
                warn!("Sidebar fallback failed: {}", e);
                return Ok(Vec::new());
            }
        };

        Ok(self
            .filter
            .collect(links.iter().map(|link| (link_title(link), link.href.as_str()))))
    }

    fn script(&self) -> Result<String, ScrapeError> {
        let options = ScriptOptions {
            container: &self.container,
            sidebar: &self.sidebar,
            citation_selectors: &self.citation_selectors,
            skip_domains: &self.filter.skip_domains,
            show_more: &self.show_more,
            expand_wait_ms: SHOW_MORE_EXPAND_WAIT_MS,
            click_wait_ms: self.click_wait_ms,
            click_poll_ms: self.click_poll_ms,
            settle_ms: self.settle_ms,
        };
        let options = serde_json::to_string(&options)
            .map_err(|e| ScrapeError::Unknown(format!("serializing script options: {e}")))?;
        Ok(format!("({})({})", EXTRACT_CITATIONS_JS.trim(), options))
    }
}

/// Visible text, falling back to the accessible label
fn link_title(link: &RawLink) -> &str {
    let text = link.text.trim();
    if text.is_empty() {
        link.aria_label.as_deref().unwrap_or("")
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> SourceFilter {
        SourceFilter::new(ScrapeConfig::default().skip_domains)
    }

    #[test]
    fn filter_rejects_relative_and_platform_urls() {
        let f = filter();
        assert!(f.admit("x", "/url?q=abc").is_none());
        assert!(f.admit("x", "https://www.google.com/search?q=a").is_none());
        assert!(f.admit("x", "https://fonts.gstatic.com/s/a.woff").is_none());
        assert!(f.admit("x", "mailto:someone@example.com").is_none());

        let source = f.admit("  Rust Blog ", "https://blog.rust-lang.org/2024/").unwrap();
        assert_eq!(source.title, "Rust Blog");
        assert_eq!(source.source, "blog.rust-lang.org");
    }

    #[test]
    fn collect_deduplicates_within_one_pass() {
        let sources = filter().collect([
            ("A", "https://a.example/1"),
            ("A again", "https://a.example/1"),
            ("B", "https://b.example/"),
        ]);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].title, "A");
        assert_eq!(sources[1].source, "b.example");
    }

    #[test]
    fn script_embeds_options_as_json() {
        let extractor = CitationExtractor::new(&ScrapeConfig::default());
        let script = extractor.script().unwrap();
        assert!(script.starts_with("(async (opts) =>"));
        assert!(script.contains(r#""container":"[data-container-id=\"main-col\"]""#));
        assert!(script.contains(r#""clickWaitMs":300"#));
        assert!(script.contains(r#""skipDomains":["google.com""#));
    }

    #[test]
    fn link_title_prefers_visible_text() {
        let link = RawLink {
            href: "https://a.example".into(),
            text: "  ".into(),
            aria_label: Some("Label".into()),
        };
        assert_eq!(link_title(&link), "Label");
    }
}
