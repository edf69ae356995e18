//! Captured answer HTML to footnoted Markdown
//!
//! Every step is a pure function over strings, applied in a fixed order.
//! Citation tokens survive conversion as literal text and are only replaced
//! by footnote runs at the very end.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::node::Text;
use scraper::{Html, Node, Selector};
use tracing::debug;

use super::config::ScrapeConfig;
use super::types::{CitationGroup, Source};

static CODE_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("pre a[href], code a[href]").expect("selector is valid"));

/// Tokens the converter escaped or wrapped in backticks
static ESCAPED_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"`?\\*\[\s*CITE\\?-(\d+)\s*\\*\]`?").expect("pattern is valid")
});
static ANY_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[CITE-\d+\]").expect("pattern is valid"));

static DATA_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[[^\]]*\]\(data:image/[^)]+\)").expect("pattern is valid"));
static EMPTY_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\]\([^)]+\)").expect("pattern is valid"));

static BROKEN_BEFORE_BOLD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([^.!?:;\n])\n+\s*(\*\*)").expect("pattern is valid"));
static BROKEN_BEFORE_LOWERCASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([^.!?:;\n])\n+\s*([a-zäöü])").expect("pattern is valid"));

static ORPHAN_DOT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*\.\s*$").expect("pattern is valid"));
static EXCESS_BLANK_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("pattern is valid"));

/// Final Markdown plus the sources it references, in footnote order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub markdown: String,
    pub sources: Vec<Source>,
}

pub struct ContentTransformer {
    cutoff_phrases: Vec<String>,
}

impl ContentTransformer {
    pub fn new(config: &ScrapeConfig) -> Self {
        Self {
            cutoff_phrases: config.phrases.cutoff.clone(),
        }
    }

    pub fn transform(&self, raw_html: &str, groups: &[CitationGroup]) -> Rendered {
        let html = pre_clean(raw_html);
        let markdown = html2md::parse_html(&html);
        let markdown = normalize_tokens(&markdown);
        let markdown = strip_artifacts(&markdown);
        let markdown = self.cut_disclaimer(&markdown);
        let markdown = merge_broken_lines(&markdown);
        let markdown = tidy(&markdown);

        let (mut markdown, sources) = embed_citations(&markdown, groups);
        debug!("Total sources embedded: {}", sources.len());

        if !sources.is_empty() {
            markdown.push_str(&sources_section(&sources));
        }

        Rendered { markdown, sources }
    }

    /// Truncate at the earliest disclaimer phrase, if any
    pub fn cut_disclaimer(&self, markdown: &str) -> String {
        let earliest = self
            .cutoff_phrases
            .iter()
            .filter(|phrase| !phrase.is_empty())
            .filter_map(|phrase| markdown.find(phrase.as_str()).map(|pos| (pos, phrase)))
            .min_by_key(|(pos, _)| *pos);

        match earliest {
            Some((pos, phrase)) => {
                debug!("Cut off content at marker: {}", phrase);
                markdown[..pos].to_string()
            }
            None => markdown.to_string(),
        }
    }
}

/// Replace links inside `<pre>`/`<code>` with their bare URL
pub fn pre_clean(html: &str) -> String {
    let mut document = Html::parse_fragment(html);

    let links: Vec<_> = document
        .select(&CODE_LINK)
        .filter_map(|link| {
            let href = link.value().attr("href")?;
            Some((link.id(), href.to_string()))
        })
        .collect();
    if links.is_empty() {
        return html.to_string();
    }

    for (id, href) in links {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.insert_before(Node::Text(Text { text: href.into() }));
            node.detach();
        }
    }

    document.root_element().inner_html()
}

pub fn normalize_tokens(markdown: &str) -> String {
    ESCAPED_TOKEN.replace_all(markdown, "[CITE-$1]").into_owned()
}

/// Drop highlight markers, inline data images and empty links
pub fn strip_artifacts(markdown: &str) -> String {
    let markdown = markdown.replace("==", "");
    let markdown = DATA_IMAGE.replace_all(&markdown, "");
    EMPTY_LINK.replace_all(&markdown, "").into_owned()
}

/// Rejoin sentences the converter hard-wrapped
pub fn merge_broken_lines(markdown: &str) -> String {
    let markdown = BROKEN_BEFORE_BOLD.replace_all(markdown, "$1 $2");
    BROKEN_BEFORE_LOWERCASE
        .replace_all(&markdown, "$1 $2")
        .into_owned()
}

pub fn tidy(markdown: &str) -> String {
    let markdown = markdown.trim();
    let markdown = ORPHAN_DOT_LINE.replace_all(markdown, "");
    EXCESS_BLANK_LINES
        .replace_all(&markdown, "\n\n")
        .trim()
        .to_string()
}

/// Replace each group's token with its footnote run
///
/// Groups are processed from the highest marker id down. A group without
/// sources, or whose token is no longer in the text, contributes nothing.
/// Leftover tokens are removed at the end.
pub fn embed_citations(markdown: &str, groups: &[CitationGroup]) -> (String, Vec<Source>) {
    let mut ordered: Vec<&CitationGroup> = groups.iter().collect();
    ordered.sort_by(|a, b| b.marker_id.cmp(&a.marker_id));

    let mut text = markdown.to_string();
    let mut embedded: Vec<Source> = Vec::new();

    for group in ordered {
        if group.sources.is_empty() {
            continue;
        }
        let token = group.token();
        if !text.contains(&token) {
            continue;
        }

        let start = embedded.len();
        let footnotes: String = (1..=group.sources.len())
            .map(|i| format!("[{}]", start + i))
            .collect();

        text = text.replacen(&token, &footnotes, 1);
        embedded.extend(group.sources.iter().cloned());
    }

    let text = ANY_TOKEN.replace_all(&text, "").into_owned();
    (text, embedded)
}

pub fn sources_section(sources: &[Source]) -> String {
    let mut section = String::from("\n\n---\n\n## Sources:\n\n");
    for (i, source) in sources.iter().enumerate() {
        let title = if source.title.is_empty() {
            "Link"
        } else {
            source.title.as_str()
        };
        section.push_str(&format!("[{}] {}  \n{}\n\n", i + 1, title, source.url));
    }
    section
}
