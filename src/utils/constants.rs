//! Shared configuration constants for the AI-mode scraper
//!
//! Default values used throughout the codebase to avoid magic numbers.
//! Everything here can be overridden through `config.yaml`.

/// Chrome user agent string for stealth mode
///
/// Desktop Windows Chrome. Keep within a few major versions of current
/// stable, otherwise the results page may fall back to a legacy layout.
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";

/// Search endpoint; `udm=50` selects AI mode
pub const SEARCH_URL: &str = "https://www.google.com/search";

/// Value of the `udm` query parameter that selects AI mode
pub const AI_MODE_UDM: &str = "50";

/// Accept-Language header sent with every request
pub const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// Navigation timeout (45 seconds)
pub const PAGE_LOAD_TIMEOUT_MS: u64 = 45_000;

/// Upper bound for the in-page citation script (3 minutes)
///
/// The script clicks every citation anchor in turn, so long answers with
/// many anchors need far more than a single protocol round trip.
pub const EXTRACTION_TIMEOUT_MS: u64 = 180_000;

/// Headroom added on top of the longest configured operation when sizing
/// the CDP request timeout, so local timeouts always fire first
pub const CDP_REQUEST_MARGIN_MS: u64 = 5_000;

/// Shared deadline for the whole completion cascade (40 seconds)
pub const COMPLETION_DEADLINE_MS: u64 = 40_000;

/// Upper bound for each marker method inside the cascade (15 seconds)
pub const COMPLETION_METHOD_TIMEOUT_MS: u64 = 15_000;

/// Poll interval while waiting for a marker element to become visible
pub const MARKER_POLL_INTERVAL_MS: u64 = 250;

/// Poll interval for the text cascade (once per second)
pub const TEXT_POLL_INTERVAL_MS: u64 = 1_000;

/// Pages shorter than this are suspicious (challenge pages are tiny)
pub const SHORT_PAGE_THRESHOLD: usize = 600;

/// Maximum wait for the sidebar to change after a citation click
pub const CITATION_CLICK_WAIT_MS: u64 = 300;

/// Poll interval while waiting for the sidebar to change
pub const CITATION_CLICK_POLL_MS: u64 = 10;

/// Settle delay after the sidebar changed (animations)
pub const CITATION_SETTLE_MS: u64 = 50;

/// Pause after expanding one collapsed "show more" section
pub const SHOW_MORE_EXPAND_WAIT_MS: u64 = 200;
