#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use ai_mode_search::ai_mode::{ScrapeConfig, Scraper};
use ai_mode_search::browser::BrowserSession;
use ai_mode_search::testing::{CallCounts, ScriptedPage, ScriptedSession};
use ai_mode_search::utils::{Clock, ManualClock};
use serde_json::{Value, json};

pub const SIDEBAR: &str = r#"[data-container-id="rhs-col"]"#;
pub const PRIMARY_MARKER: &str = r#"button svg[viewBox="3 3 18 18"]"#;
pub const SECONDARY_MARKER: &str = r#"[aria-label*="feedback" i]"#;

pub struct Harness {
    pub scraper: Scraper<ScriptedSession>,
    pub calls: Arc<CallCounts>,
    pub released: Arc<Mutex<Vec<&'static str>>>,
    pub clock: Arc<ManualClock>,
}

pub fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new())
}

pub fn as_clock(clock: &Arc<ManualClock>) -> Arc<dyn Clock> {
    clock.clone()
}

pub fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

/// Body text long enough to never trip the short-page check
pub fn long_answer() -> String {
    "Rust is a systems programming language focused on safety and speed. ".repeat(20)
}

/// Page with a normal answer whose primary marker shows after two seconds
pub fn answered_page(clock: &Arc<ManualClock>, script_result: Value) -> ScriptedPage {
    ScriptedPage::new(clock.clone())
        .with_body(long_answer())
        .with_visible_after(PRIMARY_MARKER, secs(2))
        .with_evaluate(script_result)
}

pub fn harness(page: ScriptedPage, unattended: bool, clock: Arc<ManualClock>) -> Harness {
    harness_with(ScriptedSession::new(page), unattended, clock)
}

pub fn harness_with(session: ScriptedSession, unattended: bool, clock: Arc<ManualClock>) -> Harness {
    let calls = session.page().map(|p| p.calls()).unwrap_or_default();
    let released = session.release_log();
    let scraper = Scraper::with_session(session, ScrapeConfig::default(), unattended, as_clock(&clock));
    Harness {
        scraper,
        calls,
        released,
        clock,
    }
}

pub fn source(title: &str, url: &str) -> Value {
    json!({ "title": title, "url": url, "source": "" })
}

pub fn released(log: &Arc<Mutex<Vec<&'static str>>>) -> Vec<&'static str> {
    log.lock().unwrap().clone()
}
