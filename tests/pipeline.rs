mod common;

use ai_mode_search::ai_mode::{ErrorKind, ScrapeResult, scrape_and_stop};
use ai_mode_search::browser::{DriverError, RELEASE_ORDER};
use ai_mode_search::testing::{ScriptedPage, ScriptedSession};
use common::*;
use serde_json::json;

fn cited_answer() -> serde_json::Value {
    json!({
        "html": "<p>Rust is fast[CITE-0] and safe[CITE-1].</p>\
                 <p>AI-generated answers may contain mistakes. Learn more</p>",
        "citations": [
            { "marker_id": 0, "sources": [
                source("Rust Lang", "https://www.rust-lang.org/"),
                source("Rust Lang (dup)", "https://www.rust-lang.org/"),
                source("Search", "https://www.google.com/search?q=rust"),
            ]},
            { "marker_id": 1, "sources": [
                source("Rustonomicon", "https://doc.rust-lang.org/nomicon/"),
            ]},
        ]
    })
}

#[tokio::test]
async fn successful_scrape_produces_footnoted_markdown() {
    let clock = clock();
    let page = answered_page(&clock, cited_answer());
    let mut h = harness(page, true, clock);

    let result = h.scraper.scrape("is rust fast").await;
    let ScrapeResult::Success(success) = &result else {
        panic!("expected success, got {:?}", result);
    };

    assert_eq!(result.exit_code(), 0);
    assert_eq!(success.query, "is rust fast");
    assert_eq!(
        success.source_url,
        "https://www.google.com/search?udm=50&q=is+rust+fast"
    );

    // Higher marker ids are numbered first
    assert_eq!(success.sources.len(), 2);
    assert_eq!(success.sources[0].title, "Rustonomicon");
    assert_eq!(success.sources[1].url, "https://www.rust-lang.org/");
    assert_eq!(success.sources[1].source, "www.rust-lang.org");

    assert!(!success.markdown.contains("[CITE-"));
    assert!(!success.markdown.contains("may contain mistakes"));
    assert!(success.markdown.contains("[1]"));
    assert!(success.markdown.contains("[2]"));
    assert!(!success.markdown.contains("[3]"));
    assert!(success.markdown.contains("## Sources:"));

    for source in &success.sources {
        for domain in ["google.com", "google.de", "gstatic.com"] {
            assert!(!source.url.contains(domain));
        }
    }

    // Primary marker appeared: the text cascade never ran
    // (one body read for the challenge check, one for availability)
    assert_eq!(h.calls.body_text(), 2);
    assert_eq!(h.calls.goto(), 1);

    h.scraper.stop().await;
}

#[tokio::test]
async fn headless_challenge_redirect_is_fatal() {
    let clock = clock();
    let page = answered_page(&clock, cited_answer())
        .with_resolved_url("https://www.google.com/sorry/index?continue=x");
    let mut h = harness(page, true, clock);

    let result = h.scraper.scrape("rust").await;
    assert_eq!(result.error_kind(), Some(ErrorKind::CaptchaRequired));
    assert_eq!(result.exit_code(), 2);

    // Address layer short-circuits; no later stage touched the page
    assert_eq!(h.calls.body_text(), 0);
    assert_eq!(h.calls.is_visible(), 0);
    assert_eq!(h.calls.evaluate(), 0);

    let json = result.to_json();
    assert_eq!(json["error"], "CAPTCHA_REQUIRED");
    assert!(json["suggestion"].as_str().unwrap().contains("--show-browser"));

    h.scraper.stop().await;
}

#[tokio::test]
async fn short_page_with_captcha_keyword_is_fatal_when_headless() {
    let clock = clock();
    let mut body = String::from("Please complete the captcha to continue. ");
    while body.chars().count() < 550 {
        body.push('.');
    }
    let page = ScriptedPage::new(clock.clone()).with_body(body);
    let h = harness(page, true, clock);

    let result = h.scraper.scrape("rust").await;
    assert_eq!(result.error_kind(), Some(ErrorKind::CaptchaRequired));
}

#[tokio::test]
async fn visible_mode_waits_through_a_challenge() {
    let clock = clock();
    let page = answered_page(&clock, cited_answer())
        .with_resolved_url("https://www.google.com/sorry/index?continue=x");
    let h = harness(page, false, clock);

    let result = h.scraper.scrape("rust").await;
    assert!(result.is_success());
}

#[tokio::test]
async fn regional_restriction_is_reported_with_suggestion() {
    let clock = clock();
    let page = ScriptedPage::new(clock.clone()).with_body(format!(
        "{}AI Mode is not available in your country or language",
        long_answer()
    ));
    let h = harness(page, true, clock);

    let result = h.scraper.scrape("rust").await;
    assert_eq!(result.error_kind(), Some(ErrorKind::AiModeNotAvailable));
    assert_eq!(result.exit_code(), 4);
    assert_eq!(h.calls.evaluate(), 0);

    let ScrapeResult::Failure(failure) = result else {
        panic!("expected failure");
    };
    assert!(failure.suggestion.unwrap().contains("proxy/VPN"));
}

#[tokio::test]
async fn navigation_failure_is_a_page_load_error() {
    let clock = clock();
    let page = answered_page(&clock, cited_answer())
        .with_goto_error(DriverError::Timeout(secs(45)));
    let h = harness(page, true, clock);

    let result = h.scraper.scrape("rust").await;
    assert_eq!(result.error_kind(), Some(ErrorKind::PageLoadError));
    assert_eq!(result.exit_code(), 1);
    assert_eq!(h.calls.body_text(), 0);
}

#[tokio::test]
async fn browser_closed_during_wait_is_distinguished() {
    let clock = clock();
    let page = ScriptedPage::new(clock.clone())
        .with_body(long_answer())
        .closed_after(secs(5));
    let mut h = harness(page, true, clock);

    let result = h.scraper.scrape("rust").await;
    assert_eq!(result.error_kind(), Some(ErrorKind::BrowserClosedByUser));
    assert_eq!(result.exit_code(), 3);
    assert_eq!(h.calls.evaluate(), 0);

    let report = h.scraper.stop().await;
    assert!(report.is_clean());
    assert_eq!(released(&h.released), ScriptedSession::RESOURCES.to_vec());
}

#[tokio::test]
async fn structural_script_error_is_an_extraction_error() {
    let clock = clock();
    let page = answered_page(&clock, json!({ "error": "Answer container not found" }));
    let h = harness(page, true, clock);

    let result = h.scraper.scrape("rust").await;
    assert_eq!(result.error_kind(), Some(ErrorKind::ExtractionError));
    let ScrapeResult::Failure(failure) = result else {
        panic!("expected failure");
    };
    assert!(failure.message.contains("Answer container not found"));
}

#[tokio::test]
async fn deadline_elapsing_still_extracts() {
    let clock = clock();
    let page = ScriptedPage::new(clock.clone())
        .with_body(long_answer())
        .with_evaluate(cited_answer());
    let h = harness(page, true, clock.clone());

    let result = h.scraper.scrape("rust").await;
    assert!(result.is_success());
    assert!(clock.elapsed() >= secs(40));
    assert!(clock.elapsed() <= secs(41));
}

#[tokio::test]
async fn release_runs_in_reverse_acquisition_order() {
    let clock = clock();
    let page = answered_page(&clock, cited_answer());
    let mut h = harness(page, true, clock);

    h.scraper.scrape("rust").await;
    let report = h.scraper.stop().await;

    assert!(report.is_clean());
    assert_eq!(report.released, vec!["page", "browser context", "driver"]);
    assert_eq!(released(&h.released), vec!["page", "browser context", "driver"]);

    // Second stop is a no-op, and the scraper refuses further work
    assert!(h.scraper.stop().await.released.is_empty());
    assert_eq!(released(&h.released).len(), 3);
    let result = h.scraper.scrape("rust").await;
    assert_eq!(result.error_kind(), Some(ErrorKind::Unknown));
}

#[tokio::test]
async fn failed_release_does_not_stop_the_others() {
    let clock = clock();
    let session = ScriptedSession::new(answered_page(&clock, cited_answer()))
        .failing_release("page");
    let mut h = harness_with(session, true, clock);

    let report = h.scraper.stop().await;
    assert!(!report.is_clean());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].resource, "page");
    assert_eq!(report.released, vec!["browser context", "driver"]);
}

#[tokio::test]
async fn panicking_driver_maps_to_unknown_and_releases() {
    let clock = clock();
    let page = answered_page(&clock, cited_answer()).with_evaluate_panic();
    let h = harness(page, true, clock);
    let log = h.released.clone();

    let (result, report) =
        scrape_and_stop(h.scraper, "rust", std::future::pending::<()>()).await;
    assert_eq!(result.error_kind(), Some(ErrorKind::Unknown));
    assert_eq!(result.exit_code(), 1);
    let ScrapeResult::Failure(failure) = result else {
        panic!("expected failure");
    };
    assert!(failure.message.contains("driver bug"));

    assert!(report.is_clean());
    assert_eq!(report.released, RELEASE_ORDER.to_vec());
    assert_eq!(released(&log), RELEASE_ORDER.to_vec());
}

#[tokio::test]
async fn interrupt_maps_to_interrupted_and_releases() {
    let clock = clock();
    // No completion marker: the wait keeps yielding, so the interrupt wins
    let page = ScriptedPage::new(clock.clone())
        .with_body(long_answer())
        .with_evaluate(cited_answer());
    let h = harness(page, true, clock);
    let log = h.released.clone();

    let (result, report) = scrape_and_stop(h.scraper, "rust", async {}).await;
    assert_eq!(result.error_kind(), Some(ErrorKind::Interrupted));
    assert_eq!(result.exit_code(), 130);
    assert!(report.is_clean());
    assert_eq!(released(&log).len(), 3);
}

#[tokio::test]
async fn guarded_run_completes_and_releases() {
    let clock = clock();
    let page = answered_page(&clock, cited_answer());
    let h = harness(page, true, clock);
    let log = h.released.clone();

    let (result, report) =
        scrape_and_stop(h.scraper, "rust", std::future::pending::<()>()).await;
    assert!(result.is_success());
    assert_eq!(report.released.len(), 3);
    assert_eq!(released(&log).len(), 3);
}

#[tokio::test]
async fn empty_query_is_rejected_without_navigation() {
    let clock = clock();
    let page = answered_page(&clock, cited_answer());
    let h = harness(page, true, clock);

    let result = h.scraper.scrape("   ").await;
    assert_eq!(result.error_kind(), Some(ErrorKind::Unknown));
    assert_eq!(h.calls.goto(), 0);
}
