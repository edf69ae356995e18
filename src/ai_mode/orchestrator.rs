//! Runs one query through every stage against one browser session
//!
//! navigate -> challenge -> availability -> completion -> citations -> transform
//!
//! The first terminal failure ends the run; later stages are not invoked.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::FutureExt;
use tracing::{debug, error, info, warn};

use super::availability::AvailabilityChecker;
use super::challenge::ChallengeDetector;
use super::citations::CitationExtractor;
use super::completion::CompletionWaiter;
use super::config::ScrapeConfig;
use super::error::ScrapeError;
use super::transform::ContentTransformer;
use super::types::{ScrapeFailure, ScrapeRequest, ScrapeResult, ScrapeSuccess};
use crate::Config;
use crate::browser::{BrowserSession, ChromeSession, DriverError, PageDriver, ReleaseReport};
use crate::utils::{Clock, SystemClock};

pub struct Scraper<S: BrowserSession> {
    session: Option<S>,
    /// No operator at the keyboard: a challenge is fatal instead of awaited
    unattended: bool,
    page_load: std::time::Duration,
    challenge: ChallengeDetector,
    availability: AvailabilityChecker,
    completion: CompletionWaiter,
    citations: CitationExtractor,
    transformer: ContentTransformer,
}

impl Scraper<ChromeSession> {
    /// Launch Chrome with the persistent profile and wrap it
    pub async fn start(config: &Config) -> Result<Self> {
        config
            .scrape
            .validate()
            .context("Invalid scrape configuration")?;

        info!(
            "Starting browser ({})",
            if config.browser.headless { "headless" } else { "visible" }
        );
        let session = ChromeSession::open(&config.browser, &config.scrape.timing)
            .await
            .context("Failed to start browser session")?;

        Ok(Self::with_session(
            session,
            config.scrape.clone(),
            config.browser.headless,
            Arc::new(SystemClock),
        ))
    }
}

impl<S: BrowserSession> Scraper<S> {
    pub fn with_session(
        session: S,
        config: ScrapeConfig,
        unattended: bool,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            session: Some(session),
            unattended,
            page_load: config.timing.page_load(),
            challenge: ChallengeDetector::new(&config),
            availability: AvailabilityChecker::new(&config),
            completion: CompletionWaiter::new(&config, clock),
            citations: CitationExtractor::new(&config),
            transformer: ContentTransformer::new(&config),
        }
    }

    pub fn session(&self) -> Option<&S> {
        self.session.as_ref()
    }

    /// Execute one query; never panics on page errors, never retries
    pub async fn scrape(&self, query: &str) -> ScrapeResult {
        let Some(page) = self.session.as_ref().and_then(|s| s.page()) else {
            return failure(ScrapeError::Unknown("Browser not started".into()));
        };

        if query.trim().is_empty() {
            return failure(ScrapeError::Unknown("Query must not be empty".into()));
        }

        let request = ScrapeRequest::new(query);
        match self.run_pipeline(page, &request).await {
            Ok(success) => {
                info!(
                    "Scraping completed successfully - {} sources, {} chars",
                    success.sources.len(),
                    success.markdown.len()
                );
                ScrapeResult::Success(success)
            }
            Err(e) => {
                error!("Scrape failed ({}): {}", e.kind(), e);
                failure(e)
            }
        }
    }

    async fn run_pipeline(
        &self,
        page: &S::Page,
        request: &ScrapeRequest,
    ) -> Result<ScrapeSuccess, ScrapeError> {
        let url = request.search_url();
        info!("Searching: {}", request.query());
        debug!("Navigating to {}", url);

        page.goto(&url, self.page_load)
            .await
            .map_err(|e| match e {
                DriverError::SessionClosed(message) => ScrapeError::BrowserClosedByUser(message),
                other => ScrapeError::PageLoad(other.to_string()),
            })?;

        if self.challenge.detect(page).await {
            if self.unattended {
                return Err(ScrapeError::CaptchaRequired);
            }
            warn!("CAPTCHA detected, solve it in the browser window; waiting for the answer...");
        }

        if !self.availability.is_available(page).await {
            return Err(ScrapeError::AiModeNotAvailable);
        }

        info!("Waiting for AI response...");
        let completion = self.completion.wait(page).await?;
        debug!("Completion states: {:?}", completion.states);

        info!("Extracting content and citations...");
        let extraction = self.citations.extract(page).await?;

        debug!("Converting HTML to Markdown...");
        let rendered = self
            .transformer
            .transform(&extraction.html, &extraction.groups);

        Ok(ScrapeSuccess {
            markdown: rendered.markdown,
            sources: rendered.sources,
            source_url: url,
            query: request.query().to_string(),
        })
    }

    /// Release page, browser context and driver, in that order
    ///
    /// Safe to call more than once; later calls release nothing.
    pub async fn stop(&mut self) -> ReleaseReport {
        match self.session.take() {
            Some(mut session) => {
                let report = session.close().await;
                if report.is_clean() {
                    debug!("Browser resources released: {:?}", report.released);
                } else {
                    warn!("Browser cleanup incomplete: {:?}", report.failures);
                }
                report
            }
            None => ReleaseReport::default(),
        }
    }
}

/// Scrape under a panic guard and an interrupt, then always stop the session
pub async fn scrape_and_stop<S, F>(
    mut scraper: Scraper<S>,
    query: &str,
    interrupt: F,
) -> (ScrapeResult, ReleaseReport)
where
    S: BrowserSession,
    F: Future<Output = ()>,
{
    let result = {
        let guarded = AssertUnwindSafe(scraper.scrape(query)).catch_unwind();
        tokio::select! {
            outcome = guarded => match outcome {
                Ok(result) => result,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!("Scrape panicked: {}", message);
                    failure(ScrapeError::Unknown(message))
                }
            },
            _ = interrupt => {
                warn!("Aborted by user");
                failure(ScrapeError::Interrupted)
            }
        }
    };

    let report = scraper.stop().await;
    (result, report)
}

/// Open a Chrome session, scrape one query and release everything
///
/// Ctrl-C maps to an `Interrupted` result.
pub async fn run(config: &Config, query: &str) -> ScrapeResult {
    let scraper = match Scraper::start(config).await {
        Ok(scraper) => scraper,
        Err(e) => {
            error!("{:#}", e);
            return failure(ScrapeError::Unknown(format!("{e:#}")));
        }
    };

    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Could not listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let (result, _report) = scrape_and_stop(scraper, query, interrupt).await;
    result
}

fn failure(err: ScrapeError) -> ScrapeResult {
    ScrapeResult::Failure(ScrapeFailure::from(err))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic during scrape".to_string()
    }
}
