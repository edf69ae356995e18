//! One browser session bound to one page
//!
//! Resources are acquired driver → context → page and released in the
//! reverse order. Each release is attempted even if an earlier one failed.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{Headers, SetExtraHttpHeadersParams};
use tracing::{debug, info, warn};

use super::chrome::ChromePage;
use super::driver::PageDriver;
use super::wrapper::{BrowserWrapper, launch_browser};
use crate::BrowserConfig;
use crate::ai_mode::TimingConfig;
use crate::utils::constants::ACCEPT_LANGUAGE;

/// Resource names, in release order
pub const RELEASE_ORDER: [&str; 3] = ["page", "browser context", "driver"];

/// A resource that could not be released cleanly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseFailure {
    pub resource: &'static str,
    pub error: String,
}

/// Outcome of tearing a session down
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseReport {
    /// Resources released, in release order
    pub released: Vec<&'static str>,
    pub failures: Vec<ReleaseFailure>,
}

impl ReleaseReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn record(&mut self, resource: &'static str, result: Result<()>) {
        match result {
            Ok(()) => {
                debug!("Released {}", resource);
                self.released.push(resource);
            }
            Err(e) => {
                warn!("Error releasing {}: {:#}", resource, e);
                self.failures.push(ReleaseFailure {
                    resource,
                    error: format!("{e:#}"),
                });
            }
        }
    }
}

/// The three resources behind a session, released one at a time
///
/// Each method returns `None` when the resource is not (or no longer) held.
#[async_trait]
pub trait SessionResources: Send {
    async fn release_page(&mut self) -> Option<Result<()>>;
    async fn release_context(&mut self) -> Option<Result<()>>;
    async fn release_driver(&mut self) -> Option<Result<()>>;
}

/// Release page, then browser context, then driver
///
/// A failure is recorded and the remaining resources are still released.
pub async fn release_all<R: SessionResources + ?Sized>(resources: &mut R) -> ReleaseReport {
    let mut report = ReleaseReport::default();
    let [page, context, driver] = RELEASE_ORDER;

    if let Some(result) = resources.release_page().await {
        report.record(page, result);
    }
    if let Some(result) = resources.release_context().await {
        report.record(context, result);
    }
    if let Some(result) = resources.release_driver().await {
        report.record(driver, result);
    }
    report
}

/// A page plus everything that keeps it alive
#[async_trait]
pub trait BrowserSession: Send + Sync {
    type Page: PageDriver;

    /// The session's page, or `None` once the session has been closed
    fn page(&self) -> Option<&Self::Page>;

    /// Release page, browsing context and driver. Safe to call repeatedly.
    async fn close(&mut self) -> ReleaseReport;
}

/// Chrome session over CDP
pub struct ChromeSession {
    page: Option<ChromePage>,
    browser: Option<BrowserWrapper>,
}

impl ChromeSession {
    /// Launch Chrome with the persistent profile and open one blank page
    pub async fn open(config: &BrowserConfig, timing: &TimingConfig) -> Result<Self> {
        let wrapper = launch_browser(config, timing.request_timeout()).await?;
        let mut session = Self {
            page: None,
            browser: Some(wrapper),
        };

        match session.open_page(timing.extraction()).await {
            Ok(page) => {
                session.page = Some(page);
                info!("Browser session ready");
                Ok(session)
            }
            Err(e) => {
                // Do not leak the browser process when the page cannot be created
                session.close().await;
                Err(e)
            }
        }
    }

    async fn open_page(&self, script_timeout: Duration) -> Result<ChromePage> {
        let wrapper = self
            .browser
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Browser not available"))?;

        let page = wrapper
            .browser()
            .new_page("about:blank")
            .await
            .context("Failed to create blank page")?;

        page.execute(SetExtraHttpHeadersParams::new(Headers::new(
            serde_json::json!({ "Accept-Language": ACCEPT_LANGUAGE }),
        )))
        .await
        .context("Failed to set Accept-Language header")?;

        debug!("Browser page created");
        Ok(ChromePage::new(page, script_timeout))
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    type Page = ChromePage;

    fn page(&self) -> Option<&ChromePage> {
        self.page.as_ref()
    }

    async fn close(&mut self) -> ReleaseReport {
        debug!("Cleaning up browser resources...");
        release_all(self).await
    }
}

#[async_trait]
impl SessionResources for ChromeSession {
    async fn release_page(&mut self) -> Option<Result<()>> {
        let page = self.page.take()?;
        Some(
            page.into_inner()
                .close()
                .await
                .map_err(|e| anyhow::anyhow!("Error closing page: {e}")),
        )
    }

    async fn release_context(&mut self) -> Option<Result<()>> {
        let wrapper = self.browser.as_mut()?;
        Some(wrapper.close_browser().await)
    }

    async fn release_driver(&mut self) -> Option<Result<()>> {
        let mut wrapper = self.browser.take()?;
        Some(wrapper.shutdown_handler().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[derive(Default)]
    struct Resources {
        held: HashSet<&'static str>,
        failing: HashSet<&'static str>,
        attempts: Vec<&'static str>,
    }

    impl Resources {
        fn holding_all() -> Self {
            Self {
                held: RELEASE_ORDER.into_iter().collect(),
                ..Self::default()
            }
        }

        fn release(&mut self, name: &'static str) -> Option<Result<()>> {
            if !self.held.remove(name) {
                return None;
            }
            self.attempts.push(name);
            if self.failing.contains(name) {
                Some(Err(anyhow::anyhow!("{name} is stuck")))
            } else {
                Some(Ok(()))
            }
        }
    }

    #[async_trait]
    impl SessionResources for Resources {
        async fn release_page(&mut self) -> Option<Result<()>> {
            self.release("page")
        }
        async fn release_context(&mut self) -> Option<Result<()>> {
            self.release("browser context")
        }
        async fn release_driver(&mut self) -> Option<Result<()>> {
            self.release("driver")
        }
    }

    #[tokio::test]
    async fn releases_in_reverse_acquisition_order() {
        let mut resources = Resources::holding_all();
        let report = release_all(&mut resources).await;

        assert!(report.is_clean());
        assert_eq!(report.released, RELEASE_ORDER.to_vec());
        assert_eq!(resources.attempts, RELEASE_ORDER.to_vec());
    }

    #[tokio::test]
    async fn each_release_is_attempted_after_a_failure() {
        let mut resources = Resources::holding_all();
        resources.failing.insert("browser context");

        let report = release_all(&mut resources).await;
        assert_eq!(resources.attempts, RELEASE_ORDER.to_vec());
        assert_eq!(report.released, vec!["page", "driver"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].resource, "browser context");
        assert!(report.failures[0].error.contains("stuck"));
    }

    #[tokio::test]
    async fn resources_not_held_are_skipped() {
        let mut resources = Resources::default();
        resources.held.insert("driver");

        let report = release_all(&mut resources).await;
        assert_eq!(report.released, vec!["driver"]);
        assert!(release_all(&mut resources).await.released.is_empty());
    }
}
