//! Browser process lifecycle
//!
//! Owns the chromiumoxide `Browser` together with its CDP event handler task.

use std::time::Duration;

use anyhow::Result;
use chromiumoxide::browser::Browser;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::BrowserConfig;

/// Wrapper for Browser and its event handler task
///
/// Ensures handler is properly cleaned up when browser is dropped.
/// Handler MUST be aborted to prevent it running indefinitely after
/// browser is closed.
pub struct BrowserWrapper {
    browser: Browser,
    handler: Option<JoinHandle<()>>,
}

impl BrowserWrapper {
    pub(crate) fn new(browser: Browser, handler: JoinHandle<()>) -> Self {
        Self {
            browser,
            handler: Some(handler),
        }
    }

    /// Get reference to inner browser
    pub(crate) fn browser(&self) -> &Browser {
        &self.browser
    }

    /// Close the browser and wait for the process to exit
    ///
    /// We must call BOTH `close()` and `wait()`: closing only sends the CDP
    /// command, and without waiting Chrome lingers as a zombie process.
    /// The persistent profile is flushed to disk on a clean close.
    pub(crate) async fn close_browser(&mut self) -> Result<()> {
        info!("Closing browser (profile will be saved)");
        let close_result = self.browser.close().await;
        let wait_result = self.browser.wait().await;

        close_result.map_err(|e| anyhow::anyhow!("Failed to close browser cleanly: {e}"))?;
        wait_result.map_err(|e| anyhow::anyhow!("Failed to wait for browser exit: {e}"))?;
        Ok(())
    }

    /// Stop the CDP handler task and wait for it to go away
    ///
    /// Fails if the task died from a panic while the session was in use.
    /// A handler that ended on its own (connection closed by the browser
    /// shutting down) counts as released.
    pub(crate) async fn shutdown_handler(&mut self) -> Result<()> {
        match self.handler.take() {
            Some(handler) => join_handler(handler).await,
            None => Ok(()),
        }
    }

    /// Abort the CDP handler task without waiting
    ///
    /// Returns false if the handler had already finished or been stopped.
    fn stop_handler(&mut self) -> bool {
        match self.handler.take() {
            Some(handler) => {
                let was_running = !handler.is_finished();
                handler.abort();
                was_running
            }
            None => false,
        }
    }
}

/// Abort a handler task if still running and collect how it ended
async fn join_handler(handler: JoinHandle<()>) -> Result<()> {
    if handler.is_finished() {
        debug!("CDP handler had already stopped");
    } else {
        handler.abort();
    }

    match handler.await {
        Ok(()) => Ok(()),
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => Err(anyhow::anyhow!("CDP handler task failed: {e}")),
    }
}

impl Drop for BrowserWrapper {
    fn drop(&mut self) {
        if self.stop_handler() {
            // Browser::drop() kills the Chrome process, but this is NOT a
            // clean shutdown: the profile may not be flushed.
            tracing::warn!(
                "BrowserWrapper dropped without explicit shutdown. \
                Call Scraper::stop() before dropping to save the profile."
            );
        }
    }
}

/// Launch a new browser instance with stealth configuration and the
/// persistent profile described by `config`
pub async fn launch_browser(
    config: &BrowserConfig,
    request_timeout: Duration,
) -> Result<BrowserWrapper> {
    info!(
        "Launching browser with persistent profile (headless={})",
        config.headless
    );

    let profile_dir = config.profile_dir();
    crate::browser_setup::prepare_profile(&profile_dir, &config.locale)?;

    let (browser, handler) = crate::browser_setup::launch_browser(config, profile_dir, request_timeout).await?;
    Ok(BrowserWrapper::new(browser, handler))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn running_handler_is_aborted_cleanly() {
        let handler = tokio::spawn(std::future::pending::<()>());
        join_handler(handler).await.unwrap();
    }

    #[tokio::test]
    async fn finished_handler_counts_as_released() {
        let handler = tokio::spawn(async {});
        tokio::task::yield_now().await;
        join_handler(handler).await.unwrap();
    }

    #[tokio::test]
    async fn panicked_handler_is_reported() {
        let handler: JoinHandle<()> = tokio::spawn(async { panic!("handler loop crashed") });
        let err = join_handler(handler).await.unwrap_err();
        assert!(err.to_string().contains("CDP handler task failed"));
    }
}
