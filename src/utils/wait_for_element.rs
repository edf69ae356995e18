//! Element polling utility for SPA support
//!
//! Provides wait_for_visible() which polls a page until an element is rendered
//! and visible. The answer page streams its content after the load event, so
//! completion markers show up long after navigation returns.

use std::time::Duration;

use tracing::trace;

use super::Clock;
use crate::browser::{DriverError, PageDriver};

/// Result of a bounded visibility wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Visible,
    TimedOut,
}

/// Wait for an element matching `selector` to become visible
///
/// # Arguments
/// * `page` - Page to poll
/// * `selector` - CSS selector for the element
/// * `timeout` - Maximum time to wait
/// * `poll_interval` - Fixed delay between checks
/// * `clock` - Time source
///
/// # Returns
/// * `Ok(WaitOutcome::Visible)` - The element was found and is visible
/// * `Ok(WaitOutcome::TimedOut)` - Budget exhausted
/// * `Err(DriverError::SessionClosed)` - The browser went away mid-wait
///
/// Any other driver error counts as "not visible yet". The last sleep is
/// clamped to the remaining budget so the wait never overshoots `timeout`
/// by more than one check.
pub async fn wait_for_visible(
    page: &dyn PageDriver,
    selector: &str,
    timeout: Duration,
    poll_interval: Duration,
    clock: &dyn Clock,
) -> Result<WaitOutcome, DriverError> {
    let start = clock.now();

    loop {
        match page.is_visible(selector).await {
            Ok(true) => return Ok(WaitOutcome::Visible),
            Ok(false) => {}
            Err(e) if e.is_session_closed() => return Err(e),
            Err(e) => trace!("Visibility check for '{}' failed: {}", selector, e),
        }

        let elapsed = clock.now().saturating_duration_since(start);
        if elapsed >= timeout {
            return Ok(WaitOutcome::TimedOut);
        }

        clock.sleep(poll_interval.min(timeout - elapsed)).await;
    }
}
