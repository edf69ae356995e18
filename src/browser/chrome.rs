//! chromiumoxide-backed [`PageDriver`]

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use std::time::Duration;
use tracing::debug;

use super::driver::{DriverError, PageDriver, RawLink};

/// Visibility predicate shared by the single-element checks.
/// Mirrors what a user can actually see: rendered, not hidden, non-empty box.
const IS_VISIBLE_FN: &str = r#"(el) => {
    if (!el) return false;
    const style = window.getComputedStyle(el);
    const rect = el.getBoundingClientRect();
    return style.display !== 'none'
        && style.visibility !== 'hidden'
        && style.opacity !== '0'
        && rect.width > 0
        && rect.height > 0;
}"#;

/// A live Chrome tab
#[derive(Debug, Clone)]
pub struct ChromePage {
    page: Page,
    /// Bound on a single script evaluation
    script_timeout: Duration,
}

impl ChromePage {
    pub fn new(page: Page, script_timeout: Duration) -> Self {
        Self {
            page,
            script_timeout,
        }
    }

    /// Underlying chromiumoxide page
    pub fn inner(&self) -> &Page {
        &self.page
    }

    pub(crate) fn into_inner(self) -> Page {
        self.page
    }
}

/// Quote a CSS selector as a JavaScript string literal
fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

#[async_trait]
impl PageDriver for ChromePage {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), DriverError> {
        tokio::time::timeout(timeout, self.page.goto(url))
            .await
            .map_err(|_| DriverError::Timeout(timeout))?
            .map_err(DriverError::classify)?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        let url = self.page.url().await.map_err(DriverError::classify)?;
        Ok(url.unwrap_or_default())
    }

    async fn body_text(&self) -> Result<String, DriverError> {
        let value = self
            .evaluate("document.body ? document.body.innerText : ''")
            .await?;

        if let serde_json::Value::String(text) = value {
            Ok(text)
        } else {
            Ok(String::new())
        }
    }

    async fn has_element(&self, selector: &str) -> Result<bool, DriverError> {
        let script = format!("document.querySelector({}) !== null", js_string(selector));
        Ok(self.evaluate(&script).await?.as_bool().unwrap_or(false))
    }

    async fn is_visible(&self, selector: &str) -> Result<bool, DriverError> {
        let script = format!(
            "({})(document.querySelector({}))",
            IS_VISIBLE_FN,
            js_string(selector)
        );
        Ok(self.evaluate(&script).await?.as_bool().unwrap_or(false))
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, DriverError> {
        let params = EvaluateParams::builder()
            .expression(script)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(DriverError::Evaluation)?;

        let result = tokio::time::timeout(self.script_timeout, self.page.evaluate(params))
            .await
            .map_err(|_| DriverError::Timeout(self.script_timeout))?
            .map_err(DriverError::classify)?;

        match result.value() {
            Some(value) => Ok(value.clone()),
            None => Ok(serde_json::Value::Null),
        }
    }

    async fn links_in(&self, container: &str) -> Result<Vec<RawLink>, DriverError> {
        if !self.has_element(container).await? {
            debug!("Container '{}' not present", container);
            return Ok(Vec::new());
        }

        let container_el = self
            .page
            .find_element(container)
            .await
            .map_err(DriverError::classify)?;
        let anchors = container_el
            .find_elements("a[href]")
            .await
            .map_err(DriverError::classify)?;

        let mut links = Vec::with_capacity(anchors.len());
        for anchor in anchors {
            // Individual anchors can detach while we read them; skip those
            let href = match anchor.attribute("href").await {
                Ok(Some(href)) => href,
                Ok(None) => continue,
                Err(e) => {
                    let err = DriverError::classify(e);
                    if err.is_session_closed() {
                        return Err(err);
                    }
                    debug!("Link parse error: {}", err);
                    continue;
                }
            };
            let text = anchor.inner_text().await.ok().flatten().unwrap_or_default();
            let aria_label = anchor.attribute("aria-label").await.ok().flatten();

            links.push(RawLink {
                href,
                text,
                aria_label,
            });
        }

        Ok(links)
    }
}
