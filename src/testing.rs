//! Deterministic in-memory browser for tests
//!
//! [`ScriptedPage`] answers every [`PageDriver`] call from a fixed script
//! keyed by virtual time on a shared [`ManualClock`]. [`ScriptedSession`]
//! records release order so teardown can be asserted.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::browser::{
    BrowserSession, DriverError, PageDriver, RELEASE_ORDER, RawLink, ReleaseReport,
    SessionResources, release_all,
};
use crate::utils::ManualClock;

/// Per-method call counters, shared with the test after the page is moved
#[derive(Debug, Default)]
pub struct CallCounts {
    goto: AtomicUsize,
    body_text: AtomicUsize,
    is_visible: AtomicUsize,
    evaluate: AtomicUsize,
    links_in: AtomicUsize,
}

impl CallCounts {
    pub fn goto(&self) -> usize {
        self.goto.load(Ordering::SeqCst)
    }
    pub fn body_text(&self) -> usize {
        self.body_text.load(Ordering::SeqCst)
    }
    pub fn is_visible(&self) -> usize {
        self.is_visible.load(Ordering::SeqCst)
    }
    pub fn evaluate(&self) -> usize {
        self.evaluate.load(Ordering::SeqCst)
    }
    pub fn links_in(&self) -> usize {
        self.links_in.load(Ordering::SeqCst)
    }

    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct ScriptedPage {
    clock: Arc<ManualClock>,
    resolved_url: Option<String>,
    current_url: Mutex<String>,
    goto_error: Option<DriverError>,
    /// (from, text); the latest entry whose time has come wins
    bodies: Vec<(Duration, String)>,
    visible: HashMap<String, Duration>,
    elements: HashSet<String>,
    evaluate_result: Result<Value, DriverError>,
    evaluate_panics: bool,
    links: HashMap<String, Vec<RawLink>>,
    closed_after: Option<Duration>,
    call_cost: Duration,
    calls: Arc<CallCounts>,
}

impl ScriptedPage {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            resolved_url: None,
            current_url: Mutex::new("about:blank".to_string()),
            goto_error: None,
            bodies: Vec::new(),
            visible: HashMap::new(),
            elements: HashSet::new(),
            evaluate_result: Ok(Value::Null),
            evaluate_panics: false,
            links: HashMap::new(),
            closed_after: None,
            call_cost: Duration::ZERO,
            calls: Arc::new(CallCounts::default()),
        }
    }

    /// Address reported after navigation (a redirect target)
    pub fn with_resolved_url(mut self, url: impl Into<String>) -> Self {
        self.resolved_url = Some(url.into());
        self
    }

    pub fn with_goto_error(mut self, err: DriverError) -> Self {
        self.goto_error = Some(err);
        self
    }

    pub fn with_body(self, text: impl Into<String>) -> Self {
        self.with_body_after(Duration::ZERO, text)
    }

    pub fn with_body_after(mut self, at: Duration, text: impl Into<String>) -> Self {
        self.bodies.push((at, text.into()));
        self.bodies.sort_by_key(|(from, _)| *from);
        self
    }

    pub fn with_visible_after(mut self, selector: impl Into<String>, at: Duration) -> Self {
        self.visible.insert(selector.into(), at);
        self
    }

    pub fn with_element(mut self, selector: impl Into<String>) -> Self {
        self.elements.insert(selector.into());
        self
    }

    pub fn with_evaluate(mut self, value: Value) -> Self {
        self.evaluate_result = Ok(value);
        self
    }

    pub fn with_evaluate_error(mut self, err: DriverError) -> Self {
        self.evaluate_result = Err(err);
        self
    }

    /// Make `evaluate` panic, as a driver bug would
    pub fn with_evaluate_panic(mut self) -> Self {
        self.evaluate_panics = true;
        self
    }

    pub fn with_links(mut self, container: impl Into<String>, links: Vec<RawLink>) -> Self {
        self.links.insert(container.into(), links);
        self
    }

    /// Every call from this virtual time on fails with `SessionClosed`
    pub fn closed_after(mut self, at: Duration) -> Self {
        self.closed_after = Some(at);
        self
    }

    /// Virtual latency added by every driver call
    pub fn with_call_cost(mut self, cost: Duration) -> Self {
        self.call_cost = cost;
        self
    }

    pub fn calls(&self) -> Arc<CallCounts> {
        Arc::clone(&self.calls)
    }

    fn enter(&self, counter: &AtomicUsize) -> Result<Duration, DriverError> {
        CallCounts::bump(counter);
        if !self.call_cost.is_zero() {
            self.clock.advance(self.call_cost);
        }
        let now = self.clock.elapsed();
        match self.closed_after {
            Some(at) if now >= at => Err(DriverError::SessionClosed("Target closed".into())),
            _ => Ok(now),
        }
    }

    fn visible_at(&self, selector: &str, now: Duration) -> bool {
        self.visible.get(selector).is_some_and(|from| now >= *from)
    }
}

#[async_trait]
impl PageDriver for ScriptedPage {
    async fn goto(&self, url: &str, _timeout: Duration) -> Result<(), DriverError> {
        self.enter(&self.calls.goto)?;
        if let Some(err) = &self.goto_error {
            return Err(err.clone());
        }
        let resolved = self.resolved_url.clone().unwrap_or_else(|| url.to_string());
        *self.current_url.lock().unwrap_or_else(|e| e.into_inner()) = resolved;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        if let Some(at) = self.closed_after
            && self.clock.elapsed() >= at
        {
            return Err(DriverError::SessionClosed("Target closed".into()));
        }
        Ok(self
            .current_url
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }

    async fn body_text(&self) -> Result<String, DriverError> {
        let now = self.enter(&self.calls.body_text)?;
        Ok(self
            .bodies
            .iter()
            .rev()
            .find(|(from, _)| now >= *from)
            .map(|(_, text)| text.clone())
            .unwrap_or_default())
    }

    async fn has_element(&self, selector: &str) -> Result<bool, DriverError> {
        let now = self.clock.elapsed();
        if self.closed_after.is_some_and(|at| now >= at) {
            return Err(DriverError::SessionClosed("Target closed".into()));
        }
        Ok(self.elements.contains(selector) || self.visible_at(selector, now))
    }

    async fn is_visible(&self, selector: &str) -> Result<bool, DriverError> {
        let now = self.enter(&self.calls.is_visible)?;
        Ok(self.visible_at(selector, now))
    }

    async fn evaluate(&self, _script: &str) -> Result<Value, DriverError> {
        self.enter(&self.calls.evaluate)?;
        if self.evaluate_panics {
            panic!("driver bug while evaluating script");
        }
        self.evaluate_result.clone()
    }

    async fn links_in(&self, container: &str) -> Result<Vec<RawLink>, DriverError> {
        self.enter(&self.calls.links_in)?;
        Ok(self.links.get(container).cloned().unwrap_or_default())
    }
}

/// Session around a [`ScriptedPage`] that records what it released
pub struct ScriptedSession {
    page: Option<ScriptedPage>,
    context_open: bool,
    driver_open: bool,
    released: Arc<Mutex<Vec<&'static str>>>,
    failing: HashSet<&'static str>,
}

impl ScriptedSession {
    pub const RESOURCES: [&'static str; 3] = RELEASE_ORDER;

    pub fn new(page: ScriptedPage) -> Self {
        Self {
            page: Some(page),
            context_open: true,
            driver_open: true,
            released: Arc::new(Mutex::new(Vec::new())),
            failing: HashSet::new(),
        }
    }

    fn attempt(&self, resource: &'static str) -> Result<(), anyhow::Error> {
        self.released
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(resource);
        if self.failing.contains(resource) {
            Err(anyhow::anyhow!("{resource} refused to close"))
        } else {
            Ok(())
        }
    }

    /// Make releasing `resource` fail (it is still recorded as attempted)
    pub fn failing_release(mut self, resource: &'static str) -> Self {
        self.failing.insert(resource);
        self
    }

    /// Release attempts in order, shared so it survives the session
    pub fn release_log(&self) -> Arc<Mutex<Vec<&'static str>>> {
        Arc::clone(&self.released)
    }
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    type Page = ScriptedPage;

    fn page(&self) -> Option<&ScriptedPage> {
        self.page.as_ref()
    }

    async fn close(&mut self) -> ReleaseReport {
        release_all(self).await
    }
}

#[async_trait]
impl SessionResources for ScriptedSession {
    async fn release_page(&mut self) -> Option<Result<(), anyhow::Error>> {
        self.page.take()?;
        Some(self.attempt("page"))
    }

    async fn release_context(&mut self) -> Option<Result<(), anyhow::Error>> {
        if !std::mem::take(&mut self.context_open) {
            return None;
        }
        Some(self.attempt("browser context"))
    }

    async fn release_driver(&mut self) -> Option<Result<(), anyhow::Error>> {
        if !std::mem::take(&mut self.driver_open) {
            return None;
        }
        Some(self.attempt("driver"))
    }
}
