// src/driver/sim.rs

//! Deterministic in-memory driver backend.
//!
//! Backs the test suite: tests install pages, redirects, failures and script
//! results up front, then drive the gateway end-to-end without a browser.
//! Element lookup is by exact selector string, which keeps scenarios
//! readable and the backend trivial.

use super::{
    BrowserDriver, BrowserProfile, ClickOptions, ContextHandle, DomSignature, DriverError,
    ElementInfo, LifecycleEvent, NavigationOutcome, PageHandle, PagePoint, ReadNode, ReadTarget,
    Rect, TypePlan,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Side effect attached to a simulated element's click handler.
#[derive(Debug, Clone)]
pub enum ClickEffect {
    /// Clicking navigates the page, like following a link.
    Navigate(String),
    /// Clicking rewrites the text of another element on the page.
    SetText { selector: String, text: String },
    /// Clicking removes every element matching the selector.
    Remove(String),
}

/// One scriptable element of a simulated page.
#[derive(Debug, Clone)]
pub struct SimElement {
    pub selector: String,
    pub tag: String,
    pub text: String,
    pub html: String,
    pub value: String,
    pub attrs: HashMap<String, String>,
    pub visible: bool,
    pub editable: bool,
    pub bounds: Rect,
    pub on_click: Option<ClickEffect>,
}

impl SimElement {
    pub fn new(selector: &str, tag: &str) -> Self {
        Self {
            selector: selector.to_string(),
            tag: tag.to_string(),
            text: String::new(),
            html: String::new(),
            value: String::new(),
            attrs: HashMap::new(),
            visible: true,
            editable: false,
            bounds: Rect {
                x: 0.0,
                y: 0.0,
                width: 100.0,
                height: 20.0,
            },
            on_click: None,
        }
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn html(mut self, html: &str) -> Self {
        self.html = html.to_string();
        self
    }

    pub fn value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn editable(mut self) -> Self {
        self.editable = true;
        self
    }

    pub fn bounds(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.bounds = Rect {
            x,
            y,
            width,
            height,
        };
        self
    }

    pub fn on_click(mut self, effect: ClickEffect) -> Self {
        self.on_click = Some(effect);
        self
    }

    fn info(&self) -> ElementInfo {
        ElementInfo {
            tag: self.tag.clone(),
            visible: self.visible,
            editable: self.editable,
            bounds: Some(self.bounds),
        }
    }
}

/// A simulated page: a title plus elements in DOM order.
#[derive(Debug, Clone, Default)]
pub struct SimPage {
    pub title: String,
    pub elements: Vec<SimElement>,
}

impl SimPage {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            elements: Vec::new(),
        }
    }

    pub fn element(mut self, element: SimElement) -> Self {
        self.elements.push(element);
        self
    }
}

#[derive(Default)]
struct SiteMap {
    pages: Mutex<HashMap<String, SimPage>>,
    redirects: Mutex<HashMap<String, String>>,
    failing: Mutex<HashSet<String>>,
    eval_results: Mutex<HashMap<String, serde_json::Value>>,
    latency: Mutex<Option<Duration>>,
    poisoned: AtomicBool,
    reads: AtomicUsize,
}

/// The scriptable driver itself. Cloned handles share one site map.
#[derive(Default)]
pub struct SimDriver {
    site: Arc<SiteMap>,
    contexts_created: AtomicUsize,
}

impl SimDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a page at `url`.
    pub fn install_page(&self, url: &str, page: SimPage) {
        self.site.pages.lock().insert(url.to_string(), page);
    }

    /// Makes navigation to `from` land on `to` instead.
    pub fn install_redirect(&self, from: &str, to: &str) {
        self.site
            .redirects
            .lock()
            .insert(from.to_string(), to.to_string());
    }

    /// Makes navigation to `url` fail with a transport error.
    pub fn fail_navigation(&self, url: &str) {
        self.site.failing.lock().insert(url.to_string());
    }

    /// Fixes the value returned for an exact `eval` script string.
    pub fn set_eval_result(&self, script: &str, value: serde_json::Value) {
        self.site
            .eval_results
            .lock()
            .insert(script.to_string(), value);
    }

    /// Adds artificial latency to every navigation (for deadline tests).
    pub fn set_latency(&self, latency: Duration) {
        *self.site.latency.lock() = Some(latency);
    }

    /// Marks every context, present and future, as unhealthy.
    pub fn poison_contexts(&self) {
        self.site.poisoned.store(true, Ordering::SeqCst);
    }

    pub fn contexts_created(&self) -> usize {
        self.contexts_created.load(Ordering::SeqCst)
    }

    /// How many element reads have hit the backend (cache tests use this to
    /// prove an executor call did or did not happen).
    pub fn read_count(&self) -> usize {
        self.site.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserDriver for SimDriver {
    async fn new_context(
        &self,
        _profile: &BrowserProfile,
    ) -> Result<Box<dyn ContextHandle>, DriverError> {
        self.contexts_created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SimContext {
            site: self.site.clone(),
            state: Arc::new(Mutex::new(PageState::blank())),
            closed: AtomicBool::new(false),
        }))
    }
}

#[derive(Debug, Clone)]
struct PageState {
    url: String,
    title: String,
    elements: Vec<SimElement>,
}

impl PageState {
    fn blank() -> Self {
        Self {
            url: "about:blank".to_string(),
            title: String::new(),
            elements: Vec::new(),
        }
    }
}

struct SimContext {
    site: Arc<SiteMap>,
    state: Arc<Mutex<PageState>>,
    closed: AtomicBool,
}

#[async_trait]
impl ContextHandle for SimContext {
    async fn new_page(&self) -> Result<Arc<dyn PageHandle>, DriverError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DriverError::Closed);
        }
        *self.state.lock() = PageState::blank();
        Ok(Arc::new(SimPageHandle {
            site: self.site.clone(),
            state: self.state.clone(),
        }))
    }

    async fn is_healthy(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && !self.site.poisoned.load(Ordering::SeqCst)
    }

    async fn recycle(&self) -> Result<bool, DriverError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DriverError::Closed);
        }
        *self.state.lock() = PageState::blank();
        Ok(true)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

struct SimPageHandle {
    site: Arc<SiteMap>,
    state: Arc<Mutex<PageState>>,
}

impl SimPageHandle {
    fn load(&self, url: &str) -> Result<NavigationOutcome, DriverError> {
        if self.site.failing.lock().contains(url) {
            return Err(DriverError::Navigation(format!("connection refused: {url}")));
        }
        let target = self
            .site
            .redirects
            .lock()
            .get(url)
            .cloned()
            .unwrap_or_else(|| url.to_string());
        let redirected = target != url;
        let page = self.site.pages.lock().get(&target).cloned();
        let mut state = self.state.lock();
        match page {
            Some(page) => {
                state.url = target.clone();
                state.title = page.title;
                state.elements = page.elements;
            }
            None => {
                // An address nobody installed still "loads", just empty.
                state.url = target.clone();
                state.title = String::new();
                state.elements = Vec::new();
            }
        }
        Ok(NavigationOutcome {
            final_url: target,
            redirected,
        })
    }

    fn apply_click_effect(&self, effect: ClickEffect) -> Result<(), DriverError> {
        match effect {
            ClickEffect::Navigate(url) => {
                self.load(&url)?;
            }
            ClickEffect::SetText { selector, text } => {
                let mut state = self.state.lock();
                for element in state.elements.iter_mut() {
                    if element.selector == selector {
                        element.text = text.clone();
                    }
                }
            }
            ClickEffect::Remove(selector) => {
                let mut state = self.state.lock();
                state.elements.retain(|e| e.selector != selector);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PageHandle for SimPageHandle {
    async fn navigate(
        &self,
        url: &str,
        _wait_until: LifecycleEvent,
        _referer: Option<&str>,
    ) -> Result<NavigationOutcome, DriverError> {
        let latency = *self.site.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        self.load(url)
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        Ok(self.state.lock().url.clone())
    }

    async fn title(&self) -> Result<String, DriverError> {
        Ok(self.state.lock().title.clone())
    }

    async fn query(&self, selector: &str) -> Result<Option<ElementInfo>, DriverError> {
        Ok(self
            .state
            .lock()
            .elements
            .iter()
            .find(|e| e.selector == selector)
            .map(SimElement::info))
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<ElementInfo>, DriverError> {
        Ok(self
            .state
            .lock()
            .elements
            .iter()
            .filter(|e| e.selector == selector)
            .map(SimElement::info)
            .collect())
    }

    async fn click(&self, selector: &str, opts: &ClickOptions) -> Result<PagePoint, DriverError> {
        let (point, effect) = {
            let state = self.state.lock();
            let element = state
                .elements
                .iter()
                .find(|e| e.selector == selector)
                .ok_or(DriverError::NotFound)?;
            (element.bounds.point_at(opts.position), element.on_click.clone())
        };
        if let Some(effect) = effect {
            self.apply_click_effect(effect)?;
        }
        Ok(point)
    }

    async fn fill(&self, selector: &str, text: &str, plan: &TypePlan) -> Result<(), DriverError> {
        if let Some(delay) = plan.delay_ms {
            tokio::time::sleep(Duration::from_millis(delay * text.chars().count() as u64)).await;
        }
        let mut state = self.state.lock();
        let element = state
            .elements
            .iter_mut()
            .find(|e| e.selector == selector)
            .ok_or(DriverError::NotFound)?;
        if plan.clear_first {
            element.value = text.to_string();
        } else {
            element.value.push_str(text);
        }
        Ok(())
    }

    async fn read(
        &self,
        selector: &str,
        target: &ReadTarget,
        multiple: bool,
    ) -> Result<Vec<ReadNode>, DriverError> {
        self.site.reads.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock();
        let matches: Vec<&SimElement> = state
            .elements
            .iter()
            .filter(|e| e.selector == selector)
            .collect();
        if matches.is_empty() {
            return Err(DriverError::NotFound);
        }
        let picked: Vec<&SimElement> = if multiple {
            matches
        } else {
            vec![matches[0]]
        };
        Ok(picked
            .into_iter()
            .map(|element| {
                let value = match target {
                    ReadTarget::Text => serde_json::Value::String(element.text.clone()),
                    ReadTarget::Html => serde_json::Value::String(element.html.clone()),
                    ReadTarget::Attribute(name) => element
                        .attrs
                        .get(name)
                        .map(|v| serde_json::Value::String(v.clone()))
                        .unwrap_or(serde_json::Value::Null),
                    ReadTarget::Property(name) => match name.as_str() {
                        "value" => serde_json::Value::String(element.value.clone()),
                        "textContent" => serde_json::Value::String(element.text.clone()),
                        "tagName" => {
                            serde_json::Value::String(element.tag.to_ascii_uppercase())
                        }
                        _ => serde_json::Value::Null,
                    },
                };
                ReadNode {
                    value,
                    tag: element.tag.clone(),
                }
            })
            .collect())
    }

    async fn eval(&self, script: &str) -> Result<serde_json::Value, DriverError> {
        Ok(self
            .site
            .eval_results
            .lock()
            .get(script)
            .cloned()
            .unwrap_or(serde_json::Value::Null))
    }

    async fn wait_for_lifecycle(&self, _event: LifecycleEvent) -> Result<(), DriverError> {
        // Simulated pages are fully settled the instant they load.
        Ok(())
    }

    async fn dom_signature(&self) -> Result<DomSignature, DriverError> {
        let state = self.state.lock();
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for element in &state.elements {
            for piece in [&element.tag, &element.text, &element.value] {
                for byte in piece.as_bytes() {
                    hash ^= u64::from(*byte);
                    hash = hash.wrapping_mul(0x1000_0000_01b3);
                }
            }
            hash ^= u64::from(b'/');
            hash = hash.wrapping_mul(0x1000_0000_01b3);
        }
        Ok(DomSignature {
            url: state.url.clone(),
            title: state.title.clone(),
            element_count: state.elements.len() as u64,
            structure_hash: hash,
        })
    }

    async fn reset(&self) -> Result<(), DriverError> {
        *self.state.lock() = PageState::blank();
        Ok(())
    }
}
