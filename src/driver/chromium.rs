// src/driver/chromium.rs

//! Chromium backend built on `chromiumoxide`.
//!
//! Each context launches its own headless Chromium with a private user-data
//! directory, which is what gives sessions genuinely isolated cookies and
//! storage. Because that profile directory outlives page state, contexts are
//! single-use: `recycle` reports `false` and the pool discards them after a
//! session, while the pool maintainer keeps fresh ones warm.

use super::{
    BrowserDriver, BrowserProfile, ClickOptions, ContextHandle, DomSignature, DriverError,
    ElementInfo, LifecycleEvent, MouseButton, NavigationOutcome, PageHandle, PagePoint, ReadNode,
    ReadTarget, TypePlan,
};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const LIFECYCLE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Extra settle time after `readyState === "complete"` that stands in for a
/// network-idle signal.
const NETWORK_IDLE_SETTLE: Duration = Duration::from_millis(500);

impl From<chromiumoxide::error::CdpError> for DriverError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        DriverError::Backend(e.to_string())
    }
}

/// Launches one isolated Chromium per context.
#[derive(Debug, Default)]
pub struct ChromiumDriver;

impl ChromiumDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn new_context(
        &self,
        profile: &BrowserProfile,
    ) -> Result<Box<dyn ContextHandle>, DriverError> {
        let user_data_dir =
            std::env::temp_dir().join(format!("browsergate-ctx-{}", uuid::Uuid::new_v4()));

        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-software-rasterizer")
            .user_data_dir(&user_data_dir)
            .viewport(chromiumoxide::handler::viewport::Viewport {
                width: profile.viewport_width,
                height: profile.viewport_height,
                device_scale_factor: Some(1.0),
                emulating_mobile: false,
                is_landscape: true,
                has_touch: false,
            });
        if profile.headless {
            builder = builder.new_headless_mode();
        } else {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(DriverError::Backend)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Backend(format!("failed to launch Chromium: {e}")))?;

        // The handler stream must be pumped for the browser connection to
        // make progress; it ends when the browser process goes away.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "CDP handler event error");
                }
            }
        });

        Ok(Box::new(ChromiumContext {
            browser,
            handler_task,
            user_data_dir,
            closed: AtomicBool::new(false),
        }))
    }
}

struct ChromiumContext {
    browser: Browser,
    handler_task: JoinHandle<()>,
    user_data_dir: PathBuf,
    closed: AtomicBool,
}

#[async_trait]
impl ContextHandle for ChromiumContext {
    async fn new_page(&self) -> Result<Arc<dyn PageHandle>, DriverError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DriverError::Closed);
        }
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| DriverError::Backend(format!("failed to open page: {e}")))?;
        Ok(Arc::new(ChromiumPage { page }))
    }

    async fn is_healthy(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && !self.handler_task.is_finished()
    }

    async fn recycle(&self) -> Result<bool, DriverError> {
        // The user-data directory keeps cookies and storage across pages, so
        // a recycled context would leak one session's state into the next.
        Ok(false)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl Drop for ChromiumContext {
    fn drop(&mut self) {
        // The Browser's own drop kills the child process; we only have to
        // stop pumping events and clear the profile directory.
        self.handler_task.abort();
        if let Err(e) = std::fs::remove_dir_all(&self.user_data_dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.user_data_dir.display(), error = %e, "failed to remove context profile dir");
            }
        }
    }
}

struct ChromiumPage {
    page: chromiumoxide::Page,
}

#[derive(Deserialize)]
struct WireReadNode {
    value: serde_json::Value,
    tag: String,
}

#[derive(Deserialize)]
struct WireSignature {
    url: String,
    title: String,
    count: u64,
    hash: u64,
}

impl ChromiumPage {
    async fn eval_json(&self, script: &str) -> Result<serde_json::Value, DriverError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| DriverError::Script(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    /// JSON-encodes a string into a JS literal, escaping included.
    fn js_literal(value: &str) -> String {
        serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
    }

    async fn element_bounds(&self, selector: &str) -> Result<Option<super::Rect>, DriverError> {
        let sel = Self::js_literal(selector);
        let script = format!(
            "(() => {{ const el = document.querySelector({sel}); if (!el) return null; \
             const r = el.getBoundingClientRect(); \
             return {{ x: r.x, y: r.y, width: r.width, height: r.height }}; }})()"
        );
        let value = self.eval_json(&script).await?;
        Ok(serde_json::from_value(value).ok())
    }

    async fn ready_state(&self) -> Result<String, DriverError> {
        match self.eval_json("document.readyState").await? {
            serde_json::Value::String(s) => Ok(s),
            _ => Ok(String::new()),
        }
    }
}

#[async_trait]
impl PageHandle for ChromiumPage {
    async fn navigate(
        &self,
        url: &str,
        wait_until: LifecycleEvent,
        referer: Option<&str>,
    ) -> Result<NavigationOutcome, DriverError> {
        let mut builder = chromiumoxide::cdp::browser_protocol::page::NavigateParams::builder()
            .url(url);
        if let Some(referer) = referer {
            builder = builder.referrer(referer);
        }
        let params = builder.build().map_err(DriverError::Navigation)?;
        self.page
            .goto(params)
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?;
        self.wait_for_lifecycle(wait_until).await?;
        let final_url = self.current_url().await?;
        Ok(NavigationOutcome {
            redirected: !urls_equivalent(url, &final_url),
            final_url,
        })
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    async fn title(&self) -> Result<String, DriverError> {
        Ok(self.page.get_title().await?.unwrap_or_default())
    }

    async fn query(&self, selector: &str) -> Result<Option<ElementInfo>, DriverError> {
        let sel = Self::js_literal(selector);
        let script = format!(
            "(() => {{ const el = document.querySelector({sel}); if (!el) return null; \
             const r = el.getBoundingClientRect(); const s = window.getComputedStyle(el); \
             const visible = s.display !== 'none' && s.visibility !== 'hidden' && r.width > 0 && r.height > 0; \
             const editable = (el.matches('input, textarea, select') && !el.disabled && !el.readOnly) || el.isContentEditable; \
             return {{ tag: el.tagName.toLowerCase(), visible: visible, editable: editable, \
                       bounds: {{ x: r.x, y: r.y, width: r.width, height: r.height }} }}; }})()"
        );
        let value = self.eval_json(&script).await?;
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| DriverError::Script(format!("bad element info shape: {e}")))
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<ElementInfo>, DriverError> {
        let sel = Self::js_literal(selector);
        let script = format!(
            "(() => Array.from(document.querySelectorAll({sel})).map(el => {{ \
             const r = el.getBoundingClientRect(); const s = window.getComputedStyle(el); \
             return {{ tag: el.tagName.toLowerCase(), \
                       visible: s.display !== 'none' && s.visibility !== 'hidden' && r.width > 0 && r.height > 0, \
                       editable: (el.matches('input, textarea, select') && !el.disabled && !el.readOnly) || el.isContentEditable, \
                       bounds: {{ x: r.x, y: r.y, width: r.width, height: r.height }} }}; }}))()"
        );
        let value = self.eval_json(&script).await?;
        serde_json::from_value(value)
            .map_err(|e| DriverError::Script(format!("bad element info shape: {e}")))
    }

    async fn click(&self, selector: &str, opts: &ClickOptions) -> Result<PagePoint, DriverError> {
        let bounds = self
            .element_bounds(selector)
            .await?
            .ok_or(DriverError::NotFound)?;
        let point = bounds.point_at(opts.position);

        let plain = matches!(opts.button, MouseButton::Left)
            && opts.click_count == 1
            && opts.position.is_none();
        if plain {
            let element = self
                .page
                .find_element(selector)
                .await
                .map_err(|_| DriverError::NotFound)?;
            element
                .click()
                .await
                .map_err(|e| DriverError::Backend(e.to_string()))?;
        } else {
            // Synthetic event path for non-default buttons, multi-clicks and
            // in-box positions.
            let sel = Self::js_literal(selector);
            let button = match opts.button {
                MouseButton::Left => 0,
                MouseButton::Middle => 1,
                MouseButton::Right => 2,
            };
            let script = format!(
                "(() => {{ const el = document.querySelector({sel}); if (!el) return false; \
                 const opts = {{ bubbles: true, cancelable: true, view: window, button: {button}, \
                                clientX: {x}, clientY: {y} }}; \
                 for (let i = 0; i < {count}; i++) {{ \
                   el.dispatchEvent(new MouseEvent('mousedown', opts)); \
                   el.dispatchEvent(new MouseEvent('mouseup', opts)); \
                   el.dispatchEvent(new MouseEvent({button} === 2 ? 'contextmenu' : 'click', opts)); \
                 }} return true; }})()",
                x = point.x,
                y = point.y,
                count = opts.click_count,
            );
            if self.eval_json(&script).await? != serde_json::Value::Bool(true) {
                return Err(DriverError::NotFound);
            }
        }
        Ok(point)
    }

    async fn fill(&self, selector: &str, text: &str, plan: &TypePlan) -> Result<(), DriverError> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| DriverError::NotFound)?;
        element
            .focus()
            .await
            .map_err(|e| DriverError::Backend(e.to_string()))?;

        if plan.clear_first {
            let sel = Self::js_literal(selector);
            let script = format!(
                "(() => {{ const el = document.querySelector({sel}); if (!el) return false; \
                 if ('value' in el) {{ el.value = ''; el.dispatchEvent(new Event('input', {{bubbles: true}})); }} \
                 else if (el.isContentEditable) {{ el.textContent = ''; }} return true; }})()"
            );
            self.eval_json(&script).await?;
        }

        match plan.delay_ms {
            Some(delay) if delay > 0 => {
                for ch in text.chars() {
                    element
                        .type_str(ch.to_string())
                        .await
                        .map_err(|e| DriverError::Backend(e.to_string()))?;
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
            }
            _ => {
                element
                    .type_str(text)
                    .await
                    .map_err(|e| DriverError::Backend(e.to_string()))?;
            }
        }

        if plan.press_enter {
            element
                .press_key("Enter")
                .await
                .map_err(|e| DriverError::Backend(e.to_string()))?;
        }
        Ok(())
    }

    async fn read(
        &self,
        selector: &str,
        target: &ReadTarget,
        multiple: bool,
    ) -> Result<Vec<ReadNode>, DriverError> {
        let sel = Self::js_literal(selector);
        let read_expr = match target {
            ReadTarget::Text => "el.textContent".to_string(),
            ReadTarget::Html => "el.innerHTML".to_string(),
            ReadTarget::Attribute(name) => {
                format!("el.getAttribute({})", Self::js_literal(name))
            }
            ReadTarget::Property(name) => format!("el[{}]", Self::js_literal(name)),
        };
        let script = format!(
            "(() => {{ const nodes = Array.from(document.querySelectorAll({sel})); \
             const pick = {multiple} ? nodes : nodes.slice(0, 1); \
             return pick.map(el => ({{ value: {read_expr}, tag: el.tagName.toLowerCase() }})); }})()"
        );
        let value = self.eval_json(&script).await?;
        let nodes: Vec<WireReadNode> = serde_json::from_value(value)
            .map_err(|e| DriverError::Script(format!("bad read shape: {e}")))?;
        if nodes.is_empty() {
            return Err(DriverError::NotFound);
        }
        Ok(nodes
            .into_iter()
            .map(|n| ReadNode {
                value: n.value,
                tag: n.tag,
            })
            .collect())
    }

    async fn eval(&self, script: &str) -> Result<serde_json::Value, DriverError> {
        self.eval_json(script).await
    }

    async fn wait_for_lifecycle(&self, event: LifecycleEvent) -> Result<(), DriverError> {
        loop {
            let state = self.ready_state().await?;
            let reached = match event {
                LifecycleEvent::DomContentLoaded => state == "interactive" || state == "complete",
                LifecycleEvent::Load | LifecycleEvent::NetworkIdle => state == "complete",
            };
            if reached {
                break;
            }
            tokio::time::sleep(LIFECYCLE_POLL_INTERVAL).await;
        }
        if matches!(event, LifecycleEvent::NetworkIdle) {
            tokio::time::sleep(NETWORK_IDLE_SETTLE).await;
        }
        Ok(())
    }

    async fn dom_signature(&self) -> Result<DomSignature, DriverError> {
        let script = "(() => { const tags = Array.from(document.getElementsByTagName('*')).map(e => e.tagName); \
             let h = 2166136261 >>> 0; \
             for (const t of tags) { \
               for (let i = 0; i < t.length; i++) { h ^= t.charCodeAt(i); h = Math.imul(h, 16777619) >>> 0; } \
               h ^= 47; h = Math.imul(h, 16777619) >>> 0; \
             } \
             return { url: location.href, title: document.title, count: tags.length, hash: h }; })()";
        let value = self.eval_json(script).await?;
        let wire: WireSignature = serde_json::from_value(value)
            .map_err(|e| DriverError::Script(format!("bad signature shape: {e}")))?;
        Ok(DomSignature {
            url: wire.url,
            title: wire.title,
            element_count: wire.count,
            structure_hash: wire.hash,
        })
    }

    async fn reset(&self) -> Result<(), DriverError> {
        self.page
            .goto("about:blank")
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?;
        Ok(())
    }
}

/// Trailing-slash-insensitive URL comparison, for redirect detection.
fn urls_equivalent(requested: &str, landed: &str) -> bool {
    requested.trim_end_matches('/') == landed.trim_end_matches('/')
}
