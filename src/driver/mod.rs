// src/driver/mod.rs

//! The browser-control seam.
//!
//! The gateway core is written against these traits and never against a
//! concrete browser engine. `driver::chromium` is the production backend
//! (one isolated headless Chromium per context); `driver::sim` is a
//! deterministic in-memory backend that the test suite scripts.

pub mod chromium;
pub mod sim;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use chromium::ChromiumDriver;
pub use sim::{ClickEffect, SimDriver, SimElement, SimPage};

/// Failures surfaced by a driver backend. Executors translate these into the
/// gateway error taxonomy with per-command context.
#[derive(Error, Debug, Clone)]
pub enum DriverError {
    #[error("element not found")]
    NotFound,

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("page script failed: {0}")]
    Script(String),

    #[error("browser backend failed: {0}")]
    Backend(String),

    #[error("context is closed")]
    Closed,
}

/// Page-lifecycle milestones a navigation or wait can anchor on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleEvent {
    #[default]
    Load,
    DomContentLoaded,
    NetworkIdle,
}

/// Mouse button for click commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

/// Launch-time shape of a browser context.
#[derive(Debug, Clone)]
pub struct BrowserProfile {
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

/// An element bounding box in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A point in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PagePoint {
    pub x: f64,
    pub y: f64,
}

/// What the driver could observe about a matched element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementInfo {
    pub tag: String,
    pub visible: bool,
    /// True for enabled input-like elements (input, textarea, select,
    /// contenteditable) that accept text entry.
    pub editable: bool,
    pub bounds: Option<Rect>,
}

/// Outcome of a completed navigation.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationOutcome {
    pub final_url: String,
    pub redirected: bool,
}

/// The coarse page-state signals used by the state-diff envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct DomSignature {
    pub url: String,
    pub title: String,
    pub element_count: u64,
    pub structure_hash: u64,
}

/// How a click should be delivered.
#[derive(Debug, Clone)]
pub struct ClickOptions {
    pub button: MouseButton,
    pub click_count: u32,
    /// Fractional position inside the element bounding box; the driver
    /// resolves it to page coordinates. Defaults to the element center.
    pub position: Option<PagePoint>,
}

/// How text entry should be delivered.
#[derive(Debug, Clone)]
pub struct TypePlan {
    pub clear_first: bool,
    pub delay_ms: Option<u64>,
    pub press_enter: bool,
}

/// What an extract command reads off a matched element.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadTarget {
    Text,
    Html,
    Attribute(String),
    Property(String),
}

/// A value read from a matched element, paired with the element's tag name.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadNode {
    pub value: serde_json::Value,
    pub tag: String,
}

/// Entry point of a backend: hands out isolated contexts.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn new_context(
        &self,
        profile: &BrowserProfile,
    ) -> Result<Box<dyn ContextHandle>, DriverError>;
}

/// An isolated browser environment (its own cookies, storage, cache).
#[async_trait]
pub trait ContextHandle: Send + Sync {
    async fn new_page(&self) -> Result<std::sync::Arc<dyn PageHandle>, DriverError>;

    /// Whether the underlying handle is still usable.
    async fn is_healthy(&self) -> bool;

    /// Restores the context to a pristine state between sessions. `Ok(false)`
    /// means the backend cannot guarantee isolation after reuse and the pool
    /// must discard the context instead.
    async fn recycle(&self) -> Result<bool, DriverError>;

    /// Best-effort teardown. Backends also release resources on drop.
    async fn close(&self);
}

/// One page inside a context. All command executors run against this.
#[async_trait]
pub trait PageHandle: Send + Sync {
    async fn navigate(
        &self,
        url: &str,
        wait_until: LifecycleEvent,
        referer: Option<&str>,
    ) -> Result<NavigationOutcome, DriverError>;

    async fn current_url(&self) -> Result<String, DriverError>;

    async fn title(&self) -> Result<String, DriverError>;

    /// Inspects the first element matching `selector`, if any.
    async fn query(&self, selector: &str) -> Result<Option<ElementInfo>, DriverError>;

    /// Inspects every element matching `selector`, in DOM order.
    async fn query_all(&self, selector: &str) -> Result<Vec<ElementInfo>, DriverError>;

    /// Clicks the first match and reports the page coordinate that was hit.
    async fn click(&self, selector: &str, opts: &ClickOptions) -> Result<PagePoint, DriverError>;

    /// Types `text` into the first match according to the plan.
    async fn fill(&self, selector: &str, text: &str, plan: &TypePlan) -> Result<(), DriverError>;

    /// Reads `target` from the first match (or all matches in DOM order).
    async fn read(
        &self,
        selector: &str,
        target: &ReadTarget,
        multiple: bool,
    ) -> Result<Vec<ReadNode>, DriverError>;

    /// Evaluates a script in the page and returns its JSON value.
    async fn eval(&self, script: &str) -> Result<serde_json::Value, DriverError>;

    /// Resolves once the page has reached the given lifecycle milestone.
    async fn wait_for_lifecycle(&self, event: LifecycleEvent) -> Result<(), DriverError>;

    /// Captures the coarse signals used for state diffing.
    async fn dom_signature(&self) -> Result<DomSignature, DriverError>;

    /// Drops all page state (used after a cancelled primitive left the page
    /// in an unknown condition).
    async fn reset(&self) -> Result<(), DriverError>;
}

impl Rect {
    /// Resolves a fractional in-box position (or the center) to page
    /// coordinates.
    pub fn point_at(&self, fraction: Option<PagePoint>) -> PagePoint {
        let f = fraction.unwrap_or(PagePoint { x: 0.5, y: 0.5 });
        PagePoint {
            x: self.x + self.width * f.x,
            y: self.y + self.height * f.y,
        }
    }
}
