//! Driver contract for page-facing components
//!
//! Everything in this crate talks to the browser through these traits.
//! The browser handle is an explicitly passed resource owned by the
//! caller; nothing here holds a global session. Geometry is reported in
//! client (viewport) coordinates throughout.

use ap_core::geometry::Rect;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::inject::RenderInstruction;

// =============================================================================
// Errors
// =============================================================================

/// Errors surfaced by a page driver.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("script evaluation failed: {0}")]
    Evaluate(String),
    #[error("element not found: {0}")]
    ElementNotFound(String),
    #[error("invalid selector: {0}")]
    InvalidSelector(String),
    #[error("screenshot failed: {0}")]
    Screenshot(String),
    #[error("frame not accessible: {0}")]
    FrameInaccessible(String),
    #[error("driver transport error: {0}")]
    Transport(String),
    #[error("unexpected payload shape: {0}")]
    Payload(String),
}

pub type DriverResult<T> = Result<T, DriverError>;

// =============================================================================
// Handles
// =============================================================================

/// Re-resolvable reference to a DOM element: a selector plus the match
/// ordinal within it. Valid only against the page that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
    pub selector: String,
    pub index: usize,
}

impl ElementHandle {
    pub fn new(selector: impl Into<String>, index: usize) -> Self {
        Self { selector: selector.into(), index }
    }
}

/// A subframe of the current page. `index` is the frame's position in the
/// top document's iframe order, which drivers must keep consistent with
/// the frame list they expose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    pub index: usize,
    pub url: Option<String>,
}

/// Box the driver actually rendered for one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedRender {
    pub width: u32,
    pub height: u32,
}

// =============================================================================
// Traits
// =============================================================================

/// One open page.
///
/// Scripts passed to `evaluate` are JavaScript function bodies with their
/// parameters bound to `arguments`, returning a JSON-serializable value.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn goto(&self, url: &str) -> DriverResult<()>;

    /// Run a script in page context and return its structured result.
    async fn evaluate(&self, script: &str, args: Vec<Value>) -> DriverResult<Value>;

    /// All elements currently matching a selector, in document order.
    async fn query_all(&self, selector: &str) -> DriverResult<Vec<ElementHandle>>;

    /// Live geometry; `None` when the element no longer resolves or has
    /// gone unmeasurable. Stale handles are an expected condition here,
    /// not an error.
    async fn bounding_box(&self, handle: &ElementHandle) -> DriverResult<Option<Rect>>;

    async fn click(&self, handle: &ElementHandle) -> DriverResult<()>;

    /// Interpret a render instruction against the first element matching
    /// `selector`, locking its box before replacing the contents.
    async fn apply_render(
        &self,
        selector: &str,
        instruction: &RenderInstruction,
    ) -> DriverResult<AppliedRender>;

    /// Subframes of the page, in top-document iframe order.
    async fn list_frames(&self) -> DriverResult<Vec<FrameInfo>>;

    /// Run a script inside a subframe. Cross-origin frames surface
    /// `FrameInaccessible`.
    async fn evaluate_in_frame(
        &self,
        frame: &FrameInfo,
        script: &str,
        args: Vec<Value>,
    ) -> DriverResult<Value>;

    async fn screenshot_png(&self) -> DriverResult<Vec<u8>>;

    async fn close(&self) -> DriverResult<()>;
}

/// A browser able to open auxiliary pages, used by the pre-processor to
/// render preview wrappers in isolation.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn new_page(&self, width: u32, height: u32) -> DriverResult<Box<dyn PageDriver>>;
}
