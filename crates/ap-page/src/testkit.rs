//! Canned page driver for tests
//!
//! Dispatches on the `// probe: <name>` marker each probe script carries
//! and returns configured payloads, so detection, pre-processing, and
//! injection logic can be exercised without a browser. State mutations
//! (navigations, applied renders) are recorded through a shared handle
//! that survives cloning, which is also how `MockBrowser` hands out
//! auxiliary pages.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use ap_core::geometry::Rect;
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::driver::{
    AppliedRender, BrowserDriver, DriverError, DriverResult, ElementHandle, FrameInfo, PageDriver,
};
use crate::inject::RenderInstruction;

#[derive(Debug, Default)]
struct MockState {
    visited: Vec<String>,
    applied: Vec<String>,
}

/// Configurable fake page. Public fields are the canned probe payloads;
/// `Value::Null` reads as an empty result.
#[derive(Clone, Default)]
pub(crate) struct MockDriver {
    pub frames: Value,
    pub selectors: Value,
    pub patterns: Value,
    pub videos: Value,
    pub creative_refs: Value,
    pub settle: Value,
    /// Live geometry per selector; also what `query_all` resolves against
    pub boxes: HashMap<String, Rect>,
    /// Selectors whose injection should fail as not-found
    pub fail_selectors: HashSet<String>,
    pub fail_goto: bool,
    pub screenshot: Vec<u8>,
    /// Subframes reported by `list_frames`
    pub frame_infos: Vec<FrameInfo>,
    /// Frames-probe payload per subframe index
    pub frame_frames: HashMap<usize, Value>,
    /// Markup-probe payload per subframe index
    pub frame_markup: HashMap<usize, Value>,
    state: Arc<Mutex<MockState>>,
}

impl MockDriver {
    pub fn applied_selectors(&self) -> Vec<String> {
        self.state.lock().unwrap().applied.clone()
    }

    pub fn visited(&self) -> Vec<String> {
        self.state.lock().unwrap().visited.clone()
    }
}

#[async_trait]
impl PageDriver for MockDriver {
    async fn goto(&self, url: &str) -> DriverResult<()> {
        if self.fail_goto {
            return Err(DriverError::Navigation("refused by mock".to_string()));
        }
        self.state.lock().unwrap().visited.push(url.to_string());
        Ok(())
    }

    async fn evaluate(&self, script: &str, args: Vec<Value>) -> DriverResult<Value> {
        if script.contains("probe: frames") {
            return Ok(self.frames.clone());
        }
        if script.contains("probe: selectors") {
            return Ok(self.selectors.clone());
        }
        if script.contains("probe: patterns") {
            return Ok(self.patterns.clone());
        }
        if script.contains("probe: resolve") {
            // Mint deterministic selectors for whatever indices were asked
            let indices: Vec<usize> = args
                .first()
                .and_then(|v| serde_json::from_value(v.clone()).ok())
                .unwrap_or_default();
            let resolved: Vec<Value> = indices
                .iter()
                .map(|i| json!({ "index": i, "selector": format!("#resolved-{}", i) }))
                .collect();
            return Ok(Value::Array(resolved));
        }
        if script.contains("probe: videos") {
            return Ok(self.videos.clone());
        }
        if script.contains("probe: creative-refs") {
            return Ok(self.creative_refs.clone());
        }
        if script.contains("probe: settle") {
            return Ok(self.settle.clone());
        }
        Ok(Value::Null)
    }

    async fn query_all(&self, selector: &str) -> DriverResult<Vec<ElementHandle>> {
        if self.boxes.contains_key(selector) {
            Ok(vec![ElementHandle::new(selector, 0)])
        } else {
            Ok(Vec::new())
        }
    }

    async fn bounding_box(&self, handle: &ElementHandle) -> DriverResult<Option<Rect>> {
        Ok(self.boxes.get(&handle.selector).copied())
    }

    async fn click(&self, handle: &ElementHandle) -> DriverResult<()> {
        if self.boxes.contains_key(&handle.selector) {
            Ok(())
        } else {
            Err(DriverError::ElementNotFound(handle.selector.clone()))
        }
    }

    async fn apply_render(
        &self,
        selector: &str,
        instruction: &RenderInstruction,
    ) -> DriverResult<AppliedRender> {
        if self.fail_selectors.contains(selector) {
            return Err(DriverError::ElementNotFound(selector.to_string()));
        }
        self.state.lock().unwrap().applied.push(selector.to_string());
        Ok(AppliedRender {
            width: instruction.width,
            height: instruction.height,
        })
    }

    async fn list_frames(&self) -> DriverResult<Vec<FrameInfo>> {
        Ok(self.frame_infos.clone())
    }

    async fn evaluate_in_frame(
        &self,
        frame: &FrameInfo,
        script: &str,
        _args: Vec<Value>,
    ) -> DriverResult<Value> {
        if script.contains("probe: frames") {
            return Ok(self
                .frame_frames
                .get(&frame.index)
                .cloned()
                .unwrap_or(Value::Null));
        }
        if script.contains("probe: frame-markup") {
            return Ok(self
                .frame_markup
                .get(&frame.index)
                .cloned()
                .unwrap_or(Value::Null));
        }
        Ok(Value::Null)
    }

    async fn screenshot_png(&self) -> DriverResult<Vec<u8>> {
        if self.screenshot.is_empty() {
            return Err(DriverError::Screenshot("no capture configured".to_string()));
        }
        Ok(self.screenshot.clone())
    }

    async fn close(&self) -> DriverResult<()> {
        Ok(())
    }
}

/// Fake browser handing out clones of a template page. The clones share
/// the template's recorded state, so assertions see what auxiliary
/// pages did after they are closed.
#[derive(Clone, Default)]
pub(crate) struct MockBrowser {
    template: MockDriver,
    opened: Arc<Mutex<Vec<(u32, u32)>>>,
}

impl MockBrowser {
    pub fn new(template: MockDriver) -> Self {
        MockBrowser {
            template,
            opened: Arc::default(),
        }
    }

    /// Page sizes requested so far, in order.
    pub fn opened_sizes(&self) -> Vec<(u32, u32)> {
        self.opened.lock().unwrap().clone()
    }

    pub fn visited(&self) -> Vec<String> {
        self.template.visited()
    }
}

#[async_trait]
impl BrowserDriver for MockBrowser {
    async fn new_page(&self, width: u32, height: u32) -> DriverResult<Box<dyn PageDriver>> {
        self.opened.lock().unwrap().push((width, height));
        Ok(Box::new(self.template.clone()))
    }
}
