//! WebDriver-backed drivers
//!
//! Adapts a chromedriver session behind the page and browser traits.
//! Geometry goes through an in-page script rather than the WebDriver
//! element-rect call, which reports document coordinates; everything in
//! this crate works in client coordinates.

use ap_core::geometry::Rect;
use async_trait::async_trait;
use serde_json::{json, Value};
use thirtyfour::prelude::*;
use thirtyfour::ChromeCapabilities;

use crate::driver::{
    AppliedRender, BrowserDriver, DriverError, DriverResult, ElementHandle, FrameInfo, PageDriver,
};
use crate::inject::RenderInstruction;
use crate::probe;

const RECT_SCRIPT: &str = "\
var list = document.querySelectorAll(arguments[0]);\n\
var el = list[arguments[1]];\n\
if (!el) return null;\n\
var r = el.getBoundingClientRect();\n\
return { x: r.x, y: r.y, width: r.width, height: r.height };";

const LIST_FRAMES_SCRIPT: &str = "\
var out = [];\n\
var frames = document.querySelectorAll('iframe');\n\
for (var i = 0; i < frames.length; i++) {\n\
  out.push(frames[i].src || '');\n\
}\n\
return out;";

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct WebDriverConfig {
    /// chromedriver endpoint
    pub webdriver_url: String,
    pub headless: bool,
    /// Window size for primary pages; auxiliary pages pick their own.
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        WebDriverConfig {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: true,
            window_width: 1366,
            window_height: 900,
        }
    }
}

// =============================================================================
// Browser
// =============================================================================

/// Opens WebDriver sessions on demand. Each page is its own session, so
/// auxiliary preview pages are fully isolated from the primary page.
pub struct WebDriverBrowser {
    config: WebDriverConfig,
}

impl WebDriverBrowser {
    pub fn new(config: WebDriverConfig) -> Self {
        WebDriverBrowser { config }
    }

    pub fn config(&self) -> &WebDriverConfig {
        &self.config
    }

    /// Open a page at the given window size.
    pub async fn open_page(&self, width: u32, height: u32) -> DriverResult<WebDriverPage> {
        let mut caps = ChromeCapabilities::new();
        let window_arg = format!("--window-size={},{}", width, height);
        caps.add_arg(&window_arg).map_err(transport)?;
        caps.add_arg("--no-first-run").map_err(transport)?;
        caps.add_arg("--no-default-browser-check").map_err(transport)?;
        caps.add_arg("--hide-scrollbars").map_err(transport)?;
        if self.config.headless {
            caps.add_arg("--headless=new").map_err(transport)?;
            caps.add_arg("--disable-gpu").map_err(transport)?;
        }

        let driver = WebDriver::new(&self.config.webdriver_url, caps)
            .await
            .map_err(|e| DriverError::Transport(format!("webdriver connect failed: {}", e)))?;
        Ok(WebDriverPage { driver })
    }
}

#[async_trait]
impl BrowserDriver for WebDriverBrowser {
    async fn new_page(&self, width: u32, height: u32) -> DriverResult<Box<dyn PageDriver>> {
        let page = self.open_page(width, height).await?;
        Ok(Box::new(page))
    }
}

fn transport<E: std::fmt::Display>(e: E) -> DriverError {
    DriverError::Transport(e.to_string())
}

// =============================================================================
// Page
// =============================================================================

/// One WebDriver session viewed as a page.
pub struct WebDriverPage {
    driver: WebDriver,
}

#[async_trait]
impl PageDriver for WebDriverPage {
    async fn goto(&self, url: &str) -> DriverResult<()> {
        self.driver
            .goto(url)
            .await
            .map_err(|e| DriverError::Navigation(format!("{}: {}", url, e)))
    }

    async fn evaluate(&self, script: &str, args: Vec<Value>) -> DriverResult<Value> {
        let ret = self
            .driver
            .execute(script, args)
            .await
            .map_err(|e| DriverError::Evaluate(e.to_string()))?;
        Ok(ret.json().clone())
    }

    async fn query_all(&self, selector: &str) -> DriverResult<Vec<ElementHandle>> {
        let found = self
            .driver
            .find_all(By::Css(selector))
            .await
            .map_err(|e| DriverError::InvalidSelector(format!("{}: {}", selector, e)))?;
        Ok((0..found.len())
            .map(|index| ElementHandle::new(selector, index))
            .collect())
    }

    async fn bounding_box(&self, handle: &ElementHandle) -> DriverResult<Option<Rect>> {
        let args = vec![json!(handle.selector), json!(handle.index)];
        let ret = self
            .driver
            .execute(RECT_SCRIPT, args)
            .await
            .map_err(|e| DriverError::Evaluate(e.to_string()))?;
        let value = ret.json();
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| DriverError::Payload(e.to_string()))
    }

    async fn click(&self, handle: &ElementHandle) -> DriverResult<()> {
        let found = self
            .driver
            .find_all(By::Css(handle.selector.as_str()))
            .await
            .map_err(|e| DriverError::InvalidSelector(format!("{}: {}", handle.selector, e)))?;
        let element = found
            .get(handle.index)
            .ok_or_else(|| DriverError::ElementNotFound(handle.selector.clone()))?;
        element
            .click()
            .await
            .map_err(|e| DriverError::Evaluate(e.to_string()))
    }

    async fn apply_render(
        &self,
        selector: &str,
        instruction: &RenderInstruction,
    ) -> DriverResult<AppliedRender> {
        let instruction_value =
            serde_json::to_value(instruction).map_err(|e| DriverError::Payload(e.to_string()))?;
        let ret = self
            .driver
            .execute(probe::APPLY_RENDER, vec![json!(selector), instruction_value])
            .await
            .map_err(|e| DriverError::Evaluate(e.to_string()))?;
        let value = ret.json();
        if value.is_null() {
            return Err(DriverError::ElementNotFound(selector.to_string()));
        }
        serde_json::from_value(value.clone()).map_err(|e| DriverError::Payload(e.to_string()))
    }

    async fn list_frames(&self) -> DriverResult<Vec<FrameInfo>> {
        let ret = self
            .driver
            .execute(LIST_FRAMES_SCRIPT, Vec::new())
            .await
            .map_err(|e| DriverError::Evaluate(e.to_string()))?;
        let srcs: Vec<String> = serde_json::from_value(ret.json().clone())
            .map_err(|e| DriverError::Payload(e.to_string()))?;
        Ok(srcs
            .into_iter()
            .enumerate()
            .map(|(index, src)| FrameInfo {
                index,
                url: if src.is_empty() { None } else { Some(src) },
            })
            .collect())
    }

    async fn evaluate_in_frame(
        &self,
        frame: &FrameInfo,
        script: &str,
        args: Vec<Value>,
    ) -> DriverResult<Value> {
        let frames = self
            .driver
            .find_all(By::Tag("iframe"))
            .await
            .map_err(|e| DriverError::Evaluate(e.to_string()))?;
        let element = frames
            .into_iter()
            .nth(frame.index)
            .ok_or_else(|| DriverError::FrameInaccessible(format!("frame {} gone", frame.index)))?;
        element
            .enter_frame()
            .await
            .map_err(|e| DriverError::FrameInaccessible(format!("frame {}: {}", frame.index, e)))?;

        let result = self
            .driver
            .execute(script, args)
            .await
            .map_err(|e| DriverError::Evaluate(e.to_string()));
        // Climb back out even when the evaluate failed, or every later
        // call would run against the wrong document.
        self.driver.enter_default_frame().await.ok();

        Ok(result?.json().clone())
    }

    async fn screenshot_png(&self) -> DriverResult<Vec<u8>> {
        self.driver
            .screenshot_as_png()
            .await
            .map_err(|e| DriverError::Screenshot(e.to_string()))
    }

    async fn close(&self) -> DriverResult<()> {
        self.driver
            .clone()
            .quit()
            .await
            .map_err(|e| DriverError::Transport(e.to_string()))
    }
}
