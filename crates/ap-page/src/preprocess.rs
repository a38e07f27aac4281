//! Creative pre-processing
//!
//! Third-party platforms often hand out preview-page URLs rather than
//! direct assets. Each such reference is rendered in an auxiliary page
//! and mined for the creative inside, walking a fixed ladder: offsite
//! iframe near the expected size, nested same-origin frame or its
//! markup, explicit creative-URL attributes, then URLs in inline script
//! text. Failing all of that the rendered page itself is captured as an
//! inline image. A failure for one creative never aborts the batch; it
//! degrades to passing the original reference through.

use std::mem;
use std::time::Duration;

use ap_core::geometry::{Rect, Size};
use ap_core::types::{Creative, ResolvedContent};
use regex::Regex;
use tokio::sync::Semaphore;
use url::Url;

use crate::driver::{BrowserDriver, PageDriver};
use crate::probe;

// =============================================================================
// Preview Recognition
// =============================================================================

/// URL fragments of known ad-preview wrappers.
pub const PREVIEW_URL_MARKERS: &[&str] = &[
    "adform.com/bn/preview",
    "bn.adform.net",
    "preview.sizmek.com",
    "hub.celtra.com/preview",
    "flashtalking.com/preview",
    "studio.doubleclick.net/preview",
    "demo.tremorvideo.com",
    "adpreview",
];

/// Controls preview wrappers hide the creative behind.
const REVEAL_SELECTORS: &[&str] = &[
    "[data-preview-start]",
    "button.preview-start",
    ".preview-overlay button",
    "#preview-play",
];

/// True when `url` is an indirect reference that must be resolved
/// before it can be injected.
pub fn requires_resolution(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    for marker in PREVIEW_URL_MARKERS {
        if lower.contains(marker) {
            return true;
        }
    }
    false
}

/// Creative size announced in the preview URL's query parameters, or
/// `default` when none is.
pub fn expected_size_from_url(url: &str, default: Size) -> Size {
    size_from_query(url).unwrap_or(default)
}

fn size_from_query(url: &str) -> Option<Size> {
    let parsed = Url::parse(url).ok()?;
    let mut width: Option<u32> = None;
    let mut height: Option<u32> = None;
    for (key, value) in parsed.query_pairs() {
        match key.as_ref() {
            "w" | "width" => width = value.parse().ok(),
            "h" | "height" => height = value.parse().ok(),
            _ => {
                if let Some(size) = ap_core::geometry::parse_size(value.as_ref()) {
                    width = Some(size.width);
                    height = Some(size.height);
                }
            }
        }
    }
    match (width, height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => Some(Size::new(w, h)),
        _ => None,
    }
}

// =============================================================================
// Options
// =============================================================================

#[derive(Debug, Clone)]
pub struct PreprocessOptions {
    /// Preview pages rendered at once.
    pub concurrency: usize,
    /// Assumed creative size when the URL does not announce one.
    pub default_size: Size,
    /// Pixel slack when matching an embedded frame to the expected size.
    pub iframe_slack_px: u32,
    /// Time given to the preview page to render before inspection.
    pub settle: Duration,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        PreprocessOptions {
            concurrency: 2,
            default_size: Size::new(300, 250),
            iframe_slack_px: 50,
            settle: Duration::from_millis(1500),
        }
    }
}

// =============================================================================
// Resolution
// =============================================================================

enum Resolution {
    /// Injectable content located inside the preview page.
    Direct(ResolvedContent),
    /// Data URL of a capture of the rendered preview.
    Screenshot(String),
}

/// Resolve every creative that needs it, at most `concurrency` preview
/// pages at a time. Output order matches input order; creatives that
/// need no resolution pass through untouched.
pub async fn preprocess_creatives(
    browser: &dyn BrowserDriver,
    creatives: Vec<Creative>,
    options: &PreprocessOptions,
) -> Vec<Creative> {
    let pending = creatives
        .iter()
        .filter(|c| c.resolved.is_none() && requires_resolution(&c.url))
        .count();
    if pending > 0 {
        log::info!("pre-processing {} of {} creative(s)", pending, creatives.len());
    }

    let semaphore = Semaphore::new(options.concurrency.max(1));
    let tasks = creatives.into_iter().map(|creative| {
        let semaphore = &semaphore;
        async move {
            if creative.resolved.is_some() || !requires_resolution(&creative.url) {
                return creative;
            }
            let _permit = semaphore.acquire().await.ok();
            resolve_one(browser, creative, options).await
        }
    });
    futures::future::join_all(tasks).await
}

async fn resolve_one(
    browser: &dyn BrowserDriver,
    creative: Creative,
    options: &PreprocessOptions,
) -> Creative {
    let announced = size_from_query(&creative.url);
    let expected = announced.unwrap_or(options.default_size);

    // Generous page so the wrapper lays the creative out at full size.
    let page = match browser.new_page(expected.width + 400, expected.height + 400).await {
        Ok(page) => page,
        Err(e) => {
            log::warn!("preview page open failed for {}: {}", creative.url, e);
            return creative;
        }
    };
    let resolution = resolve_in_page(page.as_ref(), &creative.url, expected, options).await;
    page.close().await.ok();

    let mut creative = apply_resolution(creative, resolution);
    if creative.size.is_none() {
        // The URL told us the real dimensions; matching can use them.
        creative.size = announced;
    }
    creative
}

async fn resolve_in_page(
    page: &dyn PageDriver,
    preview_url: &str,
    expected: Size,
    options: &PreprocessOptions,
) -> Option<Resolution> {
    if let Err(e) = page.goto(preview_url).await {
        log::warn!("preview navigation failed for {}: {}", preview_url, e);
        return None;
    }
    tokio::time::sleep(options.settle).await;
    click_reveal(page).await;

    if let Some(content) =
        offsite_iframe(page, preview_url, expected, options.iframe_slack_px).await
    {
        return Some(Resolution::Direct(content));
    }
    if let Some(content) =
        nested_or_markup(page, preview_url, expected, options.iframe_slack_px).await
    {
        return Some(Resolution::Direct(content));
    }
    if let Some(content) = referenced_url(page).await {
        return Some(Resolution::Direct(content));
    }

    match page.screenshot_png().await {
        Ok(bytes) if !bytes.is_empty() => {
            use base64::Engine;
            let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
            Some(Resolution::Screenshot(format!("data:image/png;base64,{}", encoded)))
        }
        Ok(_) => None,
        Err(e) => {
            log::warn!("preview capture failed for {}: {}", preview_url, e);
            None
        }
    }
}

fn apply_resolution(mut creative: Creative, resolution: Option<Resolution>) -> Creative {
    match resolution {
        Some(Resolution::Direct(content)) => {
            creative.original_url = Some(creative.url.clone());
            creative.resolved = Some(content);
        }
        Some(Resolution::Screenshot(data_url)) => {
            creative.original_url = Some(mem::replace(&mut creative.url, data_url));
        }
        None => {
            log::warn!("creative {} not resolved, passing original through", creative.url);
        }
    }
    creative
}

/// Click the first present reveal control, then give the page a moment.
/// Everything here is best-effort.
async fn click_reveal(page: &dyn PageDriver) {
    for selector in REVEAL_SELECTORS {
        let handles = match page.query_all(selector).await {
            Ok(handles) => handles,
            Err(_) => continue,
        };
        if let Some(handle) = handles.first() {
            if page.click(handle).await.is_ok() {
                log::debug!("clicked reveal control {}", selector);
                tokio::time::sleep(Duration::from_millis(300)).await;
                return;
            }
        }
    }
}

// =============================================================================
// Resolution Ladder
// =============================================================================

/// (a) An iframe near the expected size served from a different host
/// than the wrapper is taken to be the creative itself.
async fn offsite_iframe(
    page: &dyn PageDriver,
    preview_url: &str,
    expected: Size,
    slack_px: u32,
) -> Option<ResolvedContent> {
    let frames = match probe::collect_frames(page).await {
        Ok(frames) => frames,
        Err(e) => {
            log::debug!("frame scan failed: {}", e);
            return None;
        }
    };
    let preview_host = host_of(preview_url);
    for frame in &frames {
        let src = frame.effective_src();
        if src.is_empty() || !near_expected(&frame.rect, expected, slack_px) {
            continue;
        }
        match host_of(src) {
            Some(host) if preview_host.as_deref() != Some(host.as_str()) => {
                return Some(ResolvedContent::FrameUrl(src.to_string()));
            }
            _ => {}
        }
    }
    None
}

/// (b) Enter same-origin wrapper frames of roughly the right size and
/// look for a deeper offsite creative frame; when there is none, the
/// frame's own markup is same-origin and injectable as is.
async fn nested_or_markup(
    page: &dyn PageDriver,
    preview_url: &str,
    expected: Size,
    slack_px: u32,
) -> Option<ResolvedContent> {
    let infos = match page.list_frames().await {
        Ok(infos) => infos,
        Err(e) => {
            log::debug!("frame list failed: {}", e);
            return None;
        }
    };
    let geometry = probe::collect_frames(page).await.unwrap_or_default();
    let preview_host = host_of(preview_url);

    for info in &infos {
        let frame_host = info.url.as_deref().and_then(host_of);
        if let Some(host) = &frame_host {
            if preview_host.as_deref() != Some(host.as_str()) {
                continue;
            }
        }
        if let Some(frame) = geometry.iter().find(|f| f.index == info.index) {
            if !near_expected(&frame.rect, expected, slack_px) {
                continue;
            }
        }

        match probe::collect_frames_in(page, info).await {
            Ok(inner) => {
                for frame in &inner {
                    let src = frame.effective_src();
                    if src.is_empty() || !near_expected(&frame.rect, expected, slack_px) {
                        continue;
                    }
                    if let Some(host) = host_of(src) {
                        if preview_host.as_deref() != Some(host.as_str()) {
                            return Some(ResolvedContent::FrameUrl(src.to_string()));
                        }
                    }
                }
            }
            Err(e) => {
                log::debug!("frame {} not inspectable: {}", info.index, e);
                continue;
            }
        }

        if let Ok(value) = page
            .evaluate_in_frame(info, probe::FRAME_MARKUP_PROBE, Vec::new())
            .await
        {
            if let Some(html) = value.as_str() {
                if html.trim().len() > 50 {
                    return Some(ResolvedContent::Markup(html.to_string()));
                }
            }
        }
    }
    None
}

/// (c) Explicit creative-URL attributes, then (d) asset URLs embedded
/// in inline script text.
async fn referenced_url(page: &dyn PageDriver) -> Option<ResolvedContent> {
    let refs = match probe::collect_creative_refs(page).await {
        Ok(refs) => refs,
        Err(e) => {
            log::debug!("creative-ref scan failed: {}", e);
            return None;
        }
    };
    for candidate in &refs.refs {
        if candidate.starts_with("http://") || candidate.starts_with("https://") {
            return Some(ResolvedContent::FrameUrl(candidate.clone()));
        }
    }
    for script in &refs.scripts {
        if let Some(url) = extract_creative_url(script) {
            return Some(ResolvedContent::FrameUrl(url));
        }
    }
    None
}

/// First asset-looking URL inside script text.
pub(crate) fn extract_creative_url(script: &str) -> Option<String> {
    let pattern =
        Regex::new(r#"https?://[^\s"'<>]+?\.(?:jpg|jpeg|png|gif|webp|html?)(?:\?[^\s"'<>]*)?"#)
            .ok()?;
    pattern.find(script).map(|m| m.as_str().to_string())
}

fn near_expected(rect: &Rect, expected: Size, slack_px: u32) -> bool {
    let slack = slack_px as f64;
    (rect.width - expected.width as f64).abs() <= slack
        && (rect.height - expected.height as f64).abs() <= slack
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url).ok()?.host_str().map(str::to_ascii_lowercase)
}
