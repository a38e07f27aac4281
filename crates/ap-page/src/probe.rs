//! Raw DOM facts collected by in-page probes
//!
//! Probes are JavaScript function bodies (helpers prepended so each is
//! self-contained) returning flat serializable records. They synthesize
//! unique selectors in-page where needed and report everything else as
//! plain facts; every classification decision happens in Rust, where it
//! can be tested without a browser.

use ap_core::geometry::Rect;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::driver::{DriverError, DriverResult, FrameInfo, PageDriver};

// =============================================================================
// Probe Sources
// =============================================================================

pub(crate) const FRAMES_PROBE: &str =
    concat!(include_str!("js/helpers.js"), include_str!("js/collect_frames.js"));

pub(crate) const SELECTORS_PROBE: &str =
    concat!(include_str!("js/helpers.js"), include_str!("js/collect_selectors.js"));

pub(crate) const PATTERNS_PROBE: &str =
    concat!(include_str!("js/helpers.js"), include_str!("js/collect_patterns.js"));

pub(crate) const RESOLVE_PROBE: &str =
    concat!(include_str!("js/helpers.js"), include_str!("js/resolve_selectors.js"));

pub(crate) const VIDEOS_PROBE: &str =
    concat!(include_str!("js/helpers.js"), include_str!("js/collect_videos.js"));

pub(crate) const CREATIVE_REFS_PROBE: &str =
    concat!(include_str!("js/helpers.js"), include_str!("js/collect_creative_refs.js"));

pub(crate) const FRAME_MARKUP_PROBE: &str = include_str!("js/frame_markup.js");

pub(crate) const SETTLE_PROBE: &str = include_str!("js/settle_check.js");

#[cfg(feature = "webdriver")]
pub(crate) const APPLY_RENDER: &str = include_str!("js/apply_render.js");

// =============================================================================
// Records
// =============================================================================

/// One iframe reported by the frames probe.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct RawFrame {
    pub index: usize,
    pub id: String,
    pub name: String,
    pub src: String,
    pub data_src: String,
    pub rect: Rect,
}

impl RawFrame {
    /// src with data-src fallback, the way lazy-loading pages stash it.
    pub fn effective_src(&self) -> &str {
        if !self.src.is_empty() {
            &self.src
        } else {
            &self.data_src
        }
    }
}

/// Element found by the known-container selector pass.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct RawContainer {
    pub selector: String,
    pub matched_by: String,
    pub id: String,
    pub classes: String,
    pub rect: Rect,
}

/// Candidate from the whole-document id/class scan. Carries its scan index
/// so a selector can be minted later for winners only.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct RawCandidate {
    pub index: usize,
    pub id: String,
    pub classes: String,
    pub rect: Rect,
}

/// Minted selector for a candidate index.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct ResolvedSelector {
    pub index: usize,
    pub selector: String,
}

/// Native `<video>` element.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct RawVideo {
    pub selector: String,
    pub src: String,
    pub rect: Rect,
}

/// Payload of the videos probe.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct VideoScan {
    pub natives: Vec<RawVideo>,
    pub containers: Vec<RawContainer>,
}

/// Payload of the creative-refs probe.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct CreativeRefs {
    pub refs: Vec<String>,
    pub scripts: Vec<String>,
}

// =============================================================================
// Probe Runners
// =============================================================================

fn parse_payload<T: DeserializeOwned + Default>(value: Value) -> DriverResult<T> {
    if value.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(value).map_err(|e| DriverError::Payload(e.to_string()))
}

pub(crate) async fn collect_frames(page: &dyn PageDriver) -> DriverResult<Vec<RawFrame>> {
    let value = page.evaluate(FRAMES_PROBE, Vec::new()).await?;
    parse_payload(value)
}

/// Same frames scan, run inside a subframe.
pub(crate) async fn collect_frames_in(
    page: &dyn PageDriver,
    frame: &FrameInfo,
) -> DriverResult<Vec<RawFrame>> {
    let value = page.evaluate_in_frame(frame, FRAMES_PROBE, Vec::new()).await?;
    parse_payload(value)
}

pub(crate) async fn collect_containers(
    page: &dyn PageDriver,
    selectors: &[&str],
) -> DriverResult<Vec<RawContainer>> {
    let value = page.evaluate(SELECTORS_PROBE, vec![json!(selectors)]).await?;
    parse_payload(value)
}

pub(crate) async fn collect_pattern_candidates(
    page: &dyn PageDriver,
) -> DriverResult<Vec<RawCandidate>> {
    let value = page.evaluate(PATTERNS_PROBE, Vec::new()).await?;
    parse_payload(value)
}

pub(crate) async fn resolve_selectors(
    page: &dyn PageDriver,
    indices: &[usize],
) -> DriverResult<Vec<ResolvedSelector>> {
    if indices.is_empty() {
        return Ok(Vec::new());
    }
    let value = page.evaluate(RESOLVE_PROBE, vec![json!(indices)]).await?;
    parse_payload(value)
}

pub(crate) async fn collect_videos(
    page: &dyn PageDriver,
    container_selectors: &[&str],
) -> DriverResult<VideoScan> {
    let value = page
        .evaluate(VIDEOS_PROBE, vec![json!(container_selectors)])
        .await?;
    parse_payload(value)
}

pub(crate) async fn collect_creative_refs(page: &dyn PageDriver) -> DriverResult<CreativeRefs> {
    let value = page.evaluate(CREATIVE_REFS_PROBE, Vec::new()).await?;
    parse_payload(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_payload_null_is_empty() {
        let frames: Vec<RawFrame> = parse_payload(Value::Null).unwrap();
        assert!(frames.is_empty());

        let scan: VideoScan = parse_payload(Value::Null).unwrap();
        assert!(scan.natives.is_empty());
    }

    #[test]
    fn test_parse_payload_fills_missing_fields() {
        let value = json!([{ "index": 2, "src": "https://ads.example/frame" }]);
        let frames: Vec<RawFrame> = parse_payload(value).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].index, 2);
        assert_eq!(frames[0].id, "");
        assert_eq!(frames[0].rect.width, 0.0);
    }

    #[test]
    fn test_parse_payload_rejects_wrong_shape() {
        let err = parse_payload::<Vec<RawFrame>>(json!({"not": "a list"}));
        assert!(err.is_err());
    }

    #[test]
    fn test_effective_src_prefers_src() {
        let mut frame = RawFrame {
            src: "https://a.example/x".to_string(),
            data_src: "https://b.example/y".to_string(),
            ..RawFrame::default()
        };
        assert_eq!(frame.effective_src(), "https://a.example/x");

        frame.src.clear();
        assert_eq!(frame.effective_src(), "https://b.example/y");
    }

    #[test]
    fn test_probes_carry_markers() {
        // The test driver dispatches canned payloads on these markers.
        assert!(FRAMES_PROBE.contains("probe: frames"));
        assert!(SELECTORS_PROBE.contains("probe: selectors"));
        assert!(PATTERNS_PROBE.contains("probe: patterns"));
        assert!(RESOLVE_PROBE.contains("probe: resolve"));
        assert!(VIDEOS_PROBE.contains("probe: videos"));
        assert!(CREATIVE_REFS_PROBE.contains("probe: creative-refs"));
        assert!(FRAME_MARKUP_PROBE.contains("probe: frame-markup"));
        assert!(SETTLE_PROBE.contains("probe: settle"));
    }
}
