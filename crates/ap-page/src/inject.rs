//! Creative injection
//!
//! Turns a match into a structured render instruction and has the driver
//! interpret it against the live DOM. The instruction carries the locked
//! box dimensions so the slot cannot collapse when its contents are
//! cleared. One failed injection is reported and skipped; the rest of
//! the batch proceeds.

use ap_core::geometry::Size;
use ap_core::types::{MatchTier, PlacementMatch, ResolvedContent};
use serde::Serialize;
use thiserror::Error;

use crate::driver::{AppliedRender, DriverError, PageDriver};

// =============================================================================
// Render Instructions
// =============================================================================

/// What goes inside the slot. The driver branches on `type` when it
/// builds the replacement node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RenderContent {
    /// Embeddable document, rendered in an iframe
    Frame { url: String },
    /// Same-origin markup, rendered via srcdoc
    FrameMarkup { html: String },
    /// Bitmap asset, rendered as an image filling the locked box
    Image { src: String },
}

/// Full instruction for replacing one slot's contents.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderInstruction {
    pub content: RenderContent,
    pub width: u32,
    pub height: u32,
    /// Composite a static play button over the creative. Replaced video
    /// ads are static and must still read as video.
    pub play_overlay: bool,
}

/// Build the instruction for a match. Pre-resolved content wins; bare
/// URLs are sniffed for bitmap assets and otherwise presumed embeddable.
pub fn build_instruction(m: &PlacementMatch) -> RenderInstruction {
    let content = match &m.creative.resolved {
        Some(ResolvedContent::FrameUrl(url)) => RenderContent::Frame { url: url.clone() },
        Some(ResolvedContent::Markup(html)) => RenderContent::FrameMarkup { html: html.clone() },
        None => {
            if looks_like_image(&m.creative.url) {
                RenderContent::Image {
                    src: m.creative.url.clone(),
                }
            } else {
                RenderContent::Frame {
                    url: m.creative.url.clone(),
                }
            }
        }
    };
    RenderInstruction {
        content,
        width: m.placement.size.width,
        height: m.placement.size.height,
        play_overlay: m.placement.is_video(),
    }
}

/// Bitmap asset by inline-data prefix or file extension, query string
/// and fragment ignored.
pub(crate) fn looks_like_image(url: &str) -> bool {
    if url.starts_with("data:image/") {
        return true;
    }
    let path = match url.split(|c| c == '?' || c == '#').next() {
        Some(path) => path.to_ascii_lowercase(),
        None => return false,
    };
    const EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".webp", ".avif", ".svg"];
    for ext in EXTENSIONS {
        if path.ends_with(ext) {
            return true;
        }
    }
    false
}

// =============================================================================
// Injection
// =============================================================================

#[derive(Debug, Error)]
pub enum InjectionFailure {
    #[error("element not found: {0}")]
    ElementNotFound(String),
    #[error("render failed: {0}")]
    RenderFailed(#[from] DriverError),
}

/// Inject one match into the live DOM.
pub async fn inject_one(
    page: &dyn PageDriver,
    m: &PlacementMatch,
) -> Result<AppliedRender, InjectionFailure> {
    let instruction = build_instruction(m);
    match page.apply_render(&m.placement.selector, &instruction).await {
        Ok(applied) => Ok(applied),
        Err(DriverError::ElementNotFound(selector)) => {
            Err(InjectionFailure::ElementNotFound(selector))
        }
        Err(e) => Err(InjectionFailure::RenderFailed(e)),
    }
}

// =============================================================================
// Reporting
// =============================================================================

/// Audit view of one pairing, independent of injection outcome.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    pub placement_selector: String,
    pub placement_size: Size,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iab_label: Option<&'static str>,
    pub creative_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creative_size: Option<Size>,
    pub tier: MatchTier,
}

impl MatchSummary {
    pub fn from_match(m: &PlacementMatch) -> Self {
        MatchSummary {
            placement_selector: m.placement.selector.clone(),
            placement_size: m.placement.size,
            iab_label: m.placement.iab_label,
            creative_url: reported_url(m),
            creative_size: m.creative.size,
            tier: m.tier,
        }
    }
}

/// Outcome of injecting one match.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchReport {
    pub selector: String,
    pub creative_url: String,
    pub tier: MatchTier,
    pub requested_size: Size,
    /// Box the driver actually rendered; absent on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_size: Option<Size>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything an injection pass produced.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectionRun {
    pub successful: Vec<MatchReport>,
    pub failed: Vec<MatchReport>,
    pub matches: Vec<MatchSummary>,
}

/// Inject every match, collecting per-match reports. Failures are
/// recorded and skipped, never propagated.
pub async fn inject_matches(page: &dyn PageDriver, matches: &[PlacementMatch]) -> InjectionRun {
    let mut run = InjectionRun::default();
    for m in matches {
        run.matches.push(MatchSummary::from_match(m));
        let base = MatchReport {
            selector: m.placement.selector.clone(),
            creative_url: reported_url(m),
            tier: m.tier,
            requested_size: m.placement.size,
            applied_size: None,
            success: false,
            error: None,
        };
        match inject_one(page, m).await {
            Ok(applied) => {
                run.successful.push(MatchReport {
                    applied_size: Some(Size::new(applied.width, applied.height)),
                    success: true,
                    ..base
                });
            }
            Err(e) => {
                log::warn!("injection into {} failed: {}", m.placement.selector, e);
                run.failed.push(MatchReport {
                    error: Some(e.to_string()),
                    ..base
                });
            }
        }
    }
    log::info!(
        "injected {} of {} match(es)",
        run.successful.len(),
        run.matches.len()
    );
    run
}

/// The URL a report shows: the reference the client handed in, even
/// when pre-processing replaced it.
fn reported_url(m: &PlacementMatch) -> String {
    m.creative
        .original_url
        .clone()
        .unwrap_or_else(|| m.creative.url.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::MockDriver;
    use ap_core::types::{Creative, CreativeKind, Placement, PlacementKind, VideoSubtype};

    fn display_match(selector: &str, url: &str) -> PlacementMatch {
        PlacementMatch {
            placement: Placement::new(selector, Size::new(300, 250), PlacementKind::Css),
            creative: Creative::display(url, Size::new(300, 250)),
            tier: MatchTier::Exact,
        }
    }

    #[test]
    fn test_looks_like_image() {
        assert!(looks_like_image("https://cdn.example/b.jpg"));
        assert!(looks_like_image("https://cdn.example/b.PNG?cb=1"));
        assert!(looks_like_image("https://cdn.example/b.webp#frag"));
        assert!(looks_like_image("data:image/png;base64,AAAA"));
        assert!(!looks_like_image("https://cdn.example/ad.html"));
        assert!(!looks_like_image("https://cdn.example/tag?img=b.jpg"));
        assert!(!looks_like_image("data:text/html;base64,AAAA"));
    }

    #[test]
    fn test_instruction_for_bitmap_url() {
        let m = display_match("#slot", "https://cdn.example/banner.jpg");
        let ins = build_instruction(&m);
        assert_eq!(
            ins.content,
            RenderContent::Image {
                src: "https://cdn.example/banner.jpg".to_string()
            }
        );
        assert_eq!((ins.width, ins.height), (300, 250));
        assert!(!ins.play_overlay);
    }

    #[test]
    fn test_instruction_for_bare_url_presumes_embeddable() {
        let m = display_match("#slot", "https://tags.example/render?id=9");
        assert_eq!(
            build_instruction(&m).content,
            RenderContent::Frame {
                url: "https://tags.example/render?id=9".to_string()
            }
        );
    }

    #[test]
    fn test_instruction_prefers_resolved_content() {
        let mut m = display_match("#slot", "https://bn.adform.net/preview?w=300&h=250");
        m.creative.resolved = Some(ResolvedContent::FrameUrl(
            "https://track.adform.net/banner.html".to_string(),
        ));
        assert_eq!(
            build_instruction(&m).content,
            RenderContent::Frame {
                url: "https://track.adform.net/banner.html".to_string()
            }
        );

        m.creative.resolved = Some(ResolvedContent::Markup("<div>ad</div>".to_string()));
        assert_eq!(
            build_instruction(&m).content,
            RenderContent::FrameMarkup {
                html: "<div>ad</div>".to_string()
            }
        );
    }

    #[test]
    fn test_video_placement_gets_play_overlay() {
        let m = PlacementMatch {
            placement: Placement::new("#player", Size::new(640, 360), PlacementKind::Video)
                .with_subtype(VideoSubtype::Native),
            creative: Creative {
                url: "https://cdn.example/spot.mp4".to_string(),
                size: None,
                kind: CreativeKind::Video,
                resolved: None,
                original_url: None,
            },
            tier: MatchTier::Video,
        };
        assert!(build_instruction(&m).play_overlay);
    }

    #[test]
    fn test_instruction_wire_shape() {
        let m = display_match("#slot", "https://cdn.example/banner.png");
        let json = serde_json::to_value(build_instruction(&m)).unwrap();
        assert_eq!(json["content"]["type"], "image");
        assert_eq!(json["content"]["src"], "https://cdn.example/banner.png");
        assert_eq!(json["width"], 300);
        assert_eq!(json["playOverlay"], false);

        let mut framed = display_match("#slot", "https://bn.adform.net/preview");
        framed.creative.resolved = Some(ResolvedContent::Markup("<b>x</b>".to_string()));
        let json = serde_json::to_value(build_instruction(&framed)).unwrap();
        assert_eq!(json["content"]["type"], "frameMarkup");
        assert_eq!(json["content"]["html"], "<b>x</b>");
    }

    #[tokio::test]
    async fn test_inject_matches_is_resilient() {
        let mut driver = MockDriver::default();
        driver.fail_selectors.insert("#gone".to_string());
        let matches = vec![
            display_match("#slot-a", "https://cdn.example/a.jpg"),
            display_match("#gone", "https://cdn.example/b.jpg"),
            display_match("#slot-c", "https://cdn.example/c.jpg"),
        ];

        let run = inject_matches(&driver, &matches).await;
        assert_eq!(run.successful.len(), 2);
        assert_eq!(run.failed.len(), 1);
        assert_eq!(run.matches.len(), 3);

        assert_eq!(run.failed[0].selector, "#gone");
        assert!(!run.failed[0].success);
        assert!(run.failed[0]
            .error
            .as_deref()
            .is_some_and(|e| e.contains("not found")));
        assert_eq!(run.successful[0].applied_size, Some(Size::new(300, 250)));
        assert!(run.successful[0].success);

        // Both survivors were actually rendered
        assert_eq!(driver.applied_selectors(), vec!["#slot-a", "#slot-c"]);
    }

    #[tokio::test]
    async fn test_report_shows_original_reference() {
        let driver = MockDriver::default();
        let mut m = display_match("#slot", "data:image/png;base64,AAAA");
        m.creative.original_url = Some("https://bn.adform.net/preview?w=300&h=250".to_string());

        let run = inject_matches(&driver, &[m]).await;
        assert_eq!(
            run.successful[0].creative_url,
            "https://bn.adform.net/preview?w=300&h=250"
        );
        assert_eq!(run.matches[0].creative_url, "https://bn.adform.net/preview?w=300&h=250");
    }
}
