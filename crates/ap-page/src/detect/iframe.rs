//! Iframe strategy
//!
//! Finds third-party ad frames by matching the frame URL against known
//! ad-serving domains. The probe reports every iframe with its geometry;
//! classification is pure Rust over those facts.

use ap_core::types::{Placement, PlacementKind};

use crate::driver::{DriverResult, PageDriver};
use crate::probe::{self, RawFrame};

/// Domains that serve display ads. Matched as substrings of the frame
/// URL after lowercasing, so subdomains and paths hit too.
pub const AD_SERVING_DOMAINS: &[&str] = &[
    "doubleclick.net",
    "googlesyndication.com",
    "googleadservices.com",
    "2mdn.net",
    "adnxs.com",
    "adsrvr.org",
    "amazon-adsystem.com",
    "adform.net",
    "criteo.com",
    "criteo.net",
    "rubiconproject.com",
    "pubmatic.com",
    "openx.net",
    "casalemedia.com",
    "smartadserver.com",
    "teads.tv",
    "taboola.com",
    "outbrain.com",
    "yieldlab.net",
    "improvedigital.com",
    "adition.com",
    "flashtalking.com",
    "sizmek.com",
    "serving-sys.com",
    "adsafeprotected.com",
    "moatads.com",
    "innovid.com",
    "celtra.com",
    "adnuntius.com",
];

/// True when `url` points at a known ad server.
pub fn is_ad_server_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    for domain in AD_SERVING_DOMAINS {
        if lower.contains(domain) {
            return true;
        }
    }
    false
}

pub async fn scan(page: &dyn PageDriver) -> DriverResult<Vec<Placement>> {
    let frames = probe::collect_frames(page).await?;
    Ok(classify_frames(&frames))
}

/// Keep frames whose URL is ad-served and whose box has real area.
pub(crate) fn classify_frames(frames: &[RawFrame]) -> Vec<Placement> {
    let mut placements = Vec::new();
    for frame in frames {
        let src = frame.effective_src();
        if src.is_empty() || !is_ad_server_url(src) {
            continue;
        }
        if frame.rect.width < 1.0 || frame.rect.height < 1.0 {
            continue;
        }
        let size = ap_core::geometry::Size::from_rect(&frame.rect);
        let placement = Placement::new(frame_selector(frame), size, PlacementKind::Iframe)
            .with_source_url(src.to_string());
        placements.push(placement);
    }
    placements
}

/// Best selector for an iframe: id when CSS-safe, then name, then
/// position among iframes.
pub(crate) fn frame_selector(frame: &RawFrame) -> String {
    if is_css_safe_id(&frame.id) {
        return format!("#{}", frame.id);
    }
    if !frame.name.is_empty() && !frame.name.contains('"') {
        return format!("iframe[name=\"{}\"]", frame.name);
    }
    format!("iframe:nth-of-type({})", frame.index + 1)
}

fn is_css_safe_id(id: &str) -> bool {
    if id.is_empty() {
        return false;
    }
    let mut chars = id.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => return false,
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '-' => {}
        _ => return false,
    }
    for c in chars {
        if !c.is_ascii_alphanumeric() && c != '_' && c != '-' {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use ap_core::geometry::Rect;

    fn frame(index: usize, src: &str, w: f64, h: f64) -> RawFrame {
        RawFrame {
            index,
            src: src.to_string(),
            rect: Rect {
                x: 0.0,
                y: 0.0,
                width: w,
                height: h,
            },
            ..RawFrame::default()
        }
    }

    #[test]
    fn test_ad_server_url_matching() {
        assert!(is_ad_server_url(
            "https://tpc.googlesyndication.com/safeframe/1-0-40/html/container.html"
        ));
        assert!(is_ad_server_url("https://AD.DOUBLECLICK.NET/adi/x"));
        assert!(!is_ad_server_url("https://www.example.com/news"));
        assert!(!is_ad_server_url(""));
    }

    #[test]
    fn test_classify_keeps_ad_frames_only() {
        let frames = vec![
            frame(0, "https://securepubads.doubleclick.net/gampad/ads", 300.0, 250.0),
            frame(1, "https://www.youtube.com/embed/abc", 640.0, 360.0),
            frame(2, "", 728.0, 90.0),
        ];
        let placements = classify_frames(&frames);
        assert_eq!(placements.len(), 1);
        assert_eq!(placements[0].kind, PlacementKind::Iframe);
        assert_eq!(placements[0].size.width, 300);
        assert_eq!(placements[0].iab_label, Some("Medium Rectangle"));
        assert!(placements[0]
            .source_url
            .as_deref()
            .is_some_and(|u| u.contains("doubleclick")));
    }

    #[test]
    fn test_classify_skips_collapsed_frames() {
        let frames = vec![frame(0, "https://ad.doubleclick.net/x", 0.0, 0.0)];
        assert!(classify_frames(&frames).is_empty());
    }

    #[test]
    fn test_classify_uses_data_src_fallback() {
        let mut lazy = frame(0, "", 300.0, 250.0);
        lazy.data_src = "https://cdn.adnxs.com/slot".to_string();
        let placements = classify_frames(&[lazy]);
        assert_eq!(placements.len(), 1);
    }

    #[test]
    fn test_frame_selector_preference() {
        let mut f = frame(3, "https://x", 1.0, 1.0);
        f.id = "google_ads_iframe_1".to_string();
        assert_eq!(frame_selector(&f), "#google_ads_iframe_1");

        f.id = "1bad id".to_string();
        f.name = "ad_frame".to_string();
        assert_eq!(frame_selector(&f), "iframe[name=\"ad_frame\"]");

        f.name.clear();
        assert_eq!(frame_selector(&f), "iframe:nth-of-type(4)");
    }

    #[test]
    fn test_css_safe_id() {
        assert!(is_css_safe_id("ad-slot_1"));
        assert!(!is_css_safe_id("9lives"));
        assert!(!is_css_safe_id("has space"));
        assert!(!is_css_safe_id(""));
    }
}
