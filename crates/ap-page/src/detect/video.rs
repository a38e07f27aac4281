//! Video strategy
//!
//! Finds video ad slots three ways, in confidence order: platform player
//! iframes (URL is authoritative), native `<video>` elements, and player
//! chrome containers. Containers are the weakest signal and must also be
//! 16:9 shaped; the authoritative kinds skip the ratio check.

use std::collections::HashSet;

use ap_core::geometry::Size;
use ap_core::matcher::ASPECT_TOLERANCE;
use ap_core::standard::{match_aspect_class, AspectClass};
use ap_core::types::{Placement, PlacementKind, VideoSubtype};

use crate::detect::DetectOptions;
use crate::driver::{DriverResult, PageDriver};
use crate::probe::{self, RawFrame, VideoScan};

/// Embed URLs of hosted video players.
pub const VIDEO_PLATFORM_DOMAINS: &[&str] = &[
    "youtube.com/embed",
    "youtube-nocookie.com",
    "player.vimeo.com",
    "dailymotion.com/embed",
    "player.twitch.tv",
    "brightcove.net",
    "jwplayer.com",
    "content.jwplatform.com",
    "wistia.net",
    "kaltura.com",
    "streamable.com",
];

/// Class and attribute hooks left by common player frameworks.
pub const VIDEO_CONTAINER_SELECTORS: &[&str] = &[
    ".video-player",
    ".video-container",
    ".video-wrapper",
    ".player-container",
    "[data-video-id]",
    "[data-player]",
    ".jwplayer",
    ".video-js",
    ".plyr",
    ".flowplayer",
];

pub fn is_video_platform_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    for domain in VIDEO_PLATFORM_DOMAINS {
        if lower.contains(domain) {
            return true;
        }
    }
    false
}

pub async fn scan(page: &dyn PageDriver, options: &DetectOptions) -> DriverResult<Vec<Placement>> {
    let frames = probe::collect_frames(page).await?;
    let players = probe::collect_videos(page, VIDEO_CONTAINER_SELECTORS).await?;
    Ok(classify(&frames, &players, options.video_min))
}

/// Merge the three signal groups into placements, strongest first, with
/// position+size dedup so a native player inside a matched container is
/// reported once.
pub(crate) fn classify(frames: &[RawFrame], players: &VideoScan, min: Size) -> Vec<Placement> {
    let mut placements = Vec::new();
    let mut seen: HashSet<(i64, i64, i64, i64)> = HashSet::new();

    for frame in frames {
        let src = frame.effective_src();
        if src.is_empty() || !is_video_platform_url(src) {
            continue;
        }
        if !meets_min(frame.rect.width, frame.rect.height, min) {
            continue;
        }
        if !seen.insert(frame.rect.dedup_key()) {
            continue;
        }
        let size = Size::from_rect(&frame.rect);
        placements.push(
            Placement::new(super::iframe::frame_selector(frame), size, PlacementKind::Video)
                .with_subtype(VideoSubtype::Iframe)
                .with_source_url(src.to_string()),
        );
    }

    for native in &players.natives {
        if native.selector.is_empty() || !meets_min(native.rect.width, native.rect.height, min) {
            continue;
        }
        if !seen.insert(native.rect.dedup_key()) {
            continue;
        }
        let size = Size::from_rect(&native.rect);
        let mut placement = Placement::new(native.selector.clone(), size, PlacementKind::Video)
            .with_subtype(VideoSubtype::Native);
        if !native.src.is_empty() {
            placement = placement.with_source_url(native.src.clone());
        }
        placements.push(placement);
    }

    for container in &players.containers {
        if container.selector.is_empty()
            || !meets_min(container.rect.width, container.rect.height, min)
        {
            continue;
        }
        let size = Size::from_rect(&container.rect);
        if match_aspect_class(size.width, size.height, ASPECT_TOLERANCE) != Some(AspectClass::W16x9)
        {
            continue;
        }
        if !seen.insert(container.rect.dedup_key()) {
            continue;
        }
        placements.push(
            Placement::new(container.selector.clone(), size, PlacementKind::Video)
                .with_subtype(VideoSubtype::Container),
        );
    }

    placements
}

fn meets_min(width: f64, height: f64, min: Size) -> bool {
    width >= min.width as f64 && height >= min.height as f64
}
