//! Placement detection
//!
//! Each strategy scans the live page for one family of ad slots:
//!
//! - iframe: third-party frames served from known ad domains
//! - css: container elements recognized by selector or naming pattern
//! - video: players by platform domain, native video, or player chrome
//!
//! Strategies run independently and their results are merged with
//! position+size dedup so slots found twice keep the first (higher
//! confidence) classification.

use std::collections::HashSet;

use ap_core::geometry::{Rect, Size};
use ap_core::types::Placement;
use bitflags::bitflags;

use crate::driver::{DriverResult, PageDriver};

pub mod css;
pub mod iframe;
pub mod video;

bitflags! {
    /// Which detection strategies to run.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DetectStrategies: u8 {
        const IFRAME = 0b001;
        const CSS = 0b010;
        const VIDEO = 0b100;
    }
}

impl Default for DetectStrategies {
    fn default() -> Self {
        DetectStrategies::IFRAME | DetectStrategies::CSS
    }
}

/// Tuning knobs for a detection pass.
#[derive(Debug, Clone)]
pub struct DetectOptions {
    pub strategies: DetectStrategies,
    /// Viewport rectangle in client coordinates, when in-view filtering
    /// or reporting is wanted.
    pub viewport: Option<Rect>,
    /// Drop placements that do not intersect `viewport`.
    pub viewport_only: bool,
    /// Smallest element the css strategy will consider an ad slot.
    pub css_min: Size,
    /// Largest element the css strategy will consider an ad slot.
    pub css_max: Size,
    /// Smallest element the video strategy will consider a player.
    pub video_min: Size,
}

impl Default for DetectOptions {
    fn default() -> Self {
        DetectOptions {
            strategies: DetectStrategies::default(),
            viewport: None,
            viewport_only: false,
            css_min: Size::new(50, 50),
            css_max: Size::new(1200, 800),
            video_min: Size::new(200, 100),
        }
    }
}

/// Run the configured strategies against a loaded page and merge their
/// placements. A strategy failure is logged and skipped so one broken
/// probe cannot blank the whole scan.
pub async fn detect_placements(
    page: &dyn PageDriver,
    options: &DetectOptions,
) -> DriverResult<Vec<Placement>> {
    let mut placements: Vec<Placement> = Vec::new();
    let mut seen: HashSet<(u32, u32, String)> = HashSet::new();

    if options.strategies.contains(DetectStrategies::IFRAME) {
        match iframe::scan(page).await {
            Ok(found) => merge_new(&mut placements, &mut seen, found),
            Err(e) => log::warn!("iframe detection failed: {}", e),
        }
    }

    if options.strategies.contains(DetectStrategies::CSS) {
        match css::scan(page, options).await {
            Ok(found) => merge_new(&mut placements, &mut seen, found),
            Err(e) => log::warn!("css detection failed: {}", e),
        }
    }

    if options.strategies.contains(DetectStrategies::VIDEO) {
        match video::scan(page, options).await {
            Ok(found) => merge_new(&mut placements, &mut seen, found),
            Err(e) => log::warn!("video detection failed: {}", e),
        }
    }

    if options.viewport_only {
        if let Some(viewport) = &options.viewport {
            placements = crate::viewport::filter_live(page, placements, viewport).await;
        }
    }

    log::info!("detected {} placement(s)", placements.len());
    Ok(placements)
}

fn merge_new(
    placements: &mut Vec<Placement>,
    seen: &mut HashSet<(u32, u32, String)>,
    found: Vec<Placement>,
) {
    for placement in found {
        let key = (
            placement.size.width,
            placement.size.height,
            placement.selector.clone(),
        );
        if seen.insert(key) {
            placements.push(placement);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ap_core::types::PlacementKind;

    #[test]
    fn test_default_strategies_skip_video() {
        let strategies = DetectStrategies::default();
        assert!(strategies.contains(DetectStrategies::IFRAME));
        assert!(strategies.contains(DetectStrategies::CSS));
        assert!(!strategies.contains(DetectStrategies::VIDEO));
    }

    #[test]
    fn test_merge_new_keeps_first_classification() {
        let mut placements = Vec::new();
        let mut seen = HashSet::new();

        merge_new(
            &mut placements,
            &mut seen,
            vec![Placement::new(
                "#slot".to_string(),
                Size::new(300, 250),
                PlacementKind::Iframe,
            )],
        );
        merge_new(
            &mut placements,
            &mut seen,
            vec![
                Placement::new("#slot".to_string(), Size::new(300, 250), PlacementKind::Css),
                Placement::new("#other".to_string(), Size::new(300, 250), PlacementKind::Css),
            ],
        );

        assert_eq!(placements.len(), 2);
        assert_eq!(placements[0].kind, PlacementKind::Iframe);
        assert_eq!(placements[1].selector, "#other");
    }

    #[test]
    fn test_merge_new_same_selector_different_size_kept() {
        let mut placements = Vec::new();
        let mut seen = HashSet::new();

        merge_new(
            &mut placements,
            &mut seen,
            vec![
                Placement::new("#slot".to_string(), Size::new(300, 250), PlacementKind::Css),
                Placement::new("#slot".to_string(), Size::new(300, 600), PlacementKind::Css),
            ],
        );

        assert_eq!(placements.len(), 2);
    }
}
