//! CSS strategy
//!
//! Two passes over the document. The first queries a fixed list of
//! selectors used by common ad stacks. The second scans every element
//! carrying an id or class and keeps those whose naming tokens look
//! like ad slots; unique selectors are minted in-page for the winners
//! only, after classification, so the page is not touched for the
//! hundreds of losers.

use std::collections::{HashMap, HashSet};

use ap_core::geometry::{Rect, Size};
use ap_core::types::{Placement, PlacementKind};
use regex::Regex;

use crate::detect::DetectOptions;
use crate::driver::{DriverResult, PageDriver};
use crate::probe;

/// Selectors of well-known ad containers (GPT, AdSense, Taboola,
/// Outbrain, Criteo and generic publisher class names).
pub const AD_CONTAINER_SELECTORS: &[&str] = &[
    r#"[id^="div-gpt-ad"]"#,
    r#"[id^="google_ads_iframe"]"#,
    "[data-ad-slot]",
    "[data-ad-unit]",
    "[data-ad-client]",
    "[data-google-query-id]",
    ".adsbygoogle",
    ".ad-container",
    ".ad-wrapper",
    ".ad-slot",
    ".ad-unit",
    ".ad-banner",
    ".dfp-ad",
    ".advertisement",
    r#"[id^="taboola-"]"#,
    ".OUTBRAIN",
    r#"[id^="criteo-"]"#,
];

/// Naming patterns applied to individual id/class tokens (lowercased).
/// Boundary anchors keep words like "shadow", "admin" or "download"
/// from matching.
pub const AD_TOKEN_PATTERNS: &[&str] = &[
    "^ad$",
    "^ads$",
    "^advert(isement)?s?$",
    "(^|[-_])ad([-_]|$)",
    "[-_]ads?$",
    "^ads?[-_]",
    "sponsored",
    "dfp[-_]",
    "[-_]dfp",
    "^gpt[-_]",
    "banner[-_]?ad",
    "ad[-_]?banner",
    "ad[-_]?slot",
    "ad[-_]?unit",
    "ad[-_]?holder",
    "commercial",
];

/// Compiled token patterns.
pub(crate) struct CssPatterns {
    patterns: Vec<Regex>,
}

impl CssPatterns {
    pub fn new() -> CssPatterns {
        let patterns = AD_TOKEN_PATTERNS
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();
        CssPatterns { patterns }
    }

    /// True when the id or any class token looks ad-like.
    pub fn matches_tokens(&self, id: &str, classes: &str) -> bool {
        if !id.is_empty() && self.matches_token(id) {
            return true;
        }
        for class in classes.split_whitespace() {
            if self.matches_token(class) {
                return true;
            }
        }
        false
    }

    fn matches_token(&self, token: &str) -> bool {
        let token = token.to_ascii_lowercase();
        for regex in &self.patterns {
            if regex.is_match(&token) {
                return true;
            }
        }
        false
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.patterns.len()
    }
}

pub async fn scan(page: &dyn PageDriver, options: &DetectOptions) -> DriverResult<Vec<Placement>> {
    let mut placements = Vec::new();
    let mut seen: HashSet<(i64, i64, i64, i64)> = HashSet::new();

    // Pass 1: known containers, selectors already minted by the probe.
    let containers = probe::collect_containers(page, AD_CONTAINER_SELECTORS).await?;
    for container in &containers {
        if container.selector.is_empty() {
            continue;
        }
        if !size_gate(&container.rect, options.css_min, options.css_max) {
            continue;
        }
        if !seen.insert(container.rect.dedup_key()) {
            continue;
        }
        let size = Size::from_rect(&container.rect);
        placements.push(Placement::new(
            container.selector.clone(),
            size,
            PlacementKind::Css,
        ));
    }

    // Pass 2: id/class token scan. Winners are picked here, then their
    // selectors are resolved in one round trip.
    let candidates = probe::collect_pattern_candidates(page).await?;
    let patterns = CssPatterns::new();
    let mut winners = Vec::new();
    for candidate in &candidates {
        if !size_gate(&candidate.rect, options.css_min, options.css_max) {
            continue;
        }
        if !patterns.matches_tokens(&candidate.id, &candidate.classes) {
            continue;
        }
        if !seen.insert(candidate.rect.dedup_key()) {
            continue;
        }
        winners.push(candidate);
    }

    let indices: Vec<usize> = winners.iter().map(|c| c.index).collect();
    let resolved = probe::resolve_selectors(page, &indices).await?;
    let mut selector_by_index: HashMap<usize, String> = HashMap::new();
    for entry in resolved {
        if !entry.selector.is_empty() {
            selector_by_index.insert(entry.index, entry.selector);
        }
    }

    for candidate in winners {
        if let Some(selector) = selector_by_index.get(&candidate.index) {
            let size = Size::from_rect(&candidate.rect);
            placements.push(Placement::new(selector.clone(), size, PlacementKind::Css));
        }
    }

    Ok(placements)
}

/// Ad slots live in a bounded size band; reject page chrome below it
/// and layout wrappers above it.
pub(crate) fn size_gate(rect: &Rect, min: Size, max: Size) -> bool {
    rect.width >= min.width as f64
        && rect.height >= min.height as f64
        && rect.width <= max.width as f64
        && rect.height <= max.height as f64
}
