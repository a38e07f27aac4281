//! Whole-page mockup runs
//!
//! Ties the stages together for one page: detect, filter, pre-process,
//! match, inject, settle, capture. Stages run strictly in that order;
//! matching needs finalized geometry and capture needs injection to have
//! settled. Only detection failure aborts a run, everything later
//! degrades into the report.

use std::time::Duration;

use ap_core::matcher;
use ap_core::types::{Creative, Placement};
use serde::Serialize;

use crate::detect::{self, DetectOptions};
use crate::driver::{BrowserDriver, DriverResult, PageDriver};
use crate::inject::{self, InjectionRun};
use crate::preprocess::{self, PreprocessOptions};
use crate::probe;
use crate::viewport;

const SETTLE_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct MockupOptions {
    /// Detection tuning. When `viewport` is set the mockup is scoped to
    /// in-view placements, while the report still counts everything
    /// detected.
    pub detect: DetectOptions,
    pub preprocess: PreprocessOptions,
    /// Caller-supplied slots merged in after detection, exempt from
    /// viewport scoping.
    pub manual_placements: Vec<Placement>,
    /// Ceiling on waiting for injected creatives to finish loading.
    /// On expiry the capture proceeds with whatever has rendered.
    pub settle: Duration,
}

impl Default for MockupOptions {
    fn default() -> Self {
        MockupOptions {
            detect: DetectOptions::default(),
            preprocess: PreprocessOptions::default(),
            manual_placements: Vec::new(),
            settle: Duration::from_secs(2),
        }
    }
}

/// What one mockup run did, stage by stage.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MockupReport {
    pub placements_detected: usize,
    pub placements_in_view: usize,
    pub injection: InjectionRun,
    pub unmatched_placements: Vec<Placement>,
    pub unmatched_creatives: Vec<Creative>,
    /// Final page capture; absent when the capture itself failed
    #[serde(skip)]
    pub screenshot_png: Option<Vec<u8>>,
}

/// Run the full cycle against an already-loaded page. `browser` opens
/// the auxiliary pages pre-processing needs.
pub async fn run_mockup(
    page: &dyn PageDriver,
    browser: &dyn BrowserDriver,
    creatives: Vec<Creative>,
    options: &MockupOptions,
) -> DriverResult<MockupReport> {
    // Detection runs unfiltered so the report can count everything;
    // viewport scoping happens here, against live geometry.
    let mut detect_options = options.detect.clone();
    detect_options.viewport_only = false;
    let detected = detect::detect_placements(page, &detect_options).await?;
    let placements_detected = detected.len();

    let mut placements = match &options.detect.viewport {
        Some(rect) => viewport::filter_live(page, detected, rect).await,
        None => detected,
    };
    placements.extend(options.manual_placements.iter().cloned());
    let placements_in_view = placements.len();

    let creatives =
        preprocess::preprocess_creatives(browser, creatives, &options.preprocess).await;
    let outcome = matcher::match_creatives(placements, creatives);
    let injection = inject::inject_matches(page, &outcome.matches).await;

    if !injection.successful.is_empty() {
        settle_injected(page, options.settle).await;
    }

    let screenshot_png = match page.screenshot_png().await {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            log::warn!("final capture failed: {}", e);
            None
        }
    };

    Ok(MockupReport {
        placements_detected,
        placements_in_view,
        injection,
        unmatched_placements: outcome.unmatched_placements,
        unmatched_creatives: outcome.unmatched_creatives,
        screenshot_png,
    })
}

/// Match already-detected placements against creatives and inject the
/// pairs, without detection or capture.
pub async fn match_and_inject(
    page: &dyn PageDriver,
    placements: Vec<Placement>,
    creatives: Vec<Creative>,
) -> InjectionRun {
    let outcome = matcher::match_creatives(placements, creatives);
    inject::inject_matches(page, &outcome.matches).await
}

/// Poll until every injected creative reports loaded, up to `ceiling`.
/// Expiry is not an error; the page is used as it stands.
pub(crate) async fn settle_injected(page: &dyn PageDriver, ceiling: Duration) {
    let deadline = tokio::time::Instant::now() + ceiling;
    loop {
        match page.evaluate(probe::SETTLE_PROBE, Vec::new()).await {
            Ok(value) if value.as_bool() == Some(true) => return,
            Ok(_) => {}
            Err(e) => {
                log::debug!("settle probe failed: {}", e);
                return;
            }
        }
        if tokio::time::Instant::now() >= deadline {
            log::debug!("settle ceiling reached, proceeding");
            return;
        }
        tokio::time::sleep(SETTLE_POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{MockBrowser, MockDriver};
    use ap_core::geometry::{Rect, Size};
    use ap_core::types::MatchTier;
    use serde_json::json;

    fn ad_frame(index: usize, id: &str, x: f64, y: f64, w: f64, h: f64) -> serde_json::Value {
        json!({
            "index": index,
            "id": id,
            "src": "https://securepubads.doubleclick.net/gampad/ads",
            "rect": {"x": x, "y": y, "width": w, "height": h}
        })
    }

    fn fast_options() -> MockupOptions {
        let mut options = MockupOptions::default();
        options.preprocess.settle = Duration::from_millis(1);
        options.settle = Duration::from_millis(1);
        options
    }

    #[tokio::test]
    async fn test_run_mockup_end_to_end() {
        let mut driver = MockDriver::default();
        driver.frames = json!([ad_frame(0, "gpt-top", 10.0, 10.0, 300.0, 250.0)]);
        driver.settle = json!(true);
        driver.screenshot = vec![9, 9, 9];
        let browser = MockBrowser::new(MockDriver::default());

        let creatives = vec![Creative::display(
            "https://cdn.example/banner.jpg",
            Size::new(300, 250),
        )];
        let report = run_mockup(&driver, &browser, creatives, &fast_options())
            .await
            .unwrap();

        assert_eq!(report.placements_detected, 1);
        assert_eq!(report.placements_in_view, 1);
        assert_eq!(report.injection.successful.len(), 1);
        assert_eq!(report.injection.matches[0].tier, MatchTier::Exact);
        assert!(report.unmatched_placements.is_empty());
        assert!(report.unmatched_creatives.is_empty());
        assert_eq!(report.screenshot_png, Some(vec![9, 9, 9]));
        assert_eq!(driver.applied_selectors(), vec!["#gpt-top"]);
    }

    #[tokio::test]
    async fn test_run_mockup_scopes_to_viewport() {
        let mut driver = MockDriver::default();
        driver.frames = json!([
            ad_frame(0, "gpt-top", 10.0, 10.0, 300.0, 250.0),
            ad_frame(1, "gpt-deep", 10.0, 2400.0, 300.0, 250.0),
        ]);
        driver.settle = json!(true);
        driver.boxes.insert(
            "#gpt-top".to_string(),
            Rect { x: 10.0, y: 10.0, width: 300.0, height: 250.0 },
        );
        driver.boxes.insert(
            "#gpt-deep".to_string(),
            Rect { x: 10.0, y: 2400.0, width: 300.0, height: 250.0 },
        );
        let browser = MockBrowser::new(MockDriver::default());

        let mut options = fast_options();
        options.detect.viewport = Some(Rect { x: 0.0, y: 0.0, width: 1366.0, height: 900.0 });

        let creatives = vec![
            Creative::display("https://cdn.example/a.jpg", Size::new(300, 250)),
            Creative::display("https://cdn.example/b.jpg", Size::new(300, 250)),
        ];
        let report = run_mockup(&driver, &browser, creatives, &options)
            .await
            .unwrap();

        assert_eq!(report.placements_detected, 2);
        assert_eq!(report.placements_in_view, 1);
        assert_eq!(report.injection.successful.len(), 1);
        assert_eq!(report.injection.successful[0].selector, "#gpt-top");
        // The creative that lost its slot to the viewport is reported back
        assert_eq!(report.unmatched_creatives.len(), 1);
    }

    #[tokio::test]
    async fn test_run_mockup_captures_despite_failed_injection() {
        let mut driver = MockDriver::default();
        driver.frames = json!([ad_frame(0, "gpt-top", 10.0, 10.0, 300.0, 250.0)]);
        driver.fail_selectors.insert("#gpt-top".to_string());
        driver.screenshot = vec![1];
        let browser = MockBrowser::new(MockDriver::default());

        let creatives = vec![Creative::display(
            "https://cdn.example/banner.jpg",
            Size::new(300, 250),
        )];
        let report = run_mockup(&driver, &browser, creatives, &fast_options())
            .await
            .unwrap();

        assert!(report.injection.successful.is_empty());
        assert_eq!(report.injection.failed.len(), 1);
        assert_eq!(report.screenshot_png, Some(vec![1]));
    }

    #[tokio::test]
    async fn test_manual_placements_join_detection() {
        let driver = MockDriver::default();
        let browser = MockBrowser::new(MockDriver::default());
        let mut options = fast_options();
        options.manual_placements = vec![Placement::new(
            "#hero-banner",
            Size::new(970, 250),
            ap_core::types::PlacementKind::Custom,
        )];

        let creatives = vec![Creative::display(
            "https://cdn.example/billboard.png",
            Size::new(970, 250),
        )];
        let report = run_mockup(&driver, &browser, creatives, &options)
            .await
            .unwrap();

        assert_eq!(report.placements_detected, 0);
        assert_eq!(report.placements_in_view, 1);
        assert_eq!(report.injection.successful.len(), 1);
        assert_eq!(report.injection.successful[0].selector, "#hero-banner");
    }

    #[tokio::test]
    async fn test_match_and_inject_interface() {
        let driver = MockDriver::default();
        let placements = vec![Placement::new(
            "#slot",
            Size::new(728, 90),
            ap_core::types::PlacementKind::Custom,
        )];
        let creatives = vec![Creative::display("https://cdn.example/l.png", Size::new(728, 90))];

        let run = match_and_inject(&driver, placements, creatives).await;
        assert_eq!(run.successful.len(), 1);
        assert_eq!(run.matches.len(), 1);
        assert!(run.failed.is_empty());
    }

    #[tokio::test]
    async fn test_settle_gives_up_at_ceiling() {
        let mut driver = MockDriver::default();
        driver.settle = json!(false);
        // Returns promptly instead of polling forever
        settle_injected(&driver, Duration::from_millis(1)).await;
    }
}
