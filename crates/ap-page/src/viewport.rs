//! In-view filtering
//!
//! Re-measures each placement live and keeps those whose current box
//! intersects the viewport rectangle. Measurement happens at filter
//! time, not detection time, since lazy loads and layout shifts move
//! slots between the two.

use ap_core::geometry::Rect;
use ap_core::types::Placement;

use crate::driver::PageDriver;

/// Keep placements whose live bounding box intersects `viewport`.
/// Placements that can no longer be measured are dropped.
pub async fn filter_live(
    page: &dyn PageDriver,
    placements: Vec<Placement>,
    viewport: &Rect,
) -> Vec<Placement> {
    let mut kept = Vec::with_capacity(placements.len());
    for placement in placements {
        match live_box(page, &placement.selector).await {
            Some(rect) if rect.intersects(viewport) => kept.push(placement),
            Some(_) => {
                log::debug!("placement {} outside viewport, dropped", placement.selector);
            }
            None => {
                log::debug!("placement {} not measurable, dropped", placement.selector);
            }
        }
    }
    kept
}

/// Current client-coordinate box of the first element matching
/// `selector`, or None when it is gone or unmeasurable.
pub async fn live_box(page: &dyn PageDriver, selector: &str) -> Option<Rect> {
    let handles = match page.query_all(selector).await {
        Ok(handles) => handles,
        Err(e) => {
            log::debug!("query {} failed: {}", selector, e);
            return None;
        }
    };
    let handle = handles.first()?;
    match page.bounding_box(handle).await {
        Ok(rect) => rect,
        Err(e) => {
            log::debug!("measure {} failed: {}", selector, e);
            None
        }
    }
}
