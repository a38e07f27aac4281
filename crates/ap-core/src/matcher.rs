//! Tiered placement/creative matching
//!
//! Greedy first-fit over strictly ordered tiers: exact size, then shared
//! standard-size name, then percentage size plus aspect-ratio tolerance.
//! Video runs on its own single-tier path. Simplicity and determinism are
//! preferred over globally optimal assignment; there is no backtracking.

use crate::geometry::{aspect_ratios_match, sizes_match_with_tolerance};
use crate::standard::{match_aspect_class, match_standard_size, AspectClass};
use crate::types::{
    Creative, CreativeKind, MatchOutcome, MatchTier, Placement, PlacementMatch, VideoSubtype,
};

// =============================================================================
// Tolerances
// =============================================================================

/// Pixel slack when resolving a measured size to a standard-size name.
pub const STANDARD_SIZE_TOLERANCE_PX: u32 = 20;

/// Per-dimension percentage slack for the flexible tier.
pub const SIZE_TOLERANCE_PCT: f64 = 15.0;

/// Relative aspect-ratio slack, shared by the flexible tier and the video
/// aspect-class check.
pub const ASPECT_TOLERANCE: f64 = 0.15;

/// Display tiers in acceptance order. Each tier is fully exhausted before
/// the next begins; a pair consumed by an earlier tier is gone.
const DISPLAY_TIERS: &[MatchTier] = &[
    MatchTier::Exact,
    MatchTier::SizeTolerance,
    MatchTier::AspectFlexible,
];

// =============================================================================
// Pair Predicates
// =============================================================================

/// Why a specific placement/creative pair fails to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NoMatchReason {
    #[error("creative has no usable size")]
    CreativeSizeMissing,
    #[error("placement and creative kinds differ")]
    KindMismatch,
    #[error("no size tier accepts the pair")]
    OutsideTolerance,
    #[error("placement is neither 16:9 nor an authoritative video source")]
    NotVideoShaped,
}

fn satisfies_tier(placement: &Placement, creative: &Creative, tier: MatchTier) -> bool {
    let c_size = match creative.size {
        Some(s) => s,
        None => return false,
    };
    let p_size = placement.size;
    match tier {
        MatchTier::Exact => p_size == c_size,
        MatchTier::SizeTolerance => {
            // Both sides resolve with the same tolerance; two odd sizes that
            // happen to be near each other do not invent a shared label.
            let p_label =
                match_standard_size(p_size.width, p_size.height, STANDARD_SIZE_TOLERANCE_PX);
            let c_label =
                match_standard_size(c_size.width, c_size.height, STANDARD_SIZE_TOLERANCE_PX);
            match (p_label, c_label) {
                (Some(p), Some(c)) => p == c,
                _ => false,
            }
        }
        MatchTier::AspectFlexible => {
            // Both gates required: area similarity alone would let a wide
            // banner swallow a tall skyscraper.
            sizes_match_with_tolerance(p_size, c_size, SIZE_TOLERANCE_PCT)
                && aspect_ratios_match(p_size, c_size, ASPECT_TOLERANCE)
        }
        MatchTier::Video => video_placement_accepts(placement),
    }
}

/// Video placements accept a creative when 16:9-shaped, or unconditionally
/// for native/iframe subtypes: a real `<video>` element or a recognized
/// player iframe is authoritative regardless of measured ratio.
fn video_placement_accepts(placement: &Placement) -> bool {
    match placement.subtype {
        Some(VideoSubtype::Native) | Some(VideoSubtype::Iframe) => true,
        _ => {
            match_aspect_class(placement.size.width, placement.size.height, ASPECT_TOLERANCE)
                == Some(AspectClass::W16x9)
        }
    }
}

/// Probe a single pair against every applicable tier, reporting why it
/// fails. The batch matcher below applies the same predicates with
/// consumption; this entry point exists for diagnostics and reporting.
pub fn try_match_pair(placement: &Placement, creative: &Creative) -> Result<MatchTier, NoMatchReason> {
    match (placement.is_video(), creative.kind) {
        (true, CreativeKind::Video) => {
            if video_placement_accepts(placement) {
                Ok(MatchTier::Video)
            } else {
                Err(NoMatchReason::NotVideoShaped)
            }
        }
        (false, CreativeKind::Display) => {
            if creative.size.is_none() {
                return Err(NoMatchReason::CreativeSizeMissing);
            }
            for &tier in DISPLAY_TIERS {
                if satisfies_tier(placement, creative, tier) {
                    return Ok(tier);
                }
            }
            Err(NoMatchReason::OutsideTolerance)
        }
        _ => Err(NoMatchReason::KindMismatch),
    }
}

// =============================================================================
// Batch Matching
// =============================================================================

/// Match a pool of creatives against detected placements.
///
/// Video creatives only ever see video placements and vice versa. Both
/// sides are sorted descending by pixel area before matching, so larger
/// slots and assets resolve first regardless of input order, and a small
/// creative cannot steal a tolerant match from a larger exact one.
/// Unmatchable creatives (no URL, or display without a size) go straight
/// to the residual list.
pub fn match_creatives(placements: Vec<Placement>, creatives: Vec<Creative>) -> MatchOutcome {
    let mut outcome = MatchOutcome::default();

    let mut display_placements = Vec::new();
    let mut video_placements = Vec::new();
    for p in placements {
        if p.is_video() {
            video_placements.push(p);
        } else {
            display_placements.push(p);
        }
    }

    let mut display_creatives = Vec::new();
    let mut video_creatives = Vec::new();
    for c in creatives {
        if !c.is_matchable() {
            outcome.unmatched_creatives.push(c);
        } else if c.kind == CreativeKind::Video {
            video_creatives.push(c);
        } else {
            display_creatives.push(c);
        }
    }

    let total_placements = display_placements.len() + video_placements.len();

    display_placements.sort_by(|a, b| b.size.area().cmp(&a.size.area()));
    display_creatives.sort_by(|a, b| b.area().cmp(&a.area()));
    video_placements.sort_by(|a, b| b.size.area().cmp(&a.size.area()));
    video_creatives.sort_by(|a, b| b.area().cmp(&a.area()));

    run_tiers(display_placements, display_creatives, DISPLAY_TIERS, &mut outcome);
    run_tiers(video_placements, video_creatives, &[MatchTier::Video], &mut outcome);

    log::debug!(
        "matched {} of {} placements against {} creatives ({} creatives left over)",
        outcome.matches.len(),
        total_placements,
        outcome.matches.len() + outcome.unmatched_creatives.len(),
        outcome.unmatched_creatives.len(),
    );

    outcome
}

/// First-fit consumption loop: creatives outer, placements inner, one tier
/// at a time. Leftovers on either side land in the outcome residuals.
fn run_tiers(
    placements: Vec<Placement>,
    creatives: Vec<Creative>,
    tiers: &[MatchTier],
    outcome: &mut MatchOutcome,
) {
    let mut placement_slots: Vec<Option<Placement>> = placements.into_iter().map(Some).collect();
    let mut creative_slots: Vec<Option<Creative>> = creatives.into_iter().map(Some).collect();

    for &tier in tiers {
        for ci in 0..creative_slots.len() {
            let creative = match creative_slots[ci].as_ref() {
                Some(c) => c,
                None => continue,
            };

            let mut hit = None;
            for (pi, slot) in placement_slots.iter().enumerate() {
                if let Some(p) = slot.as_ref() {
                    if satisfies_tier(p, creative, tier) {
                        hit = Some(pi);
                        break;
                    }
                }
            }

            if let Some(pi) = hit {
                if let (Some(placement), Some(creative)) =
                    (placement_slots[pi].take(), creative_slots[ci].take())
                {
                    outcome.matches.push(PlacementMatch { placement, creative, tier });
                }
            }
        }
    }

    outcome
        .unmatched_placements
        .extend(placement_slots.into_iter().flatten());
    outcome
        .unmatched_creatives
        .extend(creative_slots.into_iter().flatten());
}
