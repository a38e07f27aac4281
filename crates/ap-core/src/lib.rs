//! Adproof Core Library
//!
//! Pure matching engine for the adproof mockup toolkit: size parsing and
//! tolerance math, the standard-size tables, and the tiered algorithm that
//! pairs detected ad placements with client creatives.
//!
//! Nothing in this crate touches a browser. Everything operates on plain
//! placement/creative records so the whole policy is testable offline;
//! the page-facing side lives in `ap-page`.
//!
//! # Modules
//!
//! - `geometry`: `Size`/`Rect`, size-string parsing, tolerance predicates
//! - `standard`: fixed IAB size table and aspect-ratio classes
//! - `types`: placement, creative, and match records
//! - `matcher`: tiered greedy matching with residual reporting

pub mod geometry;
pub mod matcher;
pub mod standard;
pub mod types;

// Re-export commonly used types
pub use geometry::{aspect_ratios_match, parse_size, sizes_match_with_tolerance, Rect, Size};
pub use matcher::{match_creatives, try_match_pair, NoMatchReason};
pub use standard::{match_aspect_class, match_standard_size, AspectClass, STANDARD_SIZES};
pub use types::{
    Creative, CreativeKind, MatchOutcome, MatchTier, Placement, PlacementKind, PlacementMatch,
    ResolvedContent, VideoSubtype,
};
