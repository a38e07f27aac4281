//! Placement, creative, and match records
//!
//! One tagged `Placement` type covers every detection strategy; the `kind`
//! discriminant carries what used to be implicit in which scan found the
//! slot. These records are created fresh per page and never persisted.

use crate::geometry::Size;
use crate::matcher::STANDARD_SIZE_TOLERANCE_PX;
use crate::standard;
use serde::{Deserialize, Serialize};

// =============================================================================
// Placement
// =============================================================================

/// How a placement was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlacementKind {
    /// `<iframe>` whose src points at a known ad server
    Iframe,
    /// Container matched by ad-related selectors or id/class patterns
    Css,
    /// Video player or video ad slot
    Video,
    /// Caller-supplied slot with an explicit selector
    Custom,
}

/// What concretely backs a video placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoSubtype {
    /// Embedded player iframe from a known video platform
    Iframe,
    /// Native `<video>` element
    Native,
    /// Generic container confirmed only by 16:9 geometry
    Container,
}

/// A located ad slot on a page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    /// Selector that re-resolves this node in the live DOM. Injection
    /// depends on it staying valid after detection.
    pub selector: String,
    /// Rendered size at detection time, device-independent pixels.
    /// Both dimensions are positive for any placement handed to the matcher.
    pub size: Size,
    pub kind: PlacementKind,
    /// Set for video placements only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<VideoSubtype>,
    /// Original src/content reference for iframe and video slots
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Standard-size name when the measured size resolves to one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iab_label: Option<&'static str>,
}

impl Placement {
    /// Build a placement, resolving its standard-size label from the
    /// measured dimensions.
    pub fn new(selector: impl Into<String>, size: Size, kind: PlacementKind) -> Self {
        Self {
            selector: selector.into(),
            size,
            kind,
            subtype: None,
            source_url: None,
            iab_label: standard::match_standard_size(
                size.width,
                size.height,
                STANDARD_SIZE_TOLERANCE_PX,
            ),
        }
    }

    pub fn with_subtype(mut self, subtype: VideoSubtype) -> Self {
        self.subtype = Some(subtype);
        self
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    /// Canonical `"WIDTHxHEIGHT"` rendering of the measured size.
    pub fn size_string(&self) -> String {
        self.size.to_string()
    }

    pub fn is_video(&self) -> bool {
        self.kind == PlacementKind::Video
    }
}

// =============================================================================
// Creative
// =============================================================================

/// What a creative is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreativeKind {
    #[default]
    Display,
    Video,
}

/// Injectable content a preview reference resolved to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum ResolvedContent {
    /// Directly embeddable frame URL
    FrameUrl(String),
    /// Same-origin markup captured for srcdoc-style injection
    Markup(String),
}

/// A client-supplied asset to inject.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Creative {
    /// Direct asset URL, data URL, or a preview reference that the
    /// pre-processor resolves before matching
    pub url: String,
    /// Declared dimensions; required for display creatives
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    #[serde(default)]
    pub kind: CreativeKind,
    /// Filled by pre-processing when a preview wrapper was resolved
    #[serde(default, rename = "resolvedContent", skip_serializing_if = "Option::is_none")]
    pub resolved: Option<ResolvedContent>,
    /// Pre-resolution reference, kept for reporting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_url: Option<String>,
}

impl Creative {
    pub fn display(url: impl Into<String>, size: Size) -> Self {
        Self {
            url: url.into(),
            size: Some(size),
            kind: CreativeKind::Display,
            resolved: None,
            original_url: None,
        }
    }

    pub fn video(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            size: None,
            kind: CreativeKind::Video,
            resolved: None,
            original_url: None,
        }
    }

    /// Display creatives need a URL and a declared size; video creatives
    /// only a URL. Anything else is excluded before matching.
    pub fn is_matchable(&self) -> bool {
        match self.kind {
            CreativeKind::Display => !self.url.is_empty() && self.size.is_some(),
            CreativeKind::Video => !self.url.is_empty(),
        }
    }

    /// Declared pixel area; sizeless creatives sort last.
    pub fn area(&self) -> u64 {
        self.size.map(|s| s.area()).unwrap_or(0)
    }
}

// =============================================================================
// Match Results
// =============================================================================

/// Which rule produced a pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchTier {
    /// Identical dimensions
    Exact,
    /// Same standard-size name within the pixel tolerance
    SizeTolerance,
    /// Within percentage size tolerance and aspect-ratio tolerance
    AspectFlexible,
    /// Video pairing; video has no meaningful exact-size concept
    Video,
}

impl MatchTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::SizeTolerance => "sizeTolerance",
            Self::AspectFlexible => "aspectFlexible",
            Self::Video => "video",
        }
    }
}

/// A placement/creative pairing and the tier that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct PlacementMatch {
    pub placement: Placement,
    pub creative: Creative,
    pub tier: MatchTier,
}

/// Everything a matching run produced, residuals included.
///
/// Unmatched entries are a reporting concern, not an error.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchOutcome {
    pub matches: Vec<PlacementMatch>,
    pub unmatched_placements: Vec<Placement>,
    pub unmatched_creatives: Vec<Creative>,
}

impl MatchOutcome {
    pub fn is_fully_matched(&self) -> bool {
        self.unmatched_placements.is_empty() && self.unmatched_creatives.is_empty()
    }
}
