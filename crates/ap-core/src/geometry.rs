//! Size and rectangle math for placement matching
//!
//! Pure helpers shared by the detector, viewport filter, and matcher.
//! All tolerance math lives here so it can be tested without a browser.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

// =============================================================================
// Size
// =============================================================================

/// Integer pixel dimensions of a placement or creative.
///
/// Serializes as the canonical `"WIDTHxHEIGHT"` string, the form
/// traffickers write sizes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Pixel area, widened so large sizes cannot overflow.
    #[inline]
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Width/height ratio. 0.0 for zero-height sizes.
    #[inline]
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }

    /// Rounded integer size of a live bounding box.
    pub fn from_rect(rect: &Rect) -> Self {
        Self {
            width: rect.width.round().max(0.0) as u32,
            height: rect.height.round().max(0.0) as u32,
        }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl Serialize for Size {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Size {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SizeVisitor;

        impl Visitor<'_> for SizeVisitor {
            type Value = Size;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a \"WIDTHxHEIGHT\" string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Size, E> {
                parse_size(v).ok_or_else(|| E::custom(format!("invalid size string: {:?}", v)))
            }
        }

        deserializer.deserialize_str(SizeVisitor)
    }
}

// =============================================================================
// Size Parsing
// =============================================================================

/// Parse a canonical `"WIDTHxHEIGHT"` size string.
///
/// Accepts exactly digits + lowercase `x` + digits. Any other separator,
/// case, or stray token yields `None`; ambiguous formats fail closed
/// rather than guess. Digit runs that overflow `u32` also fail.
pub fn parse_size(s: &str) -> Option<Size> {
    let x_pos = s.find('x')?;
    let (w_str, h_str) = (&s[..x_pos], &s[x_pos + 1..]);

    if w_str.is_empty() || h_str.is_empty() {
        return None;
    }
    if !w_str.bytes().all(|b| b.is_ascii_digit()) || !h_str.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let width = w_str.parse().ok()?;
    let height = h_str.parse().ok()?;
    Some(Size { width, height })
}

// =============================================================================
// Tolerance Predicates
// =============================================================================

/// True when both dimension differences lie within `pct` percent of the
/// larger of the two corresponding dimensions.
pub fn sizes_match_with_tolerance(a: Size, b: Size, pct: f64) -> bool {
    dimension_within_pct(a.width, b.width, pct) && dimension_within_pct(a.height, b.height, pct)
}

#[inline]
fn dimension_within_pct(a: u32, b: u32, pct: f64) -> bool {
    let larger = a.max(b);
    if larger == 0 {
        return true;
    }
    a.abs_diff(b) as f64 <= larger as f64 * pct / 100.0
}

/// True when the relative aspect-ratio difference is within `tol`:
/// `|ra - rb| / max(ra, rb) <= tol`.
pub fn aspect_ratios_match(a: Size, b: Size, tol: f64) -> bool {
    ratio_within(a.aspect_ratio(), b.aspect_ratio(), tol)
}

/// Relative closeness of two raw ratios. Degenerate non-positive ratios
/// never match anything.
#[inline]
pub(crate) fn ratio_within(ra: f64, rb: f64, tol: f64) -> bool {
    let max = ra.max(rb);
    if max <= 0.0 {
        return false;
    }
    (ra - rb).abs() / max <= tol
}

// =============================================================================
// Rect
// =============================================================================

/// Live bounding box in CSS pixels, as reported by the page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Partial overlap counts. Zero-area boxes intersect nothing, so a
    /// collapsed element never survives a viewport check.
    pub fn intersects(&self, other: &Rect) -> bool {
        if self.area() <= 0.0 || other.area() <= 0.0 {
            return false;
        }
        self.x < other.x + other.width
            && self.x + self.width > other.x
            && self.y < other.y + other.height
            && self.y + self.height > other.y
    }

    /// Integer key for position-based deduplication.
    pub fn dedup_key(&self) -> (i64, i64, i64, i64) {
        (
            self.x.round() as i64,
            self.y.round() as i64,
            self.width.round() as i64,
            self.height.round() as i64,
        )
    }
}
