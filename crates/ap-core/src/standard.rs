//! Standard advertising sizes and aspect-ratio classes
//!
//! Fixed tables, linear scans. The first acceptable entry wins, so table
//! order doubles as priority order.

use crate::geometry::ratio_within;

// =============================================================================
// IAB Standard Sizes
// =============================================================================

/// Industry-standard creative dimensions with their conventional names.
///
/// Most commonly trafficked sizes come first; a measured size near two
/// entries resolves to the earlier one.
pub const STANDARD_SIZES: &[(u32, u32, &str)] = &[
    (300, 250, "Medium Rectangle"),
    (728, 90, "Leaderboard"),
    (160, 600, "Wide Skyscraper"),
    (300, 600, "Half Page"),
    (320, 50, "Mobile Leaderboard"),
    (970, 250, "Billboard"),
    (970, 90, "Large Leaderboard"),
    (468, 60, "Banner"),
    (234, 60, "Half Banner"),
    (120, 600, "Skyscraper"),
    (336, 280, "Large Rectangle"),
    (320, 100, "Large Mobile Banner"),
    (250, 250, "Square"),
    (200, 200, "Small Square"),
    (180, 150, "Rectangle"),
    (300, 1050, "Portrait"),
    (320, 480, "Mobile Interstitial"),
    (120, 240, "Vertical Banner"),
    (125, 125, "Button"),
    (88, 31, "Micro Bar"),
];

/// Name of the first standard size with both dimensions within
/// `px_tolerance` pixels of the measured size.
pub fn match_standard_size(width: u32, height: u32, px_tolerance: u32) -> Option<&'static str> {
    for &(w, h, label) in STANDARD_SIZES {
        if width.abs_diff(w) <= px_tolerance && height.abs_diff(h) <= px_tolerance {
            return Some(label);
        }
    }
    None
}

// =============================================================================
// Aspect-Ratio Classes
// =============================================================================

/// Broad aspect-ratio families recognized by the video strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AspectClass {
    /// 16:9 widescreen (the standard video player shape)
    W16x9,
    /// 4:3 legacy display
    W4x3,
    /// 21:9 ultrawide
    W21x9,
}

impl AspectClass {
    /// Canonical `"W:H"` rendering.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::W16x9 => "16:9",
            Self::W4x3 => "4:3",
            Self::W21x9 => "21:9",
        }
    }

    pub fn ratio(&self) -> f64 {
        match self {
            Self::W16x9 => 16.0 / 9.0,
            Self::W4x3 => 4.0 / 3.0,
            Self::W21x9 => 21.0 / 9.0,
        }
    }
}

/// Scan order; 16:9 first since it is by far the most common player shape
/// and the class windows overlap slightly at generous tolerances.
const ASPECT_CLASSES: &[AspectClass] = &[AspectClass::W16x9, AspectClass::W4x3, AspectClass::W21x9];

/// First aspect class whose ratio is within `tol` of `width / height`.
pub fn match_aspect_class(width: u32, height: u32, tol: f64) -> Option<AspectClass> {
    if height == 0 {
        return None;
    }
    let ratio = width as f64 / height as f64;
    for &class in ASPECT_CLASSES {
        if ratio_within(ratio, class.ratio(), tol) {
            return Some(class);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_standard_size_exact() {
        assert_eq!(match_standard_size(300, 250, 0), Some("Medium Rectangle"));
        assert_eq!(match_standard_size(728, 90, 0), Some("Leaderboard"));
        assert_eq!(match_standard_size(88, 31, 0), Some("Micro Bar"));
    }

    #[test]
    fn test_match_standard_size_tolerance() {
        assert_eq!(match_standard_size(302, 248, 20), Some("Medium Rectangle"));
        assert_eq!(match_standard_size(310, 60, 20), Some("Mobile Leaderboard"));
        assert_eq!(match_standard_size(302, 248, 0), None);
        assert_eq!(match_standard_size(999, 999, 20), None);
    }

    #[test]
    fn test_match_standard_size_both_dimensions_required() {
        // Width is dead-on Leaderboard, height is 60px out
        assert_eq!(match_standard_size(728, 150, 20), None);
    }

    #[test]
    fn test_match_aspect_class() {
        assert_eq!(match_aspect_class(1920, 1080, 0.15), Some(AspectClass::W16x9));
        assert_eq!(match_aspect_class(640, 360, 0.15), Some(AspectClass::W16x9));
        assert_eq!(match_aspect_class(640, 480, 0.15), Some(AspectClass::W4x3));
        assert_eq!(match_aspect_class(2560, 1080, 0.15), Some(AspectClass::W21x9));
        // A medium rectangle is 4:3-ish, decidedly not 16:9
        assert_eq!(match_aspect_class(300, 250, 0.15), Some(AspectClass::W4x3));
        // Tall and ultra-wide shapes fall outside every class
        assert_eq!(match_aspect_class(300, 600, 0.15), None);
        assert_eq!(match_aspect_class(728, 90, 0.15), None);
        assert_eq!(match_aspect_class(100, 0, 0.15), None);
    }

    #[test]
    fn test_aspect_class_labels() {
        assert_eq!(AspectClass::W16x9.as_str(), "16:9");
        assert_eq!(AspectClass::W4x3.as_str(), "4:3");
        assert_eq!(AspectClass::W21x9.as_str(), "21:9");
    }
}
