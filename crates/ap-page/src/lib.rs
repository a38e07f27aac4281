//! Adproof Page Library
//!
//! This crate provides the page-facing half of adproof: everything that
//! needs a live browser. The browser is reached only through the traits
//! in `driver`, so every stage here is testable against a canned fake,
//! and the WebDriver adapter is an optional feature.
//!
//! # Architecture
//!
//! Probes (thin JavaScript function bodies) report raw DOM facts;
//! classification, matching policy, and reporting stay in Rust. A page
//! runs detect, viewport filter, pre-process, match, inject, settle,
//! capture, strictly in that order.
//!
//! # Modules
//!
//! - `driver`: browser and page trait contract, driver errors
//! - `detect`: placement detection strategies (iframe, css, video)
//! - `viewport`: in-view filtering against live geometry
//! - `preprocess`: preview-reference resolution into injectable content
//! - `inject`: render instructions, injection, per-match reporting
//! - `orchestrate`: whole-page mockup runs
//! - `webdriver`: chromedriver adapter (feature `webdriver`)

pub mod detect;
pub mod driver;
pub mod inject;
pub mod orchestrate;
pub mod preprocess;
pub mod viewport;

pub(crate) mod probe;

#[cfg(feature = "webdriver")]
pub mod webdriver;

#[cfg(test)]
pub(crate) mod testkit;

// Re-export the operations and options callers reach for first
pub use detect::{detect_placements, DetectOptions, DetectStrategies};
pub use driver::{BrowserDriver, DriverError, DriverResult, PageDriver};
pub use inject::{inject_matches, InjectionRun, MatchReport, MatchSummary};
pub use orchestrate::{match_and_inject, run_mockup, MockupOptions, MockupReport};
pub use preprocess::{preprocess_creatives, PreprocessOptions};
