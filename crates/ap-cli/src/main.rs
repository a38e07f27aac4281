//! Adproof CLI
//!
//! Command-line tool for detecting ad placements on live pages and
//! rendering client creatives into them.

mod manifest;

use std::fs;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use ap_core::geometry::{parse_size, Rect};
use ap_core::matcher::try_match_pair;
use ap_core::standard::STANDARD_SIZES;
use ap_core::types::{Creative, CreativeKind, Placement, PlacementKind};
use ap_page::orchestrate::{run_mockup, MockupOptions, MockupReport};
use ap_page::webdriver::{WebDriverBrowser, WebDriverConfig, WebDriverPage};
use ap_page::{detect_placements, DetectOptions, DetectStrategies, PageDriver};

#[derive(Parser)]
#[command(name = "adproof")]
#[command(about = "Ad placement detection and creative mockup tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect ad placements on a live page
    Detect(DetectArgs),

    /// Render creatives into a live page and capture a screenshot
    Mock(MockArgs),

    /// List the standard ad sizes and their names
    Sizes,
}

#[derive(Args)]
struct DetectArgs {
    /// Page URL to scan
    #[arg(short, long)]
    url: String,

    /// chromedriver endpoint
    #[arg(long, default_value = "http://localhost:9515")]
    webdriver: String,

    /// Show the browser window instead of running headless
    #[arg(long)]
    headed: bool,

    /// Also run video player detection
    #[arg(long)]
    include_video: bool,

    /// Viewport rectangle as WxH, e.g. 1366x900
    #[arg(long)]
    viewport: Option<String>,

    /// Keep only placements intersecting the viewport
    #[arg(long)]
    viewport_only: bool,

    /// Milliseconds to let the page settle before scanning
    #[arg(long, default_value_t = 2000)]
    settle_ms: u64,

    /// Emit placements as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct MockArgs {
    /// Page URL to mock up
    #[arg(short, long)]
    url: String,

    /// chromedriver endpoint
    #[arg(long, default_value = "http://localhost:9515")]
    webdriver: String,

    /// Show the browser window instead of running headless
    #[arg(long)]
    headed: bool,

    /// Creative spec URL[@WxH][#video]; repeatable
    #[arg(short, long)]
    creative: Vec<String>,

    /// JSON manifest of creatives
    #[arg(short, long)]
    manifest: Option<String>,

    /// Manual placement SELECTOR@WxH; repeatable
    #[arg(short, long)]
    placement: Vec<String>,

    /// Screenshot output path
    #[arg(short, long, default_value = "mockup.png")]
    out: String,

    /// Also run video player detection
    #[arg(long)]
    include_video: bool,

    /// Restrict the mockup to a viewport as WxH, e.g. 1366x900
    #[arg(long)]
    viewport: Option<String>,

    /// Milliseconds to let the page settle before detection
    #[arg(long, default_value_t = 2000)]
    settle_ms: u64,

    /// Emit the full run report as JSON
    #[arg(long)]
    json: bool,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Detect(args) => cmd_detect(args),
        Commands::Mock(args) => cmd_mock(args),
        Commands::Sizes => cmd_sizes(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

// =============================================================================
// detect
// =============================================================================

fn cmd_detect(args: DetectArgs) -> Result<(), String> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| format!("Failed to start tokio runtime: {}", e))?;
    runtime.block_on(cmd_detect_async(args))
}

async fn cmd_detect_async(args: DetectArgs) -> Result<(), String> {
    let viewport = parse_viewport(args.viewport.as_deref())?;
    if args.viewport_only && viewport.is_none() {
        return Err("--viewport-only needs --viewport".to_string());
    }

    let page = open_page(&args.webdriver, args.headed).await?;
    let result = detect_flow(&page, &args, viewport).await;
    page.close().await.ok();
    result
}

async fn detect_flow(
    page: &WebDriverPage,
    args: &DetectArgs,
    viewport: Option<Rect>,
) -> Result<(), String> {
    page.goto(&args.url).await.map_err(|e| e.to_string())?;
    tokio::time::sleep(Duration::from_millis(args.settle_ms)).await;

    let mut options = DetectOptions::default();
    if args.include_video {
        options.strategies |= DetectStrategies::VIDEO;
    }
    options.viewport = viewport;
    options.viewport_only = args.viewport_only;

    let placements = detect_placements(page, &options)
        .await
        .map_err(|e| e.to_string())?;

    if args.json {
        let out = serde_json::to_string_pretty(&placements)
            .map_err(|e| format!("Failed to serialize placements: {}", e))?;
        println!("{}", out);
        return Ok(());
    }

    println!("Detected {} placement(s) on {}", placements.len(), args.url);
    for p in &placements {
        println!(
            "  {:<7} {:>9}  {:<18} {}",
            kind_name(p),
            p.size_string(),
            p.iab_label.unwrap_or("-"),
            p.selector
        );
    }
    Ok(())
}

fn kind_name(p: &Placement) -> &'static str {
    match p.kind {
        PlacementKind::Iframe => "iframe",
        PlacementKind::Css => "css",
        PlacementKind::Video => "video",
        PlacementKind::Custom => "custom",
    }
}

// =============================================================================
// mock
// =============================================================================

fn cmd_mock(args: MockArgs) -> Result<(), String> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| format!("Failed to start tokio runtime: {}", e))?;
    runtime.block_on(cmd_mock_async(args))
}

async fn cmd_mock_async(args: MockArgs) -> Result<(), String> {
    let creatives = gather_creatives(&args)?;
    let manual = args
        .placement
        .iter()
        .map(|spec| parse_placement_spec(spec))
        .collect::<Result<Vec<_>, String>>()?;
    let viewport = parse_viewport(args.viewport.as_deref())?;

    let page = open_page(&args.webdriver, args.headed).await?;
    let result = mock_flow(&page, creatives, manual, viewport, &args).await;
    page.close().await.ok();
    result
}

async fn mock_flow(
    page: &WebDriverPage,
    creatives: Vec<Creative>,
    manual: Vec<Placement>,
    viewport: Option<Rect>,
    args: &MockArgs,
) -> Result<(), String> {
    page.goto(&args.url).await.map_err(|e| e.to_string())?;
    tokio::time::sleep(Duration::from_millis(args.settle_ms)).await;

    let browser = WebDriverBrowser::new(WebDriverConfig {
        webdriver_url: args.webdriver.clone(),
        headless: !args.headed,
        ..WebDriverConfig::default()
    });

    let mut options = MockupOptions::default();
    if args.include_video {
        options.detect.strategies |= DetectStrategies::VIDEO;
    }
    options.detect.viewport = viewport;
    options.manual_placements = manual;

    let mut report = run_mockup(page, &browser, creatives, &options)
        .await
        .map_err(|e| e.to_string())?;
    let screenshot = report.screenshot_png.take();

    if args.json {
        let out = serde_json::to_string_pretty(&report)
            .map_err(|e| format!("Failed to serialize report: {}", e))?;
        println!("{}", out);
    } else {
        print_report(&report);
    }

    match screenshot {
        Some(bytes) => {
            fs::write(&args.out, &bytes)
                .map_err(|e| format!("Failed to write '{}': {}", args.out, e))?;
            println!("Screenshot: {} ({:.1} KB)", args.out, bytes.len() as f64 / 1024.0);
        }
        None => println!("Screenshot unavailable"),
    }
    Ok(())
}

fn gather_creatives(args: &MockArgs) -> Result<Vec<Creative>, String> {
    let mut creatives = Vec::new();
    for spec in &args.creative {
        creatives.push(parse_creative_spec(spec)?);
    }
    if let Some(path) = &args.manifest {
        creatives.extend(manifest::load_creatives(path)?);
    }
    if creatives.is_empty() {
        return Err("No creatives given; use --creative or --manifest".to_string());
    }
    Ok(creatives)
}

fn print_report(report: &MockupReport) {
    println!("Placements detected: {}", report.placements_detected);
    if report.placements_in_view != report.placements_detected {
        println!("Placements in scope: {}", report.placements_in_view);
    }
    println!("Matched:             {}", report.injection.matches.len());
    println!("Injected:            {}", report.injection.successful.len());

    for entry in &report.injection.successful {
        let applied = entry
            .applied_size
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  + {} <- {} [{}] rendered {}",
            entry.selector,
            entry.creative_url,
            entry.tier.as_str(),
            applied
        );
    }
    for entry in &report.injection.failed {
        println!(
            "  ! {} <- {}: {}",
            entry.selector,
            entry.creative_url,
            entry.error.as_deref().unwrap_or("unknown failure")
        );
    }

    if !report.unmatched_placements.is_empty() {
        println!("Unmatched placements:");
        for placement in &report.unmatched_placements {
            println!("  - {} ({})", placement.selector, placement.size_string());
            for creative in &report.unmatched_creatives {
                if let Err(reason) = try_match_pair(placement, creative) {
                    println!("      vs {}: {}", creative.url, reason);
                }
            }
        }
    }
    if !report.unmatched_creatives.is_empty() {
        println!("Unmatched creatives:");
        for creative in &report.unmatched_creatives {
            let size = creative
                .size
                .map(|s| s.to_string())
                .unwrap_or_else(|| "?".to_string());
            println!("  - {} ({})", creative.url, size);
        }
    }
}

// =============================================================================
// sizes
// =============================================================================

fn cmd_sizes() -> Result<(), String> {
    println!("Standard ad sizes:");
    for &(w, h, label) in STANDARD_SIZES {
        println!("  {:>4} x {:<4}  {}", w, h, label);
    }
    Ok(())
}

// =============================================================================
// Shared helpers
// =============================================================================

async fn open_page(webdriver_url: &str, headed: bool) -> Result<WebDriverPage, String> {
    let config = WebDriverConfig {
        webdriver_url: webdriver_url.to_string(),
        headless: !headed,
        ..WebDriverConfig::default()
    };
    let browser = WebDriverBrowser::new(config);
    let (width, height) = (
        browser.config().window_width,
        browser.config().window_height,
    );
    browser
        .open_page(width, height)
        .await
        .map_err(|e| format!("Failed to open browser page: {}", e))
}

fn parse_viewport(spec: Option<&str>) -> Result<Option<Rect>, String> {
    match spec {
        Some(spec) => {
            let size = parse_size(spec)
                .ok_or_else(|| format!("Invalid viewport '{}', expected WxH", spec))?;
            Ok(Some(Rect {
                x: 0.0,
                y: 0.0,
                width: size.width as f64,
                height: size.height as f64,
            }))
        }
        None => Ok(None),
    }
}

/// Parse `URL[@WxH][#video]`. Display creatives need a size unless the
/// URL is a preview reference that announces one.
fn parse_creative_spec(spec: &str) -> Result<Creative, String> {
    let mut rest = spec;
    let mut video = false;
    if let Some(stripped) = rest.strip_suffix("#video") {
        video = true;
        rest = stripped;
    }

    let (url, size) = match rest.rfind('@') {
        Some(pos) if parse_size(&rest[pos + 1..]).is_some() => {
            (&rest[..pos], parse_size(&rest[pos + 1..]))
        }
        _ => (rest, None),
    };
    if url.is_empty() {
        return Err(format!("Invalid creative spec '{}': empty URL", spec));
    }

    let kind = if video {
        CreativeKind::Video
    } else {
        CreativeKind::Display
    };
    if kind == CreativeKind::Display
        && size.is_none()
        && !ap_page::preprocess::requires_resolution(url)
    {
        return Err(format!("Creative '{}' needs a size (append @WxH)", url));
    }

    Ok(Creative {
        url: url.to_string(),
        size,
        kind,
        resolved: None,
        original_url: None,
    })
}

/// Parse `SELECTOR@WxH` into a custom placement.
fn parse_placement_spec(spec: &str) -> Result<Placement, String> {
    let pos = spec
        .rfind('@')
        .ok_or_else(|| format!("Invalid placement spec '{}', expected SELECTOR@WxH", spec))?;
    let selector = &spec[..pos];
    let size = parse_size(&spec[pos + 1..])
        .ok_or_else(|| format!("Invalid placement size in '{}'", spec))?;
    if selector.is_empty() {
        return Err(format!("Invalid placement spec '{}': empty selector", spec));
    }
    Ok(Placement::new(selector, size, PlacementKind::Custom))
}
