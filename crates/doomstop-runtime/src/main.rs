//! Scripted demo: runs the full interruption pipeline against an
//! in-memory page and narrates what happens.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use tokio::time::{Duration, sleep};

use doomstop_core::dom::PageDom;
use doomstop_runtime::{Coordinator, SettingsStore, SimPage};

#[derive(Parser)]
#[command(
    name = "doomstop",
    about = "Demo of the feed scroll interruption pipeline on a simulated page"
)]
struct Cli {
    /// Screens of downward scrolling before the block triggers.
    #[arg(long, default_value_t = 3)]
    threshold: u32,

    /// Simulated viewport height in pixels.
    #[arg(long, default_value_t = 800.0)]
    viewport: f64,

    /// Persist settings to this JSON file instead of keeping them in
    /// memory.
    #[arg(long)]
    settings_file: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let store = match cli.settings_file {
        Some(path) => SettingsStore::open(path).context("opening settings store")?,
        None => SettingsStore::in_memory(),
    };
    let mut settings = store.current();
    settings.threshold = cli.threshold;
    let settings = store.save(&settings).context("saving settings")?;
    println!(
        "threshold: {} screens of {}px",
        settings.threshold, cli.viewport
    );

    let page = Arc::new(SimPage::new("https://x.com/home", cli.viewport));
    let Some(coordinator) = Coordinator::initialize(Arc::clone(&page), &store) else {
        bail!("no site descriptor for the demo page");
    };
    let handle = coordinator.handle();
    tokio::spawn(coordinator.run());
    sleep(Duration::from_millis(50)).await;

    let root = page.scrolling_root();
    let mut position = 0.0;

    println!("scrolling the feed...");
    scroll_until_blocked(&page, root, &mut position, cli.viewport).await?;
    let copy = page
        .overlay_copy()
        .context("blocked without overlay copy")?;
    println!("blocked: \"{}\" / \"{}\"", copy.headline, copy.detail);

    println!("pressing \"{}\"...", copy.continue_label);
    page.press_continue();
    sleep(Duration::from_millis(50)).await;
    let copy = page
        .overlay_copy()
        .context("confirmation step without overlay copy")?;
    println!("still blocked: \"{}\" / \"{}\"", copy.headline, copy.detail);

    println!("pressing \"{}\" again...", copy.continue_label);
    page.press_continue();
    sleep(Duration::from_millis(50)).await;
    if page.overlay_copy().is_some() {
        bail!("overlay still visible after confirmation");
    }
    println!("resumed; scrolling on...");

    scroll_until_blocked(&page, root, &mut position, cli.viewport).await?;
    println!("blocked again after another {} screens", settings.threshold);

    println!("navigating to a non-feed page...");
    page.navigate("https://x.com/messages");
    sleep(Duration::from_millis(50)).await;
    if page.overlay_copy().is_some() {
        bail!("overlay survived navigation away from the feed");
    }
    println!("unblocked by navigation");

    handle.shutdown().await;
    sleep(Duration::from_millis(50)).await;
    println!("session ended");
    Ok(())
}

/// Scroll down in 90%-of-a-screen steps until the overlay shows up.
async fn scroll_until_blocked(
    page: &SimPage,
    root: doomstop_core::dom::NodeId,
    position: &mut f64,
    viewport: f64,
) -> anyhow::Result<()> {
    for _ in 0..200 {
        if page.overlay_copy().is_some() {
            return Ok(());
        }
        *position += viewport * 0.9;
        page.scroll_to(root, *position);
        // Spaced wider than the scroll throttle so every step samples.
        sleep(Duration::from_millis(150)).await;
    }
    bail!("scrolled 200 steps without hitting the block")
}
