//! Lifecycle coordinator: the top-level session state machine.
//!
//! Owns the per-page session state and sequences the navigation detector,
//! container locator, scroll monitor, and blocker from a single event
//! loop. Everything asynchronous funnels into one `mpsc` stream, so the
//! coordinator never observes two things at once; races between
//! navigation, settings changes, and in-flight container waits are
//! resolved by a wait generation counter plus re-validation at resolution
//! time (see [`SessionEvent::ContainerResolved`] handling).

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use doomstop_core::dom::NodeId;
use doomstop_core::locate::locate_now;
use doomstop_core::settings::{Settings, SettingsDelta, classify_change};
use doomstop_core::site::{SiteDescriptor, descriptor_for};

use crate::blocker::Blocker;
use crate::locator::{WaitHandle, locate_async};
use crate::monitor::ScrollMonitor;
use crate::navigation::NavigationDetector;
use crate::page::{PageBackend, PageEvent};
use crate::store::SettingsStore;

/// Everything the coordinator reacts to, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The active URL changed without a reload.
    Navigated(String),
    /// A new default-merged settings snapshot was published.
    SettingsChanged(Settings),
    /// An asynchronous container wait settled. `target` is `None` after
    /// cancellation; `epoch` identifies the wait generation.
    ContainerResolved {
        epoch: u64,
        target: Option<NodeId>,
    },
    /// The scroll monitor crossed its threshold.
    ThresholdReached { screens: f64 },
    /// Overlay continue button pressed.
    OverlayContinue,
    /// Overlay close button pressed.
    OverlayClose,
    /// Page context is ending.
    Shutdown,
}

/// Cheap handle for shutting a running coordinator down.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<SessionEvent>,
}

impl CoordinatorHandle {
    /// Request teardown. Idempotent; a no-op once the loop has exited.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(SessionEvent::Shutdown).await;
    }
}

/// Top-level session state machine for one page context.
pub struct Coordinator<P: PageBackend> {
    page: Arc<P>,
    descriptor: &'static SiteDescriptor,
    settings: Settings,
    store_rx: tokio::sync::watch::Receiver<Settings>,
    tx: mpsc::Sender<SessionEvent>,
    rx: mpsc::Receiver<SessionEvent>,
    nav: NavigationDetector,
    monitor: ScrollMonitor,
    blocker: Blocker,
    /// The single outstanding container wait, if any.
    pending_wait: Option<WaitHandle>,
    /// Wait generation. Bumped on every stop-monitoring, so resolutions
    /// from a previous session identify themselves as stale.
    wait_epoch: u64,
    /// Container currently being monitored.
    monitored: Option<NodeId>,
    /// Stops the overlay and settings forwarder tasks at teardown.
    forwarders: CancellationToken,
}

impl<P: PageBackend> Coordinator<P> {
    /// Resolve a descriptor for the page's hostname and build a
    /// coordinator. `None` when the site is not registered — the page
    /// context then stays permanently idle.
    pub fn initialize(page: Arc<P>, store: &SettingsStore) -> Option<Self> {
        let url = page.current_url();
        let hostname = Url::parse(&url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))?;
        let Some(descriptor) = descriptor_for(&hostname) else {
            debug!(%hostname, "no site descriptor, staying idle");
            return None;
        };
        Some(Self::with_descriptor(page, store, descriptor))
    }

    /// Build a coordinator for a known descriptor. Embedders with their
    /// own descriptors (and tests) use this directly.
    pub fn with_descriptor(
        page: Arc<P>,
        store: &SettingsStore,
        descriptor: &'static SiteDescriptor,
    ) -> Self {
        let (tx, rx) = mpsc::channel(32);
        Self {
            page,
            descriptor,
            settings: store.current(),
            store_rx: store.subscribe(),
            tx,
            rx,
            nav: NavigationDetector::new(),
            monitor: ScrollMonitor::new(),
            blocker: Blocker::new(),
            pending_wait: None,
            wait_epoch: 0,
            monitored: None,
            forwarders: CancellationToken::new(),
        }
    }

    /// Handle for requesting shutdown from outside the loop.
    pub fn handle(&self) -> CoordinatorHandle {
        CoordinatorHandle {
            tx: self.tx.clone(),
        }
    }

    /// Run the session until shutdown.
    pub async fn run(mut self) {
        info!(site = self.descriptor.id, "session starting");
        self.spawn_overlay_forwarder();
        self.spawn_settings_forwarder();
        self.nav.start(Arc::clone(&self.page), self.tx.clone());
        self.start_monitoring();

        while let Some(event) = self.rx.recv().await {
            match event {
                SessionEvent::Navigated(url) => {
                    debug!(%url, "navigation: restarting session");
                    self.stop_monitoring();
                    self.start_monitoring();
                }
                SessionEvent::SettingsChanged(next) => self.on_settings_changed(next),
                SessionEvent::ContainerResolved { epoch, target } => {
                    self.on_container_resolved(epoch, target);
                }
                SessionEvent::ThresholdReached { screens } => {
                    if let Some(target) = self.monitored {
                        info!(screens, "threshold reached, blocking");
                        self.blocker.block(&*self.page, target);
                    }
                }
                SessionEvent::OverlayContinue => {
                    if self.blocker.press_continue(&*self.page) {
                        // Confirmed: resume with a fresh accumulation cycle.
                        self.monitor.reset();
                    }
                }
                SessionEvent::OverlayClose => self.blocker.press_close(&*self.page),
                SessionEvent::Shutdown => break,
            }
        }

        self.teardown();
    }

    /// Begin monitoring the current URL, if it qualifies.
    fn start_monitoring(&mut self) {
        if !self.settings.site_enabled(self.descriptor.id) {
            return;
        }
        let url = self.page.current_url();
        let site = self.settings.site(self.descriptor.id);
        if !self.descriptor.is_feed_url(&url, &site) {
            return;
        }

        if let Some(target) = locate_now(&*self.page, self.descriptor) {
            self.attach(target);
        } else {
            debug!(site = self.descriptor.id, "container not present, waiting");
            self.pending_wait = Some(locate_async(
                Arc::clone(&self.page),
                self.descriptor,
                self.wait_epoch,
                self.tx.clone(),
            ));
        }
    }

    /// Stop monitoring: cancel any outstanding wait, detach the monitor,
    /// and lift an active block.
    fn stop_monitoring(&mut self) {
        if let Some(wait) = self.pending_wait.take() {
            wait.cancel();
        }
        // Any resolution still in flight is now from a dead generation.
        self.wait_epoch += 1;
        self.monitor.stop();
        self.monitored = None;
        if self.blocker.is_blocked() {
            self.blocker.unblock(&*self.page);
        }
    }

    /// A container wait settled. The state it was started under may be
    /// long gone, so everything is re-validated against the present
    /// before attaching.
    fn on_container_resolved(&mut self, epoch: u64, target: Option<NodeId>) {
        if epoch != self.wait_epoch {
            debug!(epoch, current = self.wait_epoch, "stale container resolution discarded");
            return;
        }
        self.pending_wait = None;

        let Some(target) = target else {
            return; // cancelled
        };
        if !self.settings.site_enabled(self.descriptor.id) {
            debug!("container resolved but site now disabled");
            return;
        }
        let url = self.page.current_url();
        let site = self.settings.site(self.descriptor.id);
        if !self.descriptor.is_feed_url(&url, &site) {
            debug!(%url, "container resolved but URL no longer a feed");
            return;
        }
        self.attach(target);
    }

    fn attach(&mut self, target: NodeId) {
        debug!(?target, threshold = self.settings.threshold, "monitoring container");
        self.monitor.start(
            Arc::clone(&self.page),
            target,
            self.settings.threshold,
            self.tx.clone(),
        );
        self.monitored = Some(target);
    }

    /// Apply exactly one reaction to a settings change, in priority
    /// order: disable beats enable beats feed-set change beats threshold
    /// change.
    fn on_settings_changed(&mut self, next: Settings) {
        let delta = classify_change(self.descriptor.id, &self.settings, &next);
        self.settings = next;
        debug!(?delta, "settings changed");

        match delta {
            SettingsDelta::SiteDisabled => self.stop_monitoring(),
            SettingsDelta::SiteEnabled => self.start_monitoring(),
            SettingsDelta::OptionalFeedsChanged | SettingsDelta::ThresholdChanged => {
                self.stop_monitoring();
                self.start_monitoring();
            }
            SettingsDelta::Inert => {}
        }
    }

    fn teardown(&mut self) {
        info!(site = self.descriptor.id, "session ending");
        self.stop_monitoring();
        self.nav.stop();
        self.forwarders.cancel();
        self.page.destroy_overlay();
    }

    /// Overlay button presses arrive as page events; forward them into
    /// the session stream.
    fn spawn_overlay_forwarder(&self) {
        let page = Arc::clone(&self.page);
        let tx = self.tx.clone();
        let cancel = self.forwarders.clone();
        tokio::spawn(async move {
            let mut events = page.subscribe();
            loop {
                let forwarded = tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = events.recv() => match event {
                        Ok(PageEvent::OverlayContinue) => Some(SessionEvent::OverlayContinue),
                        Ok(PageEvent::OverlayClose) => Some(SessionEvent::OverlayClose),
                        Ok(_) => None,
                        Err(broadcast::error::RecvError::Lagged(_)) => None,
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                };
                if let Some(event) = forwarded {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
            }
        });
    }

    fn spawn_settings_forwarder(&self) {
        let mut store_rx = self.store_rx.clone();
        let tx = self.tx.clone();
        let cancel = self.forwarders.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = store_rx.changed() => {
                        if changed.is_err() {
                            break; // store dropped
                        }
                        let snapshot = store_rx.borrow_and_update().clone();
                        if tx.send(SessionEvent::SettingsChanged(snapshot)).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::CONTAINER_WAIT_TIMEOUT;
    use crate::page::HostMessage;
    use crate::sim::SimPage;
    use doomstop_core::block::{BlockStep, copy_for};
    use doomstop_core::dom::PageDom;
    use doomstop_core::site::PathMatcher;
    use tokio::time::{Duration, advance};

    fn feed_descriptor() -> &'static SiteDescriptor {
        Box::leak(Box::new(SiteDescriptor {
            id: "test",
            host: regex::Regex::new(r"^example\.com$").expect("static pattern"),
            feeds: vec![PathMatcher::new(r"^/feed/?$")],
            optional_feeds: Vec::new(),
            container_selector: "#feed",
            container_finder: None,
        }))
    }

    /// Let queued events flow through the broadcast and mpsc hops.
    async fn settle() {
        for _ in 0..25 {
            tokio::task::yield_now().await;
        }
    }

    /// Leave the throttle gate's cooling window.
    async fn cool_down() {
        advance(Duration::from_millis(250)).await;
        settle().await;
    }

    fn store_with_threshold(threshold: u32) -> SettingsStore {
        let store = SettingsStore::in_memory();
        let mut settings = store.current();
        settings.threshold = threshold;
        store.save(&settings).expect("save");
        store
    }

    /// Page on a feed URL with the container already present, coordinator
    /// running with threshold 3.
    async fn running_session() -> (Arc<SimPage>, NodeId, SettingsStore, CoordinatorHandle) {
        let page = Arc::new(SimPage::new("https://example.com/feed", 800.0));
        let feed = page.insert_element(None, Some("#feed"), true);
        let store = store_with_threshold(3);
        let coordinator = Coordinator::with_descriptor(Arc::clone(&page), &store, feed_descriptor());
        let handle = coordinator.handle();
        tokio::spawn(coordinator.run());
        settle().await;
        (page, feed, store, handle)
    }

    fn shown_headline(page: &SimPage) -> Option<&'static str> {
        page.overlay_copy().map(|c| c.headline)
    }

    #[tokio::test(start_paused = true)]
    async fn threshold_blocks_and_two_presses_resume() {
        let (page, feed, _store, _handle) = running_session().await;

        // Three screens in one jump: block with the initial copy.
        page.scroll_to(feed, 2400.0);
        settle().await;
        assert_eq!(shown_headline(&page), Some(copy_for(BlockStep::Initial).headline));
        assert_eq!(page.overflow(feed), "hidden");

        // First press asks for confirmation, still blocked.
        page.press_continue();
        settle().await;
        assert_eq!(
            shown_headline(&page),
            Some(copy_for(BlockStep::ConfirmPending).headline)
        );
        assert_eq!(page.overflow(feed), "hidden");

        // Second press resumes and resets accumulation.
        page.press_continue();
        settle().await;
        assert!(page.overlay_copy().is_none());
        assert_eq!(page.overflow(feed), "");

        // A fresh cycle: three more screens block again, at step one.
        cool_down().await;
        page.scroll_to(feed, 4800.0);
        settle().await;
        assert_eq!(shown_headline(&page), Some(copy_for(BlockStep::Initial).headline));
    }

    #[tokio::test(start_paused = true)]
    async fn partial_accumulation_does_not_block() {
        let (page, feed, _store, _handle) = running_session().await;

        page.scroll_to(feed, 1600.0);
        settle().await;
        assert!(page.overlay_copy().is_none());

        // The remaining screen arrives later; total crosses.
        cool_down().await;
        page.scroll_to(feed, 2400.0);
        settle().await;
        assert!(page.overlay_copy().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn navigating_to_non_feed_unblocks_and_detaches() {
        let (page, feed, _store, _handle) = running_session().await;

        page.scroll_to(feed, 2400.0);
        settle().await;
        assert!(page.overlay_copy().is_some());

        page.navigate("https://example.com/about");
        settle().await;
        assert!(page.overlay_copy().is_none());
        assert_eq!(page.overflow(feed), "");

        // Detached: no amount of scrolling blocks now.
        cool_down().await;
        page.scroll_to(feed, 9000.0);
        settle().await;
        assert!(page.overlay_copy().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn navigating_between_feeds_restarts_accumulation() {
        let (page, feed, _store, _handle) = running_session().await;

        page.scroll_to(feed, 1600.0);
        settle().await;

        page.navigate("https://example.com/feed/");
        settle().await;

        // Two screens before plus two after: would block without the
        // restart, must not with it.
        cool_down().await;
        page.scroll_to(feed, 3200.0);
        settle().await;
        assert!(page.overlay_copy().is_none());

        cool_down().await;
        page.scroll_to(feed, 5600.0);
        settle().await;
        assert!(page.overlay_copy().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn container_appearing_late_is_attached() {
        let page = Arc::new(SimPage::new("https://example.com/feed", 800.0));
        let store = store_with_threshold(3);
        let coordinator = Coordinator::with_descriptor(Arc::clone(&page), &store, feed_descriptor());
        tokio::spawn(coordinator.run());
        settle().await;

        let feed = page.insert_element(None, Some("#feed"), true);
        settle().await;

        page.scroll_to(feed, 2400.0);
        settle().await;
        assert!(page.overlay_copy().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn wait_timeout_falls_back_to_the_viewport() {
        let page = Arc::new(SimPage::new("https://example.com/feed", 800.0));
        let store = store_with_threshold(3);
        let coordinator = Coordinator::with_descriptor(Arc::clone(&page), &store, feed_descriptor());
        tokio::spawn(coordinator.run());
        settle().await;

        advance(CONTAINER_WAIT_TIMEOUT + Duration::from_millis(10)).await;
        settle().await;

        let root = page.scrolling_root();
        page.scroll_to(root, 2400.0);
        settle().await;
        assert!(page.overlay_copy().is_some());
        assert_eq!(page.overflow(root), "hidden");
    }

    #[tokio::test(start_paused = true)]
    async fn navigating_away_cancels_the_wait() {
        let page = Arc::new(SimPage::new("https://example.com/feed", 800.0));
        let store = store_with_threshold(3);
        let coordinator = Coordinator::with_descriptor(Arc::clone(&page), &store, feed_descriptor());
        tokio::spawn(coordinator.run());
        settle().await;

        page.navigate("https://example.com/about");
        settle().await;

        // The container shows up afterwards: the dead wait's resolution
        // must not attach anything.
        let feed = page.insert_element(None, Some("#feed"), true);
        advance(CONTAINER_WAIT_TIMEOUT * 2).await;
        settle().await;

        page.scroll_to(feed, 9000.0);
        settle().await;
        assert!(page.overlay_copy().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn disabling_the_site_mid_wait_cancels_it() {
        let page = Arc::new(SimPage::new("https://example.com/feed", 800.0));
        let store = store_with_threshold(3);
        let coordinator = Coordinator::with_descriptor(Arc::clone(&page), &store, feed_descriptor());
        tokio::spawn(coordinator.run());
        settle().await;

        let mut settings = store.current();
        settings.sites.entry("test".into()).or_default().enabled = false;
        store.save(&settings).expect("save");
        settle().await;

        let feed = page.insert_element(None, Some("#feed"), true);
        settle().await;
        page.scroll_to(feed, 9000.0);
        settle().await;
        assert!(page.overlay_copy().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn disable_unblocks_and_enable_resumes() {
        let (page, feed, store, _handle) = running_session().await;

        page.scroll_to(feed, 2400.0);
        settle().await;
        assert!(page.overlay_copy().is_some());

        let mut settings = store.current();
        settings.sites.entry("test".into()).or_default().enabled = false;
        store.save(&settings).expect("save");
        settle().await;
        assert!(page.overlay_copy().is_none());
        assert_eq!(page.overflow(feed), "");

        // Disabled: scrolling is free.
        cool_down().await;
        page.scroll_to(feed, 5000.0);
        settle().await;
        assert!(page.overlay_copy().is_none());

        // Re-enable: monitoring resumes from the current position.
        settings.sites.entry("test".into()).or_default().enabled = true;
        store.save(&settings).expect("save");
        settle().await;

        cool_down().await;
        page.scroll_to(feed, 7400.0);
        settle().await;
        assert!(page.overlay_copy().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn threshold_change_restarts_with_the_new_value() {
        let (page, feed, store, _handle) = running_session().await;

        page.scroll_to(feed, 1600.0);
        settle().await;

        let mut settings = store.current();
        settings.threshold = 4;
        store.save(&settings).expect("save");
        settle().await;

        // Restarted: the earlier two screens are gone, and three more do
        // not reach the new threshold of four.
        cool_down().await;
        page.scroll_to(feed, 4000.0);
        settle().await;
        assert!(page.overlay_copy().is_none());

        cool_down().await;
        page.scroll_to(feed, 4800.0);
        settle().await;
        assert!(page.overlay_copy().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn inert_settings_change_preserves_accumulation() {
        let (page, feed, store, _handle) = running_session().await;

        page.scroll_to(feed, 1600.0);
        settle().await;

        store.save(&store.current()).expect("save");
        settle().await;

        // Still the same cycle: one more screen completes the three.
        cool_down().await;
        page.scroll_to(feed, 2400.0);
        settle().await;
        assert!(page.overlay_copy().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn close_press_asks_the_host_to_close_the_tab() {
        let (page, feed, _store, _handle) = running_session().await;

        page.scroll_to(feed, 2400.0);
        settle().await;

        page.press_close();
        settle().await;
        assert_eq!(page.host_messages(), vec![HostMessage::CloseTab]);
        assert!(page.overlay_copy().is_some(), "close does not unblock");
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_restores_the_page_and_destroys_the_overlay() {
        let (page, feed, _store, handle) = running_session().await;

        page.scroll_to(feed, 2400.0);
        settle().await;
        assert!(page.overlay_copy().is_some());

        handle.shutdown().await;
        settle().await;
        assert_eq!(page.overflow(feed), "");
        assert!(!page.overlay_exists());
    }

    #[tokio::test(start_paused = true)]
    async fn non_feed_start_stays_detached_until_navigation() {
        let page = Arc::new(SimPage::new("https://example.com/about", 800.0));
        let feed = page.insert_element(None, Some("#feed"), true);
        let store = store_with_threshold(3);
        let coordinator = Coordinator::with_descriptor(Arc::clone(&page), &store, feed_descriptor());
        tokio::spawn(coordinator.run());
        settle().await;

        page.scroll_to(feed, 9000.0);
        settle().await;
        assert!(page.overlay_copy().is_none());

        page.navigate("https://example.com/feed");
        settle().await;
        cool_down().await;
        page.scroll_to(feed, 11400.0);
        settle().await;
        assert!(page.overlay_copy().is_some());
    }

    #[tokio::test]
    async fn initialize_requires_a_registered_host() {
        let store = SettingsStore::in_memory();

        let unknown = Arc::new(SimPage::new("https://unknown.example/", 800.0));
        assert!(Coordinator::initialize(unknown, &store).is_none());

        let known = Arc::new(SimPage::new("https://x.com/home", 800.0));
        assert!(Coordinator::initialize(known, &store).is_some());
    }
}
