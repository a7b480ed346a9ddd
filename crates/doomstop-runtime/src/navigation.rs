//! SPA navigation detection.
//!
//! No single signal is reliable across SPA routers, so three redundant
//! producers feed one de-duplicating URL check: history-navigation events,
//! title mutations, and a bounded-rate URL poll. Whichever fires first
//! after a route change wins; identical URLs never emit. Missing signal
//! sources (a page without a title element simply never sends
//! `TitleChanged`) cost latency, not correctness.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{Duration, interval};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::coordinator::SessionEvent;
use crate::page::{PageBackend, PageEvent};

/// URL poll interval.
pub const URL_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Detects SPA route changes and reports them as session events.
#[derive(Default)]
pub struct NavigationDetector {
    cancel: Option<CancellationToken>,
}

impl NavigationDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin detection, replacing any previous detection session.
    pub fn start<P: PageBackend>(&mut self, page: Arc<P>, tx: mpsc::Sender<SessionEvent>) {
        self.stop();

        let cancel = CancellationToken::new();
        self.cancel = Some(cancel.clone());

        tokio::spawn(async move {
            let mut events = page.subscribe();
            let mut poll = interval(URL_POLL_INTERVAL);
            poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut last_url = page.current_url();

            loop {
                let signalled = tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = poll.tick() => true,
                    event = events.recv() => match event {
                        Ok(PageEvent::HistoryNavigated | PageEvent::TitleChanged) => true,
                        Ok(_) => false,
                        Err(broadcast::error::RecvError::Lagged(_)) => true,
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                };
                if !signalled {
                    continue;
                }

                let url = page.current_url();
                if url != last_url {
                    debug!(from = %last_url, to = %url, "navigation detected");
                    last_url = url.clone();
                    if tx.send(SessionEvent::Navigated(url)).await.is_err() {
                        break;
                    }
                }
            }
        });
    }

    /// Release all detection mechanisms; later URL changes go unreported.
    pub fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
    }
}

impl Drop for NavigationDetector {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimPage;
    use tokio::time::{Duration, advance, timeout}; // paused-clock helpers

    async fn recv_nav(rx: &mut mpsc::Receiver<SessionEvent>) -> Option<String> {
        match timeout(Duration::from_secs(2), rx.recv()).await {
            Ok(Some(SessionEvent::Navigated(url))) => Some(url),
            _ => None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn history_event_reports_new_url() {
        let page = Arc::new(SimPage::new("https://x.com/home", 800.0));
        let (tx, mut rx) = mpsc::channel(8);
        let mut detector = NavigationDetector::new();
        detector.start(Arc::clone(&page), tx);
        tokio::task::yield_now().await;

        page.navigate("https://x.com/explore");
        assert_eq!(
            recv_nav(&mut rx).await.as_deref(),
            Some("https://x.com/explore")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn title_mutation_triggers_url_check() {
        let page = Arc::new(SimPage::new("https://x.com/home", 800.0));
        let (tx, mut rx) = mpsc::channel(8);
        let mut detector = NavigationDetector::new();
        detector.start(Arc::clone(&page), tx);
        tokio::task::yield_now().await;

        page.navigate_silently("https://x.com/messages");
        page.set_title("Messages / X");
        assert_eq!(
            recv_nav(&mut rx).await.as_deref(),
            Some("https://x.com/messages")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn poll_catches_silent_url_change() {
        let page = Arc::new(SimPage::new("https://x.com/home", 800.0));
        let (tx, mut rx) = mpsc::channel(8);
        let mut detector = NavigationDetector::new();
        detector.start(Arc::clone(&page), tx);
        tokio::task::yield_now().await;

        page.navigate_silently("https://x.com/explore");
        advance(URL_POLL_INTERVAL * 2).await;
        assert_eq!(
            recv_nav(&mut rx).await.as_deref(),
            Some("https://x.com/explore")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn identical_url_never_emits() {
        let page = Arc::new(SimPage::new("https://x.com/home", 800.0));
        let (tx, mut rx) = mpsc::channel(8);
        let mut detector = NavigationDetector::new();
        detector.start(Arc::clone(&page), tx);
        tokio::task::yield_now().await;

        // Title churn and polls with an unchanged URL stay silent.
        page.set_title("Home / X");
        page.set_title("(1) Home / X");
        advance(URL_POLL_INTERVAL * 3).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn redundant_signals_emit_once_per_change() {
        let page = Arc::new(SimPage::new("https://x.com/home", 800.0));
        let (tx, mut rx) = mpsc::channel(8);
        let mut detector = NavigationDetector::new();
        detector.start(Arc::clone(&page), tx);
        tokio::task::yield_now().await;

        // History event and title mutation for the same change.
        page.navigate("https://x.com/explore");
        page.set_title("Explore / X");
        advance(URL_POLL_INTERVAL).await;

        assert_eq!(
            recv_nav(&mut rx).await.as_deref(),
            Some("https://x.com/explore")
        );
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err(), "deduplicated to a single event");
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_detector_reports_nothing() {
        let page = Arc::new(SimPage::new("https://x.com/home", 800.0));
        let (tx, mut rx) = mpsc::channel(8);
        let mut detector = NavigationDetector::new();
        detector.start(Arc::clone(&page), tx);
        tokio::task::yield_now().await;

        detector.stop();
        tokio::task::yield_now().await;

        page.navigate("https://x.com/explore");
        advance(URL_POLL_INTERVAL * 2).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_previous_session() {
        let page = Arc::new(SimPage::new("https://x.com/home", 800.0));
        let (tx1, mut rx1) = mpsc::channel(8);
        let (tx2, mut rx2) = mpsc::channel(8);
        let mut detector = NavigationDetector::new();

        detector.start(Arc::clone(&page), tx1);
        tokio::task::yield_now().await;
        detector.start(Arc::clone(&page), tx2);
        tokio::task::yield_now().await;

        page.navigate("https://x.com/explore");
        assert!(recv_nav(&mut rx2).await.is_some());
        assert!(rx1.try_recv().is_err(), "old session was replaced");
    }
}
