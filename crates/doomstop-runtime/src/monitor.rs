//! Scroll monitor task.
//!
//! Attaches to the page's scroll events for one container — viewport
//! events when the container is the document scrolling root, element
//! events otherwise — throttles them through the core gate, and feeds
//! position samples to the core tracker. Threshold crossings are reported
//! to the coordinator; the monitor itself never auto-resets, so crossings
//! repeat until the coordinator resets or stops it.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{Duration, Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use doomstop_core::dom::NodeId;
use doomstop_core::scroll::{ScrollSample, ScrollTracker};
use doomstop_core::throttle::{GateDecision, SCROLL_THROTTLE_MS, ThrottleGate};

use crate::coordinator::SessionEvent;
use crate::page::{PageBackend, PageEvent, ScrollSource};

enum MonitorCtl {
    Reset,
}

/// Owns the monitoring task for one scroll container.
#[derive(Default)]
pub struct ScrollMonitor {
    cancel: Option<CancellationToken>,
    ctl: Option<mpsc::Sender<MonitorCtl>>,
}

impl ScrollMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach to `container` and report crossings of `threshold_screens`
    /// on `tx`. Replaces any previous monitoring session.
    pub fn start<P: PageBackend>(
        &mut self,
        page: Arc<P>,
        container: NodeId,
        threshold_screens: u32,
        tx: mpsc::Sender<SessionEvent>,
    ) {
        self.stop();

        let cancel = CancellationToken::new();
        let (ctl_tx, mut ctl_rx) = mpsc::channel(4);
        self.cancel = Some(cancel.clone());
        self.ctl = Some(ctl_tx);

        tokio::spawn(async move {
            let source = if container == page.scrolling_root() {
                ScrollSource::Viewport
            } else {
                ScrollSource::Element(container)
            };

            let mut events = page.subscribe();
            let mut tracker = ScrollTracker::new(threshold_screens, page.scroll_top(container));
            let mut gate = ThrottleGate::new(SCROLL_THROTTLE_MS);
            let started = Instant::now();
            let now_ms = |at: Instant| at.duration_since(started).as_millis() as u64;
            // Deadline for the pending trailing run, if one is scheduled.
            let mut trailing_at: Option<Instant> = None;

            loop {
                // Copied so the branch future does not borrow the variable
                // the handlers reassign.
                let trailing_deadline = trailing_at;
                let run_sample = tokio::select! {
                    _ = cancel.cancelled() => break,
                    ctl = ctl_rx.recv() => match ctl {
                        Some(MonitorCtl::Reset) => {
                            tracker.reset(page.scroll_top(container));
                            false
                        }
                        None => break,
                    },
                    _ = async move {
                        // Always Some when this branch is enabled.
                        if let Some(at) = trailing_deadline { sleep_until(at).await }
                    }, if trailing_deadline.is_some() => {
                        trailing_at = None;
                        gate.on_trailing(now_ms(Instant::now()))
                    }
                    event = events.recv() => match event {
                        Ok(PageEvent::Scrolled(s)) if s == source => {
                            match gate.on_signal(now_ms(Instant::now())) {
                                GateDecision::RunNow => true,
                                GateDecision::ScheduleTrailing { delay_ms } => {
                                    trailing_at =
                                        Some(Instant::now() + Duration::from_millis(delay_ms));
                                    false
                                }
                                GateDecision::Pending => false,
                            }
                        }
                        Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => false,
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                };

                if !run_sample {
                    continue;
                }

                let sample = tracker.observe(page.scroll_top(container), page.viewport_height());
                if let ScrollSample::Reached { screens } = sample {
                    debug!(screens, threshold = threshold_screens, "scroll threshold reached");
                    if tx
                        .send(SessionEvent::ThresholdReached { screens })
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            }
        });
    }

    /// Zero the accumulated distance and resynchronize the baseline,
    /// without detaching.
    pub fn reset(&self) {
        if let Some(ctl) = &self.ctl {
            // Not awaited: the monitor task may itself be blocked sending
            // a threshold event to the caller. A dropped reset leaves the
            // tracker hot, so it must at least be visible in the logs.
            if let Err(e) = ctl.try_send(MonitorCtl::Reset) {
                warn!(error = %e, "scroll monitor reset dropped");
            }
        }
    }

    /// Detach and clear all state.
    pub fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        self.ctl = None;
    }
}

impl Drop for ScrollMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
