//! Asynchronous scroll-container wait.
//!
//! SPA feed containers are frequently created after initial load, so a
//! miss from the synchronous lookup starts a bounded wait: subtree
//! mutation events and a periodic poll race to re-run the lookup, and a
//! timeout guarantees resolution with the document scrolling root as
//! fallback — the session always ends up with *some* monitorable
//! container. The outcome is delivered to the coordinator as a
//! [`SessionEvent::ContainerResolved`] carrying the wait's generation tag,
//! so stale resolutions are cheap to discard.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{Duration, interval, sleep};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use doomstop_core::locate::locate_now;
use doomstop_core::site::SiteDescriptor;

use crate::coordinator::SessionEvent;
use crate::page::{PageBackend, PageEvent};

/// Give up waiting and fall back to the scrolling root after this long.
pub const CONTAINER_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Re-run the lookup at least this often while waiting.
pub const CONTAINER_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// One outstanding container search.
///
/// Settles exactly once; after settlement every internally held observer
/// and timer is gone. Cancelling settles with a null result and is safe to
/// call repeatedly or after settlement.
#[derive(Debug)]
pub struct WaitHandle {
    cancel: CancellationToken,
}

impl WaitHandle {
    /// Cancel the wait. The handle settles with a null result; the
    /// observer, poll, and timeout are torn down immediately.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for WaitHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Start resolving the scroll container for `descriptor`.
///
/// Resolution (element, fallback, or null after cancel) arrives on `tx` as
/// `ContainerResolved { epoch, .. }`.
pub fn locate_async<P: PageBackend>(
    page: Arc<P>,
    descriptor: &'static SiteDescriptor,
    epoch: u64,
    tx: mpsc::Sender<SessionEvent>,
) -> WaitHandle {
    let cancel = CancellationToken::new();
    let handle = WaitHandle {
        cancel: cancel.clone(),
    };

    tokio::spawn(async move {
        // Subscribe before the immediate check so a mutation landing in
        // between cannot be missed.
        let mut events = page.subscribe();

        let target = if let Some(found) = locate_now(&*page, descriptor) {
            Some(found)
        } else {
            let mut poll = interval(CONTAINER_POLL_INTERVAL);
            poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let deadline = sleep(CONTAINER_WAIT_TIMEOUT);
            tokio::pin!(deadline);

            loop {
                let recheck = tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!(site = descriptor.id, "container wait cancelled");
                        break None;
                    }
                    _ = &mut deadline => {
                        debug!(site = descriptor.id, "container wait timed out, using scrolling root");
                        break Some(page.scrolling_root());
                    }
                    _ = poll.tick() => true,
                    event = events.recv() => match event {
                        Ok(PageEvent::DomMutated) => true,
                        Ok(_) => false,
                        Err(broadcast::error::RecvError::Lagged(_)) => true,
                        // Poll and timeout keep the wait bounded even if
                        // the event stream dies.
                        Err(broadcast::error::RecvError::Closed) => false,
                    },
                };
                if recheck {
                    if let Some(found) = locate_now(&*page, descriptor) {
                        break Some(found);
                    }
                }
            }
        };

        let _ = tx
            .send(SessionEvent::ContainerResolved { epoch, target })
            .await;
    });

    handle
}
