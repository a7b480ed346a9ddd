//! Block session: scroll suppression plus the two-step overlay flow.
//!
//! The container's style and the overlay are mutated here and nowhere
//! else. Step logic lives in `doomstop_core::block`; this module applies
//! its effects to the page.

use tracing::debug;

use doomstop_core::block::{BlockStep, ContinuePress, copy_for};
use doomstop_core::dom::NodeId;

use crate::page::{HostMessage, PageBackend};

/// State held while a block is active.
#[derive(Debug)]
struct BlockSession {
    target: NodeId,
    /// Original `overflow` value, restored on unblock.
    saved_overflow: String,
    step: BlockStep,
}

/// Makes the page unscrollable and gates resumption behind the two-step
/// confirmation.
#[derive(Debug, Default)]
pub struct Blocker {
    session: Option<BlockSession>,
}

impl Blocker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a block session is active.
    pub fn is_blocked(&self) -> bool {
        self.session.is_some()
    }

    /// Freeze `target` and show the overlay. A no-op while already
    /// blocked: there is only ever one concurrent block session.
    pub fn block<P: PageBackend>(&mut self, page: &P, target: NodeId) {
        if self.session.is_some() {
            return;
        }
        debug!(?target, "blocking scroll container");

        let saved_overflow = page.overflow(target);
        page.set_overflow(target, "hidden");
        page.show_overlay(&copy_for(BlockStep::Initial));

        self.session = Some(BlockSession {
            target,
            saved_overflow,
            step: BlockStep::Initial,
        });
    }

    /// Handle a continue press. Returns `true` when the press completed
    /// the confirmation and the block ended — the caller should reset its
    /// scroll accumulation in that case.
    pub fn press_continue<P: PageBackend>(&mut self, page: &P) -> bool {
        let Some(session) = &mut self.session else {
            return false;
        };

        let (next, effect) = session.step.press_continue();
        session.step = next;
        match effect {
            ContinuePress::ShowConfirm => {
                page.show_overlay(&copy_for(next));
                false
            }
            ContinuePress::Unblock => {
                self.unblock(page);
                true
            }
        }
    }

    /// Handle a close press: ask the host to close the tab. Does not
    /// unblock — the page is about to go away, and if the host refuses
    /// the block should persist.
    pub fn press_close<P: PageBackend>(&self, page: &P) {
        if self.session.is_some() {
            page.post_host_message(HostMessage::CloseTab);
        }
    }

    /// Restore the container and hide the overlay. A no-op when not
    /// blocked.
    pub fn unblock<P: PageBackend>(&mut self, page: &P) {
        let Some(session) = self.session.take() else {
            return;
        };
        debug!(target = ?session.target, "unblocking scroll container");

        page.set_overflow(session.target, &session.saved_overflow);
        page.hide_overlay();
    }
}
