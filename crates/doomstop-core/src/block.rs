//! Two-step confirmation machine for the blocking overlay.
//!
//! A single click must not be enough to resume scrolling: the first
//! continue press flips the overlay to a confirmation prompt, only the
//! second actually unblocks. The style/overlay side effects live in the
//! runtime; this is just the step logic and the displayed copy.

/// Which prompt the overlay is currently showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStep {
    /// First prompt after blocking.
    Initial,
    /// Continue was pressed once; waiting for confirmation.
    ConfirmPending,
}

/// Effect of a continue press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinuePress {
    /// Move to the confirmation prompt; stay blocked.
    ShowConfirm,
    /// Confirmed: the block should end now.
    Unblock,
}

impl BlockStep {
    /// Advance the step machine by one continue press.
    pub fn press_continue(self) -> (BlockStep, ContinuePress) {
        match self {
            BlockStep::Initial => (BlockStep::ConfirmPending, ContinuePress::ShowConfirm),
            BlockStep::ConfirmPending => (BlockStep::Initial, ContinuePress::Unblock),
        }
    }
}

/// Text shown by the overlay for a given step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayCopy {
    pub headline: &'static str,
    pub detail: &'static str,
    pub continue_label: &'static str,
    pub close_label: &'static str,
}

/// Overlay copy for `step`.
pub fn copy_for(step: BlockStep) -> OverlayCopy {
    match step {
        BlockStep::Initial => OverlayCopy {
            headline: "Take a breath",
            detail: "You've been scrolling for a while.",
            continue_label: "Keep scrolling",
            close_label: "Close tab",
        },
        BlockStep::ConfirmPending => OverlayCopy {
            headline: "Keep scrolling?",
            detail: "One more tap and the feed comes back.",
            continue_label: "Yes, continue",
            close_label: "Close tab",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_press_shows_confirmation() {
        let (step, effect) = BlockStep::Initial.press_continue();
        assert_eq!(step, BlockStep::ConfirmPending);
        assert_eq!(effect, ContinuePress::ShowConfirm);
    }

    #[test]
    fn second_press_unblocks() {
        let (step, effect) = BlockStep::ConfirmPending.press_continue();
        assert_eq!(step, BlockStep::Initial);
        assert_eq!(effect, ContinuePress::Unblock);
    }

    #[test]
    fn copy_differs_between_steps() {
        assert_ne!(
            copy_for(BlockStep::Initial).headline,
            copy_for(BlockStep::ConfirmPending).headline
        );
    }
}
