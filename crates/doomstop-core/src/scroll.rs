//! Downward scroll accumulation and threshold detection.
//!
//! Position samples come in already throttled (see [`crate::throttle`]);
//! this machine turns them into a unit-less "screens scrolled" metric and
//! reports when the configured threshold is crossed. It deliberately does
//! not latch after a crossing: every qualifying sample past the threshold
//! reports `Reached` again until the owner calls [`ScrollTracker::reset`].

/// Outcome of feeding one position sample to the tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollSample {
    /// No net downward movement; nothing accumulated.
    Ignored,
    /// Distance accumulated, threshold not crossed.
    Below {
        /// Accumulated distance in screens.
        screens: f64,
    },
    /// Accumulated distance is at or past the threshold.
    Reached {
        /// Accumulated distance in screens.
        screens: f64,
    },
    /// Distance accumulated but the viewport height was zero, so no
    /// threshold evaluation was possible.
    Indeterminate,
}

/// Accumulates downward scroll distance against a threshold in screens.
#[derive(Debug, Clone)]
pub struct ScrollTracker {
    threshold_screens: u32,
    accumulated_px: f64,
    last_scroll_top: f64,
}

impl ScrollTracker {
    /// Create a tracker with its baseline at `scroll_top`.
    pub fn new(threshold_screens: u32, scroll_top: f64) -> Self {
        Self {
            threshold_screens,
            accumulated_px: 0.0,
            last_scroll_top: scroll_top,
        }
    }

    /// Feed one position sample.
    ///
    /// The baseline moves to `scroll_top` unconditionally, so an upward
    /// move is not credited back and the next downward move is measured
    /// from the new position.
    pub fn observe(&mut self, scroll_top: f64, viewport_height: f64) -> ScrollSample {
        let delta = scroll_top - self.last_scroll_top;
        self.last_scroll_top = scroll_top;

        if delta <= 0.0 {
            return ScrollSample::Ignored;
        }
        self.accumulated_px += delta;

        if viewport_height <= 0.0 {
            return ScrollSample::Indeterminate;
        }

        let screens = self.accumulated_px / viewport_height;
        if screens >= self.threshold_screens as f64 {
            ScrollSample::Reached { screens }
        } else {
            ScrollSample::Below { screens }
        }
    }

    /// Zero the accumulated distance and resynchronize the baseline to the
    /// container's live position.
    pub fn reset(&mut self, scroll_top: f64) {
        self.accumulated_px = 0.0;
        self.last_scroll_top = scroll_top;
    }

    /// Accumulated distance in pixels.
    pub fn accumulated_px(&self) -> f64 {
        self.accumulated_px
    }
}
