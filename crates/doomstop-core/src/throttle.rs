//! Leading+trailing throttle gate.
//!
//! Classic throttle semantics as an explicit state machine rather than
//! timer juggling: the first signal in a burst runs immediately; further
//! signals inside the interval schedule exactly one trailing run at the
//! moment the interval expires. Time is passed in as relative milliseconds;
//! the caller owns the actual timer.

/// Default gate interval for scroll handling, in milliseconds.
pub const SCROLL_THROTTLE_MS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    /// No run inside the current interval.
    Idle,
    /// A run happened at `ran_at_ms`; `trailing` is set once a follow-up
    /// run has been scheduled for the end of the interval.
    Cooling { ran_at_ms: u64, trailing: bool },
}

/// What the caller should do with the signal it just delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Run immediately.
    RunNow,
    /// Schedule one trailing run after `delay_ms`; until it fires, further
    /// signals are absorbed.
    ScheduleTrailing {
        /// Milliseconds until the trailing run is due.
        delay_ms: u64,
    },
    /// A trailing run is already scheduled; drop this signal.
    Pending,
}

/// Rate-limits signal handling to once per interval with a guaranteed
/// trailing call.
#[derive(Debug, Clone)]
pub struct ThrottleGate {
    interval_ms: u64,
    state: GateState,
}

impl ThrottleGate {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            state: GateState::Idle,
        }
    }

    /// Register a signal at `now_ms` and decide how to handle it.
    pub fn on_signal(&mut self, now_ms: u64) -> GateDecision {
        match self.state {
            GateState::Idle => {
                self.state = GateState::Cooling {
                    ran_at_ms: now_ms,
                    trailing: false,
                };
                GateDecision::RunNow
            }
            GateState::Cooling { ran_at_ms, trailing } => {
                let elapsed = now_ms.saturating_sub(ran_at_ms);
                if elapsed >= self.interval_ms {
                    // Interval expired with no trailing run pending: this
                    // signal starts a fresh burst.
                    self.state = GateState::Cooling {
                        ran_at_ms: now_ms,
                        trailing: false,
                    };
                    GateDecision::RunNow
                } else if trailing {
                    GateDecision::Pending
                } else {
                    self.state = GateState::Cooling {
                        ran_at_ms,
                        trailing: true,
                    };
                    GateDecision::ScheduleTrailing {
                        delay_ms: self.interval_ms - elapsed,
                    }
                }
            }
        }
    }

    /// The scheduled trailing timer fired at `now_ms`.
    ///
    /// Returns `true` when the trailing run should actually execute. A
    /// `false` return means no trailing run was pending (stale timer).
    pub fn on_trailing(&mut self, now_ms: u64) -> bool {
        match self.state {
            GateState::Cooling { trailing: true, .. } => {
                self.state = GateState::Cooling {
                    ran_at_ms: now_ms,
                    trailing: false,
                };
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: u64 = 100;

    #[test]
    fn first_signal_runs_immediately() {
        let mut gate = ThrottleGate::new(INTERVAL);
        assert_eq!(gate.on_signal(0), GateDecision::RunNow);
    }

    #[test]
    fn burst_schedules_exactly_one_trailing_run() {
        let mut gate = ThrottleGate::new(INTERVAL);
        assert_eq!(gate.on_signal(0), GateDecision::RunNow);
        assert_eq!(
            gate.on_signal(30),
            GateDecision::ScheduleTrailing { delay_ms: 70 }
        );
        assert_eq!(gate.on_signal(50), GateDecision::Pending);
        assert_eq!(gate.on_signal(90), GateDecision::Pending);
        assert!(gate.on_trailing(100));
    }

    #[test]
    fn signal_after_interval_runs_immediately_again() {
        let mut gate = ThrottleGate::new(INTERVAL);
        assert_eq!(gate.on_signal(0), GateDecision::RunNow);
        assert_eq!(gate.on_signal(150), GateDecision::RunNow);
    }

    #[test]
    fn trailing_run_restarts_the_interval() {
        let mut gate = ThrottleGate::new(INTERVAL);
        gate.on_signal(0);
        gate.on_signal(40);
        assert!(gate.on_trailing(100));

        // Inside the new interval: throttled again.
        assert_eq!(
            gate.on_signal(130),
            GateDecision::ScheduleTrailing { delay_ms: 70 }
        );
    }

    #[test]
    fn stale_trailing_timer_is_a_noop() {
        let mut gate = ThrottleGate::new(INTERVAL);
        gate.on_signal(0);
        assert!(!gate.on_trailing(100), "nothing was scheduled");
    }

    #[test]
    fn trailing_delay_shrinks_with_elapsed_time() {
        let mut gate = ThrottleGate::new(INTERVAL);
        gate.on_signal(0);
        assert_eq!(
            gate.on_signal(99),
            GateDecision::ScheduleTrailing { delay_ms: 1 }
        );
    }
}
