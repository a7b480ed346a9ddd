//! Pure, deterministic state machines for SPA feed scroll interruption.
//!
//! Nothing in this crate performs IO, spawns tasks, or reads a clock: every
//! time value is passed in as a parameter (relative epoch milliseconds), and
//! all document access goes through the [`dom::PageDom`] capability trait so
//! the machines run unchanged against a fake document in tests.
//!
//! The async orchestration that drives these machines lives in
//! `doomstop-runtime`.

pub mod block;
pub mod dom;
pub mod locate;
pub mod scroll;
pub mod settings;
pub mod site;
pub mod throttle;

#[cfg(test)]
pub(crate) mod testdom;
