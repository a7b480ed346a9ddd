//! Async runtime for feed scroll interruption.
//!
//! Wires the pure state machines from `doomstop-core` to a live page:
//! navigation detection, asynchronous container location, throttled
//! scroll monitoring, and the block overlay, all sequenced by a single
//! coordinator event loop per page context. Pages are abstracted behind
//! [`page::PageBackend`]; [`sim::SimPage`] is the in-memory backend used
//! by the tests and the demo binary.

pub mod blocker;
pub mod coordinator;
pub mod locator;
pub mod monitor;
pub mod navigation;
pub mod page;
pub mod sim;
pub mod store;

pub use coordinator::{Coordinator, CoordinatorHandle, SessionEvent};
pub use page::{HostMessage, PageBackend, PageEvent, ScrollSource};
pub use sim::SimPage;
pub use store::{SettingsStore, StoreError};
