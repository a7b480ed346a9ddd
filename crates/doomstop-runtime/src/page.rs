//! Full page capability trait: queries plus events and effects.
//!
//! `PageDom` (in `doomstop-core`) covers read-only queries; this trait adds
//! the event stream and the mutations the runtime needs — style writes,
//! overlay control, and the host message channel. The concrete browser
//! binding is an adapter behind this trait; tests and the demo binary use
//! [`crate::sim::SimPage`].

use tokio::sync::broadcast;

use doomstop_core::block::OverlayCopy;
use doomstop_core::dom::{NodeId, PageDom};

/// Where a scroll event originated.
///
/// Scrolling the document's own root is reported by the viewport, not the
/// element — mirroring browser event routing, where `scroll` for the
/// document fires on `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollSource {
    /// The global viewport (document-level scrolling).
    Viewport,
    /// A specific overflow element.
    Element(NodeId),
}

/// Asynchronous page signals, broadcast to every interested component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageEvent {
    /// A history-navigation event fired (back/forward or SPA route push).
    HistoryNavigated,
    /// The document title text mutated — a cheap proxy for SPA routing.
    TitleChanged,
    /// Subtree nodes were added somewhere under the document body.
    DomMutated,
    /// A scroll happened on the given source.
    Scrolled(ScrollSource),
    /// The overlay's continue button was pressed.
    OverlayContinue,
    /// The overlay's close button was pressed.
    OverlayClose,
}

/// Fire-and-forget messages to the host process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostMessage {
    /// Ask the host to close the originating tab. No response expected.
    CloseTab,
}

/// The complete page capability surface.
pub trait PageBackend: PageDom + Send + Sync + 'static {
    /// Subscribe to the page's event stream. Each subscriber gets an
    /// independent cursor; dropping the receiver unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<PageEvent>;

    /// Current `overflow` style value of an element (may be empty).
    fn overflow(&self, node: NodeId) -> String;

    /// Set the `overflow` style value of an element.
    fn set_overflow(&self, node: NodeId, value: &str);

    /// Show the overlay (creating it if needed) with the given copy.
    /// Showing while already visible just swaps the copy.
    fn show_overlay(&self, copy: &OverlayCopy);

    /// Hide the overlay, keeping its resources for reuse.
    fn hide_overlay(&self);

    /// Tear down overlay resources entirely.
    fn destroy_overlay(&self);

    /// Post a fire-and-forget message to the host process.
    fn post_host_message(&self, message: HostMessage);
}
