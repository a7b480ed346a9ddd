//! Document query capability trait. Enables mock injection for testing:
//! the state machines in this crate never touch a real DOM, they see an
//! opaque node handle and a handful of read-only queries.

/// Opaque handle to a document element.
///
/// Handles are only meaningful to the [`PageDom`] implementation that issued
/// them; the core never fabricates one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// Read-only document queries.
///
/// Implemented by the real page binding and by the in-memory simulated page
/// used in tests and the demo binary.
pub trait PageDom: Send + Sync {
    /// Full URL of the document as currently displayed.
    fn current_url(&self) -> String;

    /// First element matching a CSS selector, if any.
    fn query_selector(&self, selector: &str) -> Option<NodeId>;

    /// Parent element, or `None` at the document root.
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Whether the element actually scrolls: overflow allows it and the
    /// content overflows the client box.
    fn is_scrollable(&self, node: NodeId) -> bool;

    /// The document's own scrolling root. Always exists; used as the
    /// fallback container when nothing better is found.
    fn scrolling_root(&self) -> NodeId;

    /// Current vertical scroll position of an element, in pixels.
    fn scroll_top(&self, node: NodeId) -> f64;

    /// Height of the visual viewport, in pixels. May be zero in degenerate
    /// embedding contexts.
    fn viewport_height(&self) -> f64;
}

impl<T: PageDom + ?Sized> PageDom for &T {
    fn current_url(&self) -> String {
        (**self).current_url()
    }
    fn query_selector(&self, selector: &str) -> Option<NodeId> {
        (**self).query_selector(selector)
    }
    fn parent(&self, node: NodeId) -> Option<NodeId> {
        (**self).parent(node)
    }
    fn is_scrollable(&self, node: NodeId) -> bool {
        (**self).is_scrollable(node)
    }
    fn scrolling_root(&self) -> NodeId {
        (**self).scrolling_root()
    }
    fn scroll_top(&self, node: NodeId) -> f64 {
        (**self).scroll_top(node)
    }
    fn viewport_height(&self) -> f64 {
        (**self).viewport_height()
    }
}
