//! In-memory simulated page.
//!
//! Implements the full [`PageBackend`] surface over a small node table so
//! the coordinator pipeline can be exercised end to end without a browser.
//! The demo binary scripts one of these; async tests drive it directly.

use std::sync::Mutex;

use tokio::sync::broadcast;

use doomstop_core::block::OverlayCopy;
use doomstop_core::dom::{NodeId, PageDom};

use crate::page::{HostMessage, PageBackend, PageEvent, ScrollSource};

#[derive(Debug, Clone)]
struct SimNode {
    parent: Option<NodeId>,
    selector: Option<String>,
    scrollable: bool,
    scroll_top: f64,
    overflow: String,
}

#[derive(Debug, Clone, PartialEq)]
enum OverlayState {
    /// Never created, or destroyed.
    Absent,
    /// Created but not currently shown.
    Hidden,
    Visible(OverlayCopy),
}

struct Inner {
    url: String,
    title: String,
    viewport_height: f64,
    nodes: Vec<SimNode>,
    overlay: OverlayState,
    host_messages: Vec<HostMessage>,
}

/// Scriptable in-memory page.
pub struct SimPage {
    inner: Mutex<Inner>,
    events: broadcast::Sender<PageEvent>,
}

impl SimPage {
    /// Create a page at `url`. Node 0 is the document scrolling root.
    pub fn new(url: &str, viewport_height: f64) -> Self {
        let root = SimNode {
            parent: None,
            selector: None,
            scrollable: true,
            scroll_top: 0.0,
            overflow: String::new(),
        };
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Mutex::new(Inner {
                url: url.to_string(),
                title: String::new(),
                viewport_height,
                nodes: vec![root],
                overlay: OverlayState::Absent,
                host_messages: Vec::new(),
            }),
            events,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Single-threaded runtime; poisoning would mean a panicked test.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: PageEvent) {
        let _ = self.events.send(event);
    }

    // ── Script surface ───────────────────────────────────────────

    /// SPA navigation: change the URL and fire a history event.
    pub fn navigate(&self, url: &str) {
        self.lock().url = url.to_string();
        self.emit(PageEvent::HistoryNavigated);
    }

    /// Change the URL without any accompanying signal. Only the URL poll
    /// can notice this.
    pub fn navigate_silently(&self, url: &str) {
        self.lock().url = url.to_string();
    }

    /// Mutate the document title, firing a title-mutation event.
    pub fn set_title(&self, title: &str) {
        self.lock().title = title.to_string();
        self.emit(PageEvent::TitleChanged);
    }

    /// Insert an element, firing a subtree mutation event.
    pub fn insert_element(
        &self,
        parent: Option<NodeId>,
        selector: Option<&str>,
        scrollable: bool,
    ) -> NodeId {
        let id = {
            let mut inner = self.lock();
            inner.nodes.push(SimNode {
                parent,
                selector: selector.map(str::to_string),
                scrollable,
                scroll_top: 0.0,
                overflow: String::new(),
            });
            NodeId(inner.nodes.len() as u64 - 1)
        };
        self.emit(PageEvent::DomMutated);
        id
    }

    /// Insert an element without firing a mutation event, as if it
    /// appeared in a way observers cannot see. Only a poll can find it.
    pub fn insert_element_silently(
        &self,
        parent: Option<NodeId>,
        selector: Option<&str>,
        scrollable: bool,
    ) -> NodeId {
        let mut inner = self.lock();
        inner.nodes.push(SimNode {
            parent,
            selector: selector.map(str::to_string),
            scrollable,
            scroll_top: 0.0,
            overflow: String::new(),
        });
        NodeId(inner.nodes.len() as u64 - 1)
    }

    /// Scroll an element to an absolute position, firing a scroll event
    /// from the matching source. Ignored while the element's overflow is
    /// suppressed (a blocked container cannot scroll).
    pub fn scroll_to(&self, node: NodeId, scroll_top: f64) {
        let source = {
            let mut inner = self.lock();
            if inner.nodes[node.0 as usize].overflow == "hidden" {
                return;
            }
            inner.nodes[node.0 as usize].scroll_top = scroll_top;
            if node == NodeId(0) {
                ScrollSource::Viewport
            } else {
                ScrollSource::Element(node)
            }
        };
        self.emit(PageEvent::Scrolled(source));
    }

    /// Press the overlay's continue button (no-op unless visible).
    pub fn press_continue(&self) {
        if matches!(self.lock().overlay, OverlayState::Visible(_)) {
            self.emit(PageEvent::OverlayContinue);
        }
    }

    /// Press the overlay's close button (no-op unless visible).
    pub fn press_close(&self) {
        if matches!(self.lock().overlay, OverlayState::Visible(_)) {
            self.emit(PageEvent::OverlayClose);
        }
    }

    // ── Inspection surface ───────────────────────────────────────

    /// Copy currently shown by the overlay, if visible.
    pub fn overlay_copy(&self) -> Option<OverlayCopy> {
        match &self.lock().overlay {
            OverlayState::Visible(copy) => Some(*copy),
            _ => None,
        }
    }

    /// Whether overlay resources exist at all (visible or hidden).
    pub fn overlay_exists(&self) -> bool {
        self.lock().overlay != OverlayState::Absent
    }

    /// Messages posted to the host so far.
    pub fn host_messages(&self) -> Vec<HostMessage> {
        self.lock().host_messages.clone()
    }
}

impl PageDom for SimPage {
    fn current_url(&self) -> String {
        self.lock().url.clone()
    }

    fn query_selector(&self, selector: &str) -> Option<NodeId> {
        self.lock()
            .nodes
            .iter()
            .position(|n| n.selector.as_deref() == Some(selector))
            .map(|i| NodeId(i as u64))
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.lock().nodes[node.0 as usize].parent
    }

    fn is_scrollable(&self, node: NodeId) -> bool {
        self.lock().nodes[node.0 as usize].scrollable
    }

    fn scrolling_root(&self) -> NodeId {
        NodeId(0)
    }

    fn scroll_top(&self, node: NodeId) -> f64 {
        self.lock().nodes[node.0 as usize].scroll_top
    }

    fn viewport_height(&self) -> f64 {
        self.lock().viewport_height
    }
}

impl PageBackend for SimPage {
    fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.events.subscribe()
    }

    fn overflow(&self, node: NodeId) -> String {
        self.lock().nodes[node.0 as usize].overflow.clone()
    }

    fn set_overflow(&self, node: NodeId, value: &str) {
        self.lock().nodes[node.0 as usize].overflow = value.to_string();
    }

    fn show_overlay(&self, copy: &OverlayCopy) {
        self.lock().overlay = OverlayState::Visible(*copy);
    }

    fn hide_overlay(&self) {
        let mut inner = self.lock();
        if inner.overlay != OverlayState::Absent {
            inner.overlay = OverlayState::Hidden;
        }
    }

    fn destroy_overlay(&self) {
        self.lock().overlay = OverlayState::Absent;
    }

    fn post_host_message(&self, message: HostMessage) {
        self.lock().host_messages.push(message);
    }
}
