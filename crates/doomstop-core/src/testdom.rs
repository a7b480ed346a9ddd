//! Minimal in-memory `PageDom` used by unit tests in this crate.
//!
//! The runtime crate has its own richer simulated page; this one only
//! covers what the pure machines query.

use crate::dom::{NodeId, PageDom};

struct FakeNode {
    parent: Option<NodeId>,
    selector: Option<String>,
    scrollable: bool,
    scroll_top: f64,
}

pub struct FakeDom {
    url: String,
    nodes: Vec<FakeNode>,
    viewport_height: f64,
}

impl FakeDom {
    pub fn new(url: &str) -> Self {
        // Node 0 is the document scrolling root.
        Self {
            url: url.to_string(),
            nodes: vec![FakeNode {
                parent: None,
                selector: None,
                scrollable: true,
                scroll_top: 0.0,
            }],
            viewport_height: 800.0,
        }
    }

    fn push(&mut self, node: FakeNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() as u64 - 1)
    }

    pub fn add_node(&mut self, parent: Option<NodeId>) -> NodeId {
        self.push(FakeNode {
            parent,
            selector: None,
            scrollable: false,
            scroll_top: 0.0,
        })
    }

    pub fn add_scrollable(&mut self, parent: Option<NodeId>) -> NodeId {
        self.push(FakeNode {
            parent,
            selector: None,
            scrollable: true,
            scroll_top: 0.0,
        })
    }

    pub fn add_selector_match(&mut self, parent: Option<NodeId>, selector: &str) -> NodeId {
        self.push(FakeNode {
            parent,
            selector: Some(selector.to_string()),
            scrollable: false,
            scroll_top: 0.0,
        })
    }

    pub fn set_scroll_top(&mut self, node: NodeId, value: f64) {
        self.nodes[node.0 as usize].scroll_top = value;
    }

    fn node(&self, id: NodeId) -> &FakeNode {
        &self.nodes[id.0 as usize]
    }
}

impl PageDom for FakeDom {
    fn current_url(&self) -> String {
        self.url.clone()
    }

    fn query_selector(&self, selector: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.selector.as_deref() == Some(selector))
            .map(|i| NodeId(i as u64))
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).parent
    }

    fn is_scrollable(&self, node: NodeId) -> bool {
        self.node(node).scrollable
    }

    fn scrolling_root(&self) -> NodeId {
        NodeId(0)
    }

    fn scroll_top(&self, node: NodeId) -> f64 {
        self.node(node).scroll_top
    }

    fn viewport_height(&self) -> f64 {
        self.viewport_height
    }
}
