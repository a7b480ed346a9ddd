//! Synchronous best-effort container lookup.
//!
//! The asynchronous wait (mutation events + poll + timeout) lives in the
//! runtime crate and re-runs this lookup on every tick.

use crate::dom::{NodeId, PageDom};
use crate::site::SiteDescriptor;

/// Resolve the scroll container right now, if possible.
///
/// The descriptor's custom finder is trusted first — it knows the site's
/// real scrollable element — then the CSS selector. `None` when neither
/// succeeds.
pub fn locate_now(dom: &dyn PageDom, descriptor: &SiteDescriptor) -> Option<NodeId> {
    if let Some(finder) = descriptor.container_finder {
        if let Some(node) = finder(dom) {
            return Some(node);
        }
    }
    dom.query_selector(descriptor.container_selector)
}
