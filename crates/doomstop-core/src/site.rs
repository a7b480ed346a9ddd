//! Static per-site descriptors and feed-URL classification.
//!
//! Adding a site means writing one `SiteDescriptor` and appending it to the
//! registry; everything else picks it up through `descriptor_for`.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::dom::{NodeId, PageDom};
use crate::settings::SiteSettings;

/// Site-specific fallback lookup for the real scrollable element, for sites
/// where a bare CSS selector is not trustworthy.
pub type ContainerFinder = fn(&dyn PageDom) -> Option<NodeId>;

/// Path classifier: the path must match `include` and, when present, must
/// not match `exclude`.
///
/// The split exists because reserved-route exclusions (profile URLs on x)
/// would otherwise need lookahead, which the `regex` engine does not
/// support.
#[derive(Debug)]
pub struct PathMatcher {
    include: Regex,
    exclude: Option<Regex>,
}

impl PathMatcher {
    /// Matcher with no exclusions. Panics on an invalid pattern; descriptor
    /// patterns are static and test-covered.
    pub fn new(include: &str) -> Self {
        Self {
            include: compile(include),
            exclude: None,
        }
    }

    /// Matcher that additionally rejects paths matching `exclude`.
    pub fn excluding(include: &str, exclude: &str) -> Self {
        Self {
            include: compile(include),
            exclude: Some(compile(exclude)),
        }
    }

    /// Whether a URL path belongs to this class.
    pub fn matches(&self, path: &str) -> bool {
        if !self.include.is_match(path) {
            return false;
        }
        match &self.exclude {
            Some(exclude) => !exclude.is_match(path),
            None => true,
        }
    }
}

/// A flag-gated feed pattern, disabled unless the user turns its key on.
#[derive(Debug)]
pub struct OptionalFeed {
    /// Settings key under `optionalFeeds`.
    pub key: &'static str,
    /// Human-readable label for settings UIs.
    pub label: &'static str,
    /// Path classes covered by this flag.
    pub patterns: Vec<PathMatcher>,
}

/// Static rules for one supported site.
#[derive(Debug)]
pub struct SiteDescriptor {
    /// Stable id, also the key in persisted settings.
    pub id: &'static str,
    /// Hostname match.
    pub host: Regex,
    /// Always-on feed path classes.
    pub feeds: Vec<PathMatcher>,
    /// Flag-gated feed path classes.
    pub optional_feeds: Vec<OptionalFeed>,
    /// CSS selector for the scroll container.
    pub container_selector: &'static str,
    /// Trusted site-specific container lookup, tried before the selector.
    pub container_finder: Option<ContainerFinder>,
}

impl SiteDescriptor {
    /// Whether `url` is a feed page under this descriptor and the given
    /// per-site settings. Classification looks at the path only; a string
    /// that fails URL parsing is treated as a bare path.
    pub fn is_feed_url(&self, url: &str, site_settings: &SiteSettings) -> bool {
        let path = match Url::parse(url) {
            Ok(parsed) => parsed.path().to_string(),
            Err(_) => url.to_string(),
        };

        if self.feeds.iter().any(|p| p.matches(&path)) {
            return true;
        }

        self.optional_feeds.iter().any(|opt| {
            site_settings.optional_feeds.get(opt.key).copied().unwrap_or(false)
                && opt.patterns.iter().any(|p| p.matches(&path))
        })
    }
}

/// All registered site descriptors.
pub fn registry() -> &'static [SiteDescriptor] {
    &REGISTRY
}

/// Descriptor whose host pattern matches `hostname`, if any.
pub fn descriptor_for(hostname: &str) -> Option<&'static SiteDescriptor> {
    REGISTRY.iter().find(|d| d.host.is_match(hostname))
}

static REGISTRY: LazyLock<Vec<SiteDescriptor>> = LazyLock::new(|| vec![x_descriptor()]);

fn compile(pattern: &str) -> Regex {
    // Patterns are static and covered by tests; a bad one is a programmer
    // error, not a runtime condition.
    Regex::new(pattern).expect("static site pattern must compile")
}

/// Bare descriptor for unit tests elsewhere in this crate.
#[cfg(test)]
pub(crate) fn test_descriptor(
    selector: &'static str,
    finder: Option<ContainerFinder>,
) -> SiteDescriptor {
    SiteDescriptor {
        id: "test",
        host: compile(r"^example\.com$"),
        feeds: vec![PathMatcher::new(r"^/feed/?$")],
        optional_feeds: Vec::new(),
        container_selector: selector,
        container_finder: finder,
    }
}

// ─── x.com ───────────────────────────────────────────────────────

const X_COLUMN_SELECTOR: &str = r#"[data-testid="primaryColumn"]"#;

/// Routes that can never be profile usernames. Anchoring differs per
/// group: `home` through `logout` are reserved only as the whole path,
/// `search` through `compose` are reserved as prefixes (no username may
/// start with them), and `i`/`hashtag` only when another segment follows,
/// so `/i` itself is a legal username path.
const X_RESERVED_ROUTES: &str = r"^/(?:(?:home|explore|tos|privacy|login|logout)$|search|settings|messages|notifications|compose|(?:i|hashtag)/)";

fn x_descriptor() -> SiteDescriptor {
    SiteDescriptor {
        id: "x",
        host: compile(r"^(www\.)?(x\.com|twitter\.com)$"),
        feeds: vec![
            PathMatcher::new(r"^/home/?$"),
            PathMatcher::new(r"^/$"),
            PathMatcher::new(r"^/explore/?$"),
        ],
        optional_feeds: vec![
            OptionalFeed {
                key: "search",
                label: "Search",
                patterns: vec![PathMatcher::new(r"^/search")],
            },
            OptionalFeed {
                key: "profile",
                label: "Profiles",
                patterns: vec![PathMatcher::excluding(
                    r"^/[A-Za-z0-9_]{1,15}(/(with_replies|media|likes|highlights))?/?$",
                    X_RESERVED_ROUTES,
                )],
            },
        ],
        container_selector: X_COLUMN_SELECTOR,
        container_finder: Some(x_scroll_container),
    }
}

/// The x timeline usually scrolls via the page itself, but the primary
/// column sometimes sits inside an overflow container. Walk up from the
/// column to the nearest element that actually scrolls; fall back to the
/// document scrolling root either way.
fn x_scroll_container(dom: &dyn PageDom) -> Option<NodeId> {
    let Some(column) = dom.query_selector(X_COLUMN_SELECTOR) else {
        return Some(dom.scrolling_root());
    };

    let mut current = Some(column);
    while let Some(node) = current {
        if dom.is_scrollable(node) {
            return Some(node);
        }
        current = dom.parent(node);
    }

    Some(dom.scrolling_root())
}
