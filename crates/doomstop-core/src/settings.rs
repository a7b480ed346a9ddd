//! Settings model, default merging, and change classification.
//!
//! The canonical settings copy lives in the runtime's store; this module
//! owns the schema, the merge of partial persisted data over defaults, the
//! threshold clamp, and the pure diff that tells the coordinator how to
//! react to a settings change.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::site;

/// Smallest accepted threshold, in screens.
pub const THRESHOLD_MIN: u32 = 3;

/// Largest accepted threshold, in screens.
pub const THRESHOLD_MAX: u32 = 50;

/// Threshold used when nothing valid is persisted.
pub const DEFAULT_THRESHOLD: u32 = 10;

/// Per-site toggle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteSettings {
    /// Whether interruption is active for this site at all.
    pub enabled: bool,
    /// Per-key toggles for the site's optional feed patterns. Keys not
    /// present are treated as disabled.
    #[serde(default)]
    pub optional_feeds: BTreeMap<String, bool>,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            optional_feeds: BTreeMap::new(),
        }
    }
}

/// Full, default-merged settings snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Per-site settings, keyed by site id.
    pub sites: BTreeMap<String, SiteSettings>,
    /// Scroll threshold in screens, always within `[THRESHOLD_MIN, THRESHOLD_MAX]`.
    pub threshold: u32,
}

impl Default for Settings {
    /// Defaults: every registered site enabled with no optional feeds, and
    /// the default threshold.
    fn default() -> Self {
        let sites = site::registry()
            .iter()
            .map(|d| (d.id.to_string(), SiteSettings::default()))
            .collect();
        Self {
            sites,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl Settings {
    /// Per-site settings for `site_id`. Missing entries behave like the
    /// default (enabled, no optional feeds).
    pub fn site(&self, site_id: &str) -> SiteSettings {
        self.sites.get(site_id).cloned().unwrap_or_default()
    }

    /// Whether interruption is enabled for `site_id`.
    pub fn site_enabled(&self, site_id: &str) -> bool {
        self.sites.get(site_id).map(|s| s.enabled).unwrap_or(true)
    }

    /// Merge a partial persisted value over the defaults.
    ///
    /// Unknown sites and fields are ignored; missing fields keep their
    /// defaults; the threshold is coerced into range rather than rejected.
    pub fn merged(persisted: Option<&PersistedSettings>) -> Self {
        let mut out = Self::default();
        let Some(stored) = persisted else {
            return out;
        };
        for (id, site) in &stored.sites {
            let Some(slot) = out.sites.get_mut(id) else {
                continue;
            };
            if let Some(enabled) = site.enabled {
                slot.enabled = enabled;
            }
            for (key, on) in &site.optional_feeds {
                slot.optional_feeds.insert(key.clone(), *on);
            }
        }
        if let Some(raw) = &stored.threshold {
            out.threshold = normalize_threshold(raw);
        }
        out
    }

    /// Copy of `self` with the threshold re-clamped. Applied before every
    /// persist so out-of-range values never reach storage.
    pub fn normalized(&self) -> Self {
        let mut out = self.clone();
        out.threshold = out.threshold.clamp(THRESHOLD_MIN, THRESHOLD_MAX);
        out
    }
}

/// Partial on-disk settings shape. Every field is optional so that old or
/// hand-edited data still loads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedSettings {
    #[serde(default)]
    pub sites: BTreeMap<String, PersistedSiteSettings>,
    /// Raw JSON so non-numeric garbage can be coerced instead of failing
    /// the whole deserialization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<serde_json::Value>,
}

/// Partial per-site persisted shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSiteSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub optional_feeds: BTreeMap<String, bool>,
}

impl From<&Settings> for PersistedSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            sites: settings
                .sites
                .iter()
                .map(|(id, s)| {
                    (
                        id.clone(),
                        PersistedSiteSettings {
                            enabled: Some(s.enabled),
                            optional_feeds: s.optional_feeds.clone(),
                        },
                    )
                })
                .collect(),
            threshold: Some(serde_json::Value::from(settings.threshold)),
        }
    }
}

/// Coerce an arbitrary persisted threshold value into the valid range.
///
/// Non-numeric and non-finite values fall back to the default; numeric
/// values are rounded and clamped.
pub fn normalize_threshold(raw: &serde_json::Value) -> u32 {
    let Some(num) = raw.as_f64() else {
        return DEFAULT_THRESHOLD;
    };
    if !num.is_finite() {
        return DEFAULT_THRESHOLD;
    }
    let rounded = num.round();
    if rounded <= THRESHOLD_MIN as f64 {
        THRESHOLD_MIN
    } else if rounded >= THRESHOLD_MAX as f64 {
        THRESHOLD_MAX
    } else {
        rounded as u32
    }
}

/// How the coordinator should react to a settings change for one site.
///
/// Exactly one variant applies per change, in this priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsDelta {
    /// Site went enabled → disabled: stop monitoring.
    SiteDisabled,
    /// Site went disabled → enabled: start monitoring.
    SiteEnabled,
    /// The set of enabled optional feed patterns changed: restart
    /// monitoring (URL classification may differ).
    OptionalFeedsChanged,
    /// Threshold changed: restart monitoring with the new value.
    ThresholdChanged,
    /// Nothing this site cares about changed.
    Inert,
}

/// Classify a settings change as seen by one site.
pub fn classify_change(site_id: &str, prev: &Settings, next: &Settings) -> SettingsDelta {
    let was_enabled = prev.site_enabled(site_id);
    let now_enabled = next.site_enabled(site_id);

    if was_enabled && !now_enabled {
        return SettingsDelta::SiteDisabled;
    }
    if !was_enabled && now_enabled {
        return SettingsDelta::SiteEnabled;
    }
    if now_enabled && prev.site(site_id).optional_feeds != next.site(site_id).optional_feeds {
        return SettingsDelta::OptionalFeedsChanged;
    }
    if now_enabled && prev.threshold != next.threshold {
        return SettingsDelta::ThresholdChanged;
    }
    SettingsDelta::Inert
}
