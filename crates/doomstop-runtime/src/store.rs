//! Persisted settings store with change notification.
//!
//! JSON file persistence (optional — in-memory works for tests and the
//! demo), defaults merged on load, threshold clamped on save, and a
//! `watch` channel carrying default-merged snapshots to subscribers.
//! Malformed persisted data is coerced, never rejected: a garbage file
//! degrades to defaults with a warning.

use std::fs;
use std::path::PathBuf;

use thiserror::Error;
use tokio::sync::watch;
use tracing::warn;

use doomstop_core::settings::{PersistedSettings, Settings};

/// Store IO failures. Parse failures are not errors — see module docs.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read settings file: {0}")]
    Read(#[source] std::io::Error),
    #[error("failed to write settings file: {0}")]
    Write(#[source] std::io::Error),
    #[error("failed to encode settings: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Owns the canonical settings copy and notifies subscribers of changes.
pub struct SettingsStore {
    path: Option<PathBuf>,
    tx: watch::Sender<Settings>,
}

impl SettingsStore {
    /// Open a store backed by a JSON file. A missing file means defaults;
    /// an unreadable or unparsable one degrades to defaults with a
    /// warning.
    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        let initial = load_merged(&path)?;
        let (tx, _) = watch::channel(initial);
        Ok(Self {
            path: Some(path),
            tx,
        })
    }

    /// Store with no persistence: defaults until the first save.
    pub fn in_memory() -> Self {
        let (tx, _) = watch::channel(Settings::default());
        Self { path: None, tx }
    }

    /// Current default-merged snapshot.
    pub fn current(&self) -> Settings {
        self.tx.borrow().clone()
    }

    /// Subscribe to settings changes. Each delivered value is already
    /// default-merged and clamped.
    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.tx.subscribe()
    }

    /// Normalize, persist, and publish new settings. Returns the
    /// normalized copy that was stored.
    pub fn save(&self, settings: &Settings) -> Result<Settings, StoreError> {
        let normalized = settings.normalized();
        if let Some(path) = &self.path {
            let persisted = PersistedSettings::from(&normalized);
            let body =
                serde_json::to_string_pretty(&persisted).map_err(StoreError::Encode)?;
            fs::write(path, body).map_err(StoreError::Write)?;
        }
        self.tx.send_replace(normalized.clone());
        Ok(normalized)
    }

    /// Delete the persisted value. Subscribers receive defaults.
    pub fn clear(&self) -> Result<(), StoreError> {
        if let Some(path) = &self.path {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::Write(e)),
            }
        }
        self.tx.send_replace(Settings::default());
        Ok(())
    }
}

fn load_merged(path: &PathBuf) -> Result<Settings, StoreError> {
    let body = match fs::read_to_string(path) {
        Ok(body) => body,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Settings::default());
        }
        Err(e) => return Err(StoreError::Read(e)),
    };

    match serde_json::from_str::<PersistedSettings>(&body) {
        Ok(persisted) => Ok(Settings::merged(Some(&persisted))),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unparsable settings file, using defaults");
            Ok(Settings::default())
        }
    }
}
