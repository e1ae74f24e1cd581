//! # fanout-settings
//!
//! Layered configuration for the fanout task orchestrator.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`FanoutSettings::default()`]
//! 2. **User file**: `~/.fanout/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `FANOUT_*` overrides (highest priority)
//!
//! Library components never read the global singleton on their own; they are
//! built from explicit values or a settings section. The singleton exists for
//! binaries that want one process-wide snapshot.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides_from, deep_merge, load_settings,
    load_settings_from_path, settings_path,
};
pub use types::*;

use std::sync::{Arc, RwLock};

/// Global settings singleton.
///
/// `RwLock<Option<Arc<_>>>` rather than `OnceLock` so the cached value can be
/// replaced by [`init_settings`].
static SETTINGS: RwLock<Option<Arc<FanoutSettings>>> = RwLock::new(None);

/// Get the global settings instance.
///
/// On first call, loads settings from `~/.fanout/settings.json` with env var
/// overrides, falling back to compiled defaults if loading fails.
pub fn get_settings() -> Arc<FanoutSettings> {
    {
        let guard = SETTINGS.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(ref s) = *guard {
            return Arc::clone(s);
        }
    }

    let mut guard = SETTINGS
        .write()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    // Another thread may have initialized while we waited for the write lock
    if let Some(ref s) = *guard {
        return Arc::clone(s);
    }

    let settings = Arc::new(match load_settings() {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "failed to load settings, using defaults");
            FanoutSettings::default()
        }
    });
    *guard = Some(Arc::clone(&settings));
    settings
}

/// Initialize the global settings with a specific value.
pub fn init_settings(settings: FanoutSettings) {
    let mut guard = SETTINGS
        .write()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    *guard = Some(Arc::new(settings));
}

/// Clear the cached value so the next [`get_settings`] reloads.
#[cfg(test)]
pub(crate) fn reset_settings() {
    let mut guard = SETTINGS
        .write()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    *guard = None;
}
