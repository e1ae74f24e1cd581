//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`FanoutSettings::default()`]
//! 2. If `~/.fanout/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `FANOUT_*` environment variable overrides (highest priority)
//! 4. [`FanoutSettings::validate`] raises zero limits to 1
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::FanoutSettings;

/// Resolve the path to the settings file (`~/.fanout/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".fanout").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<FanoutSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<FanoutSettings> {
    let defaults = serde_json::to_value(FanoutSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: FanoutSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    settings.validate();
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid or out-of-range values are logged and ignored (file/default wins).
pub fn apply_env_overrides(settings: &mut FanoutSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary variable source.
///
/// Split out from [`apply_env_overrides`] so tests do not have to mutate the
/// process environment.
pub fn apply_overrides_from<F>(settings: &mut FanoutSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let read_usize = |name: &str, min: usize, max: usize| -> Option<usize> {
        let val = lookup(name)?;
        let result = parse_usize_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid integer env var, ignoring");
        }
        result
    };

    // ── Executor ────────────────────────────────────────────────────
    if let Some(v) = read_usize("FANOUT_MAX_CONCURRENT_TASKS", 1, 10_000) {
        settings.executor.max_concurrent_tasks = v;
    }
    if let Some(v) = lookup("FANOUT_EXECUTION_MODE").filter(|v| !v.is_empty()) {
        match serde_json::from_value(Value::String(v.to_lowercase())) {
            Ok(mode) => settings.executor.mode = mode,
            Err(_) => {
                tracing::warn!(key = "FANOUT_EXECUTION_MODE", value = %v, "invalid mode, ignoring");
            }
        }
    }

    // ── Sharding ────────────────────────────────────────────────────
    if let Some(v) = read_usize("FANOUT_MAX_THREADS", 1, 1024) {
        settings.sharding.max_threads = v;
    }
    if let Some(v) = read_usize("FANOUT_MAX_CONCURRENT_PER_THREAD", 1, 10_000) {
        settings.sharding.max_concurrent_per_thread = v;
    }

    // ── Batching ────────────────────────────────────────────────────
    if let Some(v) = read_usize("FANOUT_MAX_TOKENS_PER_BATCH", 1, 10_000_000) {
        settings.batching.max_tokens_per_batch = v;
    }
    if let Some(v) = read_usize("FANOUT_MAX_ITEMS_PER_BATCH", 1, 100_000) {
        settings.batching.max_items_per_batch = v;
    }

    // ── Ledger ──────────────────────────────────────────────────────
    if let Some(v) = read_usize("FANOUT_CITATION_START_OFFSET", 0, 1_000_000) {
        settings.ledger.citation_start_offset = v as u32;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = lookup("FANOUT_LOG_LEVEL").filter(|v| !v.is_empty()) {
        settings.logging.level = v;
    }
}

/// Parse a string as a `usize` within an inclusive range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}
