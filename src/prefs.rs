//! Preference schema, sanitization, and the persisted store.
//!
//! Storage is an untrusted boundary: the file may be hand-edited, corrupted,
//! or written by a stale version. Every read passes through
//! [`sanitize_prefs`]; nothing downstream ever sees an out-of-range value or
//! an invalid hostname key.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

pub const DEFAULT_ENABLED: bool = true;
pub const DEFAULT_MIN_CONTRAST: f64 = 4.5;
pub const DEFAULT_TOOLBAR_BLEND: f64 = 0.08;
pub const DEFAULT_SAMPLE_SCALE: f64 = 0.12;

pub const MIN_CONTRAST_RANGE: (f64, f64) = (1.0, 21.0);
pub const TOOLBAR_BLEND_RANGE: (f64, f64) = (0.0, 1.0);
pub const SAMPLE_SCALE_RANGE: (f64, f64) = (0.02, 0.5);

/// User preferences, always in-range after sanitization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemePreferences {
    pub enabled: bool,
    pub min_contrast: f64,
    pub toolbar_blend: f64,
    pub sample_scale: f64,
    pub per_site_disabled: BTreeMap<String, bool>,
}

impl Default for ThemePreferences {
    fn default() -> Self {
        Self {
            enabled: DEFAULT_ENABLED,
            min_contrast: DEFAULT_MIN_CONTRAST,
            toolbar_blend: DEFAULT_TOOLBAR_BLEND,
            sample_scale: DEFAULT_SAMPLE_SCALE,
            per_site_disabled: BTreeMap::new(),
        }
    }
}

impl ThemePreferences {
    /// True when theming is suppressed for `host` by a per-site override.
    pub fn site_disabled(&self, host: &str) -> bool {
        match normalize_host(host) {
            Some(h) => self.per_site_disabled.get(&h).copied().unwrap_or(false),
            None => false,
        }
    }
}

/// Validate and normalize a hostname.
///
/// Lowercases and trims; rejects whitespace, `/`, `*`, and leading or
/// trailing dots. Each DNS label must be nonempty, at most 63 characters,
/// alphanumeric-and-hyphen, and must not start or end with a hyphen.
/// Idempotent: feeding the output back in returns the same value.
pub fn normalize_host(input: &str) -> Option<String> {
    let s = input.trim().to_lowercase();
    if s.is_empty() {
        return None;
    }
    if s.starts_with('.') || s.ends_with('.') {
        return None;
    }
    if s.chars().any(char::is_whitespace) || s.contains('/') || s.contains('*') {
        return None;
    }
    for label in s.split('.') {
        if label.is_empty() || label.len() > 63 {
            return None;
        }
        if label.starts_with('-') || label.ends_with('-') {
            return None;
        }
        if !label
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return None;
        }
    }
    Some(s)
}

/// Build in-range preferences from an untrusted JSON blob.
///
/// Per field: the stored value is used when it has the right type and range,
/// otherwise the documented default is substituted. Numeric fields are
/// clamped; per-site keys are filtered through [`normalize_host`], dropping
/// any that fail.
pub fn sanitize_prefs(raw: &Value) -> ThemePreferences {
    let obj = raw.as_object();
    let field = |name: &str| obj.and_then(|o| o.get(name));

    let enabled = field("enabled")
        .and_then(Value::as_bool)
        .unwrap_or(DEFAULT_ENABLED);
    let min_contrast = clamped_number(field("minContrast"), MIN_CONTRAST_RANGE, DEFAULT_MIN_CONTRAST);
    let toolbar_blend =
        clamped_number(field("toolbarBlend"), TOOLBAR_BLEND_RANGE, DEFAULT_TOOLBAR_BLEND);
    let sample_scale =
        clamped_number(field("sampleScale"), SAMPLE_SCALE_RANGE, DEFAULT_SAMPLE_SCALE);

    let mut per_site_disabled = BTreeMap::new();
    if let Some(map) = field("perSiteDisabled").and_then(Value::as_object) {
        for (key, value) in map {
            let Some(host) = normalize_host(key) else {
                continue;
            };
            per_site_disabled.insert(host, truthy(value));
        }
    }

    ThemePreferences {
        enabled,
        min_contrast,
        toolbar_blend,
        sample_scale,
        per_site_disabled,
    }
}

/// Numeric field extraction: accepts JSON numbers and numeric strings
/// (hand-edited files), clamps to `range`, falls back to `default`.
fn clamped_number(value: Option<&Value>, range: (f64, f64), default: f64) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => v.clamp(range.0, range.1),
        _ => default,
    }
}

/// JS-style truthiness for per-site flag values written by older versions.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Persisted preference store backed by a JSON file.
///
/// Reads never trust prior writes: the raw value is re-sanitized every time.
/// Writes serialize through `serde_json`, the same defensive round-trip the
/// storage boundary demands.
#[derive(Debug, Clone)]
pub struct PrefStore {
    path: PathBuf,
}

impl PrefStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// `~/.config/pagetint/prefs.json` on typical setups.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("pagetint").join("prefs.json"))
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Read and sanitize. Any failure (missing file, bad JSON, bad I/O)
    /// degrades to the documented defaults.
    pub async fn load(&self) -> ThemePreferences {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => serde_json::from_str::<Value>(&text).unwrap_or_else(|e| {
                debug!("preference file is not valid JSON: {e}");
                Value::Null
            }),
            Err(e) => {
                debug!("preference read failed: {e}");
                Value::Null
            }
        };
        sanitize_prefs(&raw)
    }

    /// Persist the full preference set.
    pub async fn save(&self, prefs: &ThemePreferences) -> Result<()> {
        // Serialization round-trip strips anything that is not part of the
        // schema before it reaches disk.
        let value = serde_json::to_value(prefs).context("failed to serialize preferences")?;
        let text = serde_json::to_string_pretty(&value)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&self.path, text)
            .await
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }

    /// Flip the per-site disable flag for `host`; returns the new state.
    ///
    /// Read-modify-write without a transactional guarantee — acceptable for
    /// single-user interactive usage.
    pub async fn toggle_site(&self, host: &str) -> Result<bool> {
        let Some(host) = normalize_host(host) else {
            bail!("invalid host name: {host:?}");
        };
        let mut prefs = self.load().await;
        let disabled = !prefs.per_site_disabled.get(&host).copied().unwrap_or(false);
        prefs.per_site_disabled.insert(host, disabled);
        self.save(&prefs).await?;
        Ok(disabled)
    }

    pub async fn set_enabled(&self, value: bool) -> Result<()> {
        let mut prefs = self.load().await;
        prefs.enabled = value;
        self.save(&prefs).await
    }
}
