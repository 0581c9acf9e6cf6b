//! Theme backend that renders a WebExtension-style theme manifest.
//!
//! The manifest lands on stdout by default, or in a file when an output
//! path is configured. An optional terminal preview paints swatches with
//! crossterm so the result can be eyeballed without a browser.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use crossterm::style::{Color as TermColor, Stylize};
use serde_json::json;
use tracing::info;

use crate::color::Color;
use crate::theme::ThemeColors;

use super::ThemeBackend;

/// Render `colors` as a `theme.colors` manifest fragment.
pub fn manifest_json(colors: &ThemeColors) -> serde_json::Value {
    json!({
        "theme": {
            "colors": {
                "frame": colors.frame,
                "toolbar": colors.toolbar,
                "tab_text": colors.tab_text,
                "tab_background_text": colors.tab_background_text,
                "toolbar_text": colors.toolbar_text,
                "accentcolor": colors.accent,
                "textcolor": colors.text,
            }
        }
    })
}

pub struct ManifestBackend {
    output: Option<PathBuf>,
    preview: bool,
}

impl ManifestBackend {
    pub fn new(output: Option<PathBuf>, preview: bool) -> Self {
        Self { output, preview }
    }
}

#[async_trait]
impl ThemeBackend for ManifestBackend {
    fn name(&self) -> &'static str {
        "manifest"
    }

    async fn update(&self, window_id: u32, colors: &ThemeColors) -> Result<()> {
        let manifest = serde_json::to_string_pretty(&manifest_json(colors))
            .context("serializing theme manifest")?;

        match &self.output {
            Some(path) => {
                tokio::fs::write(path, manifest.as_bytes())
                    .await
                    .with_context(|| format!("writing theme manifest to {}", path.display()))?;
                info!(window_id, path = %path.display(), "theme manifest written");
            }
            None => println!("{manifest}"),
        }

        if self.preview {
            print_preview(colors);
        }
        Ok(())
    }

    async fn reset(&self, window_id: u32) -> Result<()> {
        if let Some(path) = &self.output {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("removing theme manifest {}", path.display()))
                }
            }
        }
        info!(window_id, "default chrome theme restored");
        Ok(())
    }
}

fn print_preview(colors: &ThemeColors) {
    let rows: [(&str, Color); 5] = [
        ("frame", colors.frame),
        ("toolbar", colors.toolbar),
        ("accent", colors.accent),
        ("tab text", colors.tab_text),
        ("text", colors.text),
    ];
    for (label, c) in rows {
        let swatch = "      ".on(TermColor::Rgb {
            r: c.r,
            g: c.g,
            b: c.b,
        });
        println!("{swatch} {label:<10} {c}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::ThemePreferences;
    use crate::theme::compose_theme;

    fn sample_theme() -> ThemeColors {
        compose_theme(
            Some(Color::new(0x11, 0x22, 0x33)),
            None,
            &ThemePreferences::default(),
        )
    }

    #[test]
    fn manifest_colors_are_hex_strings() {
        let value = manifest_json(&sample_theme());
        let colors = &value["theme"]["colors"];
        assert_eq!(colors["frame"], "#112233");
        assert_eq!(colors["accentcolor"], "#112233");
        assert_eq!(colors["textcolor"], "#FFFFFF");
        assert_eq!(colors["tab_text"], colors["toolbar_text"]);
    }

    #[test]
    fn manifest_has_all_seven_slots() {
        let value = manifest_json(&sample_theme());
        let colors = value["theme"]["colors"]
            .as_object()
            .expect("colors object");
        for key in [
            "frame",
            "toolbar",
            "tab_text",
            "tab_background_text",
            "toolbar_text",
            "accentcolor",
            "textcolor",
        ] {
            assert!(colors.contains_key(key), "missing {key}");
        }
        assert_eq!(colors.len(), 7);
    }

    #[tokio::test]
    async fn update_writes_manifest_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("theme.json");
        let backend = ManifestBackend::new(Some(path.clone()), false);

        backend.update(1, &sample_theme()).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed["theme"]["colors"]["frame"], "#112233");
    }

    #[tokio::test]
    async fn reset_removes_manifest_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("theme.json");
        let backend = ManifestBackend::new(Some(path.clone()), false);

        backend.update(1, &sample_theme()).await.unwrap();
        assert!(path.exists());

        backend.reset(1).await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn reset_without_manifest_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ManifestBackend::new(Some(dir.path().join("never-written.json")), false);
        backend.reset(1).await.unwrap();
    }
}
