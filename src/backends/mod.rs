//! Privileged theme application, behind a narrow trait.
//!
//! From the orchestrator's perspective these calls are fire-and-forget:
//! failures are logged and swallowed, never surfaced to the user.

pub mod manifest;

use anyhow::Result;
use async_trait::async_trait;

use crate::theme::ThemeColors;

pub use manifest::ManifestBackend;

/// A destination for computed chrome themes.
#[async_trait]
pub trait ThemeBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Replace the window's chrome theme with `colors`.
    async fn update(&self, window_id: u32, colors: &ThemeColors) -> Result<()>;

    /// Restore the window's default chrome theme.
    async fn reset(&self, window_id: u32) -> Result<()>;
}
