//! The ordered strategy cascade.
//!
//! Strategies run strictly sequentially against one snapshot; the first to
//! produce a normalizable color wins and nothing after it executes. If every
//! strategy reports no signal, the cycle produces no result and the
//! orchestrator falls back to resetting.

use async_trait::async_trait;
use tracing::debug;

use crate::color::Color;
use crate::pipeline::sampler::ImageSampler;
use crate::pipeline::snapshot::{LogoCandidate, PageSnapshot};

/// Only the few largest images are worth fetching.
const MAX_IMAGE_CANDIDATES: usize = 6;

/// One heuristic in the cascade.
#[async_trait]
pub trait ExtractStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Inspect the snapshot and produce a primary color, or report that
    /// this heuristic found nothing. Must not fail.
    async fn attempt(&self, page: &PageSnapshot, sampler: &ImageSampler) -> Option<Color>;
}

/// The standard strategy order.
pub fn default_strategies() -> Vec<Box<dyn ExtractStrategy>> {
    vec![
        Box::new(MetaThemeColor),
        Box::new(LogoColor),
        Box::new(FaviconColor),
        Box::new(CallToActionColor),
        Box::new(LargestImageColor),
        Box::new(PageBackgroundColor),
    ]
}

/// Run strategies in order, short-circuiting on the first color.
pub async fn run_cascade(
    page: &PageSnapshot,
    sampler: &ImageSampler,
    strategies: &[Box<dyn ExtractStrategy>],
) -> Option<Color> {
    for strategy in strategies {
        match strategy.attempt(page, sampler).await {
            Some(color) => {
                debug!(strategy = strategy.name(), color = %color, "strategy matched");
                return Some(color);
            }
            None => debug!(strategy = strategy.name(), "no signal"),
        }
    }
    None
}

/// Page-declared `<meta name="theme-color">` hint.
pub struct MetaThemeColor;

#[async_trait]
impl ExtractStrategy for MetaThemeColor {
    fn name(&self) -> &'static str {
        "meta-theme-color"
    }

    async fn attempt(&self, page: &PageSnapshot, _sampler: &ImageSampler) -> Option<Color> {
        Color::parse(page.theme_color_meta.as_deref()?)
    }
}

/// First visible logo-like element: raster logos are sampled, vector logos
/// contribute their declared fill.
pub struct LogoColor;

#[async_trait]
impl ExtractStrategy for LogoColor {
    fn name(&self) -> &'static str {
        "logo"
    }

    async fn attempt(&self, page: &PageSnapshot, sampler: &ImageSampler) -> Option<Color> {
        for candidate in &page.logos {
            let color = match candidate {
                LogoCandidate::Raster { src } => sampler.dominant_color(src, &page.base).await,
                LogoCandidate::Vector { fill } => fill.as_deref().and_then(Color::parse),
            };
            if color.is_some() {
                return color;
            }
        }
        None
    }
}

/// Favicon links tried in document order until one yields a color.
pub struct FaviconColor;

#[async_trait]
impl ExtractStrategy for FaviconColor {
    fn name(&self) -> &'static str {
        "favicon"
    }

    async fn attempt(&self, page: &PageSnapshot, sampler: &ImageSampler) -> Option<Color> {
        for href in &page.favicons {
            if let Some(color) = sampler.dominant_color(href, &page.base).await {
                return Some(color);
            }
        }
        None
    }
}

/// The first visible button-like control: its background, falling back to
/// its text color when the background is transparent.
pub struct CallToActionColor;

#[async_trait]
impl ExtractStrategy for CallToActionColor {
    fn name(&self) -> &'static str {
        "call-to-action"
    }

    async fn attempt(&self, page: &PageSnapshot, _sampler: &ImageSampler) -> Option<Color> {
        let cta = page.call_to_action.as_ref()?;
        let background = cta
            .background
            .as_deref()
            .filter(|value| !is_transparent(value));
        match background {
            Some(value) => Color::parse(value),
            None => cta.foreground.as_deref().and_then(Color::parse),
        }
    }
}

fn is_transparent(value: &str) -> bool {
    let compact: String = value
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    compact == "transparent" || compact == "rgba(0,0,0,0)"
}

/// Largest visible images by declared area, best first, capped.
pub struct LargestImageColor;

#[async_trait]
impl ExtractStrategy for LargestImageColor {
    fn name(&self) -> &'static str {
        "largest-image"
    }

    async fn attempt(&self, page: &PageSnapshot, sampler: &ImageSampler) -> Option<Color> {
        for candidate in page.images.iter().take(MAX_IMAGE_CANDIDATES) {
            if let Some(color) = sampler.dominant_color(&candidate.src, &page.base).await {
                return Some(color);
            }
        }
        None
    }
}

/// Computed background of the root element, then the body.
pub struct PageBackgroundColor;

#[async_trait]
impl ExtractStrategy for PageBackgroundColor {
    fn name(&self) -> &'static str {
        "page-background"
    }

    async fn attempt(&self, page: &PageSnapshot, _sampler: &ImageSampler) -> Option<Color> {
        page.root_background
            .as_deref()
            .and_then(Color::parse)
            .or_else(|| page.body_background.as_deref().and_then(Color::parse))
    }
}
