//! Turning a primary/accent pair plus preferences into a concrete chrome
//! theme color set.

use serde::Serialize;

use crate::color::Color;
use crate::prefs::ThemePreferences;

/// Applied when extraction produced nothing usable.
pub const FALLBACK_PRIMARY: Color = Color {
    r: 0x2b,
    g: 0x2b,
    b: 0x2b,
};

/// Near-black anchor the toolbar is blended toward.
const TOOLBAR_ANCHOR: Color = Color {
    r: 0x11,
    g: 0x11,
    b: 0x11,
};

/// Derived, ephemeral chrome colors. Recomputed on every applicable event,
/// never persisted beyond a best-effort per-tab cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThemeColors {
    pub frame: Color,
    pub toolbar: Color,
    pub tab_text: Color,
    pub tab_background_text: Color,
    pub toolbar_text: Color,
    pub accent: Color,
    pub text: Color,
}

/// Compute the full theme color set.
///
/// The accent defaults to the primary; all four text slots share the single
/// readable text color chosen against the frame.
pub fn compose_theme(
    primary: Option<Color>,
    accent: Option<Color>,
    prefs: &ThemePreferences,
) -> ThemeColors {
    let base = primary.unwrap_or(FALLBACK_PRIMARY);
    let accent = accent.unwrap_or(base);
    let text = Color::readable_text_on(base, prefs.min_contrast);
    let toolbar = Color::blend(base, TOOLBAR_ANCHOR, prefs.toolbar_blend);

    ThemeColors {
        frame: base,
        toolbar,
        tab_text: text,
        tab_background_text: text,
        toolbar_text: text,
        accent,
        text,
    }
}
