/// Core color type used throughout the pipeline.
///
/// Wraps sRGB u8 components. Every constructor that accepts untrusted input
/// is total: malformed text yields `None`, never a panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

pub const BLACK: Color = Color { r: 0, g: 0, b: 0 };
pub const WHITE: Color = Color {
    r: 255,
    g: 255,
    b: 255,
};

impl Color {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse a page-supplied color string.
    ///
    /// Accepts `#RGB`, `#RRGGBB`, `#RRGGBBAA` (alpha discarded), the same
    /// shapes without the leading `#`, and integer `rgb()`/`rgba()`
    /// functional notation. Anything else yields `None`.
    pub fn parse(input: &str) -> Option<Self> {
        let s = input.trim();
        if s.is_empty() {
            return None;
        }

        let lower = s.to_ascii_lowercase();
        if lower.starts_with("rgb") {
            return parse_rgb_functional(&lower);
        }

        let hex = s.strip_prefix('#').unwrap_or(s);
        let expanded: String = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            // #RRGGBBAA: drop the alpha pair.
            8 => hex.get(..6)?.to_string(),
            6 => hex.to_string(),
            _ => return None,
        };
        if !expanded.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }

        let r = u8::from_str_radix(&expanded[0..2], 16).ok()?;
        let g = u8::from_str_radix(&expanded[2..4], 16).ok()?;
        let b = u8::from_str_radix(&expanded[4..6], 16).ok()?;
        Some(Self { r, g, b })
    }

    /// Build a color from possibly out-of-range channel values.
    ///
    /// Channels are clamped to [0, 255] and rounded; non-finite input is
    /// treated as 0. Total, never fails.
    pub fn from_rgb_f64(r: f64, g: f64, b: f64) -> Self {
        fn channel(v: f64) -> u8 {
            if !v.is_finite() {
                return 0;
            }
            v.clamp(0.0, 255.0).round() as u8
        }
        Self {
            r: channel(r),
            g: channel(g),
            b: channel(b),
        }
    }

    /// Serialize to the canonical uppercase `#RRGGBB` form.
    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// WCAG 2.0 relative luminance.
    ///
    /// Linearizes each sRGB channel, then computes the weighted sum.
    pub fn relative_luminance(self) -> f64 {
        fn linearize(c: u8) -> f64 {
            let c = c as f64 / 255.0;
            if c <= 0.03928 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            }
        }
        let r = linearize(self.r);
        let g = linearize(self.g);
        let b = linearize(self.b);
        0.2126 * r + 0.7152 * g + 0.0722 * b
    }

    /// WCAG 2.0 contrast ratio between two colors, in [1, 21].
    pub fn contrast_ratio(a: Color, b: Color) -> f64 {
        let l1 = a.relative_luminance();
        let l2 = b.relative_luminance();
        let (lighter, darker) = if l1 > l2 { (l1, l2) } else { (l2, l1) };
        (lighter + 0.05) / (darker + 0.05)
    }

    /// Choose black or white text against `bg`, whichever contrasts more.
    ///
    /// `min_contrast` is accepted as a hint for future threshold
    /// enforcement; current policy returns the better candidate even when
    /// the threshold is not met. Known accepted gap, kept deliberately.
    pub fn readable_text_on(bg: Color, _min_contrast: f64) -> Color {
        let c_black = Self::contrast_ratio(BLACK, bg);
        let c_white = Self::contrast_ratio(WHITE, bg);
        if c_white >= c_black {
            WHITE
        } else {
            BLACK
        }
    }

    /// Linear per-channel interpolation from `a` toward `b`.
    ///
    /// `t` is not clamped: out-of-range values extrapolate. Non-finite `t`
    /// behaves as 0.
    pub fn blend(a: Color, b: Color, t: f64) -> Color {
        let t = if t.is_finite() { t } else { 0.0 };
        let mix = |x: u8, y: u8| x as f64 + (y as f64 - x as f64) * t;
        Color::from_rgb_f64(mix(a.r, b.r), mix(a.g, b.g), mix(a.b, b.b))
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl serde::Serialize for Color {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Parse integer `rgb(r, g, b)` / `rgba(r, g, b, a)` notation.
///
/// Only plain decimal integers are accepted for the first three components,
/// matching the shapes produced by computed styles; percentages or floats
/// yield `None`. The alpha component is ignored.
fn parse_rgb_functional(lower: &str) -> Option<Color> {
    let open = lower.find('(')?;
    let close = lower.find(')')?;
    if close <= open {
        return None;
    }
    let mut parts = lower[open + 1..close].split(',');

    let channel = |raw: Option<&str>| -> Option<f64> {
        let p = raw?.trim();
        if p.is_empty() || !p.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        p.parse::<f64>().ok()
    };

    let r = channel(parts.next())?;
    let g = channel(parts.next())?;
    let b = channel(parts.next())?;
    Some(Color::from_rgb_f64(r, g, b))
}
