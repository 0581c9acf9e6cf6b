//! Immutable snapshot of the strategy-relevant parts of a document.
//!
//! The cascade never touches the parsed DOM directly: everything a strategy
//! may need is pulled out synchronously into owned data here, so the async
//! strategies stay `Send` and each extraction run sees one consistent view.

use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Logo candidates are capped; a page with fifty "logo"-classed nodes is
/// telling us nothing new after the first few.
const MAX_LOGO_CANDIDATES: usize = 8;

/// A logo-like element found in header/logo containers.
#[derive(Debug, Clone, PartialEq)]
pub enum LogoCandidate {
    /// Raster image, to be sampled from its source.
    Raster { src: String },
    /// Inline vector graphic; its declared fill stands in for sampling.
    Vector { fill: Option<String> },
}

/// Style of the first visible button-like control.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CtaStyle {
    pub background: Option<String>,
    pub foreground: Option<String>,
}

/// A visible content image with its declared pixel area.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageCandidate {
    pub src: String,
    pub area: u64,
}

/// Everything the extraction cascade inspects, in document order.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    pub base: Url,
    pub host: Option<String>,
    pub theme_color_meta: Option<String>,
    pub logos: Vec<LogoCandidate>,
    pub favicons: Vec<String>,
    pub call_to_action: Option<CtaStyle>,
    /// Sorted by declared area, descending; unknown sizes sort last.
    pub images: Vec<ImageCandidate>,
    pub root_background: Option<String>,
    pub body_background: Option<String>,
}

impl PageSnapshot {
    /// Parse `html` and collect the cascade inputs.
    pub fn parse(html: &str, base: Url) -> Self {
        let doc = Html::parse_document(html);

        let theme_color_meta = select_first(&doc, r#"meta[name="theme-color"]"#)
            .and_then(|el| el.value().attr("content"))
            .map(str::to_string);

        let logo_selector = Selector::parse(concat!(
            r#"header img, header svg, [class*="logo"] img, [class*="logo"] svg, "#,
            r#"a[aria-label*="logo"] img, a[aria-label*="logo"] svg"#
        ))
        .expect("valid logo selector");
        let mut logos = Vec::new();
        for el in doc.select(&logo_selector) {
            if logos.len() >= MAX_LOGO_CANDIDATES {
                break;
            }
            if !is_visible(&el) {
                continue;
            }
            match el.value().name() {
                "img" => {
                    if let Some(src) = el.value().attr("src") {
                        logos.push(LogoCandidate::Raster {
                            src: src.to_string(),
                        });
                    }
                }
                "svg" => {
                    let fill = el
                        .value()
                        .attr("fill")
                        .map(str::to_string)
                        .or_else(|| inline_style(&el, "fill"))
                        .or_else(|| inline_style(&el, "color"));
                    logos.push(LogoCandidate::Vector { fill });
                }
                _ => {}
            }
        }

        let favicon_selector = Selector::parse(
            r#"link[rel~="icon"], link[rel="shortcut icon"], link[rel="mask-icon"]"#,
        )
        .expect("valid favicon selector");
        let favicons = doc
            .select(&favicon_selector)
            .filter_map(|el| el.value().attr("href"))
            .map(str::to_string)
            .collect();

        let button_selector = Selector::parse(
            r#"button, .btn, [role="button"], input[type="submit"], input[type="button"]"#,
        )
        .expect("valid button selector");
        let call_to_action = doc
            .select(&button_selector)
            .find(is_visible)
            .map(|el| CtaStyle {
                background: inline_style(&el, "background-color")
                    .or_else(|| el.value().attr("bgcolor").map(str::to_string)),
                foreground: inline_style(&el, "color"),
            });

        let img_selector = Selector::parse("img").expect("valid img selector");
        let mut images: Vec<ImageCandidate> = doc
            .select(&img_selector)
            .filter(is_visible)
            .filter_map(|el| {
                let src = el.value().attr("src")?.to_string();
                Some(ImageCandidate {
                    src,
                    area: declared_area(&el),
                })
            })
            .collect();
        images.sort_by(|a, b| b.area.cmp(&a.area));

        let root_background =
            select_first(&doc, "html").and_then(|el| background_color_of(&el));
        let body_background =
            select_first(&doc, "body").and_then(|el| background_color_of(&el));

        let host = base.host_str().map(str::to_string);

        Self {
            base,
            host,
            theme_color_meta,
            logos,
            favicons,
            call_to_action,
            images,
            root_background,
            body_background,
        }
    }
}

fn select_first<'a>(doc: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    let sel = Selector::parse(selector).expect("valid selector");
    doc.select(&sel).next()
}

/// Static visibility approximation.
///
/// Without a layout engine there are no bounding boxes: an element counts as
/// visible unless it carries `hidden`, an inline `display: none` or
/// `visibility: hidden`, or declares a width or height of one pixel or less.
/// Viewport intersection is treated as satisfied.
fn is_visible(el: &ElementRef<'_>) -> bool {
    if el.value().attr("hidden").is_some() {
        return false;
    }
    if let Some(display) = inline_style(el, "display") {
        if display.eq_ignore_ascii_case("none") {
            return false;
        }
    }
    if let Some(visibility) = inline_style(el, "visibility") {
        if visibility.eq_ignore_ascii_case("hidden") {
            return false;
        }
    }
    let (w, h) = declared_size(el);
    if matches!(w, Some(v) if v <= 1.0) || matches!(h, Some(v) if v <= 1.0) {
        return false;
    }
    true
}

/// Declared width/height from attributes or inline style, in pixels.
fn declared_size(el: &ElementRef<'_>) -> (Option<f64>, Option<f64>) {
    let dim = |name: &str| {
        el.value()
            .attr(name)
            .map(str::to_string)
            .or_else(|| inline_style(el, name))
            .and_then(|v| parse_pixels(&v))
    };
    (dim("width"), dim("height"))
}

fn declared_area(el: &ElementRef<'_>) -> u64 {
    match declared_size(el) {
        (Some(w), Some(h)) if w > 0.0 && h > 0.0 => (w * h) as u64,
        _ => 0,
    }
}

/// Accepts `"120"` and `"120px"`; percentages and keywords yield `None`.
fn parse_pixels(value: &str) -> Option<f64> {
    let v = value.trim();
    let v = v.strip_suffix("px").unwrap_or(v).trim();
    let parsed = v.parse::<f64>().ok()?;
    parsed.is_finite().then_some(parsed)
}

/// Read one property out of an inline `style` attribute. Last declaration
/// wins, mirroring CSS.
fn inline_style(el: &ElementRef<'_>, property: &str) -> Option<String> {
    let style = el.value().attr("style")?;
    style
        .split(';')
        .filter_map(|decl| decl.split_once(':'))
        .filter(|(key, _)| key.trim().eq_ignore_ascii_case(property))
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .last()
}

fn background_color_of(el: &ElementRef<'_>) -> Option<String> {
    inline_style(el, "background-color")
        .or_else(|| el.value().attr("bgcolor").map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(html: &str) -> PageSnapshot {
        PageSnapshot::parse(html, Url::parse("https://example.com/page/").unwrap())
    }

    #[test]
    fn meta_theme_color_is_captured() {
        let s = snap(r##"<head><meta name="theme-color" content="#112233"></head>"##);
        assert_eq!(s.theme_color_meta.as_deref(), Some("#112233"));
    }

    #[test]
    fn missing_meta_is_absent() {
        let s = snap("<body><p>hello</p></body>");
        assert_eq!(s.theme_color_meta, None);
    }

    #[test]
    fn host_comes_from_base_url() {
        let s = snap("<body></body>");
        assert_eq!(s.host.as_deref(), Some("example.com"));
    }

    #[test]
    fn header_logo_img_is_collected() {
        let s = snap(r#"<header><img src="/logo.png" width="64" height="64"></header>"#);
        assert_eq!(
            s.logos,
            vec![LogoCandidate::Raster {
                src: "/logo.png".into()
            }]
        );
    }

    #[test]
    fn logo_class_svg_uses_fill() {
        let s = snap(r##"<div class="site-logo"><svg fill="#ff8800"></svg></div>"##);
        assert_eq!(
            s.logos,
            vec![LogoCandidate::Vector {
                fill: Some("#ff8800".into())
            }]
        );
    }

    #[test]
    fn svg_fill_falls_back_to_inline_style() {
        let s = snap(r#"<header><svg style="fill: #123456"></svg></header>"#);
        assert_eq!(
            s.logos,
            vec![LogoCandidate::Vector {
                fill: Some("#123456".into())
            }]
        );
    }

    #[test]
    fn hidden_logo_is_skipped() {
        let s = snap(r#"<header><img src="/a.png" hidden><img src="/b.png"></header>"#);
        assert_eq!(
            s.logos,
            vec![LogoCandidate::Raster {
                src: "/b.png".into()
            }]
        );
    }

    #[test]
    fn logo_candidates_are_capped() {
        let imgs: String = (0..20)
            .map(|i| format!(r#"<img src="/l{i}.png">"#))
            .collect();
        let s = snap(&format!("<header>{imgs}</header>"));
        assert_eq!(s.logos.len(), 8);
    }

    #[test]
    fn favicons_keep_document_order() {
        let s = snap(concat!(
            r#"<link rel="icon" href="/a.ico">"#,
            r#"<link rel="shortcut icon" href="/b.ico">"#,
            r#"<link rel="mask-icon" href="/c.svg">"#,
            r#"<link rel="stylesheet" href="/style.css">"#,
        ));
        assert_eq!(s.favicons, ["/a.ico", "/b.ico", "/c.svg"]);
    }

    #[test]
    fn first_visible_button_wins() {
        let s = snap(concat!(
            r#"<button style="display: none; background-color: #ff0000">no</button>"#,
            r#"<button style="background-color: #00ff00; color: #ffffff">yes</button>"#,
        ));
        let cta = s.call_to_action.unwrap();
        assert_eq!(cta.background.as_deref(), Some("#00ff00"));
        assert_eq!(cta.foreground.as_deref(), Some("#ffffff"));
    }

    #[test]
    fn role_button_and_btn_class_match() {
        let s = snap(r#"<a role="button" style="background-color: #010203">go</a>"#);
        assert!(s.call_to_action.is_some());
        let s = snap(r#"<span class="btn" style="color: #040506">go</span>"#);
        assert_eq!(
            s.call_to_action.unwrap().foreground.as_deref(),
            Some("#040506")
        );
    }

    #[test]
    fn images_sort_by_declared_area_descending() {
        let s = snap(concat!(
            r#"<img src="/small.png" width="10" height="10">"#,
            r#"<img src="/big.png" width="100" height="50">"#,
            r#"<img src="/unsized.png">"#,
        ));
        let srcs: Vec<&str> = s.images.iter().map(|i| i.src.as_str()).collect();
        assert_eq!(srcs, ["/big.png", "/small.png", "/unsized.png"]);
        assert_eq!(s.images[0].area, 5000);
        assert_eq!(s.images[2].area, 0);
    }

    #[test]
    fn tiny_and_hidden_images_are_invisible() {
        let s = snap(concat!(
            r#"<img src="/tracker.gif" width="1" height="1">"#,
            r#"<img src="/hidden.png" style="visibility: hidden">"#,
            r#"<img src="/real.png" width="20" height="20">"#,
        ));
        assert_eq!(s.images.len(), 1);
        assert_eq!(s.images[0].src, "/real.png");
    }

    #[test]
    fn pixel_suffixed_style_sizes_parse() {
        let s = snap(r#"<img src="/a.png" style="width: 120px; height: 80px">"#);
        assert_eq!(s.images[0].area, 9600);
    }

    #[test]
    fn root_and_body_backgrounds() {
        let s = snap(concat!(
            r#"<html style="background-color: rgb(1, 2, 3)">"#,
            r#"<body style="background-color: #445566"></body></html>"#,
        ));
        assert_eq!(s.root_background.as_deref(), Some("rgb(1, 2, 3)"));
        assert_eq!(s.body_background.as_deref(), Some("#445566"));
    }

    #[test]
    fn legacy_bgcolor_attribute_is_honored() {
        let s = snap(r##"<body bgcolor="#778899"></body>"##);
        assert_eq!(s.body_background.as_deref(), Some("#778899"));
    }

    #[test]
    fn last_inline_declaration_wins() {
        let s = snap(r#"<body style="background-color: #111111; background-color: #222222">"#);
        assert_eq!(s.body_background.as_deref(), Some("#222222"));
    }
}
