//! Dominant-color sampling of image resources.
//!
//! Loading is best-effort: unresolvable references, fetch failures, refused
//! cross-origin reads, and undecodable bytes all report `None` so the
//! cascade moves on. The dominant color is the mode of a coarse 5-bit
//! histogram — intentionally cheap, favoring the most common hue over a
//! perceptually "nicest" one.

use std::collections::HashMap;
use std::time::Duration;

use base64::Engine;
use image::imageops::FilterType;
use image::{GenericImageView, RgbaImage};
use tracing::debug;
use url::Url;

use crate::color::Color;
use crate::prefs::SAMPLE_SCALE_RANGE;

/// Soft bound on any single image fetch.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Pixels below this alpha are treated as transparent and skipped.
const ALPHA_OPAQUE_MIN: u8 = 128;

/// Loads image resources and reduces them to a single representative color.
#[derive(Debug, Clone)]
pub struct ImageSampler {
    http: reqwest::Client,
    sample_scale: f64,
    allow_cross_origin: bool,
}

impl ImageSampler {
    /// Build a sampler with a reusable HTTP client.
    ///
    /// `sample_scale` is the linear downscale fraction applied before pixel
    /// work, clamped to [0.02, 0.5]. With `allow_cross_origin` off, images
    /// hosted elsewhere than the page are refused — the equivalent of a
    /// tainted canvas, a normal outcome rather than an error.
    pub fn new(sample_scale: f64, allow_cross_origin: bool) -> Self {
        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(concat!("pagetint/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            sample_scale: sample_scale.clamp(SAMPLE_SCALE_RANGE.0, SAMPLE_SCALE_RANGE.1),
            allow_cross_origin,
        }
    }

    /// Resolve `reference` against `base`, load it, and compute the
    /// dominant color.
    pub async fn dominant_color(&self, reference: &str, base: &Url) -> Option<Color> {
        let url = match base.join(reference.trim()) {
            Ok(url) => url,
            Err(e) => {
                debug!("unresolvable image reference {reference:?}: {e}");
                return None;
            }
        };
        let bytes = self.load(&url, base).await?;
        sample_bytes(&bytes, self.sample_scale)
    }

    async fn load(&self, url: &Url, base: &Url) -> Option<Vec<u8>> {
        match url.scheme() {
            "http" | "https" => {
                if !self.allow_cross_origin && url.host_str() != base.host_str() {
                    debug!("cross-origin pixel read refused for {url}");
                    return None;
                }
                let response = match self.http.get(url.clone()).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        debug!("image fetch failed for {url}: {e}");
                        return None;
                    }
                };
                if !response.status().is_success() {
                    debug!("image fetch for {url} returned {}", response.status());
                    return None;
                }
                response.bytes().await.ok().map(|b| b.to_vec())
            }
            "data" => decode_data_url(url.as_str()),
            "file" => {
                let path = url.to_file_path().ok()?;
                tokio::fs::read(path).await.ok()
            }
            other => {
                debug!("unsupported image scheme {other:?}");
                None
            }
        }
    }
}

/// Decode a `data:` URL with a base64 payload. Non-base64 payloads are not
/// decodable images and yield `None`.
fn decode_data_url(raw: &str) -> Option<Vec<u8>> {
    let rest = raw.strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    if !meta.ends_with(";base64") {
        return None;
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .ok()
}

/// Decode, downscale, and histogram raw image bytes.
pub fn sample_bytes(bytes: &[u8], sample_scale: f64) -> Option<Color> {
    let img = match image::load_from_memory(bytes) {
        Ok(img) => img,
        Err(e) => {
            debug!("image decode failed: {e}");
            return None;
        }
    };
    let (iw, ih) = img.dimensions();
    if iw == 0 || ih == 0 {
        return None;
    }

    let scale = sample_scale.clamp(SAMPLE_SCALE_RANGE.0, SAMPLE_SCALE_RANGE.1);
    let w = ((iw as f64 * scale).floor() as u32).max(1);
    let h = ((ih as f64 * scale).floor() as u32).max(1);
    let small = img.resize_exact(w, h, FilterType::Triangle).to_rgba8();

    dominant_bucket(&small)
}

/// Mode of the 5-bit-per-channel histogram.
///
/// Mostly-transparent pixels are discarded; the winning bucket is the one
/// with the highest count, ties broken by first-seen order during the
/// scan; the representative color is the bucket value shifted back up by
/// the three dropped bits.
pub fn dominant_bucket(pixels: &RgbaImage) -> Option<Color> {
    // Buckets in first-seen order, with an index for the count updates.
    let mut counts: Vec<(u16, u32)> = Vec::new();
    let mut index: HashMap<u16, usize> = HashMap::new();

    for px in pixels.pixels() {
        let [r, g, b, a] = px.0;
        if a < ALPHA_OPAQUE_MIN {
            continue;
        }
        let key = ((r as u16 >> 3) << 10) | ((g as u16 >> 3) << 5) | (b as u16 >> 3);
        match index.get(&key) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(key, counts.len());
                counts.push((key, 1));
            }
        }
    }

    let mut best: Option<(u16, u32)> = None;
    for &(key, count) in &counts {
        match best {
            Some((_, top)) if count <= top => {}
            _ => best = Some((key, count)),
        }
    }

    let (key, _) = best?;
    let r = (((key >> 10) & 31) << 3) as u8;
    let g = (((key >> 5) & 31) << 3) as u8;
    let b = ((key & 31) << 3) as u8;
    Some(Color::new(r, g, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::io::Cursor;

    fn png_bytes(img: &RgbaImage) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(rgba))
    }

    // --- dominant_bucket ---

    #[test]
    fn mostly_red_image_yields_red_bucket() {
        // 90% pure red, 10% pure blue, all opaque.
        let img = RgbaImage::from_fn(10, 10, |x, _| {
            if x < 9 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        });
        let c = dominant_bucket(&img).unwrap();
        assert!(c.r >= 224, "red channel too low: {c}");
        assert_eq!(c.g, 0);
        assert_eq!(c.b, 0);
    }

    #[test]
    fn quantization_reconstructs_bucket_floor() {
        let img = solid(4, 4, [255, 130, 7, 255]);
        // 255 -> bucket 31 -> 248; 130 -> bucket 16 -> 128; 7 -> bucket 0 -> 0.
        assert_eq!(dominant_bucket(&img), Some(Color::new(248, 128, 0)));
    }

    #[test]
    fn transparent_pixels_are_discarded() {
        let img = RgbaImage::from_fn(10, 10, |x, _| {
            if x < 8 {
                // Dominant but below the alpha cutoff.
                Rgba([0, 255, 0, 40])
            } else {
                Rgba([200, 0, 0, 255])
            }
        });
        let c = dominant_bucket(&img).unwrap();
        assert!(c.r > 0 && c.g == 0, "expected the opaque red, got {c}");
    }

    #[test]
    fn fully_transparent_image_has_no_bucket() {
        let img = solid(8, 8, [10, 20, 30, 0]);
        assert_eq!(dominant_bucket(&img), None);
    }

    #[test]
    fn ties_break_to_first_seen() {
        // Two buckets with equal counts; the first scanned pixel wins.
        let img = RgbaImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                Rgba([16, 16, 16, 255])
            } else {
                Rgba([240, 240, 240, 255])
            }
        });
        assert_eq!(dominant_bucket(&img), Some(Color::new(16, 16, 16)));
    }

    #[test]
    fn tie_break_ignores_which_bucket_peaked_first() {
        // Scan order blue, red, red, blue: both buckets end at two, and
        // red hits two before blue does. Blue was seen first and wins.
        let pixels = [
            Rgba([0, 0, 255, 255]),
            Rgba([255, 0, 0, 255]),
            Rgba([255, 0, 0, 255]),
            Rgba([0, 0, 255, 255]),
        ];
        let img = RgbaImage::from_fn(4, 1, |x, _| pixels[x as usize]);
        assert_eq!(dominant_bucket(&img), Some(Color::new(0, 0, 248)));
    }

    #[test]
    fn nearby_shades_share_a_bucket() {
        // 250..=255 all land in bucket 31; together they outweigh the blues.
        let img = RgbaImage::from_fn(6, 1, |x, _| match x {
            0 => Rgba([250, 0, 0, 255]),
            1 => Rgba([252, 0, 0, 255]),
            2 => Rgba([255, 0, 0, 255]),
            _ => Rgba([0, 0, (200 + x) as u8, 255]),
        });
        assert_eq!(dominant_bucket(&img), Some(Color::new(248, 0, 0)));
    }

    // --- sample_bytes ---

    #[test]
    fn sample_solid_png() {
        let bytes = png_bytes(&solid(100, 60, [30, 90, 200, 255]));
        let c = sample_bytes(&bytes, 0.12).unwrap();
        assert_eq!(c, Color::new(24, 88, 200));
    }

    #[test]
    fn sample_tiny_image_clamps_to_one_pixel() {
        let bytes = png_bytes(&solid(3, 3, [255, 255, 255, 255]));
        assert_eq!(sample_bytes(&bytes, 0.02), Some(Color::new(248, 248, 248)));
    }

    #[test]
    fn sample_scale_is_clamped() {
        let bytes = png_bytes(&solid(40, 40, [0, 128, 0, 255]));
        // Out-of-range scales behave like the clamp endpoints.
        assert_eq!(sample_bytes(&bytes, 9.0), sample_bytes(&bytes, 0.5));
        assert_eq!(sample_bytes(&bytes, 0.0001), sample_bytes(&bytes, 0.02));
    }

    #[test]
    fn garbage_bytes_decode_to_none() {
        assert_eq!(sample_bytes(b"not an image", 0.12), None);
    }

    // --- data URLs ---

    #[test]
    fn decode_base64_data_url() {
        let bytes = png_bytes(&solid(4, 4, [1, 2, 3, 255]));
        let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
        let url = format!("data:image/png;base64,{encoded}");
        assert_eq!(decode_data_url(&url), Some(bytes));
    }

    #[test]
    fn non_base64_data_url_is_refused() {
        assert_eq!(decode_data_url("data:text/plain,hello"), None);
        assert_eq!(decode_data_url("data:image/png;base64"), None);
    }

    // --- sampler plumbing ---

    #[tokio::test]
    async fn data_url_reference_end_to_end() {
        let bytes = png_bytes(&solid(20, 20, [200, 16, 16, 255]));
        let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
        let reference = format!("data:image/png;base64,{encoded}");
        let base = Url::parse("https://example.com/").unwrap();

        let sampler = ImageSampler::new(0.12, true);
        let c = sampler.dominant_color(&reference, &base).await.unwrap();
        assert_eq!(c, Color::new(200, 16, 16));
    }

    #[tokio::test]
    async fn file_reference_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("swatch.png");
        solid(16, 16, [0, 0, 250, 255]).save(&path).unwrap();
        let base = Url::from_file_path(dir.path().join("index.html")).unwrap();

        let sampler = ImageSampler::new(0.12, true);
        let c = sampler.dominant_color("swatch.png", &base).await.unwrap();
        assert_eq!(c, Color::new(0, 0, 248));
    }

    #[tokio::test]
    async fn cross_origin_reference_is_refused_without_fetching() {
        let sampler = ImageSampler::new(0.12, false);
        let base = Url::parse("https://example.com/").unwrap();
        let c = sampler
            .dominant_color("https://cdn.elsewhere.net/pic.png", &base)
            .await;
        assert_eq!(c, None);
    }

    #[tokio::test]
    async fn same_origin_policy_still_allows_data_urls() {
        let bytes = png_bytes(&solid(4, 4, [9, 9, 9, 255]));
        let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
        let reference = format!("data:image/png;base64,{encoded}");
        let base = Url::parse("https://example.com/").unwrap();

        let sampler = ImageSampler::new(0.12, false);
        assert!(sampler.dominant_color(&reference, &base).await.is_some());
    }

    #[tokio::test]
    async fn unresolvable_reference_is_none() {
        let sampler = ImageSampler::new(0.12, true);
        let base = Url::parse("https://example.com/").unwrap();
        assert_eq!(sampler.dominant_color("http://[bad", &base).await, None);
    }
}
