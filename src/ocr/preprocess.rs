use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{GrayImage, ImageBuffer, ImageFormat, ImageReader, Luma, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// Tuning parameters for the captcha cleaning pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Integer nearest-neighbor upscale factor
    pub scale: u32,
    /// Pixels with saturation above this are ink candidates (0.0-1.0)
    pub saturation_threshold: f32,
    /// Brightest channel must be strictly above this (rejects near-black)
    pub min_value: u8,
    /// Brightest channel must be strictly below this (rejects near-white)
    pub max_value: u8,
    /// Square erosion radius; strokes thinner than 2r+1 px vanish
    pub erode_radius: u32,
    /// Square dilation radius, must exceed `erode_radius`
    pub dilate_radius: u32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            scale: 4,
            saturation_threshold: 0.2,
            min_value: 50,
            max_value: 250,
            erode_radius: 3,
            dilate_radius: 4,
        }
    }
}

impl PreprocessConfig {
    /// Rejects parameter combinations the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.scale == 0 {
            return Err(anyhow!("preprocess.scale must be at least 1"));
        }
        if self.dilate_radius <= self.erode_radius {
            return Err(anyhow!(
                "preprocess.dilate_radius ({}) must be larger than erode_radius ({})",
                self.dilate_radius,
                self.erode_radius
            ));
        }
        if self.min_value >= self.max_value {
            return Err(anyhow!(
                "preprocess.min_value ({}) must be below max_value ({})",
                self.min_value,
                self.max_value
            ));
        }
        Ok(())
    }
}

/// A foreground/background bitmap, row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct BinaryMask {
    width: u32,
    height: u32,
    data: Vec<bool>,
}

impl BinaryMask {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![false; width as usize * height as usize],
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        self.data[self.index(x, y)]
    }

    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        let i = self.index(x, y);
        self.data[i] = value;
    }

    /// Number of foreground pixels.
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Renders foreground as black, background as white.
    pub fn to_image(&self) -> GrayImage {
        ImageBuffer::from_fn(self.width, self.height, |x, y| {
            if self.get(x, y) {
                Luma([0u8])
            } else {
                Luma([255u8])
            }
        })
    }
}

/// Largest accepted captcha width or height, before upscaling.
pub const MAX_CAPTCHA_SIDE: u32 = 1024;

/// Decodes a captcha payload into an RGBA image.
///
/// Accepts bare base64 or a `data:image/...;base64,` URL. Images wider or
/// taller than `MAX_CAPTCHA_SIDE` are rejected before their pixels are
/// decoded.
pub fn decode_captcha_image(payload: &str) -> Result<RgbaImage> {
    let encoded = match payload.split_once(";base64,") {
        Some((_, data)) => data,
        None => payload,
    };
    let bytes = STANDARD
        .decode(encoded.trim())
        .context("Captcha payload is not valid base64")?;

    let (width, height) = ImageReader::new(Cursor::new(&bytes))
        .with_guessed_format()
        .context("Failed to read captcha image header")?
        .into_dimensions()
        .context("Failed to decode captcha image")?;
    if width > MAX_CAPTCHA_SIDE || height > MAX_CAPTCHA_SIDE {
        return Err(anyhow!(
            "Captcha image too large: {}x{} (max {} per side)",
            width,
            height,
            MAX_CAPTCHA_SIDE
        ));
    }

    let img = image::load_from_memory(&bytes).context("Failed to decode captcha image")?;
    Ok(img.to_rgba8())
}

/// Enlarges an image by an integer factor without smoothing.
pub fn upscale_nearest(img: &RgbaImage, factor: u32) -> RgbaImage {
    let (width, height) = img.dimensions();
    ImageBuffer::from_fn(width * factor, height * factor, |x, y| {
        *img.get_pixel(x / factor, y / factor)
    })
}

/// Returns true for colored ink: saturated, neither near-white nor near-black.
///
/// Hue is ignored, so digits and noise glyphs of any color both qualify.
/// Fully transparent pixels are background whatever color they store.
fn is_ink(pixel: &Rgba<u8>, config: &PreprocessConfig) -> bool {
    let [r, g, b, a] = pixel.0;
    if a == 0 {
        return false;
    }
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let saturation = if max == 0 {
        0.0
    } else {
        (max - min) as f32 / max as f32
    };

    saturation > config.saturation_threshold && max > config.min_value && max < config.max_value
}

/// Classifies every pixel as ink (true) or background (false).
pub fn foreground_mask(img: &RgbaImage, config: &PreprocessConfig) -> BinaryMask {
    let (width, height) = img.dimensions();
    let mut mask = BinaryMask::new(width, height);
    for (x, y, pixel) in img.enumerate_pixels() {
        if is_ink(pixel, config) {
            mask.set(x, y, true);
        }
    }
    mask
}

/// Binary erosion with a square structuring element.
///
/// A pixel survives only if its whole (2r+1)² neighbourhood is foreground.
/// Pixels closer than `radius` to the border never survive.
pub fn erode(mask: &BinaryMask, radius: u32) -> BinaryMask {
    let (width, height) = mask.dimensions();
    let mut output = BinaryMask::new(width, height);
    if width <= 2 * radius || height <= 2 * radius {
        return output;
    }

    for y in radius..height - radius {
        for x in radius..width - radius {
            let all_foreground = (y - radius..=y + radius)
                .all(|ny| (x - radius..=x + radius).all(|nx| mask.get(nx, ny)));
            if all_foreground {
                output.set(x, y, true);
            }
        }
    }
    output
}

/// Binary dilation with a square structuring element.
///
/// Each foreground pixel at least `radius` away from every border paints its
/// (2r+1)² neighbourhood.
pub fn dilate(mask: &BinaryMask, radius: u32) -> BinaryMask {
    let (width, height) = mask.dimensions();
    let mut output = BinaryMask::new(width, height);
    if width <= 2 * radius || height <= 2 * radius {
        return output;
    }

    for y in radius..height - radius {
        for x in radius..width - radius {
            if !mask.get(x, y) {
                continue;
            }
            for ny in y - radius..=y + radius {
                for nx in x - radius..=x + radius {
                    output.set(nx, ny, true);
                }
            }
        }
    }
    output
}

/// Cleans a captcha so only the large digit strokes remain.
///
/// Upscale, keep colored ink, erode away thin glyphs and lines, then dilate
/// with a larger radius to restore the surviving strokes. The result is black
/// digits on white.
pub fn clean_captcha(img: &RgbaImage, config: &PreprocessConfig) -> GrayImage {
    let scaled = upscale_nearest(img, config.scale.max(1));
    let ink = foreground_mask(&scaled, config);
    let eroded = erode(&ink, config.erode_radius);
    let restored = dilate(&eroded, config.dilate_radius);

    crate::log(&format!(
        "Captcha preprocessed: {}x{}, ink {} px -> eroded {} px -> restored {} px",
        scaled.width(),
        scaled.height(),
        ink.count(),
        eroded.count(),
        restored.count()
    ));

    restored.to_image()
}

/// Encodes a cleaned image as PNG bytes.
pub fn encode_png(img: &GrayImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png)
        .context("Failed to encode cleaned captcha as PNG")?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const RED: Rgba<u8> = Rgba([200, 30, 30, 255]);
    const BLUE: Rgba<u8> = Rgba([40, 60, 210, 255]);

    /// 30x30 white canvas with a 10x10 red block at (10..20, 10..20) and a
    /// 1 px blue line across row 5.
    fn synthetic_captcha() -> RgbaImage {
        ImageBuffer::from_fn(30, 30, |x, y| {
            if (10..20).contains(&x) && (10..20).contains(&y) {
                RED
            } else if y == 5 {
                BLUE
            } else {
                WHITE
            }
        })
    }

    #[test]
    fn test_upscale_nearest_repeats_pixels() {
        let img: RgbaImage = ImageBuffer::from_fn(2, 1, |x, _| {
            if x == 0 { RED } else { BLUE }
        });
        let scaled = upscale_nearest(&img, 4);
        assert_eq!(scaled.dimensions(), (8, 4));
        assert_eq!(*scaled.get_pixel(3, 3), RED);
        assert_eq!(*scaled.get_pixel(4, 0), BLUE);
    }

    #[test]
    fn test_ink_classification() {
        let config = PreprocessConfig::default();
        assert!(is_ink(&RED, &config));
        assert!(is_ink(&BLUE, &config));
        assert!(is_ink(&Rgba([30, 180, 40, 255]), &config), "green ink");
        assert!(!is_ink(&WHITE, &config), "white background");
        assert!(!is_ink(&Rgba([0, 0, 0, 255]), &config), "black");
        assert!(!is_ink(&Rgba([128, 128, 128, 255]), &config), "grey has no saturation");
        assert!(!is_ink(&Rgba([252, 200, 200, 255]), &config), "near-white pink");
        assert!(!is_ink(&Rgba([45, 5, 5, 255]), &config), "near-black red");
        assert!(!is_ink(&Rgba([200, 30, 30, 0]), &config), "transparent red");
        assert!(is_ink(&Rgba([200, 30, 30, 128]), &config), "half-transparent red");
    }

    #[test]
    fn test_transparent_background_is_not_ink() {
        // Transparent canvas that still stores a saturated color, with an
        // opaque red block on top
        let img: RgbaImage = ImageBuffer::from_fn(30, 30, |x, y| {
            if (10..20).contains(&x) && (10..20).contains(&y) {
                RED
            } else {
                Rgba([200, 30, 30, 0])
            }
        });
        let cleaned = clean_captcha(&img, &PreprocessConfig::default());

        let black = cleaned.pixels().filter(|p| p[0] == 0).count();
        // Only the block survives: 40x40 after upscale, eroded by 3 and
        // dilated by 4 gives 42x42
        assert_eq!(black, 42 * 42);
        assert_eq!(cleaned.get_pixel(5, 5)[0], 255);
        assert_eq!(cleaned.get_pixel(60, 60)[0], 0);
    }

    #[test]
    fn test_erode_removes_thin_strokes() {
        let mut mask = BinaryMask::new(20, 20);
        // 3 px wide bar: thinner than a radius-2 element (5 px)
        for y in 0..20 {
            for x in 8..11 {
                mask.set(x, y, true);
            }
        }
        assert_eq!(erode(&mask, 2).count(), 0);
    }

    #[test]
    fn test_erode_shrinks_and_dilate_restores_block() {
        let mut mask = BinaryMask::new(30, 30);
        for y in 10..20 {
            for x in 10..20 {
                mask.set(x, y, true);
            }
        }
        let eroded = erode(&mask, 2);
        // 10x10 shrinks to 6x6
        assert_eq!(eroded.count(), 36);
        assert!(eroded.get(12, 12));
        assert!(!eroded.get(11, 11));

        let restored = dilate(&eroded, 3);
        // 6x6 grows by 3 on every side: 12x12
        assert_eq!(restored.count(), 144);
        assert!(restored.get(9, 9));
        assert!(!restored.get(8, 8));
    }

    #[test]
    fn test_morphology_on_tiny_mask_is_empty() {
        let mut mask = BinaryMask::new(4, 4);
        for y in 0..4 {
            for x in 0..4 {
                mask.set(x, y, true);
            }
        }
        assert_eq!(erode(&mask, 3).count(), 0);
        assert_eq!(dilate(&mask, 4).count(), 0);
    }

    #[test]
    fn test_clean_captcha_keeps_block_drops_line() {
        let cleaned = clean_captcha(&synthetic_captcha(), &PreprocessConfig::default());
        assert_eq!(cleaned.dimensions(), (120, 120));

        // Block spans 40..80 after upscale; erosion keeps 43..=76, dilation
        // paints 39..=80.
        assert_eq!(cleaned.get_pixel(60, 60)[0], 0, "block centre is black");
        assert_eq!(cleaned.get_pixel(39, 39)[0], 0);
        assert_eq!(cleaned.get_pixel(80, 80)[0], 0);
        assert_eq!(cleaned.get_pixel(38, 60)[0], 255);
        assert_eq!(cleaned.get_pixel(81, 81)[0], 255);

        // The 4 px tall line (rows 20..24) cannot survive a 7 px element
        for x in 0..120 {
            assert_eq!(cleaned.get_pixel(x, 22)[0], 255, "line pixel at x={}", x);
        }

        assert!(cleaned.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn test_decode_captcha_image_accepts_data_url() {
        let png = {
            let mut buffer = Cursor::new(Vec::new());
            synthetic_captcha()
                .write_to(&mut buffer, ImageFormat::Png)
                .unwrap();
            buffer.into_inner()
        };
        let encoded = STANDARD.encode(&png);

        let bare = decode_captcha_image(&encoded).unwrap();
        assert_eq!(bare.dimensions(), (30, 30));

        let url = format!("data:image/png;base64,{}", encoded);
        let from_url = decode_captcha_image(&url).unwrap();
        assert_eq!(*from_url.get_pixel(15, 15), RED);
    }

    #[test]
    fn test_decode_captcha_image_rejects_garbage() {
        assert!(decode_captcha_image("not base64 !!").is_err());
        // Valid base64, not an image
        assert!(decode_captcha_image(&STANDARD.encode(b"hello")).is_err());
    }

    fn encoded_png(width: u32, height: u32) -> String {
        let img: RgbaImage = ImageBuffer::from_pixel(width, height, WHITE);
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Png).unwrap();
        STANDARD.encode(buffer.into_inner())
    }

    #[test]
    fn test_decode_captcha_image_rejects_oversized() {
        let err = decode_captcha_image(&encoded_png(MAX_CAPTCHA_SIDE + 1, 4)).unwrap_err();
        assert!(err.to_string().contains("too large"), "{}", err);
        assert!(decode_captcha_image(&encoded_png(4, MAX_CAPTCHA_SIDE + 1)).is_err());

        let edge = decode_captcha_image(&encoded_png(MAX_CAPTCHA_SIDE, 4)).unwrap();
        assert_eq!(edge.dimensions(), (MAX_CAPTCHA_SIDE, 4));
    }

    #[test]
    fn test_encode_png_round_trips_dimensions() {
        let cleaned = clean_captcha(&synthetic_captcha(), &PreprocessConfig::default());
        let bytes = encode_png(&cleaned).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (120, 120));
    }

    #[test]
    fn test_config_validation() {
        assert!(PreprocessConfig::default().validate().is_ok());

        let config = PreprocessConfig {
            dilate_radius: 3,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = PreprocessConfig {
            scale: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
