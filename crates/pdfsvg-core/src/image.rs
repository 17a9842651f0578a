//! Raster images and masks handed to the builder.
//!
//! The interpreter decodes image streams into 8-bit gray or RGB samples
//! (or keeps baseline JPEG data untouched); this module combines them with
//! masks and encodes the result as a `data:` URI.

use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{ExtendedColorType, ImageEncoder};
use image::codecs::png::PngEncoder;

/// Errors while encoding raster output.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageEncodeError(pub String);

impl std::fmt::Display for ImageEncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "image encoding failed: {}", self.0)
    }
}

impl std::error::Error for ImageEncodeError {}

/// A decoded image in 8-bit gray (1 component) or RGB (3 components).
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub components: u8,
    pub samples: Vec<u8>,
    /// Original DCT data when it can be embedded as-is.
    pub jpeg: Option<Vec<u8>>,
    pub interpolate: bool,
}

impl RasterImage {
    pub fn gray(width: u32, height: u32, samples: Vec<u8>) -> Self {
        Self {
            width,
            height,
            components: 1,
            samples,
            jpeg: None,
            interpolate: false,
        }
    }

    pub fn rgb(width: u32, height: u32, samples: Vec<u8>) -> Self {
        Self {
            width,
            height,
            components: 3,
            samples,
            jpeg: None,
            interpolate: false,
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    fn has_valid_samples(&self) -> bool {
        self.samples.len() >= self.pixel_count() * self.components as usize
    }

    /// RGBA pixels with the given per-pixel alpha (opaque when `None`).
    fn to_rgba(&self, alpha: Option<&[u8]>) -> Vec<u8> {
        let n = self.pixel_count();
        let mut out = Vec::with_capacity(n * 4);
        for i in 0..n {
            let a = alpha.and_then(|a| a.get(i).copied()).unwrap_or(255);
            if self.components == 1 {
                let g = self.samples.get(i).copied().unwrap_or(0);
                out.extend_from_slice(&[g, g, g, a]);
            } else {
                let base = i * 3;
                let px = self.samples.get(base..base + 3).unwrap_or(&[0, 0, 0]);
                out.extend_from_slice(&[px[0], px[1], px[2], a]);
            }
        }
        out
    }

    /// Luminance values, one byte per pixel.
    pub fn to_luma(&self) -> Vec<u8> {
        if self.components == 1 {
            return self.samples.clone();
        }
        self.samples
            .chunks_exact(3)
            .map(|px| {
                let l =
                    0.299 * f64::from(px[0]) + 0.587 * f64::from(px[1]) + 0.114 * f64::from(px[2]);
                l.round().clamp(0.0, 255.0) as u8
            })
            .collect()
    }
}

/// A 1-bit mask, one `bool` per pixel, `true` for a sample value of 1.
#[derive(Debug, Clone, PartialEq)]
pub struct StencilMask {
    pub width: u32,
    pub height: u32,
    pub bits: Vec<bool>,
    pub interpolate: bool,
}

impl StencilMask {
    /// Alpha values where samples of 0 are painted, or samples of 1 when
    /// `invert` is set.
    pub fn painted_alpha(&self, invert: bool) -> Vec<u8> {
        self.bits
            .iter()
            .map(|bit| if *bit == invert { 255 } else { 0 })
            .collect()
    }

    /// The same mask as an 8-bit luminance image for `<mask>` use.
    pub fn to_luma_image(&self, invert: bool) -> RasterImage {
        let mut img = RasterImage::gray(self.width, self.height, self.painted_alpha(invert));
        img.interpolate = self.interpolate;
        img
    }
}

/// `/Mask [min0 max0 min1 max1 ...]` color-key masking.
///
/// Pixels whose raw samples all fall in their ranges are transparent.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorKeyMask {
    pub ranges: Vec<(u32, u32)>,
    /// Raw samples before color conversion, `components` values per pixel.
    pub raw: Vec<u32>,
    pub components: usize,
}

impl ColorKeyMask {
    pub fn alpha(&self, pixel_count: usize) -> Vec<u8> {
        let n = self.components.max(1);
        (0..pixel_count)
            .map(|i| {
                let px = self.raw.get(i * n..i * n + n);
                let masked = match px {
                    Some(values) => values
                        .iter()
                        .zip(&self.ranges)
                        .all(|(v, (lo, hi))| v >= lo && v <= hi),
                    None => false,
                };
                if masked { 0 } else { 255 }
            })
            .collect()
    }
}

/// Encode an image as a `data:` URI.
///
/// JPEG data passes through when no alpha is applied.
pub fn image_data_uri(
    image: &RasterImage,
    alpha: Option<&[u8]>,
) -> Result<String, ImageEncodeError> {
    if alpha.is_none() {
        if let Some(ref jpeg) = image.jpeg {
            return Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(jpeg)));
        }
    }
    if image.width == 0 || image.height == 0 || !image.has_valid_samples() {
        return Err(ImageEncodeError(format!(
            "{}x{} image with {} samples",
            image.width,
            image.height,
            image.samples.len()
        )));
    }
    let (width, height) = (image.width, image.height);
    let png = match alpha {
        Some(a) => encode_png(&image.to_rgba(Some(a)), width, height, ExtendedColorType::Rgba8)?,
        None if image.components == 1 => {
            encode_png(&image.samples, width, height, ExtendedColorType::L8)?
        }
        None => encode_png(&image.samples, width, height, ExtendedColorType::Rgb8)?,
    };
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
}

/// A solid-colored raster whose alpha is the given mask.
pub fn stencil_data_uri(
    mask: &StencilMask,
    rgb: [u8; 3],
    invert: bool,
) -> Result<String, ImageEncodeError> {
    let n = mask.width as usize * mask.height as usize;
    let samples: Vec<u8> = std::iter::repeat_n(rgb, n).flatten().collect();
    let img = RasterImage::rgb(mask.width, mask.height, samples);
    image_data_uri(&img, Some(&mask.painted_alpha(invert)))
}

fn encode_png(
    data: &[u8],
    width: u32,
    height: u32,
    color: ExtendedColorType,
) -> Result<Vec<u8>, ImageEncodeError> {
    let mut buf = Cursor::new(Vec::new());
    PngEncoder::new(&mut buf)
        .write_image(data, width, height, color)
        .map_err(|e| ImageEncodeError(e.to_string()))?;
    Ok(buf.into_inner())
}
