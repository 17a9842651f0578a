//! Image XObjects and inline images.
//!
//! Sample data is unfiltered, unpacked from 1 to 16 bits per component,
//! mapped through `/Decode` and the image's color space, and handed to
//! the builder as 8-bit gray or RGB. Baseline JPEG data in a gray or RGB
//! space passes through untouched.

use lopdf::{Dictionary, Object, Stream, dictionary};
use pdfsvg_core::{ColorKeyMask, ColorSpace, RasterImage, StencilMask};
use tracing::{debug, trace};

use crate::color_space::ColorSpaceResolver;
use crate::error::BackendError;
use crate::lopdf_backend::{dict_bool, dict_f64, dict_get, filters, numbers, resolve};
use crate::tokenizer::Operand;

const MAX_IMAGE_PIXELS: u64 = 1 << 26;

/// The mask attached to an opaque image.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageMask {
    None,
    /// `/Mask [min max ...]`.
    ColorKey(ColorKeyMask),
    /// `/Mask` stream.
    Stencil { mask: StencilMask, invert: bool },
    /// `/SMask` stream, already reduced to gray.
    Soft(RasterImage),
}

/// A decoded image ready for the builder.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedImage {
    /// `/ImageMask true`: painted in the fill color.
    Stencil { mask: StencilMask, invert: bool },
    Raster { image: RasterImage, mask: ImageMask },
}

fn image_error(msg: impl Into<String>) -> BackendError {
    BackendError::Parse(msg.into())
}

/// Decode an image XObject (or an inline image turned into a stream).
pub fn read_image<F>(
    doc: &lopdf::Document,
    stream: &Stream,
    spaces: &mut ColorSpaceResolver<'_, F>,
) -> Result<DecodedImage, BackendError>
where
    F: FnMut(&[u8]) -> String,
{
    let dict = &stream.dict;
    let geometry = ImageGeometry::read(doc, dict)?;
    let (data, terminal) = unfilter(doc, dict, &stream.content)?;

    if dict_bool(doc, dict, b"ImageMask").unwrap_or(false) {
        let invert = decode_is_inverted(doc, dict);
        let mask = stencil_from(&geometry, &data)?;
        return Ok(DecodedImage::Stencil { mask, invert });
    }

    let space = match dict_get(doc, dict, b"ColorSpace") {
        Some(cs) => spaces
            .resolve_object(cs)
            .ok_or_else(|| image_error("image color space not supported"))?,
        // JPEG files carry their own color model.
        None if terminal.is_some() => ColorSpace::DeviceRGB,
        None => return Err(image_error("image without /ColorSpace")),
    };
    let decode = dict_get(doc, dict, b"Decode").and_then(|o| numbers(doc, o));
    let color_key = match dict_get(doc, dict, b"Mask") {
        Some(ranges @ Object::Array(_)) => numbers(doc, ranges),
        _ => None,
    };

    let image = match terminal.as_deref() {
        None => {
            let samples = unpack_samples(&geometry, space.num_components() as usize, &data)?;
            let mut image = to_raster(&geometry, &space, decode.as_deref(), &samples.values);
            image.interpolate = geometry.interpolate;
            let mask = match color_key {
                Some(ranges) => ImageMask::ColorKey(ColorKeyMask {
                    ranges: ranges
                        .chunks_exact(2)
                        .map(|r| (r[0].max(0.0) as u32, r[1].max(0.0) as u32))
                        .collect(),
                    raw: samples.values,
                    components: samples.components,
                }),
                None => attached_mask(doc, dict)?,
            };
            return Ok(DecodedImage::Raster { image, mask });
        }
        Some("DCTDecode") => jpeg_image(&geometry, &space, decode.as_deref(), false, data)?,
        Some(other) => return Err(image_error(format!("unsupported image filter {other}"))),
    };
    let mask = attached_mask(doc, dict)?;
    Ok(DecodedImage::Raster { image, mask })
}

/// `/SMask` takes precedence over a `/Mask` stream.
fn attached_mask(doc: &lopdf::Document, dict: &Dictionary) -> Result<ImageMask, BackendError> {
    if let Some(Object::Stream(smask)) = dict_get(doc, dict, b"SMask") {
        let geometry = ImageGeometry::read(doc, &smask.dict)?;
        let (data, terminal) = unfilter(doc, &smask.dict, &smask.content)?;
        let decode = dict_get(doc, &smask.dict, b"Decode").and_then(|o| numbers(doc, o));
        let gray = match terminal.as_deref() {
            None => {
                let samples = unpack_samples(&geometry, 1, &data)?;
                to_raster(&geometry, &ColorSpace::DeviceGray, decode.as_deref(), &samples.values)
            }
            Some("DCTDecode") => {
                let gray = ColorSpace::DeviceGray;
                let mut img = jpeg_image(&geometry, &gray, decode.as_deref(), true, data)?;
                img.jpeg = None;
                img
            }
            Some(other) => return Err(image_error(format!("unsupported soft mask filter {other}"))),
        };
        return Ok(ImageMask::Soft(gray));
    }
    if let Some(Object::Stream(mask)) = dict_get(doc, dict, b"Mask") {
        let geometry = ImageGeometry::read(doc, &mask.dict)?;
        let (data, _) = unfilter(doc, &mask.dict, &mask.content)?;
        let stencil = stencil_from(&geometry, &data)?;
        return Ok(ImageMask::Stencil {
            mask: stencil,
            invert: decode_is_inverted(doc, &mask.dict),
        });
    }
    Ok(ImageMask::None)
}

// --- geometry and samples ---

#[derive(Debug, Clone, Copy)]
struct ImageGeometry {
    width: u32,
    height: u32,
    bits_per_component: u32,
    interpolate: bool,
}

impl ImageGeometry {
    fn read(doc: &lopdf::Document, dict: &Dictionary) -> Result<Self, BackendError> {
        let width = dict_f64(doc, dict, b"Width").unwrap_or(0.0);
        let height = dict_f64(doc, dict, b"Height").unwrap_or(0.0);
        if width < 1.0 || height < 1.0 {
            return Err(image_error(format!("bad image size {width}x{height}")));
        }
        let (width, height) = (width as u32, height as u32);
        if u64::from(width) * u64::from(height) > MAX_IMAGE_PIXELS {
            return Err(image_error(format!("image too large: {width}x{height}")));
        }
        let is_mask = dict_bool(doc, dict, b"ImageMask").unwrap_or(false);
        let bits_per_component = match dict_f64(doc, dict, b"BitsPerComponent") {
            Some(b) => b as u32,
            None if is_mask => 1,
            None => 8,
        };
        if !matches!(bits_per_component, 1 | 2 | 4 | 8 | 16) {
            return Err(image_error(format!("unsupported BitsPerComponent {bits_per_component}")));
        }
        Ok(Self {
            width,
            height,
            bits_per_component,
            interpolate: dict_bool(doc, dict, b"Interpolate").unwrap_or(false),
        })
    }

    fn pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Raw samples, `components` per pixel.
struct Samples {
    values: Vec<u32>,
    components: usize,
}

fn unpack_samples(
    geometry: &ImageGeometry,
    components: usize,
    data: &[u8],
) -> Result<Samples, BackendError> {
    let bpc = geometry.bits_per_component as usize;
    let per_row = geometry.width as usize * components;
    let row_bytes = (per_row * bpc).div_ceil(8);
    let needed = row_bytes * geometry.height as usize;
    if data.len() < needed {
        debug!(have = data.len(), needed, "short image data, padding");
    }
    let mut values = Vec::with_capacity(per_row * geometry.height as usize);
    for row in 0..geometry.height as usize {
        let start = row * row_bytes;
        let line = data.get(start..(start + row_bytes).min(data.len())).unwrap_or(&[]);
        for i in 0..per_row {
            let v = match bpc {
                8 => u32::from(line.get(i).copied().unwrap_or(0)),
                16 => {
                    let hi = line.get(2 * i).copied().unwrap_or(0);
                    let lo = line.get(2 * i + 1).copied().unwrap_or(0);
                    u32::from(u16::from_be_bytes([hi, lo]))
                }
                _ => {
                    let bit = i * bpc;
                    let byte = line.get(bit / 8).copied().unwrap_or(0);
                    let shift = 8 - bpc - (bit % 8);
                    u32::from((byte >> shift) & ((1u8 << bpc) - 1))
                }
            };
            values.push(v);
        }
    }
    Ok(Samples {
        values,
        components: components.max(1),
    })
}

fn stencil_from(geometry: &ImageGeometry, data: &[u8]) -> Result<StencilMask, BackendError> {
    if geometry.bits_per_component != 1 {
        return Err(image_error("image masks must use 1 bit per component"));
    }
    let samples = unpack_samples(geometry, 1, data)?;
    Ok(StencilMask {
        width: geometry.width,
        height: geometry.height,
        bits: samples.values.iter().map(|v| *v != 0).collect(),
        interpolate: geometry.interpolate,
    })
}

fn decode_is_inverted(doc: &lopdf::Document, dict: &Dictionary) -> bool {
    matches!(
        dict_get(doc, dict, b"Decode").and_then(|o| numbers(doc, o)).as_deref(),
        Some([a, b, ..]) if a > b
    )
}

/// Convert raw samples to 8-bit gray or RGB.
fn to_raster(
    geometry: &ImageGeometry,
    space: &ColorSpace,
    decode: Option<&[f64]>,
    raw: &[u32],
) -> RasterImage {
    let n = space.num_components().max(1) as usize;
    let max = ((1u64 << geometry.bits_per_component) - 1) as f64;
    let is_indexed = matches!(space, ColorSpace::Indexed { .. });
    let ranges: Vec<(f64, f64)> = match decode {
        Some(d) if d.len() >= 2 * n => d.chunks_exact(2).map(|r| (r[0], r[1])).collect(),
        _ if is_indexed => vec![(0.0, max)],
        _ => space.decode_default().chunks_exact(2).map(|r| (r[0], r[1])).collect(),
    };
    let component = |i: usize, v: u32| {
        let (lo, hi) = ranges.get(i).copied().unwrap_or((0.0, 1.0));
        lo + f64::from(v) * (hi - lo) / max
    };

    let plain_8bit = geometry.bits_per_component == 8 && decode.is_none();
    let bytes = || -> Vec<u8> { raw.iter().map(|v| *v as u8).collect() };
    match space {
        ColorSpace::DeviceGray if plain_8bit => {
            RasterImage::gray(geometry.width, geometry.height, bytes())
        }
        ColorSpace::DeviceGray => {
            let samples = raw
                .iter()
                .map(|v| (component(0, *v).clamp(0.0, 1.0) * 255.0).round() as u8)
                .collect();
            RasterImage::gray(geometry.width, geometry.height, samples)
        }
        ColorSpace::DeviceRGB if plain_8bit => {
            RasterImage::rgb(geometry.width, geometry.height, bytes())
        }
        ColorSpace::Indexed { hival, .. } => {
            let palette: Vec<[u8; 3]> =
                (0..=*hival).map(|i| space.to_rgb(&[f64::from(i)]).to_rgb8()).collect();
            let samples = raw
                .iter()
                .flat_map(|v| {
                    let index = component(0, *v).round().clamp(0.0, f64::from(*hival)) as usize;
                    palette.get(index).copied().unwrap_or([0, 0, 0])
                })
                .collect();
            RasterImage::rgb(geometry.width, geometry.height, samples)
        }
        _ => {
            let mut samples = Vec::with_capacity(geometry.pixels() * 3);
            let mut comps = vec![0.0; n];
            let mut last: Option<(Vec<u32>, [u8; 3])> = None;
            for px in raw.chunks(n) {
                let rgb = match &last {
                    Some((key, rgb)) if key.as_slice() == px => *rgb,
                    _ => {
                        for (i, v) in px.iter().enumerate() {
                            comps[i] = component(i, *v);
                        }
                        let rgb = space.to_rgb(&comps).to_rgb8();
                        last = Some((px.to_vec(), rgb));
                        rgb
                    }
                };
                samples.extend_from_slice(&rgb);
            }
            RasterImage::rgb(geometry.width, geometry.height, samples)
        }
    }
}

fn jpeg_image(
    geometry: &ImageGeometry,
    space: &ColorSpace,
    decode: Option<&[f64]>,
    needs_samples: bool,
    data: Vec<u8>,
) -> Result<RasterImage, BackendError> {
    let passthrough = match space {
        ColorSpace::DeviceGray | ColorSpace::DeviceRGB => true,
        ColorSpace::IccBased { num_components, .. } => matches!(num_components, 1 | 3),
        _ => false,
    };
    if passthrough && decode.is_none() && !needs_samples {
        trace!("jpeg passed through");
        return Ok(RasterImage {
            width: geometry.width,
            height: geometry.height,
            components: if space.num_components() == 1 { 1 } else { 3 },
            samples: Vec::new(),
            jpeg: Some(data),
            interpolate: geometry.interpolate,
        });
    }
    let decoded = image::load_from_memory_with_format(&data, image::ImageFormat::Jpeg)
        .map_err(|e| image_error(format!("jpeg decode failed: {e}")))?;
    let (w, h) = (decoded.width(), decoded.height());
    let mut image = match space.num_components() {
        1 => {
            let gray = decoded.to_luma8().into_raw();
            let g = ImageGeometry {
                width: w,
                height: h,
                bits_per_component: 8,
                ..*geometry
            };
            let raw: Vec<u32> = gray.iter().map(|v| u32::from(*v)).collect();
            to_raster(&g, space, decode, &raw)
        }
        // The decoder already converts CMYK and YCCK to RGB.
        _ => RasterImage::rgb(w, h, decoded.to_rgb8().into_raw()),
    };
    image.interpolate = geometry.interpolate;
    Ok(image)
}

// --- filters ---

/// Apply the stream's filters. Image codecs that must come last are not
/// applied; their name is returned with the data they receive.
fn unfilter(
    doc: &lopdf::Document,
    dict: &Dictionary,
    content: &[u8],
) -> Result<(Vec<u8>, Option<String>), BackendError> {
    let names = filters(doc, dict);
    let params: Vec<Option<Object>> = match dict_get(doc, dict, b"DecodeParms") {
        Some(Object::Array(items)) => items.iter().map(|p| Some(resolve(doc, p).clone())).collect(),
        Some(p) => vec![Some(p.clone())],
        None => Vec::new(),
    };
    let mut data = content.to_vec();
    for (i, name) in names.iter().enumerate() {
        let name = expand_filter_name(name);
        data = match name {
            "ASCIIHexDecode" => ascii_hex_decode(&data),
            "ASCII85Decode" => ascii85_decode(&data)?,
            "RunLengthDecode" => run_length_decode(&data),
            "FlateDecode" | "LZWDecode" => {
                let mut d = dictionary! { "Filter" => name };
                if let Some(Some(p)) = params.get(i) {
                    if !matches!(p, Object::Null) {
                        d.set("DecodeParms", p.clone());
                    }
                }
                Stream::new(d, data)
                    .decompressed_content()
                    .map_err(|e| image_error(format!("{name} failed: {e}")))?
            }
            "DCTDecode" | "JPXDecode" | "CCITTFaxDecode" | "JBIG2Decode" => {
                return Ok((data, Some(name.to_string())));
            }
            other => return Err(image_error(format!("unknown filter {other}"))),
        };
    }
    Ok((data, None))
}

fn expand_filter_name(name: &str) -> &str {
    match name {
        "AHx" => "ASCIIHexDecode",
        "A85" => "ASCII85Decode",
        "LZW" => "LZWDecode",
        "Fl" => "FlateDecode",
        "RL" => "RunLengthDecode",
        "CCF" => "CCITTFaxDecode",
        "DCT" => "DCTDecode",
        other => other,
    }
}

fn ascii_hex_decode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() / 2);
    let mut high: Option<u8> = None;
    for &b in data {
        if b == b'>' {
            break;
        }
        let Some(v) = (b as char).to_digit(16) else { continue };
        match high.take() {
            Some(h) => out.push((h << 4) | v as u8),
            None => high = Some(v as u8),
        }
    }
    if let Some(h) = high {
        out.push(h << 4);
    }
    out
}

fn ascii85_decode(data: &[u8]) -> Result<Vec<u8>, BackendError> {
    let mut out = Vec::with_capacity(data.len() * 4 / 5);
    let mut group = [0u32; 5];
    let mut n = 0;
    let body = data.strip_prefix(b"<~").unwrap_or(data);
    for &b in body {
        match b {
            b'~' => break,
            b'z' if n == 0 => out.extend_from_slice(&[0, 0, 0, 0]),
            b'!'..=b'u' => {
                group[n] = u32::from(b - b'!');
                n += 1;
                if n == 5 {
                    let v = group.iter().fold(0u64, |acc, d| acc * 85 + u64::from(*d));
                    if v > u64::from(u32::MAX) {
                        return Err(image_error("ASCII85 group out of range"));
                    }
                    out.extend_from_slice(&(v as u32).to_be_bytes());
                    n = 0;
                }
            }
            b if b.is_ascii_whitespace() => {}
            _ => return Err(image_error("invalid ASCII85 character")),
        }
    }
    if n > 1 {
        for slot in group.iter_mut().skip(n) {
            *slot = 84;
        }
        let v = group.iter().fold(0u64, |acc, d| acc * 85 + u64::from(*d));
        out.extend_from_slice(&(v as u32).to_be_bytes()[..n - 1]);
    }
    Ok(out)
}

fn run_length_decode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let len = data[i];
        i += 1;
        match len {
            128 => break,
            0..=127 => {
                let count = len as usize + 1;
                let end = (i + count).min(data.len());
                out.extend_from_slice(&data[i..end]);
                i = end;
            }
            _ => {
                if let Some(&b) = data.get(i) {
                    out.extend(std::iter::repeat_n(b, 257 - len as usize));
                }
                i += 1;
            }
        }
    }
    out
}

// --- inline images ---

fn expand_key(key: &str) -> &str {
    match key {
        "BPC" => "BitsPerComponent",
        "CS" => "ColorSpace",
        "D" => "Decode",
        "DP" => "DecodeParms",
        "F" => "Filter",
        "H" => "Height",
        "W" => "Width",
        "IM" => "ImageMask",
        "I" => "Interpolate",
        "L" => "Length",
        other => other,
    }
}

fn expand_value(key: &str, value: &str) -> String {
    let expanded = match (key, value) {
        ("ColorSpace", "G") => "DeviceGray",
        ("ColorSpace", "RGB") => "DeviceRGB",
        ("ColorSpace", "CMYK") => "DeviceCMYK",
        ("ColorSpace", "I") => "Indexed",
        ("Filter", v) => expand_filter_name(v),
        (_, v) => v,
    };
    expanded.to_string()
}

fn operand_object(key: &str, op: &Operand) -> Object {
    match op {
        Operand::Integer(i) => Object::Integer(*i),
        Operand::Real(r) => Object::Real(*r as f32),
        Operand::Boolean(b) => Object::Boolean(*b),
        Operand::Null => Object::Null,
        Operand::Name(n) => Object::Name(expand_value(key, n).into_bytes()),
        Operand::String(s) => Object::String(s.clone(), lopdf::StringFormat::Literal),
        Operand::Array(items) => {
            Object::Array(items.iter().map(|i| operand_object(key, i)).collect())
        }
        Operand::Dictionary(entries) => {
            let mut d = Dictionary::new();
            for (k, v) in entries {
                d.set(k.as_bytes().to_vec(), operand_object(k, v));
            }
            Object::Dictionary(d)
        }
    }
}

/// Turn `BI ... ID data EI` into an image stream with full key names.
pub fn inline_image_stream(entries: &[(String, Operand)], data: &[u8]) -> Stream {
    let mut dict = Dictionary::new();
    for (key, value) in entries {
        let key = expand_key(key);
        dict.set(key.as_bytes().to_vec(), operand_object(key, value));
    }
    let mut stream = Stream::new(dict, data.to_vec());
    stream.dict.remove(b"Length");
    stream
}
