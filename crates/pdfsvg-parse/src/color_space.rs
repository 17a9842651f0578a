//! Color space resolution.
//!
//! Resolves device, CIE-based, ICCBased, Indexed, Separation, DeviceN and
//! Pattern color spaces from resource dictionaries into
//! [`ColorSpace`] values the builder can convert to sRGB.

use lopdf::{Dictionary, Object};
use pdfsvg_core::ColorSpace;
use tracing::{debug, warn};

use crate::function::parse_function;
use crate::lopdf_backend::{as_dict_like, dict_get, name_of, object_to_f64, resolve, stream_data};

/// Deepest nesting of base/alternate spaces followed.
const MAX_COLOR_SPACE_DEPTH: usize = 8;

/// Resolves color spaces against one resource dictionary.
///
/// ICC profiles met on the way are handed to `register`, which returns
/// the name the output uses for the profile.
pub struct ColorSpaceResolver<'a, F>
where
    F: FnMut(&[u8]) -> String,
{
    doc: &'a lopdf::Document,
    resources: Option<&'a Dictionary>,
    register: F,
}

impl<'a, F> ColorSpaceResolver<'a, F>
where
    F: FnMut(&[u8]) -> String,
{
    pub fn new(doc: &'a lopdf::Document, resources: Option<&'a Dictionary>, register: F) -> Self {
        Self {
            doc,
            resources,
            register,
        }
    }

    /// Resolve the operand of `cs`/`CS`: a family name or a resource name.
    pub fn resolve_name(&mut self, name: &str) -> Option<ColorSpace> {
        if let Some(cs) = device_space(name) {
            return Some(cs);
        }
        let doc = self.doc;
        let entry = self
            .resources
            .and_then(|r| dict_get(doc, r, b"ColorSpace"))
            .and_then(as_dict_like)
            .and_then(|d| dict_get(doc, d, name.as_bytes()));
        match entry {
            Some(obj) => self.resolve_object(obj),
            None => {
                debug!(name, "color space not found in resources");
                None
            }
        }
    }

    /// Resolve a color space object (name or array).
    pub fn resolve_object(&mut self, obj: &Object) -> Option<ColorSpace> {
        self.resolve_at(obj, 0)
    }

    fn resolve_at(&mut self, obj: &Object, depth: usize) -> Option<ColorSpace> {
        if depth > MAX_COLOR_SPACE_DEPTH {
            warn!("color space nesting too deep");
            return None;
        }
        let doc = self.doc;
        match resolve(doc, obj) {
            Object::Name(n) => {
                let name = std::str::from_utf8(n).ok()?;
                match device_space(name) {
                    Some(cs) => Some(cs),
                    // Default spaces and named spaces may be indirected once.
                    None if depth == 0 => self.resolve_name(name),
                    None => None,
                }
            }
            Object::Array(items) => self.resolve_array(items, depth),
            _ => None,
        }
    }

    fn resolve_array(&mut self, items: &[Object], depth: usize) -> Option<ColorSpace> {
        let doc = self.doc;
        let family = items.first().map(|o| resolve(doc, o)).and_then(name_of)?;
        let arg = |i: usize| items.get(i).map(|o| resolve(doc, o));
        match family {
            "DeviceGray" | "G" | "CalGray" => Some(ColorSpace::DeviceGray),
            "DeviceRGB" | "RGB" | "CalRGB" => Some(ColorSpace::DeviceRGB),
            "DeviceCMYK" | "CMYK" => Some(ColorSpace::DeviceCMYK),
            "Lab" => Some(ColorSpace::Lab),
            "ICCBased" => {
                let stream = arg(1)?.as_stream().ok()?;
                let n = dict_get(doc, &stream.dict, b"N")
                    .and_then(object_to_f64)
                    .map_or(3, |n| n as u32);
                let alternate = match dict_get(doc, &stream.dict, b"Alternate") {
                    Some(alt) => self
                        .resolve_at(alt, depth + 1)
                        .unwrap_or_else(|| ColorSpace::from_component_count(n as usize)),
                    None => ColorSpace::from_component_count(n as usize),
                };
                let profile = match stream_data(stream) {
                    Ok(data) if !data.is_empty() => Some((self.register)(&data)),
                    Ok(_) => None,
                    Err(e) => {
                        warn!(error = %e, "unreadable ICC profile");
                        None
                    }
                };
                Some(ColorSpace::IccBased {
                    num_components: n,
                    alternate: Box::new(alternate),
                    profile,
                })
            }
            "Indexed" | "I" => {
                let base = self.resolve_at(arg(1)?, depth + 1)?;
                let hival =
                    arg(2).and_then(object_to_f64).map_or(0, |h| h.clamp(0.0, 255.0) as u32);
                let lookup = match arg(3)? {
                    Object::String(bytes, _) => bytes.clone(),
                    Object::Stream(s) => stream_data(s).ok()?,
                    _ => return None,
                };
                Some(ColorSpace::Indexed {
                    base: Box::new(base),
                    hival,
                    lookup,
                })
            }
            "Separation" | "DeviceN" => {
                let (num_components, none) = if family == "Separation" {
                    (1, arg(1).and_then(name_of) == Some("None"))
                } else {
                    match arg(1)? {
                        Object::Array(names) => {
                            let none = !names.is_empty()
                                && names.iter().all(|n| name_of(resolve(doc, n)) == Some("None"));
                            (names.len() as u32, none)
                        }
                        _ => return None,
                    }
                };
                let alternate = self
                    .resolve_at(arg(2)?, depth + 1)
                    .unwrap_or(ColorSpace::DeviceGray);
                let tint_transform = match arg(3) {
                    Some(f) => match parse_function(doc, f) {
                        Ok(f) => Some(f),
                        Err(e) => {
                            warn!(error = %e, "tint transform ignored");
                            None
                        }
                    },
                    None => None,
                };
                Some(ColorSpace::Separation {
                    num_components: num_components.max(1),
                    alternate: Box::new(alternate),
                    tint_transform,
                    none,
                })
            }
            "Pattern" => {
                let base = match arg(1) {
                    Some(b) => self.resolve_at(b, depth + 1).map(Box::new),
                    None => None,
                };
                Some(ColorSpace::Pattern(base))
            }
            other => {
                debug!(family = other, "unsupported color space family");
                None
            }
        }
    }
}

/// Device families and the inline-image abbreviations.
pub fn device_space(name: &str) -> Option<ColorSpace> {
    match name {
        "DeviceGray" | "G" | "CalGray" => Some(ColorSpace::DeviceGray),
        "DeviceRGB" | "RGB" | "CalRGB" => Some(ColorSpace::DeviceRGB),
        "DeviceCMYK" | "CMYK" => Some(ColorSpace::DeviceCMYK),
        "Pattern" => Some(ColorSpace::Pattern(None)),
        _ => None,
    }
}
