//! Fonts as the interpreter needs them.
//!
//! [`PdfFont`] splits shown strings into character codes and gives each
//! code its Unicode text and advance width. Embedded TrueType and
//! OpenType programs are parsed with ttf-parser so glyphs can be drawn
//! as outlines. [`native_info`] reads the descriptor facts recorded in
//! the font catalog.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use lopdf::{Dictionary, Object};
use pdfsvg_core::{
    FontId, FontStretch, GlyphOutlines, NativeFontInfo, Path, PathBuilder, TextFont,
    strip_subset_tag,
};
use tracing::{debug, warn};

use crate::cmap::{CMap, CidCMap};
use crate::encoding::{BaseEncoding, SimpleEncoding};
use crate::error::BackendError;
use crate::lopdf_backend::{
    dict_f64, dict_get, dict_name, name_of, numbers, object_to_f64, resolve, stream_data,
    text_string,
};
use crate::standard_fonts::standard_width;

/// Width used for CIDs with no `/W` entry and no `/DW`.
const DEFAULT_CID_WIDTH: f64 = 1000.0;
/// Vertical advance from the default `/DW2 [880 -1000]`.
const DEFAULT_VERTICAL_ADVANCE: f64 = -1000.0;

/// One character code from a shown string.
#[derive(Debug, Clone, PartialEq)]
pub struct ShownGlyph {
    pub code: u32,
    pub text: String,
    /// Horizontal advance in glyph space (1.0 = font size).
    pub width: f64,
    /// Vertical advance in glyph space, negative downwards.
    pub vertical_advance: f64,
    /// Single-byte code 32, which receives word spacing.
    pub word_space: bool,
}

/// How a composite font turns bytes into codes.
#[derive(Debug, Clone)]
enum CodeMap {
    /// Embedded CMap or `Identity-H`/`Identity-V`.
    Cid(CidCMap),
    /// Predefined `Uni*-UCS2`/`Uni*-UTF16` CMaps: the codes are UTF-16BE.
    Utf16,
    /// Predefined legacy CJK CMaps, decoded with the matching charset.
    Legacy(&'static encoding_rs::Encoding),
}

#[derive(Debug, Clone)]
enum FontKind {
    Simple {
        encoding: SimpleEncoding,
        first_char: u32,
        widths: Vec<f64>,
        missing_width: f64,
        /// Glyph space to text space for widths (0.001, or the Type 3
        /// `/FontMatrix`).
        width_scale: f64,
    },
    Composite {
        codes: CodeMap,
        default_width: f64,
        widths: HashMap<u32, f64>,
        default_vertical: f64,
    },
}

/// A font loaded from a font dictionary.
#[derive(Debug, Clone)]
pub struct PdfFont {
    pub id: FontId,
    /// `/BaseFont` without its subset tag.
    pub base_name: String,
    pub subtype: String,
    kind: FontKind,
    to_unicode: Option<CMap>,
    outlines: Option<Rc<dyn GlyphOutlines>>,
    vertical: bool,
}

impl PdfFont {
    /// Load the font dictionary `font`.
    ///
    /// Problems in optional parts (ToUnicode, font program, widths) are
    /// logged and the part is skipped.
    pub fn load(
        doc: &lopdf::Document,
        font: &Dictionary,
        id: FontId,
    ) -> Result<Self, BackendError> {
        let subtype = dict_name(doc, font, b"Subtype").unwrap_or("Type1").to_string();
        let base_name = dict_name(doc, font, b"BaseFont")
            .map_or_else(String::new, |n| strip_subset_tag(n).to_string());
        let to_unicode = match dict_get(doc, font, b"ToUnicode") {
            Some(Object::Stream(s)) => match stream_data(s).and_then(|data| CMap::parse(&data)) {
                Ok(cmap) => Some(cmap),
                Err(e) => {
                    warn!(font = %base_name, error = %e, "ToUnicode CMap ignored");
                    None
                }
            },
            _ => None,
        };

        let mut loaded = if subtype == "Type0" {
            load_composite(doc, font, id, &base_name)?
        } else {
            load_simple(doc, font, id, &subtype, &base_name)
        };
        loaded.base_name = base_name;
        loaded.subtype = subtype;
        loaded.to_unicode = to_unicode;
        Ok(loaded)
    }

    pub fn is_vertical(&self) -> bool {
        self.vertical
    }

    pub fn has_outlines(&self) -> bool {
        self.outlines.is_some()
    }

    /// The font handle carried in the text state after `Tf`.
    pub fn text_font(&self, resource_name: &str) -> TextFont {
        TextFont {
            id: self.id,
            resource_name: resource_name.to_string(),
            base_name: self.base_name.clone(),
            outlines: self.outlines.clone(),
            vertical: self.vertical,
        }
    }

    /// Split a string operand into glyphs.
    pub fn decode(&self, bytes: &[u8]) -> Vec<ShownGlyph> {
        match &self.kind {
            FontKind::Simple {
                encoding,
                first_char,
                widths,
                missing_width,
                width_scale,
            } => bytes
                .iter()
                .map(|&b| {
                    let code = u32::from(b);
                    let width = code
                        .checked_sub(*first_char)
                        .and_then(|i| widths.get(i as usize))
                        .copied()
                        .unwrap_or(*missing_width);
                    let text = match self.unicode(code) {
                        Some(t) => t.to_string(),
                        None => encoding
                            .text(b)
                            .map(str::to_string)
                            .unwrap_or_else(|| latin1_fallback(b)),
                    };
                    ShownGlyph {
                        code,
                        text,
                        width: width * width_scale,
                        vertical_advance: DEFAULT_VERTICAL_ADVANCE / 1000.0,
                        word_space: b == b' ',
                    }
                })
                .collect(),
            FontKind::Composite {
                codes,
                default_width,
                widths,
                default_vertical,
            } => {
                let mut out = Vec::new();
                let mut rest = bytes;
                while !rest.is_empty() {
                    let (code, len, cid, fallback) = next_composite_code(codes, rest);
                    let chunk = &rest[..len];
                    rest = &rest[len..];
                    let width = cid.and_then(|c| widths.get(&c)).copied().unwrap_or(*default_width);
                    let text = match self.unicode(code) {
                        Some(t) => t.to_string(),
                        None => fallback.unwrap_or_else(|| "\u{fffd}".to_string()),
                    };
                    out.push(ShownGlyph {
                        code,
                        text,
                        width: width / 1000.0,
                        vertical_advance: default_vertical / 1000.0,
                        word_space: len == 1 && chunk[0] == b' ',
                    });
                }
                out
            }
        }
    }

    fn unicode(&self, code: u32) -> Option<&str> {
        self.to_unicode.as_ref().and_then(|m| m.lookup(code))
    }
}

fn latin1_fallback(b: u8) -> String {
    if b >= 0x20 && b != 0x7f { char::from(b).to_string() } else { String::new() }
}

/// `(code, byte length, cid, text from the code itself)`.
fn next_composite_code(codes: &CodeMap, bytes: &[u8]) -> (u32, usize, Option<u32>, Option<String>) {
    match codes {
        CodeMap::Cid(cmap) => {
            let (code, len) = cmap.next_code(bytes).unwrap_or((u32::from(bytes[0]), 1));
            (code, len, Some(cmap.lookup(code)), None)
        }
        CodeMap::Utf16 => {
            let len = match bytes {
                [hi, _, _, _, ..] if (0xd8..=0xdb).contains(hi) => 4,
                [_, _, ..] => 2,
                _ => 1,
            };
            let chunk = &bytes[..len];
            let code = chunk.iter().take(4).fold(0u32, |acc, b| (acc << 8) | u32::from(*b));
            let units: Vec<u16> = chunk
                .chunks(2)
                .map(|c| u16::from_be_bytes([c[0], c.get(1).copied().unwrap_or(0)]))
                .collect();
            (code, len, None, Some(String::from_utf16_lossy(&units)))
        }
        CodeMap::Legacy(encoding) => {
            let lead = bytes[0];
            let double = if *encoding == encoding_rs::SHIFT_JIS {
                matches!(lead, 0x81..=0x9f | 0xe0..=0xfc)
            } else {
                (0x81..=0xfe).contains(&lead)
            };
            let len = if double && bytes.len() >= 2 { 2 } else { 1 };
            let chunk = &bytes[..len];
            let code = chunk.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b));
            let (text, _, _) = encoding.decode(chunk);
            (code, len, None, Some(text.into_owned()))
        }
    }
}

/// Encoding of a predefined CMap name other than `Identity-H`/`Identity-V`.
fn predefined_cmap(name: &str) -> Option<CodeMap> {
    let stem = name.strip_suffix("-H").or_else(|| name.strip_suffix("-V")).unwrap_or(name);
    if stem.starts_with("Uni") && (stem.contains("UCS2") || stem.contains("UTF16")) {
        return Some(CodeMap::Utf16);
    }
    let encoding = match stem {
        "GB-EUC" | "GBpc-EUC" | "GBK-EUC" | "GBKp-EUC" | "GBK2K" => encoding_rs::GBK,
        "B5pc" | "ETen-B5" | "HKscs-B5" | "ETenms-B5" => encoding_rs::BIG5,
        "83pv-RKSJ" | "90ms-RKSJ" | "90msp-RKSJ" | "90pv-RKSJ" | "Add-RKSJ" | "Ext-RKSJ"
        | "RKSJ" => encoding_rs::SHIFT_JIS,
        "EUC" | "Ext-EUC" => encoding_rs::EUC_JP,
        "KSC-EUC" | "KSCms-UHC" | "KSCpc-EUC" | "KSCms-UHC-HW" => encoding_rs::EUC_KR,
        _ => return None,
    };
    Some(CodeMap::Legacy(encoding))
}

fn font_descriptor<'a>(doc: &'a lopdf::Document, font: &'a Dictionary) -> Option<&'a Dictionary> {
    dict_get(doc, font, b"FontDescriptor").and_then(|o| o.as_dict().ok())
}

fn descendant<'a>(doc: &'a lopdf::Document, font: &'a Dictionary) -> Option<&'a Dictionary> {
    match dict_get(doc, font, b"DescendantFonts") {
        Some(Object::Array(items)) => items.first().and_then(|o| resolve(doc, o).as_dict().ok()),
        _ => None,
    }
}

/// The embedded program the outline reader understands: FontFile2, or
/// FontFile3 with `/Subtype /OpenType`.
fn font_program(doc: &lopdf::Document, descriptor: &Dictionary) -> Option<Vec<u8>> {
    let stream = match dict_get(doc, descriptor, b"FontFile2") {
        Some(Object::Stream(s)) => s,
        _ => match dict_get(doc, descriptor, b"FontFile3") {
            Some(Object::Stream(s)) if dict_name(doc, &s.dict, b"Subtype") == Some("OpenType") => s,
            _ => return None,
        },
    };
    match stream_data(stream) {
        Ok(data) => Some(data),
        Err(e) => {
            warn!(error = %e, "embedded font program unreadable");
            None
        }
    }
}

/// `(code, glyph name)` pairs from a `/Differences` array.
fn differences(doc: &lopdf::Document, items: &[Object]) -> Vec<(u8, String)> {
    let mut out = Vec::new();
    let mut code: Option<u32> = None;
    for item in items {
        match resolve(doc, item) {
            Object::Integer(n) => code = u32::try_from(*n).ok(),
            Object::Name(name) => {
                if let Some(c) = code {
                    if let Ok(byte) = u8::try_from(c) {
                        out.push((byte, String::from_utf8_lossy(name).into_owned()));
                    }
                    code = Some(c + 1);
                }
            }
            _ => {}
        }
    }
    out
}

fn load_simple(
    doc: &lopdf::Document,
    font: &Dictionary,
    id: FontId,
    subtype: &str,
    base_name: &str,
) -> PdfFont {
    let default_base = if subtype == "TrueType" {
        BaseEncoding::WinAnsi
    } else {
        BaseEncoding::Standard
    };
    let encoding = match dict_get(doc, font, b"Encoding") {
        Some(Object::Name(n)) => {
            let name = String::from_utf8_lossy(n);
            SimpleEncoding::new(BaseEncoding::from_name(&name).unwrap_or(default_base))
        }
        Some(Object::Dictionary(d)) => {
            let base = dict_name(doc, d, b"BaseEncoding")
                .and_then(BaseEncoding::from_name)
                .unwrap_or(default_base);
            let mut enc = SimpleEncoding::new(base);
            if let Some(Object::Array(items)) = dict_get(doc, d, b"Differences") {
                enc.apply_differences(&differences(doc, items));
            }
            enc
        }
        _ => SimpleEncoding::new(default_base),
    };

    let descriptor = font_descriptor(doc, font);
    let first_char = dict_f64(doc, font, b"FirstChar").map_or(0, |f| f.max(0.0) as u32);
    let declared = dict_get(doc, font, b"Widths").and_then(|o| numbers(doc, o));
    let missing = descriptor.and_then(|d| dict_f64(doc, d, b"MissingWidth"));
    let standard: Option<Vec<f64>> = match declared {
        Some(_) => None,
        None => (0..=255u8).map(|c| standard_width(base_name, c)).collect(),
    };
    let (first_char, widths, missing_width) = match declared {
        Some(widths) => (first_char, widths, missing.unwrap_or(0.0)),
        None => match standard {
            Some(table) => (0, table, missing.unwrap_or(0.0)),
            None => {
                debug!(font = base_name, "no widths, using a flat 500");
                (0, Vec::new(), missing.unwrap_or(500.0))
            }
        },
    };
    let width_scale = if subtype == "Type3" {
        dict_get(doc, font, b"FontMatrix")
            .and_then(|o| numbers(doc, o))
            .and_then(|m| m.first().copied())
            .unwrap_or(0.001)
    } else {
        0.001
    };

    let outlines = descriptor.and_then(|d| font_program(doc, d)).and_then(|data| {
        let gids = simple_glyph_ids(&data, &encoding)?;
        Some(Rc::new(EmbeddedOutlines::new(data, GlyphMap::Simple(gids))) as Rc<dyn GlyphOutlines>)
    });

    PdfFont {
        id,
        base_name: String::new(),
        subtype: String::new(),
        kind: FontKind::Simple {
            encoding,
            first_char,
            widths,
            missing_width,
            width_scale,
        },
        to_unicode: None,
        outlines,
        vertical: false,
    }
}

/// CID widths from a `/W` array: `c [w1 w2 ...]` or `c_first c_last w`.
fn cid_widths(doc: &lopdf::Document, items: &[Object]) -> HashMap<u32, f64> {
    let mut widths = HashMap::new();
    let mut i = 0;
    while i < items.len() {
        let Some(start) = object_to_f64(resolve(doc, &items[i])).map(|v| v.max(0.0) as u32) else {
            i += 1;
            continue;
        };
        match items.get(i + 1).map(|o| resolve(doc, o)) {
            Some(Object::Array(list)) => {
                for (j, w) in list.iter().enumerate() {
                    if let Some(w) = object_to_f64(resolve(doc, w)) {
                        widths.insert(start + j as u32, w);
                    }
                }
                i += 2;
            }
            Some(end) => {
                let end = object_to_f64(end).map_or(start, |v| v.max(0.0) as u32);
                if let Some(w) = items.get(i + 2).and_then(|o| object_to_f64(resolve(doc, o))) {
                    // Cap pathological ranges.
                    for cid in start..=end.min(start.saturating_add(0xffff)) {
                        widths.insert(cid, w);
                    }
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}

fn load_composite(
    doc: &lopdf::Document,
    font: &Dictionary,
    id: FontId,
    base_name: &str,
) -> Result<PdfFont, BackendError> {
    let (codes, vertical) = match dict_get(doc, font, b"Encoding") {
        Some(Object::Name(n)) => {
            let name = String::from_utf8_lossy(n).into_owned();
            match name.as_str() {
                "Identity-H" => (CodeMap::Cid(CidCMap::identity(false)), false),
                "Identity-V" => (CodeMap::Cid(CidCMap::identity(true)), true),
                other => match predefined_cmap(other) {
                    Some(map) => (map, other.ends_with("-V")),
                    None => {
                        warn!(
                            font = base_name,
                            cmap = other,
                            "unknown predefined CMap, assuming Identity-H"
                        );
                        (CodeMap::Cid(CidCMap::identity(false)), false)
                    }
                },
            }
        }
        Some(Object::Stream(s)) => {
            let cmap = CidCMap::parse(&stream_data(s)?)?;
            let vertical = cmap.writing_mode() == 1;
            (CodeMap::Cid(cmap), vertical)
        }
        _ => {
            let msg = format!("Type0 font {base_name} has no usable /Encoding");
            return Err(BackendError::Font(msg));
        }
    };

    let cid_font = descendant(doc, font);
    let default_width = cid_font
        .and_then(|d| dict_f64(doc, d, b"DW"))
        .unwrap_or(DEFAULT_CID_WIDTH);
    let widths = match cid_font.and_then(|d| dict_get(doc, d, b"W")) {
        Some(Object::Array(items)) => cid_widths(doc, items),
        _ => HashMap::new(),
    };
    let default_vertical = cid_font
        .and_then(|d| dict_get(doc, d, b"DW2"))
        .and_then(|o| numbers(doc, o))
        .and_then(|v| v.get(1).copied())
        .unwrap_or(DEFAULT_VERTICAL_ADVANCE);

    let outlines = match (&codes, cid_font) {
        (CodeMap::Cid(cmap), Some(cid_font)) => {
            let cid_to_gid = match dict_get(doc, cid_font, b"CIDToGIDMap") {
                Some(Object::Stream(s)) => match stream_data(s) {
                    Ok(data) => Some(
                        data.chunks(2)
                            .map(|c| u16::from_be_bytes([c[0], c.get(1).copied().unwrap_or(0)]))
                            .collect(),
                    ),
                    Err(e) => {
                        warn!(
                            font = base_name,
                            error = %e,
                            "CIDToGIDMap unreadable, using identity"
                        );
                        None
                    }
                },
                _ => None,
            };
            font_descriptor(doc, cid_font)
                .and_then(|d| font_program(doc, d))
                .filter(|data| ttf_parser::Face::parse(data, 0).is_ok())
                .map(|data| {
                    Rc::new(EmbeddedOutlines::new(
                        data,
                        GlyphMap::Cid {
                            cmap: cmap.clone(),
                            cid_to_gid,
                        },
                    )) as Rc<dyn GlyphOutlines>
                })
        }
        _ => None,
    };

    Ok(PdfFont {
        id,
        base_name: String::new(),
        subtype: String::new(),
        kind: FontKind::Composite {
            codes,
            default_width,
            widths,
            default_vertical,
        },
        to_unicode: None,
        outlines,
        vertical,
    })
}

/// Glyph ids for the 256 codes of a simple font, tried through the glyph
/// name, the symbol cmap (3,0), the Mac cmap (1,0) and finally the
/// Unicode cmaps. `None` if the program does not parse.
fn simple_glyph_ids(data: &[u8], encoding: &SimpleEncoding) -> Option<Vec<Option<u16>>> {
    use ttf_parser::PlatformId;

    let face = match ttf_parser::Face::parse(data, 0) {
        Ok(face) => face,
        Err(e) => {
            debug!(error = %e, "embedded font program not parsed");
            return None;
        }
    };
    let subtables: Vec<_> =
        face.tables().cmap.map(|c| c.subtables.into_iter().collect()).unwrap_or_default();
    let gids = (0..=255u8)
        .map(|code| {
            if let Some(gid) = encoding.glyph_name(code).and_then(|n| face.glyph_index_by_name(n)) {
                return Some(gid.0);
            }
            let c = u32::from(code);
            for sub in &subtables {
                let found = match (sub.platform_id, sub.encoding_id) {
                    (PlatformId::Windows, 0) => {
                        sub.glyph_index(0xf000 + c).or_else(|| sub.glyph_index(c))
                    }
                    (PlatformId::Macintosh, 0) => sub.glyph_index(c),
                    _ => None,
                };
                if let Some(gid) = found.filter(|g| g.0 != 0) {
                    return Some(gid.0);
                }
            }
            let ch = encoding.text(code)?.chars().next()?;
            face.glyph_index(ch).filter(|g| g.0 != 0).map(|g| g.0)
        })
        .collect();
    Some(gids)
}

#[derive(Debug)]
enum GlyphMap {
    Simple(Vec<Option<u16>>),
    Cid { cmap: CidCMap, cid_to_gid: Option<Vec<u16>> },
}

/// Outlines from an embedded TrueType/OpenType program.
#[derive(Debug)]
struct EmbeddedOutlines {
    data: Vec<u8>,
    map: GlyphMap,
    cache: RefCell<HashMap<u32, Option<Path>>>,
}

impl EmbeddedOutlines {
    fn new(data: Vec<u8>, map: GlyphMap) -> Self {
        Self {
            data,
            map,
            cache: RefCell::new(HashMap::new()),
        }
    }

    fn glyph_id(&self, code: u32) -> Option<u16> {
        match &self.map {
            GlyphMap::Simple(gids) => gids.get(code as usize).copied().flatten(),
            GlyphMap::Cid { cmap, cid_to_gid } => {
                let cid = cmap.lookup(code);
                match cid_to_gid {
                    Some(table) => table.get(cid as usize).copied(),
                    None => u16::try_from(cid).ok(),
                }
            }
        }
    }

    fn build(&self, code: u32) -> Option<Path> {
        let gid = self.glyph_id(code)?;
        let face = ttf_parser::Face::parse(&self.data, 0).ok()?;
        let scale = 1.0 / f64::from(face.units_per_em().max(1));
        let mut sink = OutlineSink {
            builder: PathBuilder::new(),
            scale,
        };
        face.outline_glyph(ttf_parser::GlyphId(gid), &mut sink)?;
        Some(sink.builder.build())
    }
}

impl GlyphOutlines for EmbeddedOutlines {
    fn outline(&self, code: u32) -> Option<Path> {
        if let Some(cached) = self.cache.borrow().get(&code) {
            return cached.clone();
        }
        let path = self.build(code);
        self.cache.borrow_mut().insert(code, path.clone());
        path
    }
}

struct OutlineSink {
    builder: PathBuilder,
    scale: f64,
}

impl ttf_parser::OutlineBuilder for OutlineSink {
    fn move_to(&mut self, x: f32, y: f32) {
        self.builder.move_to(f64::from(x) * self.scale, f64::from(y) * self.scale);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.builder.line_to(f64::from(x) * self.scale, f64::from(y) * self.scale);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let s = self.scale;
        let (qx, qy) = (f64::from(x1) * s, f64::from(y1) * s);
        let (ex, ey) = (f64::from(x) * s, f64::from(y) * s);
        let Some(start) = self.builder.current_point() else {
            self.builder.move_to(ex, ey);
            return;
        };
        self.builder.curve_to(
            start.x + 2.0 / 3.0 * (qx - start.x),
            start.y + 2.0 / 3.0 * (qy - start.y),
            ex + 2.0 / 3.0 * (qx - ex),
            ey + 2.0 / 3.0 * (qy - ey),
            ex,
            ey,
        );
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let s = self.scale;
        self.builder.curve_to(
            f64::from(x1) * s,
            f64::from(y1) * s,
            f64::from(x2) * s,
            f64::from(y2) * s,
            f64::from(x) * s,
            f64::from(y) * s,
        );
    }

    fn close(&mut self) {
        self.builder.close_path();
    }
}

/// What the font dictionary and its descriptor say about a font.
pub fn native_info(doc: &lopdf::Document, font: &Dictionary) -> NativeFontInfo {
    let subtype = dict_name(doc, font, b"Subtype").unwrap_or("Type1").to_string();
    let is_cid = subtype == "Type0";
    let descriptor = if is_cid {
        descendant(doc, font).and_then(|d| font_descriptor(doc, d))
    } else {
        font_descriptor(doc, font)
    };
    let mut info = NativeFontInfo {
        name: dict_name(doc, font, b"BaseFont").map(str::to_string),
        subtype,
        is_cid,
        embedded: font.get(b"CharProcs").is_ok(),
        ..NativeFontInfo::default()
    };
    let Some(desc) = descriptor else {
        return info;
    };
    info.family = match dict_get(doc, desc, b"FontFamily") {
        Some(Object::String(bytes, _)) => Some(text_string(bytes)),
        _ => None,
    };
    let flags = dict_f64(doc, desc, b"Flags").map_or(0, |f| f as i64);
    let italic_angle = dict_f64(doc, desc, b"ItalicAngle").unwrap_or(0.0);
    info.italic = flags & 64 != 0 || italic_angle != 0.0;
    info.weight_class = dict_f64(doc, desc, b"FontWeight")
        .filter(|w| *w > 0.0)
        .map(|w| (w / 100.0).round().clamp(1.0, 9.0) as u16);
    info.stretch = dict_get(doc, desc, b"FontStretch")
        .and_then(name_of)
        .and_then(FontStretch::from_pdf_name);
    info.embedded |= [b"FontFile".as_slice(), b"FontFile2", b"FontFile3"]
        .iter()
        .any(|k| desc.get(k).is_ok());
    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Stream, dictionary};

    fn simple(doc: &lopdf::Document, font: Dictionary) -> PdfFont {
        PdfFont::load(doc, &font, FontId::new(1, 0)).unwrap()
    }

    // --- simple fonts ---

    #[test]
    fn widths_from_first_char() {
        let doc = lopdf::Document::new();
        let font = simple(
            &doc,
            dictionary! {
                "Type" => "Font",
                "Subtype" => "TrueType",
                "BaseFont" => "ABCDEF+Custom",
                "FirstChar" => 65,
                "LastChar" => 66,
                "Widths" => vec![600.into(), 700.into()],
            },
        );
        assert_eq!(font.base_name, "Custom");
        let glyphs = font.decode(b"AB@");
        assert_eq!(glyphs.len(), 3);
        assert_eq!(glyphs[0].text, "A");
        assert!((glyphs[0].width - 0.6).abs() < 1e-9);
        assert!((glyphs[1].width - 0.7).abs() < 1e-9);
        assert_eq!(glyphs[2].width, 0.0);
    }

    #[test]
    fn standard_font_without_widths() {
        let doc = lopdf::Document::new();
        let font = simple(&doc, dictionary! { "Subtype" => "Type1", "BaseFont" => "Helvetica" });
        let glyphs = font.decode(b"A ");
        assert!((glyphs[0].width - 0.667).abs() < 1e-9);
        assert!(glyphs[1].word_space);
        assert!(!glyphs[0].word_space);
    }

    #[test]
    fn differences_and_to_unicode() {
        let mut doc = lopdf::Document::new();
        let to_unicode = doc.add_object(Stream::new(
            dictionary! {},
            b"beginbfchar <42> <263A> endbfchar".to_vec(),
        ));
        let font = simple(
            &doc,
            dictionary! {
                "Subtype" => "Type1",
                "BaseFont" => "Custom",
                "Encoding" => dictionary! {
                    "BaseEncoding" => "WinAnsiEncoding",
                    "Differences" => vec![65.into(), Object::Name(b"Euro".to_vec()), Object::Name(b"bullet".to_vec())],
                },
                "ToUnicode" => to_unicode,
            },
        );
        let text: Vec<String> = font.decode(b"ABC").into_iter().map(|g| g.text).collect();
        assert_eq!(text, vec!["€", "\u{263A}", "C"]);
    }

    #[test]
    fn type3_widths_use_font_matrix() {
        let doc = lopdf::Document::new();
        let font = simple(
            &doc,
            dictionary! {
                "Subtype" => "Type3",
                "FontMatrix" => vec![0.01.into(), 0.into(), 0.into(), 0.01.into(), 0.into(), 0.into()],
                "FirstChar" => 97,
                "Widths" => vec![50.into()],
            },
        );
        assert!((font.decode(b"a")[0].width - 0.5).abs() < 1e-9);
    }

    // --- composite fonts ---

    fn type0(doc: &mut lopdf::Document, encoding: Object) -> PdfFont {
        let cid_font = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "BaseFont" => "Custom",
            "DW" => 500,
            "W" => vec![
                Object::Integer(3),
                Object::Array(vec![250.into(), 300.into()]),
                10.into(),
                12.into(),
                800.into(),
            ],
        });
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => "Custom",
            "Encoding" => encoding,
            "DescendantFonts" => vec![cid_font.into()],
        };
        PdfFont::load(doc, &font, FontId::new(2, 0)).unwrap()
    }

    #[test]
    fn identity_h_two_byte_codes_and_w_array() {
        let mut doc = lopdf::Document::new();
        let font = type0(&mut doc, Object::Name(b"Identity-H".to_vec()));
        let glyphs = font.decode(&[0, 3, 0, 4, 0, 11, 0, 99]);
        let widths: Vec<f64> = glyphs.iter().map(|g| g.width).collect();
        assert_eq!(widths, vec![0.25, 0.3, 0.8, 0.5]);
        assert_eq!(glyphs[0].code, 3);
        assert!(!font.is_vertical());
    }

    #[test]
    fn identity_v_is_vertical() {
        let mut doc = lopdf::Document::new();
        let font = type0(&mut doc, Object::Name(b"Identity-V".to_vec()));
        assert!(font.is_vertical());
        assert_eq!(font.decode(&[0, 1])[0].vertical_advance, -1.0);
    }

    #[test]
    fn utf16_predefined_cmap_gives_text() {
        let mut doc = lopdf::Document::new();
        let font = type0(&mut doc, Object::Name(b"UniJIS-UCS2-H".to_vec()));
        let glyphs = font.decode(&[0x30, 0x42, 0xd8, 0x3d, 0xde, 0x00]);
        assert_eq!(glyphs.len(), 2);
        assert_eq!(glyphs[0].text, "\u{3042}");
        assert_eq!(glyphs[1].text, "\u{1F600}");
    }

    #[test]
    fn shift_jis_splits_on_lead_bytes() {
        let mut doc = lopdf::Document::new();
        let font = type0(&mut doc, Object::Name(b"90ms-RKSJ-H".to_vec()));
        let glyphs = font.decode(&[b'A', 0x82, 0xa0]);
        assert_eq!(glyphs.len(), 2);
        assert_eq!(glyphs[0].text, "A");
        assert_eq!(glyphs[1].text, "\u{3042}");
    }

    #[test]
    fn embedded_cmap_stream() {
        let mut doc = lopdf::Document::new();
        let cmap = doc.add_object(Stream::new(
            dictionary! { "Type" => "CMap" },
            b"1 begincodespacerange <00> <ff> endcodespacerange 1 begincidrange <20> <7e> 1 endcidrange".to_vec(),
        ));
        let font = type0(&mut doc, cmap.into());
        let glyphs = font.decode(b"\x22 ");
        // 0x22 maps to CID 3.
        assert_eq!(glyphs[0].width, 0.25);
        assert!(glyphs[1].word_space);
    }

    #[test]
    fn type0_without_encoding_fails() {
        let doc = lopdf::Document::new();
        let font = dictionary! { "Subtype" => "Type0", "BaseFont" => "X" };
        assert!(PdfFont::load(&doc, &font, FontId::new(3, 0)).is_err());
    }

    // --- native info ---

    #[test]
    fn native_info_from_descriptor() {
        let mut doc = lopdf::Document::new();
        let descriptor = doc.add_object(dictionary! {
            "Type" => "FontDescriptor",
            "FontName" => "ABCDEF+Univers-BoldCondensed",
            "FontFamily" => Object::string_literal("Univers"),
            "Flags" => 64,
            "FontWeight" => 700,
            "FontStretch" => "Condensed",
            "FontFile2" => Stream::new(dictionary! {}, vec![0; 4]),
        });
        let font = dictionary! {
            "Subtype" => "TrueType",
            "BaseFont" => "ABCDEF+Univers-BoldCondensed",
            "FontDescriptor" => descriptor,
        };
        let info = native_info(&doc, &font);
        assert_eq!(info.name.as_deref(), Some("ABCDEF+Univers-BoldCondensed"));
        assert_eq!(info.family.as_deref(), Some("Univers"));
        assert!(info.italic);
        assert_eq!(info.weight_class, Some(7));
        assert_eq!(info.stretch, Some(FontStretch::Condensed));
        assert!(info.embedded);
        assert!(!info.is_cid);
    }

    #[test]
    fn native_info_without_descriptor() {
        let doc = lopdf::Document::new();
        let font = dictionary! { "Subtype" => "Type1", "BaseFont" => "Helvetica" };
        let info = native_info(&doc, &font);
        assert_eq!(info.subtype, "Type1");
        assert!(!info.embedded);
        assert_eq!(info.weight_class, None);
    }

    #[test]
    fn unparseable_program_has_no_outlines() {
        let mut doc = lopdf::Document::new();
        let descriptor = doc.add_object(dictionary! {
            "FontFile2" => Stream::new(dictionary! {}, b"not a font".to_vec()),
        });
        let font = simple(
            &doc,
            dictionary! { "Subtype" => "TrueType", "BaseFont" => "Broken", "FontDescriptor" => descriptor },
        );
        assert!(!font.has_outlines());
    }
}
