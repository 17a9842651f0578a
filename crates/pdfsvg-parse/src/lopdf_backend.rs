//! lopdf-based document access.
//!
//! [`LopdfDocument`] opens a file, caches the page order and answers the
//! page-level questions the importer asks: boxes, rotation, resources and
//! content bytes, with attribute inheritance through the page tree. The
//! free functions are small helpers for reading lopdf objects leniently.

use lopdf::{Dictionary, Object, ObjectId, Stream};
use pdfsvg_core::{OpenFailureReason, PageBoxes, Rect};
use tracing::{debug, warn};

use crate::error::BackendError;

/// Deepest `/Parent` chain followed when resolving inherited attributes.
const MAX_PAGE_TREE_DEPTH: usize = 64;

/// A parsed PDF document backed by lopdf.
pub struct LopdfDocument {
    inner: lopdf::Document,
    /// Page object ids in page order.
    page_ids: Vec<ObjectId>,
}

impl std::fmt::Debug for LopdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LopdfDocument")
            .field("page_count", &self.page_ids.len())
            .finish_non_exhaustive()
    }
}

fn open_reason(err: &lopdf::Error) -> OpenFailureReason {
    let msg = err.to_string().to_lowercase();
    if msg.contains("encrypt") || msg.contains("decrypt") || msg.contains("password") {
        OpenFailureReason::Encrypted
    } else if msg.contains("header") {
        OpenFailureReason::OpenFile
    } else if msg.contains("i/o") || msg.contains("io error") {
        OpenFailureReason::FileIo
    } else if msg.contains("catalog") || msg.contains("root") {
        OpenFailureReason::BadCatalog
    } else {
        OpenFailureReason::Damaged
    }
}

impl LopdfDocument {
    /// Parse a document from memory.
    ///
    /// # Errors
    ///
    /// [`BackendError::Open`] with the reason the document was rejected.
    /// Encrypted documents are always rejected.
    pub fn open(bytes: &[u8]) -> Result<Self, BackendError> {
        let head = &bytes[..bytes.len().min(1024)];
        if !head.windows(5).any(|w| w == b"%PDF-") {
            return Err(BackendError::Open(OpenFailureReason::OpenFile));
        }
        let inner = lopdf::Document::load_mem(bytes).map_err(|e| {
            debug!(error = %e, "lopdf rejected the document");
            BackendError::Open(open_reason(&e))
        })?;
        Self::from_document(inner)
    }

    /// Wrap a document that is already loaded.
    pub fn from_document(inner: lopdf::Document) -> Result<Self, BackendError> {
        if inner.is_encrypted() {
            return Err(BackendError::Open(OpenFailureReason::Encrypted));
        }
        if inner.catalog().is_err() {
            return Err(BackendError::Open(OpenFailureReason::BadCatalog));
        }
        let page_ids = inner.get_pages().into_values().collect();
        Ok(Self { inner, page_ids })
    }

    pub fn inner(&self) -> &lopdf::Document {
        &self.inner
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Object id of the page at 0-based `index`.
    pub fn page_id(&self, index: usize) -> Result<ObjectId, BackendError> {
        self.page_ids
            .get(index)
            .copied()
            .ok_or(BackendError::Open(OpenFailureReason::BadPageNumber))
    }

    fn page_dict(&self, index: usize) -> Result<&Dictionary, BackendError> {
        let id = self.page_id(index)?;
        self.inner
            .get_object(id)
            .and_then(Object::as_dict)
            .map_err(|e| BackendError::Parse(format!("page {index}: {e}")))
    }

    /// Look `key` up on the page or its ancestors.
    pub fn inherited(&self, index: usize, key: &[u8]) -> Result<Option<&Object>, BackendError> {
        let mut dict = self.page_dict(index)?;
        for _ in 0..MAX_PAGE_TREE_DEPTH {
            if let Ok(value) = dict.get(key) {
                return Ok(Some(resolve(&self.inner, value)));
            }
            match dict.get(b"Parent").map(|p| resolve(&self.inner, p)) {
                Ok(Object::Dictionary(parent)) => dict = parent,
                _ => return Ok(None),
            }
        }
        warn!(page = index, "page tree too deep, inherited attribute not found");
        Ok(None)
    }

    /// All page boxes and the normalized rotation.
    ///
    /// A missing or malformed media box falls back to US Letter.
    pub fn page_boxes(&self, index: usize) -> Result<PageBoxes, BackendError> {
        let doc = &self.inner;
        let read = |key: &[u8]| -> Result<Option<Rect>, BackendError> {
            Ok(self.inherited(index, key)?.and_then(|o| rect_from(doc, o)))
        };
        let media = match read(b"MediaBox")? {
            Some(r) if !r.is_empty() => r,
            _ => {
                warn!(page = index, "no usable MediaBox, assuming US Letter");
                Rect::new(0.0, 0.0, 612.0, 792.0)
            }
        };
        let mut boxes = PageBoxes::new(media);
        boxes.crop = read(b"CropBox")?;
        boxes.trim = read(b"TrimBox")?;
        boxes.bleed = read(b"BleedBox")?;
        boxes.art = read(b"ArtBox")?;
        boxes.rotate = match self.inherited(index, b"Rotate")? {
            Some(obj) => PageBoxes::normalize_rotation(object_to_f64(obj).map_or(0, |r| r as i64)),
            None => 0,
        };
        Ok(boxes)
    }

    /// The page's resource dictionary, inherited if needed.
    pub fn page_resources(&self, index: usize) -> Result<Option<&Dictionary>, BackendError> {
        Ok(self.inherited(index, b"Resources")?.and_then(|o| o.as_dict().ok()))
    }

    /// Decoded content of all `/Contents` streams, joined by whitespace.
    pub fn page_content(&self, index: usize) -> Result<Vec<u8>, BackendError> {
        let page = self.page_dict(index)?;
        let Ok(contents) = page.get(b"Contents") else {
            return Ok(Vec::new());
        };
        let parts: Vec<&Object> = match resolve(&self.inner, contents) {
            Object::Array(items) => items.iter().collect(),
            other => vec![other],
        };
        let mut out = Vec::new();
        for part in parts {
            let Ok(stream) = resolve(&self.inner, part).as_stream() else {
                warn!(page = index, "content entry is not a stream");
                continue;
            };
            match stream_data(stream) {
                Ok(bytes) => {
                    if !out.is_empty() {
                        out.push(b'\n');
                    }
                    out.extend_from_slice(&bytes);
                }
                Err(e) => warn!(page = index, error = %e, "content stream skipped"),
            }
        }
        Ok(out)
    }
}

/// Follow references until a direct object is reached.
pub fn resolve<'a>(doc: &'a lopdf::Document, obj: &'a Object) -> &'a Object {
    let mut current = obj;
    for _ in 0..32 {
        match current {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(next) => current = next,
                Err(_) => return &Object::Null,
            },
            _ => return current,
        }
    }
    &Object::Null
}

/// `dict[key]` with references resolved.
pub fn dict_get<'a>(
    doc: &'a lopdf::Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Object> {
    dict.get(key).ok().map(|o| resolve(doc, o)).filter(|o| !matches!(o, Object::Null))
}

pub fn dict_f64(doc: &lopdf::Document, dict: &Dictionary, key: &[u8]) -> Option<f64> {
    dict_get(doc, dict, key).and_then(object_to_f64)
}

pub fn dict_name<'a>(
    doc: &'a lopdf::Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a str> {
    dict_get(doc, dict, key).and_then(name_of)
}

pub fn dict_bool(doc: &lopdf::Document, dict: &Dictionary, key: &[u8]) -> Option<bool> {
    match dict_get(doc, dict, key) {
        Some(Object::Boolean(b)) => Some(*b),
        _ => None,
    }
}

/// Dictionary of a dictionary or stream object.
pub fn as_dict_like(obj: &Object) -> Option<&Dictionary> {
    match obj {
        Object::Dictionary(d) => Some(d),
        Object::Stream(s) => Some(&s.dict),
        _ => None,
    }
}

pub fn object_to_f64(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

pub fn name_of(obj: &Object) -> Option<&str> {
    match obj {
        Object::Name(n) => std::str::from_utf8(n).ok(),
        _ => None,
    }
}

/// Numbers of an array, resolving indirect elements. `None` when any
/// element is not a number.
pub fn numbers(doc: &lopdf::Document, obj: &Object) -> Option<Vec<f64>> {
    match resolve(doc, obj) {
        Object::Array(items) => items.iter().map(|i| object_to_f64(resolve(doc, i))).collect(),
        _ => None,
    }
}

/// A `[x0 y0 x1 y1]` rectangle.
pub fn rect_from(doc: &lopdf::Document, obj: &Object) -> Option<Rect> {
    match numbers(doc, obj)?.as_slice() {
        [x0, y0, x1, y1] => Some(Rect::new(*x0, *y0, *x1, *y1)),
        _ => None,
    }
}

/// Names listed in `/Filter`, in decoding order.
pub fn filters(doc: &lopdf::Document, dict: &Dictionary) -> Vec<String> {
    match dict_get(doc, dict, b"Filter") {
        Some(Object::Name(n)) => vec![String::from_utf8_lossy(n).into_owned()],
        Some(Object::Array(items)) => items
            .iter()
            .filter_map(|i| name_of(resolve(doc, i)).map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// Decoded stream bytes.
pub fn stream_data(stream: &Stream) -> Result<Vec<u8>, BackendError> {
    if stream.dict.get(b"Filter").is_ok() {
        stream
            .decompressed_content()
            .map_err(|e| BackendError::Parse(format!("failed to decode stream: {e}")))
    } else {
        Ok(stream.content.clone())
    }
}

/// A PDF text string: UTF-16BE with a byte order mark, else treated as
/// Latin-1.
pub fn text_string(bytes: &[u8]) -> String {
    match bytes {
        [0xfe, 0xff, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks(2)
                .map(|c| u16::from_be_bytes([c[0], c.get(1).copied().unwrap_or(0)]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        [0xef, 0xbb, 0xbf, rest @ ..] => String::from_utf8_lossy(rest).into_owned(),
        _ => bytes.iter().map(|b| char::from(*b)).collect(),
    }
}
