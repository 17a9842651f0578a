//! Document-wide font inventory.
//!
//! [`get_pdf_fonts`] visits every page's resources, and the resources of
//! the form XObjects and tiling patterns they reach, and records each font
//! once under a stable [`FontId`].

use std::collections::HashSet;

use lopdf::{Dictionary, Object, ObjectId};
use pdfsvg_core::{FontCatalog, FontData, FontId, FontSystemCatalog};
use tracing::{debug, trace, warn};

use crate::fonts::native_info;
use crate::lopdf_backend::{LopdfDocument, resolve};
use crate::value::hash31;

/// A font entry of a resource dictionary.
#[derive(Debug, Clone, Copy)]
pub struct ResourceFont<'a> {
    /// Resource name used with `Tf`.
    pub name: &'a [u8],
    pub id: FontId,
    pub dict: &'a Dictionary,
}

/// Identity of the font stored as `value` at position `index` of a
/// `/Font` dictionary. `font_dict` is the object id of that dictionary
/// when it is an indirect object.
pub fn font_id(value: &Object, index: usize, font_dict: Option<ObjectId>) -> FontId {
    match (value, font_dict) {
        (Object::Reference((num, r#gen)), _) => FontId::new(*num, u32::from(*r#gen)),
        (_, Some((dict_num, _))) => FontId::positional(index as u32, dict_num),
        _ => FontId::hashed(hash31(value)),
    }
}

/// Fonts of a resource dictionary, in stored order.
///
/// Entries that are not dictionaries are skipped.
pub fn resource_fonts<'a>(
    doc: &'a lopdf::Document,
    resources: &'a Dictionary,
) -> Vec<ResourceFont<'a>> {
    let Ok(entry) = resources.get(b"Font") else {
        return Vec::new();
    };
    let font_dict_id = match entry {
        Object::Reference(id) => Some(*id),
        _ => None,
    };
    let Ok(fonts) = resolve(doc, entry).as_dict() else {
        return Vec::new();
    };
    fonts
        .iter()
        .enumerate()
        .filter_map(|(index, (name, value))| {
            let dict = resolve(doc, value).as_dict().ok()?;
            Some(ResourceFont {
                name: name.as_slice(),
                id: font_id(value, index, font_dict_id),
                dict,
            })
        })
        .collect()
}

struct Pending<'a> {
    resources: &'a Dictionary,
    depth: usize,
}

/// Build the font catalog of `doc`.
///
/// Pages are numbered from 1. `max_depth` bounds how deeply nested form
/// XObjects and patterns are followed.
pub fn get_pdf_fonts(
    doc: &LopdfDocument,
    system: &dyn FontSystemCatalog,
    max_depth: usize,
) -> FontCatalog {
    let mut catalog = FontCatalog::new();
    let inner = doc.inner();
    // Shared by all pages: a form reached from several pages is walked once.
    let mut visited: HashSet<u32> = HashSet::new();
    for index in 0..doc.page_count() {
        let page = index as u32 + 1;
        let resources = match doc.page_resources(index) {
            Ok(Some(r)) => r,
            Ok(None) => continue,
            Err(e) => {
                warn!(page, error = %e, "page resources unreadable, fonts skipped");
                continue;
            }
        };
        collect_page_fonts(inner, resources, page, system, max_depth, &mut visited, &mut catalog);
    }
    debug!(fonts = catalog.len(), "font catalog built");
    catalog
}

fn collect_page_fonts(
    doc: &lopdf::Document,
    resources: &Dictionary,
    page: u32,
    system: &dyn FontSystemCatalog,
    max_depth: usize,
    visited: &mut HashSet<u32>,
    catalog: &mut FontCatalog,
) {
    let mut work = vec![Pending { resources, depth: 0 }];
    while let Some(Pending { resources, depth }) = work.pop() {
        for font in resource_fonts(doc, resources) {
            catalog.insert_with(font.id, page, || {
                let native = native_info(doc, font.dict);
                let data = FontData::new(&native, system);
                (native, data)
            });
        }
        if depth >= max_depth {
            debug!(page, depth, "resource depth limit reached");
            continue;
        }
        for category in [b"XObject".as_slice(), b"Pattern"] {
            let entries = resources.get(category).ok().and_then(|o| resolve(doc, o).as_dict().ok());
            let Some(entries) = entries else {
                continue;
            };
            for (_, value) in entries.iter() {
                if let Some(child) = child_resources(doc, value, resources, visited) {
                    work.push(Pending {
                        resources: child,
                        depth: depth + 1,
                    });
                }
            }
        }
    }
}

/// Resources of an XObject or pattern stream whose object number and
/// resources object number have not been seen before.
fn child_resources<'a>(
    doc: &'a lopdf::Document,
    value: &'a Object,
    parent: &Dictionary,
    visited: &mut HashSet<u32>,
) -> Option<&'a Dictionary> {
    if let Object::Reference(id) = value {
        if !visited.insert(id.0) {
            trace!(?id, "already visited");
            return None;
        }
    }
    let stream = resolve(doc, value).as_stream().ok()?;
    let entry = stream.dict.get(b"Resources").ok()?;
    if let Object::Reference(id) = entry {
        if !visited.insert(id.0) {
            return None;
        }
    }
    let child = resolve(doc, entry).as_dict().ok()?;
    if std::ptr::eq(child, parent) || child == parent {
        return None;
    }
    Some(child)
}
