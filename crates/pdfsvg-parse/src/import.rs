//! Page import: one PDF page in, one SVG document out.

use lopdf::{Dictionary, Object};
use pdfsvg_core::{
    BuilderSettings, FontContext, ImportOptions, ImportResult, OpenFailureReason, PageFrame,
    PdfError, SvgBuilder, SvgDocument,
};
use tracing::{debug, info};

use crate::interpreter::{InterpreterOptions, PageInterpreter, optional_group_key};
use crate::lopdf_backend::{LopdfDocument, dict_get, dict_name, resolve, text_string};

/// Everything needed to import one page.
#[derive(Debug, Clone)]
pub struct PageImportSettings<'a> {
    /// Crop selection, approximation precision and limits.
    pub options: ImportOptions,
    /// Font inventory, per-font fallback decisions and installed fonts.
    pub fonts: FontContext<'a>,
}

impl<'a> PageImportSettings<'a> {
    pub fn new(options: ImportOptions, fonts: FontContext<'a>) -> Self {
        Self { options, fonts }
    }

    fn builder_settings(&self, page_index: usize) -> BuilderSettings {
        BuilderSettings {
            color_delta: self.options.color_delta(),
            embed_images: self.options.embed_images,
            crop: self.options.crop.is_some(),
            page_number: page_index + 1,
        }
    }
}

/// Convert the page at `page_index` (0-based) into an SVG document.
///
/// The visible area is the box selected by `options.crop` (falling back
/// to the crop box, then the media box), or the media box without any
/// cropping clip when no box is selected. `/Rotate` is honoured.
///
/// # Errors
///
/// [`PdfError::OpenFailed`] with [`OpenFailureReason::BadPageNumber`] for
/// an index past the last page; page structure errors; builder invariant
/// violations. Problems local to single operators are returned as
/// warnings instead.
pub fn build_document_from_page(
    doc: &LopdfDocument,
    page_index: usize,
    settings: &PageImportSettings<'_>,
) -> Result<ImportResult<SvgDocument>, PdfError> {
    if page_index >= doc.page_count() {
        return Err(PdfError::OpenFailed(OpenFailureReason::BadPageNumber));
    }
    let boxes = doc.page_boxes(page_index)?;
    let view = match settings.options.crop {
        Some(which) => boxes.select(which),
        None => boxes.media,
    };
    let frame = PageFrame::new(view, boxes.rotate);
    debug!(page = page_index + 1, ?view, rotate = boxes.rotate, "importing page");

    let mut builder = SvgBuilder::new(frame, settings.builder_settings(page_index), settings.fonts);
    register_optional_groups(doc.inner(), &mut builder);

    let content = doc.page_content(page_index)?;
    let resources = doc.page_resources(page_index)?;
    let options = InterpreterOptions {
        max_recursion_depth: settings.options.max_recursion_depth,
    };
    PageInterpreter::new(doc.inner(), &mut builder, options).run(&content, resources)?;

    let mut result = builder.finish();
    if !settings.options.collect_warnings {
        result.warnings.clear();
    }
    info!(page = page_index + 1, warnings = result.warnings.len(), "page imported");
    Ok(result)
}

/// Make the document's optional content groups known to the builder,
/// with their default visibility.
fn register_optional_groups(doc: &lopdf::Document, builder: &mut SvgBuilder<'_>) {
    let Some(properties) = doc
        .catalog()
        .ok()
        .and_then(|c| dict_get(doc, c, b"OCProperties"))
        .and_then(|o| o.as_dict().ok())
    else {
        return;
    };
    let Some(Object::Array(groups)) = dict_get(doc, properties, b"OCGs") else {
        return;
    };
    let config = dict_get(doc, properties, b"D").and_then(|o| o.as_dict().ok());
    let base_on = config.and_then(|d| dict_name(doc, d, b"BaseState")) != Some("OFF");
    let listed = |key: &[u8], id: lopdf::ObjectId| -> bool {
        config
            .and_then(|d| d.get(key).ok())
            .map(|o| resolve(doc, o))
            .and_then(|o| o.as_array().ok())
            .is_some_and(|items| {
                items.iter().any(|i| matches!(i, Object::Reference(r) if *r == id))
            })
    };

    for entry in groups {
        let Object::Reference(id) = entry else {
            continue;
        };
        let Some(group) = doc.get_object(*id).ok().and_then(|o| o.as_dict().ok()) else {
            continue;
        };
        let label = group_label(doc, group).unwrap_or_else(|| format!("Layer {}", id.0));
        let visible = if base_on { !listed(b"OFF", *id) } else { listed(b"ON", *id) };
        debug!(label = %label, visible, "optional content group");
        builder.add_optional_group(&optional_group_key(*id), &label, visible);
    }
}

fn group_label(doc: &lopdf::Document, group: &Dictionary) -> Option<String> {
    match dict_get(doc, group, b"Name")? {
        Object::String(bytes, _) => Some(text_string(bytes)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lopdf_backend::test_pdf::Builder;
    use lopdf::dictionary;
    use pdfsvg_core::{CropBox, FontCatalog, FontStrategies, ImportWarningCode, MemoryFontCatalog};

    fn import(
        doc: &LopdfDocument,
        index: usize,
        options: ImportOptions,
    ) -> Result<ImportResult<SvgDocument>, PdfError> {
        let catalog = FontCatalog::new();
        let strategies = FontStrategies::new();
        let system = MemoryFontCatalog::default();
        let settings = PageImportSettings::new(
            options,
            FontContext {
                catalog: &catalog,
                strategies: &strategies,
                system: &system,
            },
        );
        build_document_from_page(doc, index, &settings)
    }

    #[test]
    fn red_square_page() {
        let mut b = Builder::new();
        b.page(b"1 0 0 rg 50 50 100 100 re f", Dictionary::new());
        let doc = LopdfDocument::from_document(b.finish()).unwrap();
        let result = import(&doc, 0, ImportOptions::default()).unwrap();
        assert!(result.is_clean());
        let svg = result.value.to_svg_string();
        assert!(svg.contains("#ff0000"), "{svg}");
        assert!(svg.contains("width=\"200\""), "{svg}");
    }

    #[test]
    fn page_index_out_of_range() {
        let mut b = Builder::new();
        b.page(b"", Dictionary::new());
        let doc = LopdfDocument::from_document(b.finish()).unwrap();
        let err = import(&doc, 1, ImportOptions::default()).unwrap_err();
        assert_eq!(err.open_failure(), Some(OpenFailureReason::BadPageNumber));
    }

    #[test]
    fn crop_box_selects_the_view() {
        let mut b = Builder::new();
        b.page_with(
            b"",
            Dictionary::new(),
            dictionary! { "CropBox" => vec![10.into(), 10.into(), 110.into(), 60.into()] },
        );
        let doc = LopdfDocument::from_document(b.finish()).unwrap();
        let options = ImportOptions {
            crop: Some(CropBox::Crop),
            ..ImportOptions::default()
        };
        let svg = import(&doc, 0, options).unwrap().value.to_svg_string();
        assert!(svg.contains("width=\"100\""), "{svg}");
        assert!(svg.contains("height=\"50\""), "{svg}");

        let uncropped = import(&doc, 0, ImportOptions::default()).unwrap().value;
        assert!(uncropped.elements_named("clipPath").is_empty());
    }

    #[test]
    fn rotated_page_swaps_dimensions() {
        let mut b = Builder::new();
        b.page_with(
            b"",
            Dictionary::new(),
            dictionary! {
                "MediaBox" => vec![0.into(), 0.into(), 200.into(), 100.into()],
                "Rotate" => 90,
            },
        );
        let doc = LopdfDocument::from_document(b.finish()).unwrap();
        let svg = import(&doc, 0, ImportOptions::default()).unwrap().value.to_svg_string();
        assert!(svg.contains("width=\"100\""), "{svg}");
        assert!(svg.contains("height=\"200\""), "{svg}");
    }

    #[test]
    fn warnings_can_be_suppressed() {
        let mut b = Builder::new();
        b.page(b"Q /Missing Do", Dictionary::new());
        let doc = LopdfDocument::from_document(b.finish()).unwrap();
        let noisy = import(&doc, 0, ImportOptions::default()).unwrap();
        assert!(noisy.warnings.iter().any(|w| w.code == ImportWarningCode::UnbalancedState));
        assert!(noisy.warnings.iter().all(|w| w.page == Some(1)));
        let quiet = import(
            &doc,
            0,
            ImportOptions {
                collect_warnings: false,
                ..ImportOptions::default()
            },
        )
        .unwrap();
        assert!(quiet.is_clean());
    }

    #[test]
    fn optional_content_defaults_come_from_the_catalog() {
        let mut b = Builder::new();
        let layer = |name: &str| {
            dictionary! { "Type" => "OCG", "Name" => Object::string_literal(name) }
        };
        let shown = b.doc.add_object(layer("Shown"));
        let hidden = b.doc.add_object(layer("Hidden"));
        b.page(
            b"/OC /a BDC 0 0 5 5 re f EMC /OC /b BDC 0 0 5 5 re f EMC",
            dictionary! { "Properties" => dictionary! { "a" => shown, "b" => hidden } },
        );
        let mut pdf = b.finish();
        let ocp = dictionary! {
            "OCGs" => vec![shown.into(), hidden.into()],
            "D" => dictionary! { "OFF" => vec![hidden.into()] },
        };
        let root = pdf.trailer.get(b"Root").unwrap().as_reference().unwrap();
        pdf.get_object_mut(root)
            .unwrap()
            .as_dict_mut()
            .unwrap()
            .set("OCProperties", ocp);
        let doc = LopdfDocument::from_document(pdf).unwrap();
        let svg = import(&doc, 0, ImportOptions::default()).unwrap().value;
        let layer = |label: &str| {
            svg.elements_named("g")
                .into_iter()
                .find(|g| svg.attr(*g, "inkscape:label") == Some(label))
                .unwrap()
        };
        assert_eq!(svg.style(layer("Shown"), "display"), None);
        assert_eq!(svg.style(layer("Hidden"), "display"), Some("none"));
    }
}
