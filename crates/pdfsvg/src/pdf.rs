use pdfsvg_core::{
    FontCatalog, FontContext, FontFallback, FontId, FontStrategies, FontSystemCatalog,
    ImportOptions, ImportResult, PageBoxes, PdfError, SvgDocument, auto_font_strategies,
};
use pdfsvg_parse::{LopdfDocument, PageImportSettings, build_document_from_page, get_pdf_fonts};
use tracing::{debug, warn};

/// An open PDF document, ready to render pages as SVG.
///
/// Opening walks every page once to build the [`FontCatalog`]; the per-font
/// fallback decisions derived from it can be adjusted before rendering.
///
/// # Example
///
/// ```ignore
/// let pdf = Pdf::open_file("input.pdf", None)?;
/// let page = pdf.render_page(0)?;
/// page.value.write_to(std::fs::File::create("page1.svg")?)?;
/// ```
pub struct Pdf {
    doc: LopdfDocument,
    options: ImportOptions,
    system: Box<dyn FontSystemCatalog>,
    fonts: FontCatalog,
    strategies: FontStrategies,
}

impl std::fmt::Debug for Pdf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pdf")
            .field("pages", &self.doc.page_count())
            .field("fonts", &self.fonts.len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Pdf {
    /// Open a PDF document from bytes.
    ///
    /// Without the `system-fonts` feature no font counts as installed.
    ///
    /// # Errors
    ///
    /// [`PdfError::OpenFailed`] for encrypted or unreadable documents,
    /// [`PdfError::ParseError`] for malformed ones.
    pub fn open(bytes: &[u8], options: Option<ImportOptions>) -> Result<Self, PdfError> {
        Self::open_with_fonts(bytes, options, default_font_system())
    }

    /// Open a PDF document from a file path.
    #[cfg(feature = "std")]
    pub fn open_file(
        path: impl AsRef<std::path::Path>,
        options: Option<ImportOptions>,
    ) -> Result<Self, PdfError> {
        let bytes = std::fs::read(path.as_ref()).map_err(|e| PdfError::IoError(e.to_string()))?;
        Self::open(&bytes, options)
    }

    /// Open a PDF document, resolving fonts against `system`.
    pub fn open_with_fonts(
        bytes: &[u8],
        options: Option<ImportOptions>,
        system: Box<dyn FontSystemCatalog>,
    ) -> Result<Self, PdfError> {
        let doc = LopdfDocument::open(bytes).map_err(PdfError::from)?;
        let options = options.unwrap_or_default();
        let fonts = get_pdf_fonts(&doc, system.as_ref(), options.max_resource_depth);
        let strategies = auto_font_strategies(options.font_strategy, &fonts);
        debug!(pages = doc.page_count(), fonts = fonts.len(), "document opened");
        Ok(Self {
            doc,
            options,
            system,
            fonts,
            strategies,
        })
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.doc.page_count()
    }

    /// The declared boxes and rotation of the page at `index` (0-based).
    pub fn page_boxes(&self, index: usize) -> Result<PageBoxes, PdfError> {
        self.doc.page_boxes(index).map_err(PdfError::from)
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// The document's font inventory.
    pub fn fonts(&self) -> &FontCatalog {
        &self.fonts
    }

    pub fn font_strategies(&self) -> &FontStrategies {
        &self.strategies
    }

    /// Override how text in one font is rendered. Unknown ids are ignored.
    pub fn set_font_fallback(&mut self, id: FontId, fallback: FontFallback) {
        if self.fonts.contains(&id) {
            self.strategies.insert(id, fallback);
        } else {
            warn!(font = %id, "fallback set for a font not in the catalog");
        }
    }

    /// Render the page at `index` (0-based).
    ///
    /// # Errors
    ///
    /// [`PdfError::OpenFailed`] with `BadPageNumber` past the last page,
    /// or an error that aborted the page. Recoverable problems are
    /// reported as warnings of the result.
    pub fn render_page(&self, index: usize) -> Result<ImportResult<SvgDocument>, PdfError> {
        let settings = PageImportSettings::new(
            self.options.clone(),
            FontContext {
                catalog: &self.fonts,
                strategies: &self.strategies,
                system: self.system.as_ref(),
            },
        );
        build_document_from_page(&self.doc, index, &settings)
    }

    /// Render several pages lazily, in the given order.
    ///
    /// A failing page does not stop the iteration.
    pub fn render_pages<'a, I>(
        &'a self,
        indices: I,
    ) -> impl Iterator<Item = (usize, Result<ImportResult<SvgDocument>, PdfError>)> + 'a
    where
        I: IntoIterator<Item = usize>,
        I::IntoIter: 'a,
    {
        indices.into_iter().map(move |index| (index, self.render_page(index)))
    }
}

#[cfg(feature = "system-fonts")]
fn default_font_system() -> Box<dyn FontSystemCatalog> {
    Box::new(crate::system_fonts::SystemFontCatalog::new())
}

#[cfg(not(feature = "system-fonts"))]
fn default_font_system() -> Box<dyn FontSystemCatalog> {
    Box::new(pdfsvg_core::MemoryFontCatalog::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Object, Stream, dictionary};
    use pdfsvg_core::{FontStrategy, OpenFailureReason};

    fn pdf_with_content(pages: &[&[u8]]) -> Vec<u8> {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let kids: Vec<Object> = pages
            .iter()
            .map(|content| {
                let content_id = doc.add_object(Stream::new(dictionary! {}, content.to_vec()));
                Object::Reference(doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                    "Contents" => content_id,
                    "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
                }))
            })
            .collect();
        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! { "Type" => "Pages", "Kids" => kids, "Count" => count }),
        );
        let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog);
        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn open_counts_pages_and_fonts() {
        let bytes = pdf_with_content(&[b"".as_slice(), b"BT /F1 12 Tf (x) Tj ET".as_slice()]);
        let pdf = Pdf::open(&bytes, None).unwrap();
        assert_eq!(pdf.page_count(), 2);
        assert_eq!(pdf.fonts().len(), 1);
        let record = pdf.fonts().iter().next().unwrap();
        assert_eq!(record.pages.iter().copied().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn open_rejects_garbage() {
        assert!(Pdf::open(b"not a pdf", None).is_err());
    }

    #[test]
    fn default_strategy_renders_missing_fonts_as_shapes() {
        let pdf = Pdf::open(&pdf_with_content(&[b"".as_slice()]), None).unwrap();
        let id = pdf.fonts().iter().next().unwrap().id;
        assert_eq!(pdf.font_strategies().get(&id), Some(&FontFallback::AsVectorShapes));
    }

    #[test]
    fn fallback_override_only_for_known_fonts() {
        let options = ImportOptions {
            font_strategy: FontStrategy::KeepMissing,
            ..ImportOptions::default()
        };
        let bytes = pdf_with_content(&[b"BT /F1 12 Tf (x) Tj ET".as_slice()]);
        let mut pdf = Pdf::open(&bytes, Some(options)).unwrap();
        let id = pdf.fonts().iter().next().unwrap().id;
        pdf.set_font_fallback(id, FontFallback::DeleteText);
        pdf.set_font_fallback(FontId::new(999, 0), FontFallback::DeleteText);
        assert_eq!(pdf.font_strategies().len(), 1);
        let svg = pdf.render_page(0).unwrap().value;
        assert!(svg.elements_named("text").is_empty());
    }

    #[test]
    fn render_page_past_the_end() {
        let pdf = Pdf::open(&pdf_with_content(&[b"".as_slice()]), None).unwrap();
        let err = pdf.render_page(3).unwrap_err();
        assert_eq!(err.open_failure(), Some(OpenFailureReason::BadPageNumber));
    }

    #[test]
    fn render_pages_keeps_going_after_a_failure() {
        let bytes = pdf_with_content(&[b"0 0 10 10 re f".as_slice(), b"".as_slice()]);
        let pdf = Pdf::open(&bytes, None).unwrap();
        let results: Vec<_> = pdf.render_pages([0, 5, 1]).collect();
        assert_eq!(results.len(), 3);
        assert!(results[0].1.is_ok());
        assert!(results[1].1.is_err());
        assert_eq!(results[2].0, 1);
        assert!(results[2].1.is_ok());
    }

    #[test]
    fn page_boxes_report_media() {
        let pdf = Pdf::open(&pdf_with_content(&[b"".as_slice()]), None).unwrap();
        let boxes = pdf.page_boxes(0).unwrap();
        assert_eq!(boxes.media.width(), 612.0);
        assert_eq!(boxes.rotate, 0);
    }
}
