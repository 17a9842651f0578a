//! pdfsvg: Convert PDF pages into SVG documents.
//!
//! This is the public API facade crate for pdfsvg-rs. It re-exports types from
//! pdfsvg-core and uses pdfsvg-parse for PDF reading and interpretation.
//!
//! # Architecture
//!
//! - **pdfsvg-core**: Backend-independent data types and the SVG builder
//! - **pdfsvg-parse**: PDF access through lopdf and the content stream interpreter
//! - **pdfsvg** (this crate): Public API that ties everything together
//!
//! # Example
//!
//! ```ignore
//! use pdfsvg::{Pdf, parse_page_range};
//!
//! let pdf = Pdf::open_file("input.pdf", None)?;
//! for (index, result) in pdf.render_pages(parse_page_range("1,3-5", pdf.page_count())?) {
//!     let page = result?;
//!     for warning in &page.warnings {
//!         eprintln!("{warning}");
//!     }
//!     std::fs::write(format!("page{}.svg", index + 1), page.value.to_svg_string())?;
//! }
//! ```

mod page_range;
mod pdf;
mod report;
#[cfg(feature = "system-fonts")]
mod system_fonts;

pub use page_range::{PageRangeError, parse_page_range};
pub use pdf::Pdf;
#[cfg(feature = "serde")]
pub use report::font_reports_json;
pub use report::{FontReport, font_reports};
#[cfg(feature = "system-fonts")]
pub use system_fonts::SystemFontCatalog;

pub use pdfsvg_core::{
    CropBox, FontCatalog, FontFallback, FontId, FontRecord, FontStrategies, FontStrategy,
    FontSystemCatalog, ImportOptions, ImportResult, ImportWarning, ImportWarningCode,
    MemoryFontCatalog, OpenFailureReason, PageBoxes, PdfError, Rect, SvgDocument,
};

pub use pdfsvg_core;
pub use pdfsvg_parse;
