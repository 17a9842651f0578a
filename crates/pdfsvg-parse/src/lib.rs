//! pdfsvg-parse: PDF parsing backend and content stream interpreter.
//!
//! This crate reads PDF documents with lopdf, inventories their fonts,
//! and interprets page content streams, reporting drawing operations to
//! the [`SvgBuilder`](pdfsvg_core::SvgBuilder) of pdfsvg-core.
//! [`build_document_from_page`] ties the pieces together for one page.

pub mod cmap;
pub mod color_space;
pub mod encoding;
pub mod error;
pub mod font_catalog;
pub mod fonts;
pub mod function;
pub mod images;
pub mod import;
pub mod interpreter;
pub mod lopdf_backend;
pub mod shading;
pub mod standard_fonts;
pub mod tokenizer;
pub mod value;

pub use error::BackendError;
pub use font_catalog::get_pdf_fonts;
pub use import::{PageImportSettings, build_document_from_page};
pub use interpreter::{InterpreterOptions, PageInterpreter};
pub use lopdf_backend::LopdfDocument;
pub use pdfsvg_core;
