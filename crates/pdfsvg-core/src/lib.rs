//! pdfsvg-core: Backend-independent data types and the SVG builder.
//!
//! This crate holds the geometry, paint and font model shared by the
//! pdfsvg-rs crates, together with [`SvgBuilder`], which turns graphics
//! operations reported by a content-stream interpreter into an
//! [`SvgDocument`]. It does not parse PDF files; see `pdfsvg-parse`.

pub mod builder;
pub mod clip;
pub mod color;
pub mod document;
pub mod error;
pub mod font;
pub mod font_system;
pub mod function;
pub mod geometry;
pub mod icc;
pub mod image;
pub mod page;
pub mod path;
pub mod shading;
pub mod state;
pub mod text;

pub use builder::{
    BuilderSettings, ContainerKind, FontContext, GlyphInput, GroupOptions, SvgBuilder,
    TilingPatternInfo,
};
pub use clip::{ClipEntry, ClipHistory};
pub use color::{Color, ColorSpace, IccColor};
pub use document::{Node, NodeId, SvgDocument};
pub use error::{
    ImportOptions, ImportResult, ImportWarning, ImportWarningCode, InvariantViolation,
    OpenFailureReason, PdfError, color_delta_for_precision,
};
pub use font::{
    FontCatalog, FontData, FontFallback, FontId, FontRecord, FontStrategies, FontStrategy,
    FontStretch, NativeFontInfo, auto_font_strategies, strip_subset_tag,
};
pub use font_system::{FontDescription, FontSystemCatalog, MemoryFontCatalog};
pub use function::{FunctionError, PdfFunction};
pub use geometry::{Affine, Point, Rect, ctm_to_affine};
pub use image::{ColorKeyMask, RasterImage, StencilMask};
pub use page::{CropBox, PageBoxes, PageFrame};
pub use path::{FillRule, Path, PathBuilder, PathSegment};
pub use shading::{MeshVertex, Shading, ShadingKind};
pub use state::{BlendMode, DashPattern, GraphicsState, LineCap, LineJoin, Paint};
pub use text::{GlyphOutlines, TextFont, TextRenderMode, TextState};
